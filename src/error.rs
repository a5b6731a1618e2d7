/*
 * Copyright 2020 Joyent, Inc.
 */

use std::error::Error as StdError;
use std::fmt;

#[derive(Debug)]
pub enum Error {
    /// A configuration value was rejected, or a frozen configuration was
    /// mutated.
    Configuration(String),
    /// A network or bind failure while opening a session.
    Connection(String),
    /// A liveness check on a connection failed outright.
    Validation(String),
    /// No connection became available before the checkout timeout elapsed.
    PoolExhausted(String),
    /// The pool could not create its minimum connections at startup.
    PoolInitialization(String),
    /// The pool was used in a way its lifecycle does not allow.
    Pool(String),
    IOError(std::io::Error),
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Error::IOError(error)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Configuration(err_str) => err_str.fmt(fmt),
            Error::Connection(err_str) => err_str.fmt(fmt),
            Error::Validation(err_str) => err_str.fmt(fmt),
            Error::PoolExhausted(err_str) => err_str.fmt(fmt),
            Error::PoolInitialization(err_str) => err_str.fmt(fmt),
            Error::Pool(err_str) => err_str.fmt(fmt),
            Error::IOError(io_err) => io_err.fmt(fmt),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Error::IOError(io_err) => Some(io_err),
            _ => None,
        }
    }
}
