/*
 * Copyright 2020 Joyent, Inc.
 */

use crate::connection::Connection;
use crate::error::Error;

/// A cheap liveness check applied to pooled connections.
///
/// `Ok(false)` and `Err(_)` are both treated as "invalid" by the pool; the
/// error form only adds diagnostic detail to the log. The pool never
/// propagates a validation failure to checkout or checkin callers.
pub trait ConnectionValidator: Send + Sync {
    fn validate(&self, connection: &mut Connection) -> Result<bool, Error>;
}

/// The default validator: a connection is considered live while it holds an
/// open session.
#[derive(Clone, Copy, Debug, Default)]
pub struct OpenStateValidator;

impl ConnectionValidator for OpenStateValidator {
    fn validate(&self, connection: &mut Connection) -> Result<bool, Error> {
        Ok(connection.is_open())
    }
}
