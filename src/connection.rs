/*
 * Copyright 2020 Joyent, Inc.
 */

use std::fmt;
use std::sync::Arc;

use slog::{info, warn, Logger};

use crate::config::EndpointConfig;
use crate::endpoint::{srv_key, Endpoint};
use crate::error::Error;
use crate::provider::{BindOutcome, BindRequest, RawSession, SessionFactory};
use crate::strategy::EndpointSelector;

/// A logical connection to a directory service.
///
/// A connection owns its raw session exclusively while open. Opening walks
/// the candidate endpoints chosen by the factory's strategy, falling through
/// to the next endpoint on a connection fault and surfacing the last fault
/// when all candidates are exhausted.
pub struct Connection {
    config: Arc<EndpointConfig>,
    session_factory: Arc<dyn SessionFactory>,
    selector: Arc<EndpointSelector>,
    session: Option<Box<dyn RawSession>>,
    connected_endpoint: Option<Endpoint>,
    log: Logger,
}

impl Connection {
    pub(crate) fn new(
        config: Arc<EndpointConfig>,
        session_factory: Arc<dyn SessionFactory>,
        selector: Arc<EndpointSelector>,
        log: Logger,
    ) -> Self {
        Connection {
            config,
            session_factory,
            selector,
            session: None,
            connected_endpoint: None,
            log,
        }
    }

    /// Open the connection, binding with the credentials from the endpoint
    /// configuration. The bind is anonymous when the configuration carries
    /// no bind DN and no SASL settings.
    pub fn open(&mut self) -> Result<BindOutcome, Error> {
        let request = self.config.bind_request();
        self.open_with(&request)
    }

    /// Open the connection, binding with caller-supplied parameters instead
    /// of the configured credentials.
    pub fn open_with(&mut self, request: &BindRequest) -> Result<BindOutcome, Error> {
        if self.session.is_some() {
            return Err(Error::Connection(String::from(
                "connection is already open",
            )));
        }

        let mut last_error: Option<Error> = None;

        for endpoint in self.selector.candidates(self.config.endpoints()) {
            let key = srv_key(&endpoint);
            let params = self.config.connect_params(&endpoint);
            match self.session_factory.create(&params) {
                Ok(mut session) => match session.bind(request) {
                    Ok(outcome) => {
                        info!(self.log, "opened connection to endpoint {}", &key);
                        self.session = Some(session);
                        self.connected_endpoint = Some(endpoint);
                        return Ok(outcome);
                    }
                    Err(bind_err) => {
                        warn!(
                            self.log,
                            "bind failed for endpoint {}: {}", &key, bind_err
                        );
                        if let Err(close_err) = session.close() {
                            warn!(
                                self.log,
                                "failed to close unbound session for \
                                 endpoint {}: {}",
                                &key,
                                close_err
                            );
                        }
                        last_error = Some(bind_err);
                    }
                },
                Err(create_err) => {
                    warn!(
                        self.log,
                        "connection attempt failed for endpoint {}: {}",
                        &key,
                        create_err
                    );
                    last_error = Some(create_err);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            Error::Connection(String::from("no endpoints available"))
        }))
    }

    /// True iff a raw session is currently held.
    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    /// Release the raw session. Session-level close faults are logged, not
    /// propagated; release must always succeed from the caller's viewpoint.
    /// Safe to call any number of times.
    pub fn close(&mut self) {
        if let Some(mut session) = self.session.take() {
            if let Err(close_err) = session.close() {
                let key = self
                    .connected_endpoint
                    .as_ref()
                    .map(srv_key)
                    .unwrap_or_default();
                warn!(
                    self.log,
                    "failed to cleanly close session for endpoint {}: {}",
                    &key,
                    close_err
                );
            }
            self.connected_endpoint = None;
        }
    }

    /// Close (if open) then open again, binding from configuration. Used to
    /// recover from a stale session.
    pub fn reopen(&mut self) -> Result<BindOutcome, Error> {
        self.close();
        self.open()
    }

    /// Close (if open) then open again with caller-supplied bind parameters.
    pub fn reopen_with(&mut self, request: &BindRequest) -> Result<BindOutcome, Error> {
        self.close();
        self.open_with(request)
    }

    /// The endpoint the current session is connected to, if open.
    pub fn connected_endpoint(&self) -> Option<&Endpoint> {
        self.connected_endpoint.as_ref()
    }

    pub fn config(&self) -> &EndpointConfig {
        &self.config
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.debug_struct("Connection")
            .field("config", &self.config)
            .field("open", &self.session.is_some())
            .field("connected_endpoint", &self.connected_endpoint)
            .finish()
    }
}

impl Drop for Connection {
    // Last-resort leak guard only. The pool and proxy close explicitly;
    // arriving here with an open session means a caller lost track of one.
    fn drop(&mut self) {
        if self.session.is_some() {
            warn!(
                self.log,
                "connection dropped while still open; closing session"
            );
            self.close();
        }
    }
}
