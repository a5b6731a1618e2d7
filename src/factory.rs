/*
 * Copyright 2020 Joyent, Inc.
 */

use std::fmt;
use std::sync::Arc;

use slog::Logger;

use crate::config::EndpointConfig;
use crate::connection::Connection;
use crate::error::Error;
use crate::provider::{ProviderRegistry, SessionFactory};
use crate::strategy::EndpointSelector;

/// Produces connections for one endpoint configuration.
///
/// Constructing a factory freezes the configuration and resolves the session
/// provider, once. All connections handed out by the factory share the
/// configuration, the provider's session factory, and the endpoint selector
/// (so strategies with per-factory state, like round robin, behave as one
/// unit across connections).
pub struct ConnectionFactory {
    config: Arc<EndpointConfig>,
    session_factory: Arc<dyn SessionFactory>,
    selector: Arc<EndpointSelector>,
    log: Logger,
}

impl ConnectionFactory {
    /// Create a factory for `config`, resolving the session provider from
    /// `registry`. `provider_name` overrides the registry's default; absent
    /// that, the `DIRPOOL_PROVIDER` environment variable is consulted.
    pub fn new(
        registry: &ProviderRegistry,
        provider_name: Option<&str>,
        config: EndpointConfig,
        log: Logger,
    ) -> Result<Self, Error> {
        config.activate();
        let provider = registry.resolve(provider_name)?;
        let session_factory: Arc<dyn SessionFactory> =
            Arc::from(provider.create_factory(&config)?);
        let selector = Arc::new(EndpointSelector::new(config.strategy()));

        Ok(ConnectionFactory {
            config: Arc::new(config),
            session_factory,
            selector,
            log,
        })
    }

    /// A new, unopened connection.
    pub fn connection(&self) -> Connection {
        Connection::new(
            Arc::clone(&self.config),
            Arc::clone(&self.session_factory),
            Arc::clone(&self.selector),
            self.log.clone(),
        )
    }

    /// A new connection, opened and bound per the configuration.
    pub fn open_connection(&self) -> Result<Connection, Error> {
        let mut connection = self.connection();
        connection.open()?;
        Ok(connection)
    }

    pub fn config(&self) -> &EndpointConfig {
        &self.config
    }
}

impl fmt::Debug for ConnectionFactory {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.debug_struct("ConnectionFactory")
            .field("config", &self.config)
            .field("selector", &self.selector)
            .finish()
    }
}
