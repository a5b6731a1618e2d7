/*
 * Copyright 2020 Joyent, Inc.
 */

//! Connection and pool configuration.
//!
//! Both configuration types freeze the instant they are activated. A factory
//! activates the configuration it is handed, so there is no window in which
//! a configuration can change underneath live connections. Mutators fail
//! with [`Error::Configuration`]: ../error/enum.Error.html once the freeze
//! has happened.

use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::time::Duration;

use crate::endpoint::Endpoint;
use crate::error::Error;
use crate::provider::{BindRequest, ConnectParams, Credential, SaslConfig};
use crate::strategy::ConnectionStrategy;

pub const DEFAULT_MIN_POOL_SIZE: u32 = 3;
pub const DEFAULT_MAX_POOL_SIZE: u32 = 10;
pub const DEFAULT_VALIDATE_ON_CHECKIN: bool = false;
pub const DEFAULT_VALIDATE_ON_CHECKOUT: bool = false;
pub const DEFAULT_VALIDATE_PERIODICALLY: bool = false;
pub const DEFAULT_VALIDATE_PERIOD: Duration = Duration::from_secs(1800);
pub const DEFAULT_AVERAGE_IDLE_TIME: Duration = Duration::from_secs(300);

/// Description of one or more directory server endpoints together with the
/// credentials and transport settings used to open sessions against them.
#[derive(Debug)]
pub struct EndpointConfig {
    endpoints: Vec<Endpoint>,
    bind_dn: Option<String>,
    bind_credential: Option<Credential>,
    sasl: Option<SaslConfig>,
    use_tls: bool,
    connect_timeout: Option<Duration>,
    response_timeout: Option<Duration>,
    strategy: ConnectionStrategy,
    activated: AtomicBool,
}

impl EndpointConfig {
    /// Create a configuration for the given endpoints. At least one endpoint
    /// is required.
    pub fn new(endpoints: Vec<Endpoint>) -> Result<Self, Error> {
        if endpoints.is_empty() {
            return Err(Error::Configuration(String::from(
                "at least one endpoint is required",
            )));
        }
        Ok(EndpointConfig {
            endpoints,
            bind_dn: None,
            bind_credential: None,
            sasl: None,
            use_tls: false,
            connect_timeout: None,
            response_timeout: None,
            strategy: ConnectionStrategy::default(),
            activated: AtomicBool::new(false),
        })
    }

    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }

    pub fn bind_dn(&self) -> Option<&str> {
        self.bind_dn.as_deref()
    }

    pub fn bind_credential(&self) -> Option<&Credential> {
        self.bind_credential.as_ref()
    }

    pub fn sasl(&self) -> Option<&SaslConfig> {
        self.sasl.as_ref()
    }

    pub fn use_tls(&self) -> bool {
        self.use_tls
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout
    }

    pub fn response_timeout(&self) -> Option<Duration> {
        self.response_timeout
    }

    pub fn strategy(&self) -> ConnectionStrategy {
        self.strategy
    }

    pub fn set_bind_dn(&mut self, dn: Option<String>) -> Result<(), Error> {
        self.check_mutable()?;
        self.bind_dn = dn;
        Ok(())
    }

    pub fn set_bind_credential(
        &mut self,
        credential: Option<Credential>,
    ) -> Result<(), Error> {
        self.check_mutable()?;
        self.bind_credential = credential;
        Ok(())
    }

    pub fn set_sasl(&mut self, sasl: Option<SaslConfig>) -> Result<(), Error> {
        self.check_mutable()?;
        self.sasl = sasl;
        Ok(())
    }

    pub fn set_use_tls(&mut self, use_tls: bool) -> Result<(), Error> {
        self.check_mutable()?;
        self.use_tls = use_tls;
        Ok(())
    }

    pub fn set_connect_timeout(
        &mut self,
        timeout: Option<Duration>,
    ) -> Result<(), Error> {
        self.check_mutable()?;
        self.connect_timeout = timeout;
        Ok(())
    }

    pub fn set_response_timeout(
        &mut self,
        timeout: Option<Duration>,
    ) -> Result<(), Error> {
        self.check_mutable()?;
        self.response_timeout = timeout;
        Ok(())
    }

    pub fn set_strategy(&mut self, strategy: ConnectionStrategy) -> Result<(), Error> {
        self.check_mutable()?;
        self.strategy = strategy;
        Ok(())
    }

    /// Freeze the configuration. Idempotent; called by the factory that
    /// takes ownership of the configuration.
    pub fn activate(&self) {
        self.activated.store(true, AtomicOrdering::Relaxed);
    }

    pub fn is_activated(&self) -> bool {
        self.activated.load(AtomicOrdering::Relaxed)
    }

    /// The bind parameters this configuration implies: simple bind when a DN
    /// is set, SASL when configured, anonymous otherwise.
    pub fn bind_request(&self) -> BindRequest {
        BindRequest {
            dn: self.bind_dn.clone(),
            credential: self.bind_credential.clone(),
            sasl: self.sasl.clone(),
        }
    }

    /// Resolved parameters for a connection attempt against one endpoint.
    pub fn connect_params(&self, endpoint: &Endpoint) -> ConnectParams {
        ConnectParams {
            endpoint: endpoint.clone(),
            use_tls: self.use_tls,
            connect_timeout: self.connect_timeout,
            response_timeout: self.response_timeout,
        }
    }

    fn check_mutable(&self) -> Result<(), Error> {
        if self.is_activated() {
            Err(Error::Configuration(String::from(
                "endpoint configuration is activated and cannot be changed",
            )))
        } else {
            Ok(())
        }
    }
}

/// Tunables for the connection pool.
///
/// Sizes and durations are unsigned types, so the out-of-range values the
/// setters would otherwise have to reject cannot be expressed.
#[derive(Debug)]
pub struct PoolConfig {
    min_pool_size: u32,
    max_pool_size: u32,
    validate_on_checkin: bool,
    validate_on_checkout: bool,
    validate_periodically: bool,
    validate_period: Duration,
    average_idle_time: Duration,
    activated: AtomicBool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        PoolConfig {
            min_pool_size: DEFAULT_MIN_POOL_SIZE,
            max_pool_size: DEFAULT_MAX_POOL_SIZE,
            validate_on_checkin: DEFAULT_VALIDATE_ON_CHECKIN,
            validate_on_checkout: DEFAULT_VALIDATE_ON_CHECKOUT,
            validate_periodically: DEFAULT_VALIDATE_PERIODICALLY,
            validate_period: DEFAULT_VALIDATE_PERIOD,
            average_idle_time: DEFAULT_AVERAGE_IDLE_TIME,
            activated: AtomicBool::new(false),
        }
    }
}

impl PoolConfig {
    pub fn new() -> Self {
        PoolConfig::default()
    }

    /// The number of idle connections the pool maintains and the size the
    /// pool shrinks back to when pruned.
    pub fn min_pool_size(&self) -> u32 {
        self.min_pool_size
    }

    pub fn max_pool_size(&self) -> u32 {
        self.max_pool_size
    }

    pub fn validate_on_checkin(&self) -> bool {
        self.validate_on_checkin
    }

    pub fn validate_on_checkout(&self) -> bool {
        self.validate_on_checkout
    }

    pub fn validate_periodically(&self) -> bool {
        self.validate_periodically
    }

    pub fn validate_period(&self) -> Duration {
        self.validate_period
    }

    /// The maximum average idle age of the idle set. When exceeded, the pool
    /// prunes idle connections back toward the minimum size.
    pub fn average_idle_time(&self) -> Duration {
        self.average_idle_time
    }

    pub fn set_min_pool_size(&mut self, size: u32) -> Result<(), Error> {
        self.check_mutable()?;
        self.min_pool_size = size;
        Ok(())
    }

    pub fn set_max_pool_size(&mut self, size: u32) -> Result<(), Error> {
        self.check_mutable()?;
        self.max_pool_size = size;
        Ok(())
    }

    pub fn set_validate_on_checkin(&mut self, b: bool) -> Result<(), Error> {
        self.check_mutable()?;
        self.validate_on_checkin = b;
        Ok(())
    }

    pub fn set_validate_on_checkout(&mut self, b: bool) -> Result<(), Error> {
        self.check_mutable()?;
        self.validate_on_checkout = b;
        Ok(())
    }

    pub fn set_validate_periodically(&mut self, b: bool) -> Result<(), Error> {
        self.check_mutable()?;
        self.validate_periodically = b;
        Ok(())
    }

    pub fn set_validate_period(&mut self, period: Duration) -> Result<(), Error> {
        self.check_mutable()?;
        self.validate_period = period;
        Ok(())
    }

    pub fn set_average_idle_time(&mut self, time: Duration) -> Result<(), Error> {
        self.check_mutable()?;
        self.average_idle_time = time;
        Ok(())
    }

    /// Freeze the configuration. Idempotent; called by the pool that takes
    /// ownership of the configuration.
    pub fn activate(&self) {
        self.activated.store(true, AtomicOrdering::Relaxed);
    }

    pub fn is_activated(&self) -> bool {
        self.activated.load(AtomicOrdering::Relaxed)
    }

    /// Cross-field validation, run when a pool is constructed.
    pub fn check(&self) -> Result<(), Error> {
        if self.min_pool_size > self.max_pool_size {
            return Err(Error::Configuration(format!(
                "min pool size {} exceeds max pool size {}",
                self.min_pool_size, self.max_pool_size
            )));
        }
        Ok(())
    }

    fn check_mutable(&self) -> Result<(), Error> {
        if self.is_activated() {
            Err(Error::Configuration(String::from(
                "pool configuration is activated and cannot be changed",
            )))
        } else {
            Ok(())
        }
    }
}
