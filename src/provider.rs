/*
 * Copyright 2020 Joyent, Inc.
 */

//! Contracts implemented by session providers.
//!
//! A session provider supplies the wire-protocol half of the library: it
//! knows how to open, bind, and close a raw session against a single
//! endpoint. Everything above it (connection lifecycle, pooling, endpoint
//! selection) is provider-agnostic. Providers are registered by name in a
//! [`ProviderRegistry`]: struct.ProviderRegistry.html and resolved once per
//! connection factory construction.

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::config::EndpointConfig;
use crate::endpoint::Endpoint;
use crate::error::Error;

/// Environment variable consulted for a provider override when no explicit
/// override name is given.
pub const PROVIDER_ENV_VAR: &str = "DIRPOOL_PROVIDER";

/// An opaque bind secret. The debug representation is redacted.
#[derive(Clone, Eq, PartialEq)]
pub struct Credential(Vec<u8>);

impl Credential {
    pub fn new(value: Vec<u8>) -> Self {
        Credential(value)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl From<&str> for Credential {
    fn from(value: &str) -> Self {
        Credential(value.as_bytes().to_vec())
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.write_str("Credential(****)")
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Mechanism {
    External,
    DigestMd5,
    CramMd5,
    GssApi,
}

#[derive(Clone, Debug)]
pub struct SaslConfig {
    pub mechanism: Mechanism,
    pub authorization_id: Option<String>,
    pub realm: Option<String>,
}

/// Parameters for the authentication handshake performed when a session is
/// opened. An empty request is an anonymous bind.
#[derive(Clone, Debug, Default)]
pub struct BindRequest {
    pub dn: Option<String>,
    pub credential: Option<Credential>,
    pub sasl: Option<SaslConfig>,
}

impl BindRequest {
    pub fn anonymous() -> Self {
        BindRequest::default()
    }

    pub fn simple(dn: &str, credential: Credential) -> Self {
        BindRequest {
            dn: Some(String::from(dn)),
            credential: Some(credential),
            sasl: None,
        }
    }

    pub fn is_anonymous(&self) -> bool {
        self.dn.is_none() && self.sasl.is_none()
    }
}

/// The result of a bind. A result code of zero is success; any other code is
/// a directory-level refusal that the provider chose not to surface as an
/// `Error`.
#[derive(Clone, Debug)]
pub struct BindOutcome {
    pub result_code: u32,
    pub message: Option<String>,
}

impl BindOutcome {
    pub fn success(&self) -> bool {
        self.result_code == 0
    }
}

/// Resolved parameters for one connection attempt against one endpoint.
///
/// TLS and timeout settings travel here explicitly rather than through any
/// ambient state, so a provider sees exactly what the configuration that
/// produced it contained.
#[derive(Clone, Debug)]
pub struct ConnectParams {
    pub endpoint: Endpoint,
    pub use_tls: bool,
    pub connect_timeout: Option<Duration>,
    pub response_timeout: Option<Duration>,
}

/// A raw network session to a single directory server.
pub trait RawSession: Send {
    /// Perform the authentication handshake.
    fn bind(&mut self, request: &BindRequest) -> Result<BindOutcome, Error>;
    /// Release the session.
    fn close(&mut self) -> Result<(), Error>;
}

/// Produces raw sessions for resolved connection parameters.
pub trait SessionFactory: Send + Sync {
    fn create(&self, params: &ConnectParams) -> Result<Box<dyn RawSession>, Error>;
}

/// A session provider builds one `SessionFactory` per endpoint
/// configuration.
pub trait SessionProvider: Send + Sync {
    fn create_factory(
        &self,
        config: &EndpointConfig,
    ) -> Result<Box<dyn SessionFactory>, Error>;
}

/// A name to provider mapping with a designated default.
///
/// Resolution order is: explicit override name, the `DIRPOOL_PROVIDER`
/// environment variable, then the registered default. Resolution happens
/// once per connection factory construction, never per connection.
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn SessionProvider>>,
    default: Option<String>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        ProviderRegistry {
            providers: HashMap::new(),
            default: None,
        }
    }

    pub fn register(&mut self, name: &str, provider: Arc<dyn SessionProvider>) {
        self.providers.insert(String::from(name), provider);
    }

    /// Register a provider and make it the default for unnamed resolution.
    pub fn register_default(&mut self, name: &str, provider: Arc<dyn SessionProvider>) {
        self.register(name, provider);
        self.default = Some(String::from(name));
    }

    pub fn resolve(
        &self,
        override_name: Option<&str>,
    ) -> Result<Arc<dyn SessionProvider>, Error> {
        let m_name = override_name
            .map(String::from)
            .or_else(|| env::var(PROVIDER_ENV_VAR).ok());

        match m_name {
            Some(name) => self.providers.get(&name).cloned().ok_or_else(|| {
                Error::Configuration(format!(
                    "no session provider registered under the name {}",
                    name
                ))
            }),
            None => self
                .default
                .as_ref()
                .and_then(|name| self.providers.get(name))
                .cloned()
                .ok_or_else(|| {
                    Error::Configuration(String::from(
                        "no default session provider registered",
                    ))
                }),
        }
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        ProviderRegistry::new()
    }
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        let mut names: Vec<&String> = self.providers.keys().collect();
        names.sort();
        fmt.debug_struct("ProviderRegistry")
            .field("providers", &names)
            .field("default", &self.default)
            .finish()
    }
}
