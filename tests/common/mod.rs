/*
 * Copyright 2020 Joyent, Inc.
 */

// Shared fakes for the integration tests: an in-memory session provider and
// a pair of scriptable validators.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use slog::{o, Drain, Logger};

use dirpool::config::EndpointConfig;
use dirpool::connection::Connection;
use dirpool::endpoint::Endpoint;
use dirpool::error::Error;
use dirpool::factory::ConnectionFactory;
use dirpool::provider::{
    BindOutcome, BindRequest, ConnectParams, ProviderRegistry, RawSession,
    SessionFactory, SessionProvider,
};
use dirpool::validator::ConnectionValidator;

pub fn test_log() -> Logger {
    let plain = slog_term::PlainSyncDecorator::new(std::io::stdout());
    Logger::root(
        Mutex::new(slog_term::FullFormat::new(plain).build()).fuse(),
        o!("build-id" => "0.1.0"),
    )
}

#[derive(Debug)]
pub struct DummySession;

impl RawSession for DummySession {
    fn bind(&mut self, _request: &BindRequest) -> Result<BindOutcome, Error> {
        Ok(BindOutcome {
            result_code: 0,
            message: None,
        })
    }

    fn close(&mut self) -> Result<(), Error> {
        Ok(())
    }
}

pub struct DummySessionFactory {
    attempts: Arc<Mutex<Vec<String>>>,
    fail_hosts: Arc<Mutex<HashSet<String>>>,
    created: Arc<AtomicU32>,
}

impl SessionFactory for DummySessionFactory {
    fn create(&self, params: &ConnectParams) -> Result<Box<dyn RawSession>, Error> {
        self.attempts
            .lock()
            .unwrap()
            .push(params.endpoint.host.clone());
        if self
            .fail_hosts
            .lock()
            .unwrap()
            .contains(&params.endpoint.host)
        {
            return Err(Error::Connection(format!(
                "connection refused by {}",
                params.endpoint.name
            )));
        }
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(DummySession))
    }
}

/// Provider whose sessions always bind. The hosts it is told to fail refuse
/// every connection attempt, and every attempt is recorded.
pub struct DummyProvider {
    pub attempts: Arc<Mutex<Vec<String>>>,
    pub fail_hosts: Arc<Mutex<HashSet<String>>>,
    pub created: Arc<AtomicU32>,
}

impl DummyProvider {
    pub fn new() -> Self {
        DummyProvider {
            attempts: Arc::new(Mutex::new(Vec::new())),
            fail_hosts: Arc::new(Mutex::new(HashSet::new())),
            created: Arc::new(AtomicU32::new(0)),
        }
    }

    pub fn fail_host(&self, host: &str) {
        self.fail_hosts.lock().unwrap().insert(String::from(host));
    }

    pub fn attempted_hosts(&self) -> Vec<String> {
        self.attempts.lock().unwrap().clone()
    }

    pub fn created_count(&self) -> u32 {
        self.created.load(Ordering::SeqCst)
    }
}

impl SessionProvider for DummyProvider {
    fn create_factory(
        &self,
        _config: &EndpointConfig,
    ) -> Result<Box<dyn SessionFactory>, Error> {
        Ok(Box::new(DummySessionFactory {
            attempts: Arc::clone(&self.attempts),
            fail_hosts: Arc::clone(&self.fail_hosts),
            created: Arc::clone(&self.created),
        }))
    }
}

pub fn registry_with(provider: Arc<DummyProvider>) -> ProviderRegistry {
    let mut registry = ProviderRegistry::new();
    registry.register_default("dummy", provider);
    registry
}

pub fn factory_for(
    config: EndpointConfig,
    provider: Arc<DummyProvider>,
    log: Logger,
) -> ConnectionFactory {
    let registry = registry_with(provider);
    ConnectionFactory::new(&registry, None, config, log).unwrap()
}

pub fn single_endpoint_factory(log: Logger) -> (ConnectionFactory, Arc<DummyProvider>) {
    let provider = Arc::new(DummyProvider::new());
    let config =
        EndpointConfig::new(vec![Endpoint::new("ldap1.test", 389)]).unwrap();
    let factory = factory_for(config, Arc::clone(&provider), log);
    (factory, provider)
}

/// Validator whose verdict is controlled by a shared flag.
pub struct FlagValidator {
    pub valid: Arc<AtomicBool>,
}

impl FlagValidator {
    pub fn new(valid: Arc<AtomicBool>) -> Self {
        FlagValidator { valid }
    }
}

impl ConnectionValidator for FlagValidator {
    fn validate(&self, _connection: &mut Connection) -> Result<bool, Error> {
        Ok(self.valid.load(Ordering::SeqCst))
    }
}

/// Validator that rejects every connection.
pub struct RejectingValidator;

impl ConnectionValidator for RejectingValidator {
    fn validate(&self, _connection: &mut Connection) -> Result<bool, Error> {
        Ok(false)
    }
}

/// Validator that fails outright instead of returning a verdict.
pub struct ErroringValidator;

impl ConnectionValidator for ErroringValidator {
    fn validate(&self, _connection: &mut Connection) -> Result<bool, Error> {
        Err(Error::Validation(String::from("health probe lost")))
    }
}
