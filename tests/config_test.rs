/*
 * Copyright 2020 Joyent, Inc.
 */

mod common;

use std::sync::Arc;
use std::time::Duration;

use dirpool::config::{
    EndpointConfig, PoolConfig, DEFAULT_AVERAGE_IDLE_TIME, DEFAULT_MAX_POOL_SIZE,
    DEFAULT_MIN_POOL_SIZE, DEFAULT_VALIDATE_PERIOD,
};
use dirpool::connection_pool::types::ConnectionPoolOptions;
use dirpool::connection_pool::ConnectionPool;
use dirpool::endpoint::Endpoint;
use dirpool::error::Error;
use dirpool::provider::{ProviderRegistry, SessionProvider};

use common::{single_endpoint_factory, test_log, DummyProvider};

#[test]
fn endpoint_config_requires_an_endpoint() {
    match EndpointConfig::new(vec![]) {
        Err(Error::Configuration(_)) => (),
        other => panic!("expected configuration error, got {:?}", other),
    }
}

#[test]
fn endpoint_config_freezes_on_activation() {
    let mut config =
        EndpointConfig::new(vec![Endpoint::new("ldap1.test", 389)]).unwrap();

    config
        .set_bind_dn(Some(String::from("cn=pool,dc=test")))
        .unwrap();
    config.set_use_tls(true).unwrap();
    config
        .set_connect_timeout(Some(Duration::from_secs(5)))
        .unwrap();
    assert!(!config.is_activated());

    config.activate();
    assert!(config.is_activated());

    match config.set_bind_dn(None) {
        Err(Error::Configuration(_)) => (),
        other => panic!("expected configuration error, got {:?}", other),
    }

    // The values from before activation are intact.
    assert_eq!(config.bind_dn(), Some("cn=pool,dc=test"));
    assert!(config.use_tls());
    assert_eq!(config.connect_timeout(), Some(Duration::from_secs(5)));

    // Activation is idempotent.
    config.activate();
    assert!(config.is_activated());
}

#[test]
fn pool_config_defaults() {
    let pool_config = PoolConfig::default();
    assert_eq!(pool_config.min_pool_size(), DEFAULT_MIN_POOL_SIZE);
    assert_eq!(pool_config.max_pool_size(), DEFAULT_MAX_POOL_SIZE);
    assert!(!pool_config.validate_on_checkin());
    assert!(!pool_config.validate_on_checkout());
    assert!(!pool_config.validate_periodically());
    assert_eq!(pool_config.validate_period(), DEFAULT_VALIDATE_PERIOD);
    assert_eq!(pool_config.average_idle_time(), DEFAULT_AVERAGE_IDLE_TIME);
}

#[test]
fn pool_config_freezes_on_activation() {
    let mut pool_config = PoolConfig::new();
    pool_config.set_min_pool_size(1).unwrap();

    pool_config.activate();

    match pool_config.set_max_pool_size(20) {
        Err(Error::Configuration(_)) => (),
        other => panic!("expected configuration error, got {:?}", other),
    }
    assert_eq!(pool_config.max_pool_size(), DEFAULT_MAX_POOL_SIZE);
}

#[test]
fn pool_rejects_min_size_above_max_size() {
    let log = test_log();
    let (factory, _provider) = single_endpoint_factory(log.clone());

    let mut pool_config = PoolConfig::new();
    pool_config.set_min_pool_size(5).unwrap();
    pool_config.set_max_pool_size(2).unwrap();

    let pool_opts = ConnectionPoolOptions {
        pool_config,
        checkout_timeout: Some(1000),
        validator: None,
        log,
    };

    match ConnectionPool::new(pool_opts, factory) {
        Err(Error::Configuration(_)) => (),
        other => panic!("expected configuration error, got {:?}", other.is_ok()),
    }
}

#[test]
fn provider_registry_resolution() {
    let default_provider: Arc<dyn SessionProvider> = Arc::new(DummyProvider::new());
    let other_provider: Arc<dyn SessionProvider> = Arc::new(DummyProvider::new());

    let mut registry = ProviderRegistry::new();
    registry.register_default("dummy", Arc::clone(&default_provider));
    registry.register("other", Arc::clone(&other_provider));

    let resolved_default = registry.resolve(None).unwrap();
    assert!(Arc::ptr_eq(&resolved_default, &default_provider));

    let resolved_other = registry.resolve(Some("other")).unwrap();
    assert!(Arc::ptr_eq(&resolved_other, &other_provider));

    match registry.resolve(Some("missing")) {
        Err(Error::Configuration(_)) => (),
        _ => panic!("expected configuration error for an unknown provider"),
    }
}

#[test]
fn empty_registry_has_no_default() {
    let registry = ProviderRegistry::new();
    match registry.resolve(None) {
        Err(Error::Configuration(_)) => (),
        _ => panic!("expected configuration error for a missing default"),
    }
}
