/*
 * Copyright 2020 Joyent, Inc.
 */

mod common;

use std::sync::Arc;

use dirpool::config::EndpointConfig;
use dirpool::endpoint::Endpoint;
use dirpool::error::Error;
use dirpool::provider::{BindRequest, Credential};
use dirpool::strategy::ConnectionStrategy;

use common::{factory_for, single_endpoint_factory, test_log, DummyProvider};

#[test]
fn connection_lifecycle() {
    let log = test_log();
    let (factory, _provider) = single_endpoint_factory(log);

    let mut conn = factory.connection();
    assert!(!conn.is_open());
    assert!(conn.connected_endpoint().is_none());

    let outcome = conn.open().unwrap();
    assert!(outcome.success());
    assert!(conn.is_open());
    assert_eq!(conn.connected_endpoint().unwrap().host, "ldap1.test");

    // A second open on a live connection is refused.
    match conn.open() {
        Err(Error::Connection(_)) => (),
        other => panic!("expected connection error, got {:?}", other),
    }

    conn.close();
    assert!(!conn.is_open());
    // close is idempotent
    conn.close();
    assert!(!conn.is_open());

    let outcome = conn.reopen().unwrap();
    assert!(outcome.success());
    assert!(conn.is_open());
}

#[test]
fn connection_open_with_explicit_bind() {
    let log = test_log();
    let (factory, _provider) = single_endpoint_factory(log);

    let request =
        BindRequest::simple("cn=admin,dc=test", Credential::from("secret"));
    let mut conn = factory.connection();
    let outcome = conn.open_with(&request).unwrap();
    assert!(outcome.success());
    assert!(conn.is_open());

    let reopen_outcome = conn.reopen_with(&request).unwrap();
    assert!(reopen_outcome.success());
}

#[test]
fn open_falls_through_to_the_next_endpoint() {
    let log = test_log();
    let provider = Arc::new(DummyProvider::new());
    provider.fail_host("a.test");

    let mut config = EndpointConfig::new(vec![
        Endpoint::new("a.test", 389),
        Endpoint::new("b.test", 389),
    ])
    .unwrap();
    config
        .set_strategy(ConnectionStrategy::ActivePassive)
        .unwrap();

    let factory = factory_for(config, Arc::clone(&provider), log);
    let conn = factory.open_connection().unwrap();
    assert_eq!(conn.connected_endpoint().unwrap().host, "b.test");
    assert_eq!(provider.attempted_hosts(), vec!["a.test", "b.test"]);
}

#[test]
fn open_surfaces_the_last_fault_when_endpoints_are_exhausted() {
    let log = test_log();
    let provider = Arc::new(DummyProvider::new());
    provider.fail_host("a.test");
    provider.fail_host("b.test");

    let mut config = EndpointConfig::new(vec![
        Endpoint::new("a.test", 389),
        Endpoint::new("b.test", 389),
    ])
    .unwrap();
    config
        .set_strategy(ConnectionStrategy::ActivePassive)
        .unwrap();

    let factory = factory_for(config, Arc::clone(&provider), log);
    match factory.open_connection() {
        Err(Error::Connection(msg)) => assert!(msg.contains("b.test")),
        other => panic!("expected connection error, got {:?}", other.is_ok()),
    }
    assert_eq!(provider.attempted_hosts(), vec!["a.test", "b.test"]);
}

#[test]
fn round_robin_rotation_is_shared_across_connections() {
    let log = test_log();
    let provider = Arc::new(DummyProvider::new());

    let mut config = EndpointConfig::new(vec![
        Endpoint::new("a.test", 389),
        Endpoint::new("b.test", 389),
    ])
    .unwrap();
    config.set_strategy(ConnectionStrategy::RoundRobin).unwrap();

    let factory = factory_for(config, Arc::clone(&provider), log);
    let conn1 = factory.open_connection().unwrap();
    let conn2 = factory.open_connection().unwrap();
    assert_eq!(conn1.connected_endpoint().unwrap().host, "a.test");
    assert_eq!(conn2.connected_endpoint().unwrap().host, "b.test");
}

#[test]
fn dropping_an_open_connection_does_not_panic() {
    let log = test_log();
    let (factory, _provider) = single_endpoint_factory(log);

    let conn = factory.open_connection().unwrap();
    // The drop guard closes the session on our behalf.
    drop(conn);
}
