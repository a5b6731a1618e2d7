//
// Copyright 2020 Joyent, Inc.
//

//! A directory server session pool
//!
//! Dirpool manages a bounded pool of live, bound sessions to directory
//! (LDAP) servers, decoupled from any particular wire-protocol
//! implementation. Use of dirpool requires an implementation of the
//! [`SessionProvider`]: provider/trait.SessionProvider.html trait, which
//! supplies the wire-protocol half: opening, binding, and closing a raw
//! session against a single endpoint. Everything else -- endpoint selection,
//! connection lifecycle, pooling, validation, and pruning -- is handled
//! here.
//!
//! # Example
//!
//! Use a hypothetical `SessionProvider` implementation to create a dirpool
//! connection pool.
//!
//! ```rust,ignore
//! use std::sync::{Arc, Mutex};
//! use std::thread;
//!
//! use slog::{Drain, Logger, o};
//!
//! use dirpool::config::{EndpointConfig, PoolConfig};
//! use dirpool::connection_pool::ConnectionPool;
//! use dirpool::connection_pool::types::ConnectionPoolOptions;
//! use dirpool::endpoint::Endpoint;
//! use dirpool::factory::ConnectionFactory;
//! use dirpool::provider::ProviderRegistry;
//! use dirpool::strategy::ConnectionStrategy;
//!
//! fn main() {
//!     let plain = slog_term::PlainSyncDecorator::new(std::io::stdout());
//!     let log = Logger::root(
//!         Mutex::new(
//!             slog_term::FullFormat::new(plain).build()
//!         ).fuse(),
//!         o!("build-id" => "0.1.0")
//!     );
//!
//!     let mut registry = ProviderRegistry::new();
//!     registry.register_default("native", Arc::new(NativeProvider::new()));
//!
//!     let endpoints = vec![
//!         Endpoint::new("ldap1.example.com", 389),
//!         Endpoint::new("ldap2.example.com", 389),
//!     ];
//!     let mut config = EndpointConfig::new(endpoints).unwrap();
//!     config.set_bind_dn(Some("cn=pool,dc=example,dc=com".into())).unwrap();
//!     config.set_bind_credential(Some("hunter2".into())).unwrap();
//!     config.set_strategy(ConnectionStrategy::RoundRobin).unwrap();
//!
//!     let factory =
//!         ConnectionFactory::new(&registry, None, config, log.clone()).unwrap();
//!
//!     let pool_opts = ConnectionPoolOptions {
//!         pool_config: PoolConfig::default(),
//!         checkout_timeout: Some(1000),
//!         validator: None,
//!         log: log.clone(),
//!     };
//!
//!     let pool = ConnectionPool::new(pool_opts, factory).unwrap();
//!
//!     for _ in 0..10 {
//!         let pool = pool.clone();
//!         thread::spawn(move || {
//!             let conn = pool.checkout()?;
//!             // Do stuff here
//!             // The connection is returned to the pool when it falls out of scope.
//!         });
//!     }
//! }
//! ```

#![allow(missing_docs)]

pub mod config;
pub mod connection;
pub mod connection_pool;
pub mod endpoint;
pub mod error;
pub mod factory;
pub mod provider;
pub mod strategy;
pub mod validator;
