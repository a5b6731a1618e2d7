/*
 * Copyright 2020 Joyent, Inc.
 */

pub mod types;

use std::collections::VecDeque;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use slog::{debug, info, warn, Logger};

use crate::config::PoolConfig;
use crate::connection::Connection;
use crate::connection_pool::types::{
    ConnectionPoolOptions, ConnectionPoolState, ConnectionPoolStats,
    MaintenanceCheck, PoolData, PooledConnectionStatistics, PooledEntry,
    ProtectedData,
};
use crate::error::Error;
use crate::factory::ConnectionFactory;
use crate::validator::{ConnectionValidator, OpenStateValidator};

/// A bounded pool of open directory connections.
///
/// The pool keeps two disjoint sets of connections: an idle queue guarded by
/// the pool-wide lock, and the checked-out connections owned by their
/// proxies. Their combined size never exceeds the configured maximum. The
/// pool eagerly creates its configured minimum at construction and, when
/// periodic validation is enabled, runs a background maintenance thread that
/// validates and prunes the idle queue.
pub struct ConnectionPool {
    protected_data: ProtectedData,
    factory: Arc<ConnectionFactory>,
    validator: Arc<dyn ConnectionValidator>,
    pool_config: Arc<PoolConfig>,
    checkout_timeout: Option<u64>,
    maintenance_check: Option<MaintenanceCheck>,
    maintenance_thread: Option<thread::JoinHandle<()>>,
    original: bool,
    log: Logger,
}

impl Clone for ConnectionPool {
    fn clone(&self) -> ConnectionPool {
        ConnectionPool {
            protected_data: self.protected_data.clone(),
            factory: Arc::clone(&self.factory),
            validator: Arc::clone(&self.validator),
            pool_config: Arc::clone(&self.pool_config),
            checkout_timeout: self.checkout_timeout,
            maintenance_check: self.maintenance_check.clone(),
            maintenance_thread: None,
            original: false,
            log: self.log.clone(),
        }
    }
}

impl ConnectionPool {
    /// Create a pool backed by `factory`. The pool configuration is frozen
    /// and checked, and the minimum connections are created and opened
    /// synchronously; failure to create them is fatal to construction.
    pub fn new(
        options: ConnectionPoolOptions,
        factory: ConnectionFactory,
    ) -> Result<Self, Error> {
        let ConnectionPoolOptions {
            pool_config,
            checkout_timeout,
            validator,
            log,
        } = options;

        pool_config.activate();
        pool_config.check()?;

        let mut pool_data = PoolData::new(pool_config.max_pool_size() as usize);
        for _ in 0..pool_config.min_pool_size() {
            match factory.open_connection() {
                Ok(connection) => {
                    let entry = PooledEntry::new(connection);
                    info!(log, "added connection for endpoint {}", &entry.key);
                    pool_data.available.push_back(entry);
                    pool_data.stats.total_connections += 1.into();
                    pool_data.stats.idle_connections += 1.into();
                }
                Err(create_err) => {
                    for mut entry in pool_data.available.drain(..) {
                        entry.connection.close();
                    }
                    return Err(Error::PoolInitialization(format!(
                        "unable to create the minimum pool connections: {}",
                        create_err
                    )));
                }
            }
        }

        let validator: Arc<dyn ConnectionValidator> = match validator {
            Some(v) => Arc::from(v),
            None => Arc::new(OpenStateValidator),
        };

        let mut pool = ConnectionPool {
            protected_data: ProtectedData::new(pool_data),
            factory: Arc::new(factory),
            validator,
            pool_config: Arc::new(pool_config),
            checkout_timeout,
            maintenance_check: None,
            maintenance_thread: None,
            original: true,
            log,
        };

        if pool.pool_config.validate_periodically() {
            let check = MaintenanceCheck::new();
            pool.maintenance_check = Some(check.clone());
            let maintenance_pool = pool.clone();
            let maintenance_thread =
                thread::spawn(move || maintenance_loop(maintenance_pool, check));
            pool.maintenance_thread = Some(maintenance_thread);
        }

        Ok(pool)
    }

    /// Check out a connection, blocking until one is available or the
    /// checkout timeout elapses.
    ///
    /// An idle connection is reused when one exists (validated first when
    /// the configuration asks for it; failed connections are destroyed and
    /// the checkout retried). Otherwise a new connection is created while
    /// the pool is under its maximum size. Otherwise the caller waits for a
    /// checkin, failing with a pool exhaustion fault on timeout.
    pub fn checkout(&self) -> Result<PooledConnection, Error> {
        let mut pool_data = self.protected_data.pool_data_lock();

        loop {
            if pool_data.state != ConnectionPoolState::Running {
                return Err(Error::Pool(String::from(
                    "connection pool is not running",
                )));
            }

            if let Some(mut entry) = pool_data.available.pop_front() {
                pool_data.stats.idle_connections -= 1.into();
                if self.pool_config.validate_on_checkout()
                    && !self.run_validator(&mut entry)
                {
                    info!(
                        self.log,
                        "discarding connection for endpoint {} that failed \
                         validation on checkout",
                        &entry.key
                    );
                    self.destroy_entry(&mut pool_data, entry);
                    continue;
                }
                debug!(
                    self.log,
                    "found idle connection for endpoint {}", &entry.key
                );
                entry.stats.checkout_count += 1;
                pool_data.stats.active_connections += 1.into();
                return Ok(PooledConnection {
                    connection_pool: self.clone(),
                    entry: Some(entry),
                });
            }

            if pool_data.stats.total_connections
                < self.pool_config.max_pool_size().into()
            {
                let connection = self.factory.open_connection()?;
                let mut entry = PooledEntry::new(connection);
                info!(self.log, "added connection for endpoint {}", &entry.key);
                entry.stats.checkout_count = 1;
                pool_data.stats.total_connections += 1.into();
                pool_data.stats.active_connections += 1.into();
                return Ok(PooledConnection {
                    connection_pool: self.clone(),
                    entry: Some(entry),
                });
            }

            let wait_result = self
                .protected_data
                .condvar_wait(pool_data, self.checkout_timeout);
            pool_data = wait_result.0;

            if wait_result.1 {
                return Err(Error::PoolExhausted(String::from(
                    "unable to retrieve a connection within the checkout \
                     timeout",
                )));
            }
        }
    }

    /// Check out a connection without waiting. Returns `None` when the pool
    /// is at its maximum size with no idle connection, or is not running.
    pub fn try_checkout(&self) -> Option<PooledConnection> {
        let mut pool_data = self.protected_data.pool_data_lock();

        loop {
            if pool_data.state != ConnectionPoolState::Running {
                return None;
            }

            if let Some(mut entry) = pool_data.available.pop_front() {
                pool_data.stats.idle_connections -= 1.into();
                if self.pool_config.validate_on_checkout()
                    && !self.run_validator(&mut entry)
                {
                    info!(
                        self.log,
                        "discarding connection for endpoint {} that failed \
                         validation on checkout",
                        &entry.key
                    );
                    self.destroy_entry(&mut pool_data, entry);
                    continue;
                }
                debug!(
                    self.log,
                    "found idle connection for endpoint {}", &entry.key
                );
                entry.stats.checkout_count += 1;
                pool_data.stats.active_connections += 1.into();
                return Some(PooledConnection {
                    connection_pool: self.clone(),
                    entry: Some(entry),
                });
            }

            if pool_data.stats.total_connections
                < self.pool_config.max_pool_size().into()
            {
                match self.factory.open_connection() {
                    Ok(connection) => {
                        let mut entry = PooledEntry::new(connection);
                        info!(
                            self.log,
                            "added connection for endpoint {}", &entry.key
                        );
                        entry.stats.checkout_count = 1;
                        pool_data.stats.total_connections += 1.into();
                        pool_data.stats.active_connections += 1.into();
                        return Some(PooledConnection {
                            connection_pool: self.clone(),
                            entry: Some(entry),
                        });
                    }
                    Err(create_err) => {
                        warn!(
                            self.log,
                            "unable to create connection: {}", create_err
                        );
                        return None;
                    }
                }
            }

            return None;
        }
    }

    /// Drain and close all connections and stop the maintenance thread.
    /// Blocks until every checked-out connection has been returned and
    /// closed. Idempotent. May only be called on the original pool
    /// instance; clones do not carry the maintenance thread handle.
    pub fn close(&mut self) -> Result<(), Error> {
        if !self.original {
            return Err(Error::Pool(String::from(
                "connection pool clones may not close the pool",
            )));
        }

        {
            let mut pool_data = self.protected_data.pool_data_lock();
            match pool_data.state {
                ConnectionPoolState::Stopping | ConnectionPoolState::Stopped => {
                    return Ok(())
                }
                ConnectionPoolState::Running => {
                    pool_data.state = ConnectionPoolState::Stopping;
                }
            }
        }

        if let Some(check) = &self.maintenance_check {
            let mut stop = check.get_lock();
            *stop = true;
            drop(stop);
            check.condvar_notify();
        }
        if let Some(handle) = self.maintenance_thread.take() {
            let _ = handle.join();
            debug!(self.log, "close: joined maintenance thread");
        }

        let mut pool_data = self.protected_data.pool_data_lock();
        while let Some(entry) = pool_data.available.pop_front() {
            pool_data.stats.idle_connections -= 1.into();
            self.destroy_entry(&mut pool_data, entry);
        }

        // Wake blocked checkouts so they observe the state change, then wait
        // for checked-out connections to come back; checkin destroys them
        // while the pool is stopping.
        self.protected_data.condvar_notify_all();
        while pool_data.stats.active_connections > 0.into() {
            info!(
                self.log,
                "connections remaining: {}", pool_data.stats.active_connections
            );
            let wait_result =
                self.protected_data.condvar_wait(pool_data, Some(100));
            pool_data = wait_result.0;
        }

        pool_data.state = ConnectionPoolState::Stopped;
        info!(self.log, "connection pool closed");
        Ok(())
    }

    /// Pool counters, or `None` once the pool is no longer running.
    pub fn stats(&self) -> Option<ConnectionPoolStats> {
        let pool_data = self.protected_data.pool_data_lock();
        match pool_data.state {
            ConnectionPoolState::Running => Some(pool_data.stats),
            _ => None,
        }
    }

    pub fn state(&self) -> String {
        self.protected_data.pool_data_lock().state.to_string()
    }

    pub fn pool_config(&self) -> &PoolConfig {
        &self.pool_config
    }

    /// Return a checked-out connection to the pool. Never fails; validation
    /// and close faults are logged and absorbed, since the caller has
    /// already finished with the resource.
    fn checkin(&self, mut entry: PooledEntry) {
        let mut pool_data = self.protected_data.pool_data_lock();
        pool_data.stats.active_connections -= 1.into();

        if pool_data.state != ConnectionPoolState::Running {
            self.destroy_entry(&mut pool_data, entry);
            self.protected_data.condvar_notify_all();
            return;
        }

        if self.pool_config.validate_on_checkin() && !self.run_validator(&mut entry)
        {
            info!(
                self.log,
                "discarding connection for endpoint {} that failed \
                 validation on checkin",
                &entry.key
            );
            self.destroy_entry(&mut pool_data, entry);
            self.replenish(&mut pool_data);
            return;
        }

        entry.stats.checkin_count += 1;
        entry.idle_since = Instant::now();
        pool_data.stats.idle_connections += 1.into();
        pool_data.available.push_back(entry);
        self.protected_data.condvar_notify();
    }

    /// Run the validator, folding an outright validation error into the
    /// invalid outcome. A passing connection gets its last-validated time
    /// updated.
    fn run_validator(&self, entry: &mut PooledEntry) -> bool {
        match self.validator.validate(&mut entry.connection) {
            Ok(true) => {
                entry.stats.last_validated = Some(Instant::now());
                true
            }
            Ok(false) => false,
            Err(validate_err) => {
                warn!(
                    self.log,
                    "validation error for endpoint {}: {}",
                    &entry.key,
                    validate_err
                );
                false
            }
        }
    }

    /// Remove an entry from the pool accounting and close its connection.
    /// The close runs on its own thread so external session code cannot
    /// block the pool lock.
    fn destroy_entry(&self, pool_data: &mut PoolData, entry: PooledEntry) {
        pool_data.stats.total_connections -= 1.into();
        let close_log = self.log.clone();
        let _close_thread = thread::spawn(move || close_entry(close_log, entry));
    }

    /// Create connections until the pool is back at its minimum size.
    /// Creation failures are logged and abandoned; the next checkin or
    /// maintenance pass will try again.
    fn replenish(&self, pool_data: &mut PoolData) {
        while pool_data.stats.total_connections
            < self.pool_config.min_pool_size().into()
        {
            match self.factory.open_connection() {
                Ok(connection) => {
                    let entry = PooledEntry::new(connection);
                    info!(
                        self.log,
                        "added replacement connection for endpoint {}",
                        &entry.key
                    );
                    pool_data.stats.total_connections += 1.into();
                    pool_data.stats.idle_connections += 1.into();
                    pool_data.available.push_back(entry);
                    self.protected_data.condvar_notify();
                }
                Err(create_err) => {
                    warn!(
                        self.log,
                        "unable to create replacement connection: {}",
                        create_err
                    );
                    break;
                }
            }
        }
    }

    /// One maintenance pass: validate every idle connection, replace
    /// evicted ones up to the minimum size, then prune excess idle
    /// capacity. Operates only on the idle queue; checked-out connections
    /// are never touched.
    fn run_maintenance(&self) {
        let mut pool_data = self.protected_data.pool_data_lock();
        if pool_data.state != ConnectionPoolState::Running {
            return;
        }

        debug!(self.log, "running pool maintenance");

        let mut retained = VecDeque::with_capacity(pool_data.available.len());
        while let Some(mut entry) = pool_data.available.pop_front() {
            if self.run_validator(&mut entry) {
                retained.push_back(entry);
            } else {
                info!(
                    self.log,
                    "discarding idle connection for endpoint {} that failed \
                     periodic validation",
                    &entry.key
                );
                pool_data.stats.idle_connections -= 1.into();
                self.destroy_entry(&mut pool_data, entry);
            }
        }
        pool_data.available = retained;

        self.replenish(&mut pool_data);
        self.prune(&mut pool_data);
    }

    /// Shrink the idle queue, oldest idle first, while it is above the
    /// minimum size and the average idle age exceeds the configured
    /// threshold. The minimum idle connections are never pruned for
    /// idleness alone.
    fn prune(&self, pool_data: &mut PoolData) {
        let min_size = self.pool_config.min_pool_size() as usize;
        let threshold = self.pool_config.average_idle_time();

        while pool_data.available.len() > min_size {
            let now = Instant::now();
            let total_idle: Duration = pool_data
                .available
                .iter()
                .map(|entry| now.duration_since(entry.idle_since))
                .sum();
            let average_idle = total_idle / pool_data.available.len() as u32;

            if average_idle <= threshold {
                break;
            }

            if let Some(entry) = pool_data.available.pop_front() {
                info!(
                    self.log,
                    "pruning idle connection for endpoint {}", &entry.key
                );
                pool_data.stats.idle_connections -= 1.into();
                self.destroy_entry(pool_data, entry);
            }
        }
    }
}

impl fmt::Debug for ConnectionPool {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        let pool_data = self.protected_data.pool_data_lock();
        fmt.debug_struct("ConnectionPool")
            .field("state", &pool_data.state)
            .field("stats", &pool_data.stats)
            .field("original", &self.original)
            .finish()
    }
}

/// A checked-out member of the pool.
///
/// The proxy owns its connection for the duration of the checkout; dropping
/// the proxy (or calling [`close`]: #method.close) returns the connection to
/// the pool rather than destroying it. All connection operations are reached
/// through `Deref`/`DerefMut`.
pub struct PooledConnection {
    connection_pool: ConnectionPool,
    entry: Option<PooledEntry>,
}

impl PooledConnection {
    pub fn connection(&self) -> &Connection {
        &self.entry.as_ref().unwrap().connection
    }

    pub fn connection_mut(&mut self) -> &mut Connection {
        &mut self.entry.as_mut().unwrap().connection
    }

    /// The pool this connection belongs to.
    pub fn pool(&self) -> &ConnectionPool {
        &self.connection_pool
    }

    /// When the connection entered the pool. This is the pool-entry time,
    /// not the time of the current checkout.
    pub fn created_time(&self) -> Instant {
        self.entry.as_ref().unwrap().created
    }

    pub fn statistics(&self) -> PooledConnectionStatistics {
        self.entry.as_ref().unwrap().stats
    }

    /// Return the connection to the pool. Equivalent to dropping the proxy;
    /// consuming `self` makes a second close unrepresentable.
    pub fn close(self) {}
}

impl Deref for PooledConnection {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        &self.entry.as_ref().unwrap().connection
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Connection {
        &mut self.entry.as_mut().unwrap().connection
    }
}

impl fmt::Debug for PooledConnection {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.debug_struct("PooledConnection")
            .field("entry", &self.entry)
            .finish()
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(entry) = self.entry.take() {
            self.connection_pool.checkin(entry);
        }
    }
}

fn close_entry(log: Logger, mut entry: PooledEntry) {
    info!(log, "closing connection for endpoint {}", &entry.key);
    entry.connection.close();
}

fn maintenance_loop(pool: ConnectionPool, check: MaintenanceCheck) {
    let period = pool.pool_config.validate_period();
    debug!(
        pool.log,
        "starting maintenance task, period {} seconds",
        period.as_secs()
    );

    loop {
        let stop_guard = check.get_lock();
        if *stop_guard {
            break;
        }

        let wait_result = check.condvar_wait_timeout(stop_guard, period);
        let stop = *wait_result.0;
        drop(wait_result.0);

        if stop {
            break;
        }
        if wait_result.1 {
            pool.run_maintenance();
        }
    }

    debug!(pool.log, "maintenance task stopped");
}
