/*
 * Copyright 2020 Joyent, Inc.
 */

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use derive_more::{Add, AddAssign, Display, From, Into, Sub, SubAssign};
use slog::Logger;

use crate::config::PoolConfig;
use crate::connection::Connection;
use crate::endpoint::{srv_key, EndpointKey};
use crate::validator::ConnectionValidator;

#[derive(Add, AddAssign, Clone, Copy, Debug, Display, Eq, From, Into, Ord,
         PartialOrd, PartialEq, Sub, SubAssign)]
pub struct ConnectionCount(u32);

#[derive(Copy, Clone, Debug)]
pub struct ConnectionPoolStats {
    pub total_connections: ConnectionCount,
    pub idle_connections: ConnectionCount,
    pub active_connections: ConnectionCount,
}

impl ConnectionPoolStats {
    pub fn new() -> Self {
        ConnectionPoolStats {
            total_connections: ConnectionCount::from(0),
            idle_connections: ConnectionCount::from(0),
            active_connections: ConnectionCount::from(0),
        }
    }
}

impl Default for ConnectionPoolStats {
    fn default() -> Self {
        ConnectionPoolStats::new()
    }
}

#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum ConnectionPoolState {
    #[display(fmt = "running")]
    Running,
    #[display(fmt = "stopping")]
    Stopping,
    #[display(fmt = "stopped")]
    Stopped,
}

/// Per-connection usage bookkeeping. Lives with the pooled entry, so the
/// numbers survive across checkouts of the same connection.
#[derive(Clone, Copy, Debug, Default)]
pub struct PooledConnectionStatistics {
    pub checkout_count: u64,
    pub checkin_count: u64,
    pub last_validated: Option<Instant>,
}

/// A pool member: the connection plus the metadata the pool keeps about it.
#[derive(Debug)]
pub struct PooledEntry {
    pub connection: Connection,
    pub key: EndpointKey,
    pub created: Instant,
    pub idle_since: Instant,
    pub stats: PooledConnectionStatistics,
}

impl PooledEntry {
    pub fn new(connection: Connection) -> Self {
        let key = connection
            .connected_endpoint()
            .map(srv_key)
            .unwrap_or_default();
        let now = Instant::now();
        PooledEntry {
            connection,
            key,
            created: now,
            idle_since: now,
            stats: PooledConnectionStatistics::default(),
        }
    }
}

/// Pool state guarded by the pool-wide lock: the idle queue, the counters,
/// and the lifecycle state. The active side of the pool is not collected
/// here; checked-out connections live inside their proxies and are tracked
/// by count alone.
#[derive(Debug)]
pub struct PoolData {
    pub available: VecDeque<PooledEntry>,
    pub stats: ConnectionPoolStats,
    pub state: ConnectionPoolState,
}

impl PoolData {
    pub fn new(max_size: usize) -> Self {
        PoolData {
            available: VecDeque::with_capacity(max_size),
            stats: ConnectionPoolStats::new(),
            state: ConnectionPoolState::Running,
        }
    }
}

#[derive(Debug)]
pub struct ProtectedData(Arc<(Mutex<PoolData>, Condvar)>);

impl ProtectedData {
    pub fn new(pool_data: PoolData) -> Self {
        ProtectedData(Arc::new((Mutex::new(pool_data), Condvar::new())))
    }

    pub fn pool_data_lock(&self) -> MutexGuard<PoolData> {
        (self.0).0.lock().unwrap()
    }

    pub fn condvar_wait<'a>(
        &self,
        g: MutexGuard<'a, PoolData>,
        m_timeout_ms: Option<u64>,
    ) -> (MutexGuard<'a, PoolData>, bool) {
        match m_timeout_ms {
            Some(timeout_ms) => {
                let timeout = Duration::from_millis(timeout_ms);
                let wait_result = (self.0).1.wait_timeout(g, timeout).unwrap();
                (wait_result.0, wait_result.1.timed_out())
            }
            None => ((self.0).1.wait(g).unwrap(), false),
        }
    }

    pub fn condvar_notify(&self) {
        (self.0).1.notify_one()
    }

    pub fn condvar_notify_all(&self) {
        (self.0).1.notify_all()
    }
}

impl Clone for ProtectedData {
    fn clone(&self) -> ProtectedData {
        ProtectedData(Arc::clone(&self.0))
    }
}

/// Stop signal for the maintenance thread. The thread sleeps on the condvar
/// for one validation period at a time; setting the flag and notifying wakes
/// it for prompt shutdown.
#[derive(Debug)]
pub struct MaintenanceCheck(Arc<(Mutex<bool>, Condvar)>);

impl MaintenanceCheck {
    pub fn new() -> Self {
        MaintenanceCheck(Arc::new((Mutex::new(false), Condvar::new())))
    }

    pub fn get_lock(&self) -> MutexGuard<bool> {
        (self.0).0.lock().unwrap()
    }

    pub fn condvar_wait_timeout<'a>(
        &self,
        g: MutexGuard<'a, bool>,
        timeout: Duration,
    ) -> (MutexGuard<'a, bool>, bool) {
        let wait_result = (self.0).1.wait_timeout(g, timeout).unwrap();
        (wait_result.0, wait_result.1.timed_out())
    }

    pub fn condvar_notify(&self) {
        (self.0).1.notify_one()
    }
}

impl Clone for MaintenanceCheck {
    fn clone(&self) -> MaintenanceCheck {
        MaintenanceCheck(Arc::clone(&self.0))
    }
}

/// Options for pool construction.
pub struct ConnectionPoolOptions {
    pub pool_config: PoolConfig,
    /// Milliseconds a checkout will wait for a connection before failing
    /// with a pool exhaustion fault. `None` blocks indefinitely.
    pub checkout_timeout: Option<u64>,
    /// Liveness check applied per the pool configuration's validate flags.
    /// Defaults to the open-state check when `None`.
    pub validator: Option<Box<dyn ConnectionValidator>>,
    pub log: Logger,
}
