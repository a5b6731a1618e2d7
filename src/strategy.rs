/*
 * Copyright 2020 Joyent, Inc.
 */

//! Policies for choosing among multiple configured endpoints.

use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

use rand::seq::SliceRandom;

use crate::endpoint::Endpoint;

/// The policy applied when a configuration lists more than one endpoint.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ConnectionStrategy {
    /// Always use the first configured endpoint.
    First,
    /// Rotate through the endpoints in declared order. The rotation advances
    /// on every connection attempt, successful or not.
    RoundRobin,
    /// Pick endpoints in uniform random order on each attempt.
    Random,
    /// Prefer the first endpoint, falling through to the others in declared
    /// order only when a connection attempt fails. Every new attempt starts
    /// back at the first endpoint.
    ActivePassive,
}

impl Default for ConnectionStrategy {
    fn default() -> Self {
        ConnectionStrategy::First
    }
}

/// Applies a `ConnectionStrategy` on behalf of one connection factory.
///
/// The round-robin rotation counter lives here, shared by all connections the
/// factory produces.
#[derive(Debug)]
pub struct EndpointSelector {
    strategy: ConnectionStrategy,
    counter: AtomicUsize,
}

impl EndpointSelector {
    pub fn new(strategy: ConnectionStrategy) -> Self {
        EndpointSelector {
            strategy,
            counter: AtomicUsize::new(0),
        }
    }

    pub fn strategy(&self) -> ConnectionStrategy {
        self.strategy
    }

    /// The ordered candidate list for one connection attempt. The caller
    /// tries each candidate in turn and gives up when the list is exhausted.
    pub fn candidates(&self, endpoints: &[Endpoint]) -> Vec<Endpoint> {
        match self.strategy {
            ConnectionStrategy::First => endpoints.iter().take(1).cloned().collect(),
            ConnectionStrategy::ActivePassive => endpoints.to_vec(),
            ConnectionStrategy::RoundRobin => {
                let count = endpoints.len();
                let start =
                    self.counter.fetch_add(1, AtomicOrdering::Relaxed) % count;
                let mut ordered = Vec::with_capacity(count);
                for offset in 0..count {
                    ordered.push(endpoints[(start + offset) % count].clone());
                }
                ordered
            }
            ConnectionStrategy::Random => {
                let mut shuffled = endpoints.to_vec();
                shuffled.shuffle(&mut rand::thread_rng());
                shuffled
            }
        }
    }
}
