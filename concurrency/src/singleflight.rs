// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Duplicate call suppression.
//!
//! A [`Group`] makes sure that, for a given key, at most one execution of an (expensive,
//! idempotent) operation is in flight at any time.  Callers arriving while it runs block and
//! receive a clone of its result.  Calls for distinct keys do not wait on each other.

use crate::sync::{Arc, Condvar, Mutex};
use std::collections::HashMap;
use std::hash::Hash;
use tracing::{trace, warn};

enum State<V> {
    Running,
    Done(V),
    /// The executing caller unwound before producing a value.
    Abandoned,
}

struct Call<V> {
    state: Mutex<State<V>>,
    finished: Condvar,
}

impl<V: Clone> Call<V> {
    fn new() -> Call<V> {
        Call {
            state: Mutex::new(State::Running),
            finished: Condvar::new(),
        }
    }

    fn settle(&self, state: State<V>) {
        *self.state.lock() = state;
        self.finished.notify_all();
    }

    /// Block until the call settles.  `None` if it was abandoned.
    fn wait(&self) -> Option<V> {
        let mut state = self.state.lock();
        while matches!(*state, State::Running) {
            self.finished.wait(&mut state);
        }
        match &*state {
            State::Done(value) => Some(value.clone()),
            State::Running | State::Abandoned => None,
        }
    }
}

enum Role<V> {
    Leader(Arc<Call<V>>),
    Follower(Arc<Call<V>>),
}

/// Settles the call of a leader, also when the leader unwinds.
struct Flight<'a, K: Eq + Hash, V: Clone> {
    group: &'a Group<K, V>,
    key: &'a K,
    call: Arc<Call<V>>,
    outcome: Option<V>,
}

impl<K: Eq + Hash, V: Clone> Drop for Flight<'_, K, V> {
    fn drop(&mut self) {
        self.group.calls.lock().remove(self.key);
        match self.outcome.take() {
            Some(value) => self.call.settle(State::Done(value)),
            None => {
                warn!("single-flight call abandoned, waiters will retry");
                self.call.settle(State::Abandoned);
            }
        }
    }
}

/// A namespace of keyed, coalesced executions.
pub struct Group<K, V> {
    calls: Mutex<HashMap<K, Arc<Call<V>>>>,
}

impl<K: Eq + Hash + Clone, V: Clone> Default for Group<K, V> {
    fn default() -> Self {
        Group::new()
    }
}

impl<K: Eq + Hash + Clone, V: Clone> Group<K, V> {
    /// Create an empty group.
    #[must_use]
    pub fn new() -> Group<K, V> {
        Group {
            calls: Mutex::new(HashMap::new()),
        }
    }

    fn join(&self, key: &K) -> Role<V> {
        let mut calls = self.calls.lock();
        if let Some(call) = calls.get(key) {
            return Role::Follower(Arc::clone(call));
        }
        let call = Arc::new(Call::new());
        calls.insert(key.clone(), Arc::clone(&call));
        Role::Leader(call)
    }

    /// Execute `f` for `key`, unless an execution for `key` is already in flight, in which case
    /// wait for it and share its result.
    ///
    /// The returned flag is `true` when the value was produced by another caller.
    ///
    /// If the executing caller panics, the waiting callers are released and one of them runs its
    /// own `f` in turn.  Once an execution completes the key is forgotten: later calls execute
    /// again.
    pub fn work<F>(&self, key: K, f: F) -> (V, bool)
    where
        F: FnOnce() -> V,
    {
        loop {
            match self.join(&key) {
                Role::Leader(call) => {
                    let mut flight = Flight {
                        group: self,
                        key: &key,
                        call,
                        outcome: None,
                    };
                    let value = f();
                    flight.outcome = Some(value.clone());
                    drop(flight);
                    return (value, false);
                }
                Role::Follower(call) => {
                    trace!("joining in-flight call");
                    if let Some(value) = call.wait() {
                        return (value, true);
                    }
                }
            }
        }
    }

    /// Number of keys with an execution in flight.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.calls.lock().len()
    }
}
