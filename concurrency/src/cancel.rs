// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Registry of cancellable long-lived tasks (streaming connections and the like).

use crate::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Default)]
struct Registered {
    tokens: Vec<CancellationToken>,
    closed: bool,
}

/// Hands out [`CancellationToken`]s and cancels all of them, in registration order, on
/// [`CancelRegistry::close_all`].
///
/// Once closed, the registry stays closed: tokens registered afterwards are born cancelled, so no
/// task can outlive shutdown.
#[derive(Default)]
pub struct CancelRegistry {
    inner: Mutex<Registered>,
}

impl CancelRegistry {
    /// Create an open, empty registry.
    #[must_use]
    pub fn new() -> CancelRegistry {
        CancelRegistry::default()
    }

    /// Register a new task and return the token it must watch.
    #[must_use]
    pub fn register(&self) -> CancellationToken {
        let token = CancellationToken::new();
        let mut inner = self.inner.lock();
        if inner.closed {
            drop(inner);
            debug!("registration after shutdown, cancelling right away");
            token.cancel();
        } else {
            inner.tokens.push(token.clone());
        }
        token
    }

    /// Cancel every registered token, oldest first, and close the registry.
    pub fn close_all(&self) {
        let tokens = {
            let mut inner = self.inner.lock();
            inner.closed = true;
            std::mem::take(&mut inner.tokens)
        };
        debug!("cancelling {} registered tasks", tokens.len());
        for token in tokens {
            token.cancel();
        }
    }

    /// Number of tokens awaiting cancellation.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().tokens.len()
    }

    /// True if no token awaits cancellation.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True once [`CancelRegistry::close_all`] has run.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }
}
