// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Lock types.  Locks are not poisoned: a panic while holding one leaves the data as it was.

pub use arc_swap::{ArcSwap, ArcSwapOption};
pub use parking_lot::{Condvar, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
pub use std::sync::Arc;
