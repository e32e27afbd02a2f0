// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Concurrency primitives shared by the netpool crates.
//!
//! * [`sync`]: the lock and lock-free cell types everybody should use.
//! * [`singleflight`]: coalescing of concurrent identical, idempotent calls.
//! * [`cancel`]: a registry of cancellable long-lived tasks, closed at shutdown.  Meant for the
//!   daemon's streaming endpoints (event and log streams) which must not outlive it.

#![deny(
    unsafe_code,
    missing_docs,
    clippy::all,
    clippy::pedantic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic
)]

pub mod cancel;
pub mod singleflight;
pub mod sync;
