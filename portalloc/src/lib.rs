// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Reservation of published host ports.
//!
//! The [`PortAllocator`] keeps, per protocol and address, the set of reserved ports.  Anonymous
//! requests (port 0) get the lowest free port outside the operating system's dynamic (ephemeral)
//! port range, which is learned once through a [`DynamicRangeProvider`] and cached.

#![deny(
    unsafe_code,
    missing_docs,
    clippy::all,
    clippy::pedantic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic
)]

mod allocator;
mod error;
mod protocol;
pub mod provider;
mod range;

pub use allocator::{AllocatorConfig, PortAllocator, RangePolicy};
pub use error::{AllocatorError, RangeError};
pub use protocol::Protocol;
pub use provider::DynamicRangeProvider;
pub use range::{DynamicRange, PortRange};
