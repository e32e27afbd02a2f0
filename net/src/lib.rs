// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! A library for working with and validating ip prefixes: checked prefix types, overlap detection
//! and sub-prefix arithmetic used to carve address pools.

#![deny(
    unsafe_code,
    missing_docs,
    clippy::all,
    clippy::pedantic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic
)]
#![allow(clippy::should_panic_without_expect)] // we panic in contract checks with simple unwrap()

pub mod ip;
pub mod ipv4;
pub mod ipv6;
pub mod prefix;

pub use ip::IpPrefix;
pub use ipv4::Ipv4Prefix;
pub use ipv6::Ipv6Prefix;
pub use prefix::{Contains, Overlaps};
