// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Address pool management for container networks.
//!
//! * [`SplitSpec`]: a base prefix and the length of the subnets carved out of it.
//! * [`DefaultPools`]: the immutable catalog of local and global scope default pools.
//! * [`derive_ula_base`]: a stable, host specific unique local IPv6 base network.

#![deny(
    unsafe_code,
    clippy::all,
    clippy::pedantic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic
)]

mod defaults;
mod error;
mod split;
mod ula;

pub use defaults::{DefaultPools, global_scope_defaults, local_scope_defaults};
pub use error::IpamError;
pub use split::{SplitSpec, Subnets, check_no_overlap};
pub use ula::{ULA_BASE_LEN, ULA_SUBNET_LEN, derive_ula_base};
