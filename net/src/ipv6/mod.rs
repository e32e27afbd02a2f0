// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Ipv6 prefixes and prefix arithmetic

mod prefix;

pub use prefix::*;
