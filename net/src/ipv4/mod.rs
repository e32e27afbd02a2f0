// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Ipv4 prefixes and prefix arithmetic

mod prefix;

pub use prefix::*;
