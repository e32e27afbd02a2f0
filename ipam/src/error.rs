// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use crate::SplitSpec;
use net::IpPrefix;

/// Errors raised while validating or walking address pools.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IpamError {
    #[error(
        "invalid split of {base} into /{size}: size must be in /{}..=/{}",
        .base.prefix_len() + 1,
        .base.width()
    )]
    InvalidSplit { base: IpPrefix, size: u8 },
    #[error("prefix {0} overlaps with {1}")]
    Overlap(IpPrefix, IpPrefix),
    #[error("no subnet of {0} is available")]
    PoolExhausted(SplitSpec),
}
