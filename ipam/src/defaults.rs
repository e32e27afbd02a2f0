// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Catalog of default address pools.
//!
//! Local scope pools feed bridge style networks, global scope pools feed multi-host networks.
//! The catalog is immutable once built; callers only ever get copies of it.

use crate::split::check_no_overlap;
use crate::{IpamError, SplitSpec};
use net::IpPrefix;
use net::ipv4::Ipv4Prefix;
use serde::{Deserialize, Serialize};
use tracing::debug;

const fn v4_split(addr: [u8; 4], len: u8, size: u8) -> SplitSpec {
    SplitSpec::new_unchecked(IpPrefix::V4(Ipv4Prefix::new_assert(addr, len)), size)
}

const BUILTIN_LOCAL: [SplitSpec; 7] = [
    v4_split([172, 17, 0, 0], 16, 24),
    v4_split([172, 18, 0, 0], 16, 24),
    v4_split([172, 19, 0, 0], 16, 24),
    v4_split([172, 20, 0, 0], 14, 24),
    v4_split([172, 24, 0, 0], 14, 24),
    v4_split([172, 28, 0, 0], 14, 24),
    v4_split([192, 168, 0, 0], 16, 24),
];

const BUILTIN_GLOBAL: [SplitSpec; 1] = [v4_split([10, 0, 0, 0], 8, 24)];

/// Default pools, per scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "DefaultPoolsRepr")]
pub struct DefaultPools {
    local: Vec<SplitSpec>,
    global: Vec<SplitSpec>,
}

#[derive(Deserialize)]
struct DefaultPoolsRepr {
    #[serde(default)]
    local: Vec<SplitSpec>,
    #[serde(default)]
    global: Vec<SplitSpec>,
}

impl TryFrom<DefaultPoolsRepr> for DefaultPools {
    type Error = IpamError;

    fn try_from(value: DefaultPoolsRepr) -> Result<Self, Self::Error> {
        DefaultPools::new(value.local, value.global)
    }
}

impl Default for DefaultPools {
    fn default() -> Self {
        DefaultPools::builtin()
    }
}

fn check_scope(pools: &[SplitSpec]) -> Result<(), IpamError> {
    for (i, pool) in pools.iter().enumerate() {
        pool.validate()?;
        let earlier: Vec<IpPrefix> = pools[..i].iter().map(SplitSpec::base).collect();
        check_no_overlap(&pool.base(), &earlier)?;
    }
    Ok(())
}

impl DefaultPools {
    /// The built-in catalog.
    #[must_use]
    pub fn builtin() -> DefaultPools {
        DefaultPools {
            local: BUILTIN_LOCAL.to_vec(),
            global: BUILTIN_GLOBAL.to_vec(),
        }
    }

    /// Build a catalog from operator provided pools.
    ///
    /// # Errors
    ///
    /// * [`IpamError::InvalidSplit`] if any pool is not a valid split.
    /// * [`IpamError::Overlap`] if two pools of the same scope overlap.
    pub fn new(local: Vec<SplitSpec>, global: Vec<SplitSpec>) -> Result<DefaultPools, IpamError> {
        check_scope(&local)?;
        check_scope(&global)?;
        debug!("default pools: {} local, {} global", local.len(), global.len());
        Ok(DefaultPools { local, global })
    }

    /// A copy of the local scope pools.
    #[must_use]
    pub fn local_scope_defaults(&self) -> Vec<SplitSpec> {
        self.local.clone()
    }

    /// A copy of the global scope pools.
    #[must_use]
    pub fn global_scope_defaults(&self) -> Vec<SplitSpec> {
        self.global.clone()
    }
}

/// Copy of the built-in local scope pools.
#[must_use]
pub fn local_scope_defaults() -> Vec<SplitSpec> {
    BUILTIN_LOCAL.to_vec()
}

/// Copy of the built-in global scope pools.
#[must_use]
pub fn global_scope_defaults() -> Vec<SplitSpec> {
    BUILTIN_GLOBAL.to_vec()
}
