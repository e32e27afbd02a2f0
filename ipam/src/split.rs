// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Declarative pool splitting.
//!
//! A [`SplitSpec`] describes the set of `2^(size - base.len)` subnets of length `size` carved out
//! of `base`.  The set is never materialized: subnets are computed on demand by index, so a
//! `/8` split into `/24` (65536 subnets) costs nothing until somebody walks it.

use crate::IpamError;
use net::{IpPrefix, Overlaps};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::net::IpAddr;
use tracing::{debug, trace};

/// A network to be split in chunks of mask length `size`.
///
/// Example: base `10.10.0.0/16` with size `24` defines the 256 pools `10.10.[0-255].0/24`.
///
/// Serializes as `{"base": "<cidr>", "size": <len>}`; deserialization enforces the same invariant
/// as [`SplitSpec::new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "SplitSpecRepr")]
pub struct SplitSpec {
    base: IpPrefix,
    size: u8,
}

#[derive(Deserialize)]
struct SplitSpecRepr {
    base: IpPrefix,
    size: u8,
}

impl TryFrom<SplitSpecRepr> for SplitSpec {
    type Error = IpamError;

    fn try_from(value: SplitSpecRepr) -> Result<Self, Self::Error> {
        SplitSpec::new(value.base, value.size)
    }
}

impl Display for SplitSpec {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (/{} subnets)", self.base, self.size)
    }
}

const fn addr_bits(addr: IpAddr) -> u128 {
    match addr {
        IpAddr::V4(a) => a.to_bits() as u128,
        IpAddr::V6(a) => a.to_bits(),
    }
}

impl SplitSpec {
    /// Create a validated [`SplitSpec`].
    ///
    /// # Errors
    ///
    /// Returns [`IpamError::InvalidSplit`] unless `base.len < size <= width(base)`.
    pub fn new(base: IpPrefix, size: u8) -> Result<SplitSpec, IpamError> {
        let spec = SplitSpec { base, size };
        spec.validate()?;
        Ok(spec)
    }

    /// Create a [`SplitSpec`] without validating it.
    ///
    /// Operations on an invalid split report [`IpamError::InvalidSplit`] (or yield nothing).
    #[must_use]
    pub const fn new_unchecked(base: IpPrefix, size: u8) -> SplitSpec {
        SplitSpec { base, size }
    }

    /// The prefix being split.
    #[must_use]
    pub const fn base(&self) -> IpPrefix {
        self.base
    }

    /// The mask length of each subnet.
    #[must_use]
    pub const fn size(&self) -> u8 {
        self.size
    }

    /// Check `base.len < size <= width(base)`.
    ///
    /// # Errors
    ///
    /// Returns [`IpamError::InvalidSplit`] if the invariant does not hold.
    pub fn validate(&self) -> Result<(), IpamError> {
        if self.size <= self.base.prefix_len() || self.size > self.base.width() {
            return Err(IpamError::InvalidSplit {
                base: self.base,
                size: self.size,
            });
        }
        Ok(())
    }

    /// The zeroth subnet of the split: the base network address with mask length `size`.
    ///
    /// # Errors
    ///
    /// Returns [`IpamError::InvalidSplit`] if `size` is out of range for the base.
    pub fn first_prefix(&self) -> Result<IpPrefix, IpamError> {
        self.validate()?;
        match self.base.nth_subnet(self.size, 0) {
            Some(first) => Ok(first),
            None => Err(IpamError::InvalidSplit {
                base: self.base,
                size: self.size,
            }),
        }
    }

    /// The `n`-th subnet of the split, or `None` past the end (or for an invalid split).
    #[must_use]
    pub fn nth_prefix(&self, n: u128) -> Option<IpPrefix> {
        self.validate().ok()?;
        self.base.nth_subnet(self.size, n)
    }

    /// Number of subnets in the split.  `None` for invalid splits and for `::/0` split into
    /// `/128`, whose count does not fit in a `u128`.
    #[must_use]
    pub fn subnet_count(&self) -> Option<u128> {
        self.validate().ok()?;
        self.base.subnet_count(self.size)
    }

    /// Lazily iterate over the subnets of the split, in address order.
    #[must_use]
    pub fn subnets(&self) -> Subnets {
        Subnets {
            spec: *self,
            next: Some(0),
        }
    }

    /// Returns true if the base of this split overlaps with `prefix`.
    #[must_use]
    pub fn overlaps(&self, prefix: &IpPrefix) -> bool {
        self.base.overlaps(prefix)
    }

    /// Find the lowest subnet of the split which overlaps none of the `in_use` prefixes.
    ///
    /// Runs of subnets covered by an in-use prefix are skipped in one step, so the walk is bounded
    /// by the number of in-use prefixes rather than by the size of the split.
    ///
    /// # Errors
    ///
    /// * [`IpamError::InvalidSplit`] if the split is invalid.
    /// * [`IpamError::PoolExhausted`] if every subnet collides with an in-use prefix.
    #[tracing::instrument(level = "debug", skip(in_use), fields(in_use = in_use.len()))]
    pub fn next_available(&self, in_use: &[IpPrefix]) -> Result<IpPrefix, IpamError> {
        self.validate()?;
        let shift = u32::from(self.base.width() - self.size);
        let base_bits = addr_bits(self.base.first_address());
        let mut index: u128 = 0;
        while let Some(candidate) = self.base.nth_subnet(self.size, index) {
            let collision = in_use
                .iter()
                .filter(|p| p.overlaps(&candidate))
                .map(|p| addr_bits(p.last_address()))
                .max();
            let Some(last) = collision else {
                debug!("selected {candidate} from {self}");
                return Ok(candidate);
            };
            trace!("{candidate} is in use");
            // resume right after the last subnet touched by the colliding prefix
            let Some(next) = ((last - base_bits) >> shift).checked_add(1) else {
                break;
            };
            index = next;
        }
        Err(IpamError::PoolExhausted(*self))
    }
}

/// Lazy iterator over the subnets of a [`SplitSpec`].
#[derive(Debug, Clone)]
pub struct Subnets {
    spec: SplitSpec,
    next: Option<u128>,
}

impl Iterator for Subnets {
    type Item = IpPrefix;

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.next?;
        let prefix = self.spec.nth_prefix(index);
        self.next = match prefix {
            Some(_) => index.checked_add(1),
            None => None,
        };
        prefix
    }
}

/// Check that `candidate` overlaps none of the `existing` prefixes.
///
/// # Errors
///
/// Returns [`IpamError::Overlap`] naming the first colliding pair.
pub fn check_no_overlap<'a>(
    candidate: &IpPrefix,
    existing: impl IntoIterator<Item = &'a IpPrefix>,
) -> Result<(), IpamError> {
    match existing.into_iter().find(|p| candidate.overlaps(p)) {
        Some(other) => Err(IpamError::Overlap(*candidate, *other)),
        None => Ok(()),
    }
}
