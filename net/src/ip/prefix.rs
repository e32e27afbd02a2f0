// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use crate::ipv4::{
    InvalidIpv4Network, InvalidIpv4PrefixLength, Ipv4Prefix, Ipv4PrefixLen, Ipv4PrefixParseError,
};
use crate::ipv6::{
    InvalidIpv6Network, InvalidIpv6PrefixLength, Ipv6Prefix, Ipv6PrefixLen, Ipv6PrefixParseError,
};
use crate::prefix::{Contains, Overlaps};
use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Display, Formatter};
use std::net::IpAddr;
use std::str::FromStr;

/// An `IpAddr` with a mask describing a network in CIDR notation.
///
/// Note that unlike [`IpNet`] from the `ipnet` crate, this type ensures that only network bits
/// are set in the address.  It (de)serializes as a CIDR string, e.g. `"172.17.0.0/16"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum IpPrefix {
    /// An IPv4 prefix
    V4(Ipv4Prefix),
    /// An IPv6 prefix
    V6(Ipv6Prefix),
}

/// Errors which may occur when evaluating the length of ip prefixes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidIpPrefixLength {
    /// Prefix length too long for ipv4
    #[error(transparent)]
    InvalidIpv4PrefixLength(#[from] InvalidIpv4PrefixLength),
    /// Prefix length too long for ipv6
    #[error(transparent)]
    InvalidIpv6PrefixLength(#[from] InvalidIpv6PrefixLength),
}

/// An error indicating that an invalid network was provided.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidIpNetwork {
    /// An invalid Ipv4 network
    #[error(transparent)]
    InvalidIpv4Network(#[from] InvalidIpv4Network),
    /// An invalid Ipv6 network
    #[error(transparent)]
    InvalidIpv6Network(#[from] InvalidIpv6Network),
}

/// An error indicating that a string could not be parsed as an [`IpPrefix`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IpPrefixParseError {
    /// A failed attempt to parse an ipv4 prefix
    #[error(transparent)]
    V4(#[from] Ipv4PrefixParseError),
    /// A failed attempt to parse an ipv6 prefix
    #[error(transparent)]
    V6(#[from] Ipv6PrefixParseError),
    /// Failed to parse input as ipv4 or ipv6 prefix
    #[error("failed to parse input '{0}' as ipv4 or ipv6 prefix")]
    ParseFailure(String),
}

impl IpPrefix {
    /// Constructor which validates the arguments provided.
    ///
    /// # Errors
    ///
    /// * Returns [`InvalidIpNetwork`] if the provided prefix length is greater
    ///   than the max length for the Ipv4/Ipv6 address supplied or non-network bits are set
    ///   in the supplied address.
    #[tracing::instrument(level = "trace")]
    pub fn new_strict(
        addr: impl Into<IpAddr> + Debug,
        prefix: impl Into<u8> + Debug,
    ) -> Result<IpPrefix, InvalidIpNetwork> {
        Ok(match addr.into() {
            IpAddr::V4(addr) => IpPrefix::V4(Ipv4Prefix::new_strict(addr, prefix.into())?),
            IpAddr::V6(addr) => IpPrefix::V6(Ipv6Prefix::new_strict(addr, prefix.into())?),
        })
    }

    /// Create an [`IpPrefix`] even if the address contains non-network bits.
    ///
    /// # Errors
    ///
    /// * Returns an error if the provided prefix length is greater than the width of the address.
    #[tracing::instrument(level = "trace")]
    pub fn new_tolerant(
        addr: impl Into<IpAddr> + Debug,
        prefix: impl Into<u8> + Debug,
    ) -> Result<IpPrefix, InvalidIpPrefixLength> {
        Ok(match addr.into() {
            IpAddr::V4(addr) => IpPrefix::V4(Ipv4Prefix::new_tolerant(addr, prefix.into())?),
            IpAddr::V6(addr) => IpPrefix::V6(Ipv6Prefix::new_tolerant(addr, prefix.into())?),
        })
    }

    /// Returns the address of the network.
    #[must_use]
    pub const fn address(&self) -> IpAddr {
        match self {
            IpPrefix::V4(p) => IpAddr::V4(p.address()),
            IpPrefix::V6(p) => IpAddr::V6(p.address()),
        }
    }

    /// Returns the prefix length of the network.
    #[must_use]
    pub const fn prefix_len(&self) -> u8 {
        match self {
            IpPrefix::V4(p) => p.prefix_len().as_u8(),
            IpPrefix::V6(p) => p.prefix_len().as_u8(),
        }
    }

    /// Number of bits in an address of this family (32 or 128).
    #[must_use]
    pub const fn width(&self) -> u8 {
        match self {
            IpPrefix::V4(_) => Ipv4PrefixLen::MAX_LEN,
            IpPrefix::V6(_) => Ipv6PrefixLen::MAX_LEN,
        }
    }

    /// Returns true for ipv4 prefixes
    #[must_use]
    pub const fn is_ipv4(&self) -> bool {
        matches!(self, IpPrefix::V4(_))
    }

    /// Safe cast of [`IpPrefix`] to `ipnet::IpNet`
    #[must_use]
    pub const fn as_net(&self) -> IpNet {
        match self {
            IpPrefix::V4(p) => IpNet::V4(p.as_net()),
            IpPrefix::V6(p) => IpNet::V6(p.as_net()),
        }
    }

    /// First address covered by the prefix.
    #[must_use]
    pub const fn first_address(&self) -> IpAddr {
        match self {
            IpPrefix::V4(p) => IpAddr::V4(p.first_address()),
            IpPrefix::V6(p) => IpAddr::V6(p.first_address()),
        }
    }

    /// Last address covered by the prefix.
    #[must_use]
    pub const fn last_address(&self) -> IpAddr {
        match self {
            IpPrefix::V4(p) => IpAddr::V4(p.last_address()),
            IpPrefix::V6(p) => IpAddr::V6(p.last_address()),
        }
    }

    /// Number of sub-prefixes of length `len`.
    ///
    /// Returns `None` if `len` is not a legal sub-prefix length or the count overflows `u128`.
    #[must_use]
    pub fn subnet_count(&self, len: u8) -> Option<u128> {
        match self {
            IpPrefix::V4(p) => p.subnet_count(Ipv4PrefixLen::try_new(len).ok()?),
            IpPrefix::V6(p) => p.subnet_count(Ipv6PrefixLen::try_new(len).ok()?),
        }
    }

    /// The `n`-th sub-prefix of length `len`, or `None` if there is no such sub-prefix.
    #[must_use]
    pub fn nth_subnet(&self, len: u8, n: u128) -> Option<IpPrefix> {
        match self {
            IpPrefix::V4(p) => p
                .nth_subnet(Ipv4PrefixLen::try_new(len).ok()?, n)
                .map(IpPrefix::V4),
            IpPrefix::V6(p) => p
                .nth_subnet(Ipv6PrefixLen::try_new(len).ok()?, n)
                .map(IpPrefix::V6),
        }
    }
}

impl From<IpAddr> for IpPrefix {
    fn from(value: IpAddr) -> Self {
        match value {
            IpAddr::V4(addr) => IpPrefix::V4(Ipv4Prefix::from(addr)),
            IpAddr::V6(addr) => IpPrefix::V6(Ipv6Prefix::from(addr)),
        }
    }
}

impl From<Ipv4Prefix> for IpPrefix {
    fn from(value: Ipv4Prefix) -> Self {
        IpPrefix::V4(value)
    }
}

impl From<Ipv6Prefix> for IpPrefix {
    fn from(value: Ipv6Prefix) -> Self {
        IpPrefix::V6(value)
    }
}

impl TryFrom<IpNet> for IpPrefix {
    type Error = InvalidIpNetwork;

    fn try_from(value: IpNet) -> Result<Self, Self::Error> {
        IpPrefix::new_strict(value.addr(), value.prefix_len())
    }
}

impl From<IpPrefix> for IpNet {
    fn from(value: IpPrefix) -> Self {
        value.as_net()
    }
}

impl Display for IpPrefix {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            IpPrefix::V4(p) => write!(f, "{p}"),
            IpPrefix::V6(p) => write!(f, "{p}"),
        }
    }
}

impl FromStr for IpPrefix {
    type Err = IpPrefixParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.contains(':') {
            Ok(IpPrefix::V6(Ipv6Prefix::from_str(s)?))
        } else if s.contains('.') {
            Ok(IpPrefix::V4(Ipv4Prefix::from_str(s)?))
        } else {
            Err(IpPrefixParseError::ParseFailure(s.to_string()))
        }
    }
}

impl TryFrom<String> for IpPrefix {
    type Error = IpPrefixParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        IpPrefix::from_str(&value)
    }
}

impl From<IpPrefix> for String {
    fn from(value: IpPrefix) -> Self {
        value.to_string()
    }
}

impl Contains<IpPrefix> for IpPrefix {
    fn contains(&self, other: IpPrefix) -> bool {
        match (self, other) {
            (IpPrefix::V4(a), IpPrefix::V4(b)) => a.contains(b),
            (IpPrefix::V6(a), IpPrefix::V6(b)) => a.contains(b),
            _ => false,
        }
    }
}

impl Contains<IpAddr> for IpPrefix {
    fn contains(&self, other: IpAddr) -> bool {
        match (self, other) {
            (IpPrefix::V4(a), IpAddr::V4(b)) => a.contains(b),
            (IpPrefix::V6(a), IpAddr::V6(b)) => a.contains(b),
            _ => false,
        }
    }
}

impl Overlaps for IpPrefix {
    /// Prefixes of different address families never overlap.
    fn overlaps(&self, other: &IpPrefix) -> bool {
        match (self, other) {
            (IpPrefix::V4(a), IpPrefix::V4(b)) => a.overlaps(b),
            (IpPrefix::V6(a), IpPrefix::V6(b)) => a.overlaps(b),
            _ => false,
        }
    }
}

#[cfg(any(test, feature = "bolero"))]
mod contract {
    use crate::ip::IpPrefix;
    use bolero::{Driver, TypeGenerator};

    impl TypeGenerator for IpPrefix {
        fn generate<D: Driver>(driver: &mut D) -> Option<Self> {
            if driver.produce::<bool>()? {
                Some(IpPrefix::V4(driver.produce()?))
            } else {
                Some(IpPrefix::V6(driver.produce()?))
            }
        }
    }
}
