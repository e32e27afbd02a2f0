// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

#[cfg(any(test, feature = "bolero"))]
#[allow(unused_imports)] // re-export
pub use contract::*;

use crate::prefix::{Contains, Overlaps, ranges_intersect};
use ipnet::{AddrParseError, Ipv6Net};
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Display, Formatter};
use std::net::Ipv6Addr;
use std::str::FromStr;
use tracing::debug;

/// An `Ipv6Addr` with a mask describing a network in CIDR notation.
///
/// Note that unlike [`Ipv6Net`] from the `ipnet` crate, this type ensures that only network bits
/// are set in the address.  Deserialization enforces the same rule.
#[derive(
    Default, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "Ipv6Net", into = "Ipv6Net")]
pub struct Ipv6Prefix(Ipv6Net);

/// A checked type describing the values 0 to 128, which constitute all legal prefix lengths for
/// Ipv6 addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(try_from = "u8", into = "u8")]
pub struct Ipv6PrefixLen(u8);

/// An error indicating that an invalid prefix length was provided.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidIpv6PrefixLength {
    /// The provided prefix is too long to form a legal [`Ipv6PrefixLen`]
    #[error("invalid prefix length {0}, max is {MAX}", MAX = Ipv6PrefixLen::MAX_LEN)]
    TooLong(u8),
}

/// An error indicating that an invalid network was provided.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidIpv6Network {
    /// The provided network description contains set non-network bits
    #[error("Address {0}/{1} contains non network bits")]
    AddressContainsNonNetworkBits(Ipv6Addr, Ipv6PrefixLen),
    /// The provided prefix length is invalid
    #[error(transparent)]
    InvalidPrefix(InvalidIpv6PrefixLength),
}

/// An error indicating that a string could not be parsed as an [`Ipv6Prefix`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Ipv6PrefixParseError {
    /// failure to interpret string as an ip and a prefix length
    #[error(transparent)]
    AddrParseError(AddrParseError),
    /// invalid ip or prefix length
    #[error(transparent)]
    InvalidIpv6Network(InvalidIpv6Network),
}

/// Mask with the `len` most significant bits set.
const fn netmask(len: u8) -> u128 {
    match u128::MAX.checked_shl((Ipv6PrefixLen::MAX_LEN - len) as u32) {
        Some(mask) => mask,
        None => 0,
    }
}

impl Ipv6PrefixLen {
    /// The largest possible prefix length for IPv6 (i.e. /128)
    pub const MAX_LEN: u8 = 128;
    /// The largest possible prefix length for IPv6 (i.e. /128)
    pub const MAX: Self = Self(Self::MAX_LEN);
    /// The minimum possible prefix length for IPv6 (i.e. /0)
    pub const MIN: Self = Self(0);

    /// Constructor which asserts if the provided length is invalid.
    ///
    /// # Panics
    ///
    /// Panics if the provided length is greater than [`Ipv6PrefixLen::MAX_LEN`].
    #[must_use]
    pub const fn new_assert(len: u8) -> Self {
        assert!(len <= Self::MAX_LEN, "invalid prefix length");
        Self(len)
    }

    /// Constructor which checks that the provided length is valid.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidIpv6PrefixLength::TooLong`] if the provided length is greater than
    /// [`Ipv6PrefixLen::MAX_LEN`].
    pub const fn try_new(len: u8) -> Result<Ipv6PrefixLen, InvalidIpv6PrefixLength> {
        if len > Self::MAX_LEN {
            return Err(InvalidIpv6PrefixLength::TooLong(len));
        }
        Ok(Ipv6PrefixLen(len))
    }

    /// Interpret the [`Ipv6PrefixLen`] as a `u8`
    #[must_use]
    pub const fn as_u8(&self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Ipv6PrefixLen {
    type Error = InvalidIpv6PrefixLength;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ipv6PrefixLen::try_new(value)
    }
}

impl From<Ipv6PrefixLen> for u8 {
    fn from(value: Ipv6PrefixLen) -> Self {
        value.0
    }
}

impl Display for Ipv6PrefixLen {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl PartialEq<u8> for Ipv6PrefixLen {
    fn eq(&self, other: &u8) -> bool {
        self.0 == *other
    }
}

impl Ipv6Prefix {
    /// The root [`Ipv6Prefix`], aka ::/0
    pub const ROOT: Ipv6Prefix = Ipv6Prefix::new_assert(0, 0);

    /// Validating constructor which panics if the arguments are invalid.
    /// The address is given as its 128 bit integer representation.
    ///
    /// # Panics
    ///
    /// * Panics if the provided prefix is greater than 128
    /// * Panics if the provided address contains non-network bits.
    #[must_use]
    pub const fn new_assert(bits: u128, prefix: u8) -> Self {
        let prefix = Ipv6PrefixLen::new_assert(prefix);
        assert!(
            bits & netmask(prefix.0) == bits,
            "Ipv6Prefix address contains non network bits"
        );
        Ipv6Prefix(Ipv6Net::new_assert(Ipv6Addr::from_bits(bits), prefix.0))
    }

    /// Constructor which validates the arguments provided.
    ///
    /// # Errors
    ///
    /// * Returns [`InvalidIpv6Network::InvalidPrefix`] if the provided prefix length is greater
    ///   than [`Ipv6PrefixLen::MAX_LEN`].
    /// * Returns [`InvalidIpv6Network::AddressContainsNonNetworkBits`] if the provided address
    ///   contains non-network bits.
    #[tracing::instrument(level = "trace")]
    pub fn new_strict(
        addr: impl Into<Ipv6Addr> + Debug,
        prefix: impl TryInto<Ipv6PrefixLen, Error = InvalidIpv6PrefixLength> + Debug,
    ) -> Result<Ipv6Prefix, InvalidIpv6Network> {
        let addr = addr.into();
        let prefix = prefix
            .try_into()
            .map_err(InvalidIpv6Network::InvalidPrefix)?;
        if addr.to_bits() & netmask(prefix.0) != addr.to_bits() {
            return Err(InvalidIpv6Network::AddressContainsNonNetworkBits(
                addr, prefix,
            ));
        }
        Ok(Ipv6Prefix(Ipv6Net::new_assert(addr, prefix.0)))
    }

    /// Create an [`Ipv6Prefix`] even if the address contains non-network bits.  The host bits
    /// are cleared (and a debug event is logged).
    ///
    /// # Errors
    ///
    /// * Returns an error if the provided prefix length is greater than [`Ipv6PrefixLen::MAX_LEN`].
    #[tracing::instrument(level = "trace")]
    pub fn new_tolerant<E>(
        addr: impl Into<Ipv6Addr> + Debug,
        prefix: impl TryInto<Ipv6PrefixLen, Error = E> + Debug,
    ) -> Result<Ipv6Prefix, E> {
        let addr = addr.into();
        let prefix = prefix.try_into()?;
        let masked = Ipv6Addr::from_bits(addr.to_bits() & netmask(prefix.0));
        if masked != addr {
            debug!(%addr, %prefix, "clearing non network bits of prefix address");
        }
        Ok(Ipv6Prefix(Ipv6Net::new_assert(masked, prefix.0)))
    }

    /// Returns the address of the network.
    #[must_use]
    pub const fn address(&self) -> Ipv6Addr {
        self.0.addr()
    }

    /// Returns the prefix length of the network.
    #[must_use]
    pub const fn prefix_len(&self) -> Ipv6PrefixLen {
        Ipv6PrefixLen(self.0.prefix_len()) // checked already
    }

    /// Safe cast of [`Ipv6Prefix`] to `ipnet::Ipv6Net`
    #[must_use]
    pub const fn as_net(&self) -> Ipv6Net {
        self.0
    }

    /// First address covered by the prefix (the network address).
    #[must_use]
    pub const fn first_address(&self) -> Ipv6Addr {
        self.address()
    }

    /// Last address covered by the prefix.
    #[must_use]
    pub const fn last_address(&self) -> Ipv6Addr {
        Ipv6Addr::from_bits(self.address().to_bits() | !netmask(self.0.prefix_len()))
    }

    /// Number of sub-prefixes of length `len` contained in this prefix.
    ///
    /// Returns `None` if `len` is shorter than this prefix, or if the count does not fit in a
    /// `u128` (only the case for `::/0` split into `/128`).
    #[must_use]
    pub fn subnet_count(&self, len: Ipv6PrefixLen) -> Option<u128> {
        let diff = len.0.checked_sub(self.prefix_len().0)?;
        1u128.checked_shl(u32::from(diff))
    }

    /// Returns the `n`-th sub-prefix of length `len`, counting from the network address.
    ///
    /// Returns `None` if `len` is shorter than this prefix or if `n` is past the last sub-prefix.
    #[must_use]
    pub fn nth_subnet(&self, len: Ipv6PrefixLen, n: u128) -> Option<Ipv6Prefix> {
        let diff = len.0.checked_sub(self.prefix_len().0)?;
        if diff < Ipv6PrefixLen::MAX_LEN && n >> diff != 0 {
            return None;
        }
        // n != 0 implies diff >= 1, hence len >= 1 and the shift is at most 127
        let offset = if n == 0 {
            0
        } else {
            n << (Ipv6PrefixLen::MAX_LEN - len.0)
        };
        let addr = Ipv6Addr::from_bits(self.address().to_bits() | offset);
        Some(Ipv6Prefix(Ipv6Net::new_assert(addr, len.0)))
    }

    /// Returns the address `value << shift` positions above the network address, with
    /// wrapping 128 bit arithmetic.
    ///
    /// This is the building block for carving fields (such as the ULA global id) into an
    /// address.  The result is not guaranteed to be a network address of this prefix.
    #[must_use]
    pub fn address_plus(&self, value: u64, shift: u8) -> Ipv6Addr {
        let delta = u128::from(value)
            .checked_shl(u32::from(shift))
            .unwrap_or_default();
        Ipv6Addr::from_bits(self.address().to_bits().wrapping_add(delta))
    }
}

impl From<Ipv6Addr> for Ipv6Prefix {
    fn from(value: Ipv6Addr) -> Self {
        Ipv6Prefix(Ipv6Net::new_assert(value, Ipv6PrefixLen::MAX_LEN))
    }
}

impl TryFrom<Ipv6Net> for Ipv6Prefix {
    type Error = InvalidIpv6Network;

    fn try_from(value: Ipv6Net) -> Result<Self, Self::Error> {
        Ipv6Prefix::new_strict(value.addr(), value.prefix_len())
    }
}

impl From<Ipv6Prefix> for Ipv6Net {
    fn from(value: Ipv6Prefix) -> Self {
        value.0
    }
}

impl Display for Ipv6Prefix {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Ipv6Prefix {
    type Err = Ipv6PrefixParseError;

    /// Attempt to parse an [`Ipv6Prefix`] from a `str`.
    ///
    /// # Errors
    ///
    /// * Returns [`Ipv6PrefixParseError::AddrParseError`] if the provided string cannot be parsed
    ///   as an address and a prefix length.
    /// * Returns [`Ipv6PrefixParseError::InvalidIpv6Network`] if non-network bits are set.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let net = Ipv6Net::from_str(s).map_err(Ipv6PrefixParseError::AddrParseError)?;
        Ipv6Prefix::new_strict(net.addr(), net.prefix_len())
            .map_err(Ipv6PrefixParseError::InvalidIpv6Network)
    }
}

impl Contains<Ipv6Prefix> for Ipv6Prefix {
    fn contains(&self, other: Ipv6Prefix) -> bool {
        self.0.contains(&other.0)
    }
}

impl Contains<Ipv6Addr> for Ipv6Prefix {
    fn contains(&self, other: Ipv6Addr) -> bool {
        self.0.contains(&other)
    }
}

impl Overlaps for Ipv6Prefix {
    fn overlaps(&self, other: &Ipv6Prefix) -> bool {
        ranges_intersect(
            self.first_address(),
            self.last_address(),
            other.first_address(),
            other.last_address(),
        )
    }
}

#[cfg(any(test, feature = "bolero"))]
mod contract {
    use crate::ipv6::{Ipv6Prefix, Ipv6PrefixLen};
    use bolero::{Driver, TypeGenerator};
    use std::net::Ipv6Addr;
    use std::ops::Bound;

    impl TypeGenerator for Ipv6PrefixLen {
        fn generate<D: Driver>(driver: &mut D) -> Option<Self> {
            Some(Ipv6PrefixLen::new_assert(driver.gen_u8(
                Bound::Included(&0),
                Bound::Included(&Ipv6PrefixLen::MAX_LEN),
            )?))
        }
    }

    impl TypeGenerator for Ipv6Prefix {
        fn generate<D: Driver>(driver: &mut D) -> Option<Self> {
            let addr: Ipv6Addr = driver.produce()?;
            let len: Ipv6PrefixLen = driver.produce()?;
            Ipv6Prefix::new_tolerant(addr, len).ok()
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::ipv6::{InvalidIpv6Network, Ipv6Prefix, Ipv6PrefixLen};
    use crate::prefix::{Contains, Overlaps};
    use std::net::Ipv6Addr;
    use std::str::FromStr;

    #[test]
    #[should_panic]
    fn non_network_bits_panic_in_asserting_constructor() {
        let _ = Ipv6Prefix::new_assert(1, 64);
    }

    #[test]
    fn non_network_bits_in_checked_constructor_returns_error() {
        let ip = Ipv6Addr::from_str("fd00::1").unwrap();
        assert!(matches!(
            Ipv6Prefix::new_strict(ip, 64),
            Err(InvalidIpv6Network::AddressContainsNonNetworkBits(_, _))
        ));
        assert!(matches!(
            Ipv6Prefix::new_strict(ip, 129),
            Err(InvalidIpv6Network::InvalidPrefix(_))
        ));
    }

    #[test]
    fn first_and_last_address() {
        let prefix = Ipv6Prefix::from_str("fd42:98fc:1c14::/48").unwrap();
        assert_eq!(
            prefix.last_address(),
            Ipv6Addr::from_str("fd42:98fc:1c14:ffff:ffff:ffff:ffff:ffff").unwrap()
        );
        assert_eq!(Ipv6Prefix::ROOT.last_address().to_bits(), u128::MAX);
    }

    #[test]
    fn nth_subnet_walks_the_split() {
        let base = Ipv6Prefix::from_str("fd62:fb69:18af::/48").unwrap();
        let len = Ipv6PrefixLen::new_assert(64);
        assert_eq!(base.subnet_count(len), Some(65536));
        assert_eq!(
            base.nth_subnet(len, 0).unwrap().to_string(),
            "fd62:fb69:18af::/64"
        );
        assert_eq!(
            base.nth_subnet(len, 0xbeef).unwrap().to_string(),
            "fd62:fb69:18af:beef::/64"
        );
        assert_eq!(base.nth_subnet(len, 65536), None);
    }

    #[test]
    fn root_split_into_hosts_does_not_overflow() {
        let len = Ipv6PrefixLen::MAX;
        assert_eq!(Ipv6Prefix::ROOT.subnet_count(len), None);
        assert_eq!(
            Ipv6Prefix::ROOT.nth_subnet(len, u128::MAX),
            Some(Ipv6Prefix::from(Ipv6Addr::from_bits(u128::MAX)))
        );
        assert_eq!(
            Ipv6Prefix::ROOT.nth_subnet(Ipv6PrefixLen::MIN, 0),
            Some(Ipv6Prefix::ROOT)
        );
        assert_eq!(Ipv6Prefix::ROOT.nth_subnet(Ipv6PrefixLen::MIN, 1), None);
    }

    #[test]
    fn address_plus_places_fields() {
        let ula = Ipv6Prefix::from_str("fd00::/8").unwrap();
        assert_eq!(
            ula.address_plus(0x42_98fc_1c14, 80),
            Ipv6Addr::from_str("fd42:98fc:1c14::").unwrap()
        );
        assert_eq!(ula.address_plus(1, 128), ula.address());
    }

    #[test]
    fn overlap_is_symmetric_and_reflexive() {
        bolero::check!()
            .with_type()
            .cloned()
            .for_each(|(a, b): (Ipv6Prefix, Ipv6Prefix)| {
                assert!(a.overlaps(&a));
                assert_eq!(a.overlaps(&b), b.overlaps(&a));
                assert_eq!(a.overlaps(&b), a.contains(b) || b.contains(a));
            });
    }
}
