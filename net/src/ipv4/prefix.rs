// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

#[cfg(any(test, feature = "bolero"))]
#[allow(unused_imports)] // re-export
pub use contract::*;

use crate::prefix::{Contains, Overlaps, ranges_intersect};
use ipnet::{AddrParseError, Ipv4Net};
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Display, Formatter};
use std::net::Ipv4Addr;
use std::str::FromStr;
use tracing::debug;

/// An `Ipv4Addr` with a mask describing a network in CIDR notation.
///
/// Note that unlike [`Ipv4Net`] from the `ipnet` crate, this type ensures that only network bits
/// are set in the address.  Deserialization enforces the same rule.
#[derive(
    Default, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "Ipv4Net", into = "Ipv4Net")]
pub struct Ipv4Prefix(Ipv4Net);

/// A checked type describing the values 0 to 32, which constitute all legal prefix lengths for
/// Ipv4 addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(try_from = "u8", into = "u8")]
pub struct Ipv4PrefixLen(u8);

/// An error indicating that an invalid prefix length was provided.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidIpv4PrefixLength {
    /// The provided prefix is too long to form a legal [`Ipv4PrefixLen`]
    #[error("invalid prefix length {0}, max is {MAX}", MAX = Ipv4PrefixLen::MAX_LEN)]
    TooLong(u8),
}

/// An error indicating that an invalid network was provided.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidIpv4Network {
    /// The provided network description contains set non-network bits
    #[error("Address {0}/{1} contains non network bits")]
    AddressContainsNonNetworkBits(Ipv4Addr, Ipv4PrefixLen),
    /// The provided prefix length is invalid
    #[error(transparent)]
    InvalidPrefix(InvalidIpv4PrefixLength),
}

/// An error indicating that a string could not be parsed as an [`Ipv4Prefix`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Ipv4PrefixParseError {
    /// failure to interpret string as an ip and a prefix length
    #[error(transparent)]
    AddrParseError(AddrParseError),
    /// invalid ip or prefix length
    #[error(transparent)]
    InvalidIpv4Network(InvalidIpv4Network),
}

/// Mask with the `len` most significant bits set.
const fn netmask(len: u8) -> u32 {
    match u32::MAX.checked_shl((Ipv4PrefixLen::MAX_LEN - len) as u32) {
        Some(mask) => mask,
        None => 0,
    }
}

impl Ipv4PrefixLen {
    /// The largest possible prefix length for IPv4 (i.e. /32)
    pub const MAX_LEN: u8 = 32;
    /// The largest possible prefix length for IPv4 (i.e. /32)
    pub const MAX: Self = Self(Self::MAX_LEN);
    /// The minimum possible prefix length for IPv4 (i.e. /0)
    pub const MIN: Self = Self(0);

    /// Constructor which asserts if the provided length is invalid.
    /// Useful in const contexts where you are sure you won't panic.
    ///
    /// # Panics
    ///
    /// Panics if the provided length is greater than [`Ipv4PrefixLen::MAX_LEN`].
    #[must_use]
    pub const fn new_assert(len: u8) -> Self {
        assert!(len <= Self::MAX_LEN, "invalid prefix length");
        Self(len)
    }

    /// Constructor which checks that the provided length is valid.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidIpv4PrefixLength::TooLong`] if the provided length is greater than
    /// [`Ipv4PrefixLen::MAX_LEN`].
    pub const fn try_new(len: u8) -> Result<Ipv4PrefixLen, InvalidIpv4PrefixLength> {
        if len > Self::MAX_LEN {
            return Err(InvalidIpv4PrefixLength::TooLong(len));
        }
        Ok(Ipv4PrefixLen(len))
    }

    /// Interpret the [`Ipv4PrefixLen`] as a `u8`
    #[must_use]
    pub const fn as_u8(&self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Ipv4PrefixLen {
    type Error = InvalidIpv4PrefixLength;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ipv4PrefixLen::try_new(value)
    }
}

impl From<Ipv4PrefixLen> for u8 {
    fn from(value: Ipv4PrefixLen) -> Self {
        value.0
    }
}

impl Display for Ipv4PrefixLen {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl PartialEq<u8> for Ipv4PrefixLen {
    fn eq(&self, other: &u8) -> bool {
        self.0 == *other
    }
}

impl Ipv4Prefix {
    /// The root [`Ipv4Prefix`], aka 0.0.0.0/0
    pub const ROOT: Ipv4Prefix = Ipv4Prefix::new_assert([0, 0, 0, 0], 0);

    /// Validating constructor which panics if the arguments are invalid.
    /// Useful in const contexts and testing.
    ///
    /// # Panics
    ///
    /// * Panics if the provided prefix is greater than 32
    /// * Panics if the provided address contains non-network bits.
    #[must_use]
    pub const fn new_assert(addr: [u8; 4], prefix: u8) -> Self {
        let addr = Ipv4Addr::new(addr[0], addr[1], addr[2], addr[3]);
        let prefix = Ipv4PrefixLen::new_assert(prefix);
        assert!(
            addr.to_bits() & netmask(prefix.0) == addr.to_bits(),
            "Ipv4Prefix address contains non network bits"
        );
        Ipv4Prefix(Ipv4Net::new_assert(addr, prefix.0))
    }

    /// Constructor which validates the arguments provided.
    ///
    /// # Errors
    ///
    /// * Returns [`InvalidIpv4Network::InvalidPrefix`] if the provided prefix length is greater
    ///   than [`Ipv4PrefixLen::MAX_LEN`].
    /// * Returns [`InvalidIpv4Network::AddressContainsNonNetworkBits`] if the provided address
    ///   contains non-network bits.
    #[tracing::instrument(level = "trace")]
    pub fn new_strict(
        addr: impl Into<Ipv4Addr> + Debug,
        prefix: impl TryInto<Ipv4PrefixLen, Error = InvalidIpv4PrefixLength> + Debug,
    ) -> Result<Ipv4Prefix, InvalidIpv4Network> {
        let addr = addr.into();
        let prefix = prefix
            .try_into()
            .map_err(InvalidIpv4Network::InvalidPrefix)?;
        if addr.to_bits() & netmask(prefix.0) != addr.to_bits() {
            return Err(InvalidIpv4Network::AddressContainsNonNetworkBits(
                addr, prefix,
            ));
        }
        Ok(Ipv4Prefix(Ipv4Net::new_assert(addr, prefix.0)))
    }

    /// Create an [`Ipv4Prefix`] even if the address contains non-network bits.  The host bits
    /// are cleared (and a debug event is logged).
    ///
    /// # Errors
    ///
    /// * Returns an error if the provided prefix length is greater than [`Ipv4PrefixLen::MAX_LEN`].
    #[tracing::instrument(level = "trace")]
    pub fn new_tolerant<E>(
        addr: impl Into<Ipv4Addr> + Debug,
        prefix: impl TryInto<Ipv4PrefixLen, Error = E> + Debug,
    ) -> Result<Ipv4Prefix, E> {
        let addr = addr.into();
        let prefix = prefix.try_into()?;
        let masked = Ipv4Addr::from_bits(addr.to_bits() & netmask(prefix.0));
        if masked != addr {
            debug!(%addr, %prefix, "clearing non network bits of prefix address");
        }
        Ok(Ipv4Prefix(Ipv4Net::new_assert(masked, prefix.0)))
    }

    /// Returns the address of the network.
    #[must_use]
    pub const fn address(&self) -> Ipv4Addr {
        self.0.addr()
    }

    /// Returns the prefix length of the network.
    #[must_use]
    pub const fn prefix_len(&self) -> Ipv4PrefixLen {
        Ipv4PrefixLen(self.0.prefix_len()) // checked already
    }

    /// Safe cast of [`Ipv4Prefix`] to `ipnet::Ipv4Net`
    #[must_use]
    pub const fn as_net(&self) -> Ipv4Net {
        self.0
    }

    /// First address covered by the prefix (the network address).
    #[must_use]
    pub const fn first_address(&self) -> Ipv4Addr {
        self.address()
    }

    /// Last address covered by the prefix (the broadcast address for prefixes shorter than /31).
    #[must_use]
    pub const fn last_address(&self) -> Ipv4Addr {
        Ipv4Addr::from_bits(self.address().to_bits() | !netmask(self.0.prefix_len()))
    }

    /// Number of sub-prefixes of length `len` contained in this prefix.
    ///
    /// Returns `None` if `len` is shorter than this prefix.
    #[must_use]
    pub fn subnet_count(&self, len: Ipv4PrefixLen) -> Option<u128> {
        let diff = len.0.checked_sub(self.prefix_len().0)?;
        Some(1u128 << diff)
    }

    /// Returns the `n`-th sub-prefix of length `len`, counting from the network address.
    ///
    /// Returns `None` if `len` is shorter than this prefix or if `n` is past the last sub-prefix.
    #[must_use]
    pub fn nth_subnet(&self, len: Ipv4PrefixLen, n: u128) -> Option<Ipv4Prefix> {
        let diff = len.0.checked_sub(self.prefix_len().0)?;
        if n >> diff != 0 {
            return None;
        }
        // n < 2^diff, so the shifted offset stays within the host bits of self
        let offset = u32::try_from(n << (Ipv4PrefixLen::MAX_LEN - len.0)).ok()?;
        let addr = Ipv4Addr::from_bits(self.address().to_bits() | offset);
        Some(Ipv4Prefix(Ipv4Net::new_assert(addr, len.0)))
    }
}

impl From<Ipv4Addr> for Ipv4Prefix {
    fn from(value: Ipv4Addr) -> Self {
        Ipv4Prefix(Ipv4Net::new_assert(value, Ipv4PrefixLen::MAX_LEN))
    }
}

impl TryFrom<Ipv4Net> for Ipv4Prefix {
    type Error = InvalidIpv4Network;

    fn try_from(value: Ipv4Net) -> Result<Self, Self::Error> {
        Ipv4Prefix::new_strict(value.addr(), value.prefix_len())
    }
}

impl From<Ipv4Prefix> for Ipv4Net {
    fn from(value: Ipv4Prefix) -> Self {
        value.0
    }
}

impl Display for Ipv4Prefix {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Ipv4Prefix {
    type Err = Ipv4PrefixParseError;

    /// Attempt to parse an [`Ipv4Prefix`] from a `str`.
    ///
    /// # Errors
    ///
    /// * Returns [`Ipv4PrefixParseError::AddrParseError`] if the provided string cannot be parsed
    ///   as an address and a prefix length.
    /// * Returns [`Ipv4PrefixParseError::InvalidIpv4Network`] if non-network bits are set.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let net = Ipv4Net::from_str(s).map_err(Ipv4PrefixParseError::AddrParseError)?;
        Ipv4Prefix::new_strict(net.addr(), net.prefix_len())
            .map_err(Ipv4PrefixParseError::InvalidIpv4Network)
    }
}

impl Contains<Ipv4Prefix> for Ipv4Prefix {
    fn contains(&self, other: Ipv4Prefix) -> bool {
        self.0.contains(&other.0)
    }
}

impl Contains<Ipv4Addr> for Ipv4Prefix {
    fn contains(&self, other: Ipv4Addr) -> bool {
        self.0.contains(&other)
    }
}

impl Overlaps for Ipv4Prefix {
    fn overlaps(&self, other: &Ipv4Prefix) -> bool {
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
    use crate::ipv4::{Ipv4Prefix, Ipv4PrefixLen};
    use bolero::{Driver, TypeGenerator, ValueGenerator};
    use std::net::Ipv4Addr;
    use std::ops::Bound;

    impl TypeGenerator for Ipv4PrefixLen {
        fn generate<D: Driver>(driver: &mut D) -> Option<Self> {
            Some(Ipv4PrefixLen::new_assert(driver.gen_u8(
                Bound::Included(&0),
                Bound::Included(&Ipv4PrefixLen::MAX_LEN),
            )?))
        }
    }

    impl TypeGenerator for Ipv4Prefix {
        fn generate<D: Driver>(driver: &mut D) -> Option<Self> {
            let addr: Ipv4Addr = driver.produce()?;
            let len: Ipv4PrefixLen = driver.produce()?;
            Ipv4Prefix::new_tolerant(addr, len).ok()
        }
    }

    /// [`ValueGenerator`] which produces an [`Ipv4Prefix`] together with a strictly longer prefix
    /// length, i.e. a valid split of that prefix.
    pub struct SplittablePrefixGenerator;

    impl ValueGenerator for SplittablePrefixGenerator {
        type Output = (Ipv4Prefix, Ipv4PrefixLen);

        fn generate<D: Driver>(&self, driver: &mut D) -> Option<Self::Output> {
            let addr: Ipv4Addr = driver.produce()?;
            let len = driver.gen_u8(
                Bound::Included(&0),
                Bound::Excluded(&Ipv4PrefixLen::MAX_LEN),
            )?;
            let size = driver.gen_u8(
                Bound::Excluded(&len),
                Bound::Included(&Ipv4PrefixLen::MAX_LEN),
            )?;
            let prefix = Ipv4Prefix::new_tolerant(addr, len).ok()?;
            Some((prefix, Ipv4PrefixLen::new_assert(size)))
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::ipv4::{
        InvalidIpv4Network, InvalidIpv4PrefixLength, Ipv4Prefix, Ipv4PrefixLen,
        SplittablePrefixGenerator,
    };
    use crate::prefix::{Contains, Overlaps};
    use std::net::Ipv4Addr;
    use std::str::FromStr;

    #[test]
    #[should_panic]
    fn non_network_bits_panic_in_asserting_constructor() {
        let _ = Ipv4Prefix::new_assert([192, 168, 0, 1], 24);
    }

    #[test]
    fn non_network_bits_in_checked_constructor_returns_error() {
        let ip = Ipv4Addr::new(192, 168, 0, 1);
        match Ipv4Prefix::new_strict(ip, 24) {
            Ok(_) | Err(InvalidIpv4Network::InvalidPrefix(_)) => unreachable!(),
            Err(InvalidIpv4Network::AddressContainsNonNetworkBits(err_ip, err_prefix)) => {
                assert_eq!(err_ip, ip);
                assert_eq!(err_prefix, 24);
            }
        }
        assert_eq!(
            Ipv4Prefix::new_strict(ip, 33).unwrap_err(),
            InvalidIpv4Network::InvalidPrefix(InvalidIpv4PrefixLength::TooLong(33))
        );
    }

    #[test]
    fn tolerant_constructor_clears_host_bits() {
        let prefix =
            Ipv4Prefix::new_tolerant::<InvalidIpv4PrefixLength>([172, 20, 3, 9], 14).unwrap();
        assert_eq!(prefix, Ipv4Prefix::new_assert([172, 20, 0, 0], 14));
    }

    #[test]
    fn first_and_last_address() {
        let prefix = Ipv4Prefix::from_str("172.20.0.0/14").unwrap();
        assert_eq!(prefix.first_address(), Ipv4Addr::new(172, 20, 0, 0));
        assert_eq!(prefix.last_address(), Ipv4Addr::new(172, 23, 255, 255));
        assert_eq!(Ipv4Prefix::ROOT.last_address(), Ipv4Addr::BROADCAST);
        let host = Ipv4Prefix::from(Ipv4Addr::new(10, 1, 2, 3));
        assert_eq!(host.first_address(), host.last_address());
    }

    #[test]
    fn nth_subnet_walks_the_split() {
        let base = Ipv4Prefix::from_str("10.0.0.0/8").unwrap();
        let len = Ipv4PrefixLen::new_assert(24);
        assert_eq!(base.subnet_count(len), Some(65536));
        assert_eq!(
            base.nth_subnet(len, 0),
            Some(Ipv4Prefix::new_assert([10, 0, 0, 0], 24))
        );
        assert_eq!(
            base.nth_subnet(len, 257),
            Some(Ipv4Prefix::new_assert([10, 1, 1, 0], 24))
        );
        assert_eq!(
            base.nth_subnet(len, 65535),
            Some(Ipv4Prefix::new_assert([10, 255, 255, 0], 24))
        );
        assert_eq!(base.nth_subnet(len, 65536), None);
        assert_eq!(base.nth_subnet(Ipv4PrefixLen::new_assert(7), 0), None);
        assert_eq!(base.subnet_count(Ipv4PrefixLen::new_assert(7)), None);
    }

    #[test]
    fn root_splits_into_hosts() {
        let len = Ipv4PrefixLen::MAX;
        assert_eq!(Ipv4Prefix::ROOT.subnet_count(len), Some(1 << 32));
        assert_eq!(
            Ipv4Prefix::ROOT.nth_subnet(len, u128::from(u32::MAX)),
            Some(Ipv4Prefix::from(Ipv4Addr::BROADCAST))
        );
        assert_eq!(Ipv4Prefix::ROOT.nth_subnet(len, 1 << 32), None);
    }

    #[test]
    fn serde_rejects_host_bits() {
        let ok: Ipv4Prefix = serde_json::from_str("\"192.168.0.0/16\"").unwrap();
        assert_eq!(ok, Ipv4Prefix::new_assert([192, 168, 0, 0], 16));
        assert!(serde_json::from_str::<Ipv4Prefix>("\"192.168.0.1/16\"").is_err());
        assert_eq!(serde_json::to_string(&ok).unwrap(), "\"192.168.0.0/16\"");
    }

    #[test]
    fn overlap_is_symmetric_and_reflexive() {
        bolero::check!()
            .with_type()
            .cloned()
            .for_each(|(a, b): (Ipv4Prefix, Ipv4Prefix)| {
                assert!(a.overlaps(&a));
                assert_eq!(a.overlaps(&b), b.overlaps(&a));
                // prefixes either nest or are disjoint
                assert_eq!(a.overlaps(&b), a.contains(b) || b.contains(a));
            });
    }

    #[test]
    fn every_subnet_is_contained() {
        bolero::check!()
            .with_generator(SplittablePrefixGenerator)
            .cloned()
            .for_each(|(base, len): (Ipv4Prefix, Ipv4PrefixLen)| {
                let first = base.nth_subnet(len, 0).unwrap();
                assert_eq!(first.address(), base.address());
                assert_eq!(first.prefix_len(), len);
                let count = base.subnet_count(len).unwrap();
                let last = base.nth_subnet(len, count - 1).unwrap();
                assert_eq!(last.last_address(), base.last_address());
                assert!(base.contains(first));
                assert!(base.contains(last));
                assert!(base.nth_subnet(len, count).is_none());
            });
    }
}
