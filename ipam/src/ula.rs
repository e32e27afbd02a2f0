// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Host specific unique local (fd00::/8) IPv6 pools.

use crate::SplitSpec;
use net::{IpPrefix, Ipv6Prefix};
use sha2::{Digest, Sha256};
use tracing::debug;

/// Mask length of the derived ULA base network.
pub const ULA_BASE_LEN: u8 = 48;

/// Mask length of the subnets carved from the derived ULA base network.
pub const ULA_SUBNET_LEN: u8 = 64;

const ULA_PREFIX: Ipv6Prefix = Ipv6Prefix::new_assert(0xfd00 << 112, 8);
const GLOBAL_ID_BITS: u32 = 40;
const GLOBAL_ID_SHIFT: u8 = 128 - 8 - 40;

/// Derive the ULA pool of a host from its identifier.
///
/// The 40 bit global id is the low 40 bits of the first 8 bytes (big endian) of the SHA-256 of
/// `host_id`, placed right after the `fd` byte.  The same identifier always yields the same
/// `/48`, split into `/64` subnets.
#[must_use]
pub fn derive_ula_base(host_id: &str) -> SplitSpec {
    let digest = Sha256::digest(host_id.as_bytes());
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest.as_slice()[..8]);
    let global_id = u64::from_be_bytes(head) & ((1u64 << GLOBAL_ID_BITS) - 1);
    let addr = ULA_PREFIX.address_plus(global_id, GLOBAL_ID_SHIFT);
    // fd + 40 bit global id: no bits below the /48
    let base = Ipv6Prefix::new_assert(addr.to_bits(), ULA_BASE_LEN);
    debug!("ula base for host id {host_id:?}: {base}");
    SplitSpec::new_unchecked(IpPrefix::V6(base), ULA_SUBNET_LEN)
}
