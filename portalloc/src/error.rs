// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use crate::Protocol;
use std::net::IpAddr;

/// Errors learning or building a port range.
///
/// Cloneable: one failed query is shared by every caller waiting on it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RangeError {
    /// The operating system could not be asked.
    #[error("dynamic port range query failed: {0}")]
    QueryFailed(String),
    /// The operating system answered something unexpected.
    #[error("failed to parse dynamic port range: {0}")]
    ParseFailed(String),
    /// Zero port, or bounds out of order.
    #[error("invalid port range {start}-{end}")]
    Invalid {
        /// lower bound
        start: u16,
        /// upper bound
        end: u16,
    },
}

/// Errors returned by the [`PortAllocator`](crate::PortAllocator).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AllocatorError {
    /// The requested port is reserved already.
    #[error("{proto} port {port} on {addr} is already in use")]
    PortInUse {
        /// protocol of the request
        proto: Protocol,
        /// address of the request
        addr: IpAddr,
        /// the port asked for
        port: u16,
    },
    /// Every port eligible for the request is reserved.
    #[error("no {proto} port is available on {addr}")]
    RangeExhausted {
        /// protocol of the request
        proto: Protocol,
        /// address of the request
        addr: IpAddr,
    },
    /// The dynamic port range could not be learned.
    #[error(transparent)]
    DynamicRange(#[from] RangeError),
}
