// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use serde::{Deserialize, Serialize};

/// Transport protocols ports can be published for.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
    strum::EnumCount,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Protocol {
    /// Transmission Control Protocol
    Tcp,
    /// User Datagram Protocol
    Udp,
    /// Stream Control Transmission Protocol
    Sctp,
}

impl Protocol {
    pub(crate) const fn index(self) -> usize {
        match self {
            Protocol::Tcp => 0,
            Protocol::Udp => 1,
            Protocol::Sctp => 2,
        }
    }
}

#[cfg(test)]
mod test {
    use super::Protocol;
    use std::str::FromStr;
    use strum::{EnumCount, IntoEnumIterator};

    #[test]
    fn names() {
        assert_eq!(Protocol::Tcp.to_string(), "tcp");
        assert_eq!(Protocol::from_str("UDP"), Ok(Protocol::Udp));
        assert_eq!(Protocol::from_str("sctp"), Ok(Protocol::Sctp));
        assert!(Protocol::from_str("icmp").is_err());
        assert_eq!(serde_json::to_string(&Protocol::Sctp).unwrap(), r#""sctp""#);
    }

    #[test]
    fn indices_are_dense() {
        let indices: Vec<_> = Protocol::iter().map(Protocol::index).collect();
        assert_eq!(indices, (0..Protocol::COUNT).collect::<Vec<_>>());
    }
}
