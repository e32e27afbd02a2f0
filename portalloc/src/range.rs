// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Port windows

use crate::RangeError;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::num::NonZero;

/// The operating system's dynamic (ephemeral) port range: `1 <= start <= end <= 65535`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "DynamicRangeRepr")]
pub struct DynamicRange {
    start: u16,
    end: u16,
}

#[derive(Deserialize)]
struct DynamicRangeRepr {
    start: u16,
    end: u16,
}

impl TryFrom<DynamicRangeRepr> for DynamicRange {
    type Error = RangeError;

    fn try_from(value: DynamicRangeRepr) -> Result<Self, Self::Error> {
        DynamicRange::new(value.start, value.end)
    }
}

impl Display for DynamicRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

impl DynamicRange {
    /// The IANA suggested dynamic range, 49152-65535.
    pub const IANA: DynamicRange = DynamicRange {
        start: 49152,
        end: 65535,
    };

    /// Build a [`DynamicRange`].
    ///
    /// # Errors
    ///
    /// Returns [`RangeError::Invalid`] if `start` is zero or larger than `end`.
    pub const fn new(start: u16, end: u16) -> Result<DynamicRange, RangeError> {
        if start == 0 || start > end {
            return Err(RangeError::Invalid { start, end });
        }
        Ok(DynamicRange { start, end })
    }

    /// First port of the range.
    #[must_use]
    pub const fn start(&self) -> u16 {
        self.start
    }

    /// Last port of the range.
    #[must_use]
    pub const fn end(&self) -> u16 {
        self.end
    }

    /// Tell if `port` falls within the range.
    #[must_use]
    pub const fn contains(&self, port: u16) -> bool {
        port >= self.start && port <= self.end
    }
}

/// A non-empty, inclusive window `[first, last]` of non-zero ports.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PortRange {
    first: NonZero<u16>,
    last: NonZero<u16>,
}

impl Display for PortRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_singleton() {
            write!(f, "{}", self.first)
        } else {
            write!(f, "[{}-{}]", self.first, self.last)
        }
    }
}

impl From<DynamicRange> for PortRange {
    fn from(range: DynamicRange) -> Self {
        match (NonZero::new(range.start), NonZero::new(range.end)) {
            (Some(first), Some(last)) => PortRange { first, last },
            // start is never zero and end >= start
            _ => PortRange::ALL,
        }
    }
}

impl PortRange {
    /// Every valid port, 1-65535.
    pub const ALL: PortRange = PortRange {
        first: NonZero::<u16>::MIN,
        last: NonZero::<u16>::MAX,
    };

    /// Create a `PortRange` from two `u16`. Both must be non-zero and well-ordered.
    ///
    /// # Errors
    ///
    /// Returns [`RangeError::Invalid`] if any of the ports is zero or last is smaller than first.
    pub fn new(first: u16, last: u16) -> Result<Self, RangeError> {
        let invalid = RangeError::Invalid {
            start: first,
            end: last,
        };
        if last < first {
            return Err(invalid);
        }
        match (NonZero::new(first), NonZero::new(last)) {
            (Some(first), Some(last)) => Ok(Self { first, last }),
            _ => Err(invalid),
        }
    }

    /// First port of the window.
    #[must_use]
    pub const fn first(self) -> u16 {
        self.first.get()
    }

    /// Last port of the window.
    #[must_use]
    pub const fn last(self) -> u16 {
        self.last.get()
    }

    #[must_use]
    #[allow(clippy::len_without_is_empty)]
    /// Returns number of ports contained in a `PortRange`
    pub const fn len(self) -> u16 {
        self.last.get() - self.first.get() + 1
    }

    #[must_use]
    /// Returns true if a `PortRange` contains a single port
    pub fn is_singleton(self) -> bool {
        self.last == self.first
    }

    #[must_use]
    /// Tell if a given port is contained within this `PortRange`
    pub const fn contains(self, port: u16) -> bool {
        port >= self.first.get() && port <= self.last.get()
    }
}
