// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use super::DynamicRangeProvider;
use crate::{DynamicRange, RangeError};

/// A provider which always reports the same range.
///
/// Used for operator configured ranges and on platforms without a known query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticProvider(DynamicRange);

impl StaticProvider {
    /// A provider reporting `range`.
    #[must_use]
    pub const fn new(range: DynamicRange) -> StaticProvider {
        StaticProvider(range)
    }
}

impl DynamicRangeProvider for StaticProvider {
    fn dynamic_range(&self) -> Result<DynamicRange, RangeError> {
        Ok(self.0)
    }

    fn name(&self) -> &'static str {
        "static"
    }
}
