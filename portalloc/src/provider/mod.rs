// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Sources of the operating system's dynamic port range.

mod fixed;
mod procfs;
mod sysctl;

pub use fixed::StaticProvider;
pub use procfs::{PROCFS_PORT_RANGE, ProcfsProvider, parse_port_range};
pub use sysctl::{
    CommandRunner, SYSCTL_BIN, SYSCTL_HIFIRST, SYSCTL_HILAST, SysctlProvider, SystemCommandRunner,
    parse_sysctl_value,
};

use crate::{DynamicRange, RangeError};
use std::sync::Arc;

/// Reports the dynamic (ephemeral) port window of the operating system.
///
/// The [`PortAllocator`](crate::PortAllocator) calls this at most once per cached range; it is
/// never on a hot path.
pub trait DynamicRangeProvider: Send + Sync {
    /// Query the current range.
    ///
    /// # Errors
    ///
    /// * [`RangeError::QueryFailed`] if the operating system could not be asked.
    /// * [`RangeError::ParseFailed`] if the answer is not two integers.
    /// * [`RangeError::Invalid`] if the two integers are not a valid range.
    fn dynamic_range(&self) -> Result<DynamicRange, RangeError>;

    /// Short name for logs.
    fn name(&self) -> &'static str;
}

/// The provider matching the build target.
#[must_use]
pub fn platform_default() -> Arc<dyn DynamicRangeProvider> {
    platform::provider()
}

#[cfg(target_os = "linux")]
mod platform {
    use super::{DynamicRangeProvider, ProcfsProvider};
    use std::sync::Arc;

    pub(super) fn provider() -> Arc<dyn DynamicRangeProvider> {
        Arc::new(ProcfsProvider::new())
    }
}

#[cfg(any(
    target_os = "macos",
    target_os = "freebsd",
    target_os = "openbsd",
    target_os = "netbsd",
    target_os = "dragonfly"
))]
mod platform {
    use super::{DynamicRangeProvider, SysctlProvider, SystemCommandRunner};
    use std::sync::Arc;

    pub(super) fn provider() -> Arc<dyn DynamicRangeProvider> {
        Arc::new(SysctlProvider::new(SystemCommandRunner))
    }
}

#[cfg(not(any(
    target_os = "linux",
    target_os = "macos",
    target_os = "freebsd",
    target_os = "openbsd",
    target_os = "netbsd",
    target_os = "dragonfly"
)))]
mod platform {
    use super::{DynamicRangeProvider, StaticProvider};
    use crate::DynamicRange;
    use std::sync::Arc;

    pub(super) fn provider() -> Arc<dyn DynamicRangeProvider> {
        Arc::new(StaticProvider::new(DynamicRange::IANA))
    }
}
