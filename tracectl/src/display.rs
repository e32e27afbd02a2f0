// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Human readable dump of the tracing configuration.

use crate::TracingControl;
use crate::targets::KNOWN_TARGETS;
use std::fmt::Display;

impl Display for TracingControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let current = self.current();
        if current.is_empty() {
            writeln!(f, "filter: (default {})", crate::DEFAULT_DEFAULT_LOGLEVEL)?;
        } else {
            writeln!(f, "filter: {current}")?;
        }
        writeln!(f, "installed: {}", self.is_installed())?;
        writeln!(f, "targets:")?;
        for (short, full) in KNOWN_TARGETS {
            writeln!(f, "  {short:<12} {full}")?;
        }
        Ok(())
    }
}
