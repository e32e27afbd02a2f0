// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! BSD family provider: the range is asked from `sysctl(8)`.

use super::DynamicRangeProvider;
use crate::{DynamicRange, RangeError};
use std::process::Command;
use tracing::{debug, trace};

/// The sysctl binary.
pub const SYSCTL_BIN: &str = "/usr/sbin/sysctl";
/// First port of the dynamic range.
pub const SYSCTL_HIFIRST: &str = "net.inet.ip.portrange.hifirst";
/// Last port of the dynamic range.
pub const SYSCTL_HILAST: &str = "net.inet.ip.portrange.hilast";

/// Capability to run an external program and collect its standard output.
pub trait CommandRunner: Send + Sync {
    /// Run `program` with `args` to completion.
    ///
    /// # Errors
    ///
    /// Returns [`RangeError::QueryFailed`] if the program can not be run or exits unsuccessfully.
    fn run(&self, program: &str, args: &[&str]) -> Result<String, RangeError>;
}

/// [`CommandRunner`] spawning real processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandRunner;

impl CommandRunner for SystemCommandRunner {
    fn run(&self, program: &str, args: &[&str]) -> Result<String, RangeError> {
        trace!("running {program} {args:?}");
        let output = Command::new(program)
            .args(args)
            .output()
            .map_err(|e| RangeError::QueryFailed(format!("{program} {args:?}: {e}")))?;
        if !output.status.success() {
            return Err(RangeError::QueryFailed(format!(
                "{program} {args:?} exited with {}",
                output.status
            )));
        }
        String::from_utf8(output.stdout)
            .map_err(|e| RangeError::ParseFailed(format!("{program} {args:?}: {e}")))
    }
}

/// Parse the `<name>: <int>` line printed by `sysctl <name>`.
///
/// # Errors
///
/// Returns [`RangeError::ParseFailed`] if the output does not have that shape.
pub fn parse_sysctl_value(name: &str, output: &str) -> Result<u16, RangeError> {
    let unexpected =
        || RangeError::ParseFailed(format!("sysctl {name}: unexpected output {output:?}"));
    let value = output
        .lines()
        .next()
        .and_then(|line| line.strip_prefix(name))
        .and_then(|rest| rest.strip_prefix(':'))
        .ok_or_else(unexpected)?;
    value.trim().parse::<u16>().map_err(|_| unexpected())
}

/// Provider for macOS and the BSDs.
#[derive(Debug, Clone, Default)]
pub struct SysctlProvider<C: CommandRunner> {
    runner: C,
}

impl<C: CommandRunner> SysctlProvider<C> {
    /// A provider running `sysctl` through `runner`.
    pub const fn new(runner: C) -> SysctlProvider<C> {
        SysctlProvider { runner }
    }

    fn query(&self, name: &str) -> Result<u16, RangeError> {
        let output = self.runner.run(SYSCTL_BIN, &[name])?;
        parse_sysctl_value(name, &output)
    }
}

impl<C: CommandRunner> DynamicRangeProvider for SysctlProvider<C> {
    fn dynamic_range(&self) -> Result<DynamicRange, RangeError> {
        let start = self.query(SYSCTL_HIFIRST)?;
        let end = self.query(SYSCTL_HILAST)?;
        let range = DynamicRange::new(start, end)?;
        debug!("sysctl: dynamic port range {range}");
        Ok(range)
    }

    fn name(&self) -> &'static str {
        "sysctl"
    }
}
