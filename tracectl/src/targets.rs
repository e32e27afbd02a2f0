// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Tracing targets and filter specifications.
//!
//! A filter specification is a comma separated list of directives, each either a bare level
//! (`debug`), which sets the default, or `target=level`.  Targets may be given by their short
//! names (`portalloc=trace`), which expand to the crate they stand for.

use crate::TraceCtlError;
use std::str::FromStr;
use tracing_subscriber::filter::LevelFilter;

/// Short names of the tracing targets of the netpool crates.
pub const KNOWN_TARGETS: &[(&str, &str)] = &[
    ("net", "netpool_net"),
    ("ipam", "netpool_ipam"),
    ("portalloc", "netpool_portalloc"),
    ("concurrency", "netpool_concurrency"),
    ("args", "netpool_args"),
    ("netpool", "netpool"),
];

/// Expand a short target name; unknown names are kept as they are.
#[must_use]
pub fn expand_target(target: &str) -> &str {
    KNOWN_TARGETS
        .iter()
        .find(|(short, _)| *short == target)
        .map_or(target, |(_, full)| *full)
}

/// One parsed directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    /// `None` for the default level.
    pub target: Option<String>,
    /// Maximum level for the target.
    pub level: LevelFilter,
}

impl std::fmt::Display for Directive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.target {
            Some(target) => write!(f, "{target}={}", self.level),
            None => write!(f, "{}", self.level),
        }
    }
}

fn parse_level(directive: &str, level: &str) -> Result<LevelFilter, TraceCtlError> {
    LevelFilter::from_str(level.trim())
        .map_err(|e| TraceCtlError::InvalidDirective(directive.to_string(), e.to_string()))
}

/// Parse a filter specification, expanding short target names.
pub fn parse_spec(spec: &str) -> Result<Vec<Directive>, TraceCtlError> {
    spec.split(',')
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(|directive| match directive.split_once('=') {
            Some((target, level)) => {
                let target = target.trim();
                if target.is_empty() {
                    return Err(TraceCtlError::InvalidDirective(
                        directive.to_string(),
                        "empty target".to_string(),
                    ));
                }
                Ok(Directive {
                    target: Some(expand_target(target).to_string()),
                    level: parse_level(directive, level)?,
                })
            }
            None => Ok(Directive {
                target: None,
                level: parse_level(directive, directive)?,
            }),
        })
        .collect()
}

/// Render directives back into the syntax of [`tracing_subscriber::EnvFilter`].
#[must_use]
pub fn render(directives: &[Directive]) -> String {
    directives
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}
