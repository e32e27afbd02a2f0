// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use super::DynamicRangeProvider;
use crate::{DynamicRange, RangeError};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Where Linux exposes its local port range.
pub const PROCFS_PORT_RANGE: &str = "/proc/sys/net/ipv4/ip_local_port_range";

/// Linux provider, reading [`PROCFS_PORT_RANGE`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcfsProvider {
    path: PathBuf,
}

impl Default for ProcfsProvider {
    fn default() -> Self {
        ProcfsProvider::new()
    }
}

impl ProcfsProvider {
    /// Read the range from [`PROCFS_PORT_RANGE`].
    #[must_use]
    pub fn new() -> ProcfsProvider {
        ProcfsProvider::with_path(PROCFS_PORT_RANGE)
    }

    /// Read the range from some other file with the same format.
    #[must_use]
    pub fn with_path(path: impl AsRef<Path>) -> ProcfsProvider {
        ProcfsProvider {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// The file this provider reads.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Parse the contents of `ip_local_port_range`: exactly two whitespace separated integers.
///
/// # Errors
///
/// * [`RangeError::ParseFailed`] if the contents are not two port numbers.
/// * [`RangeError::Invalid`] if they are not a valid range.
pub fn parse_port_range(contents: &str) -> Result<DynamicRange, RangeError> {
    let tokens: Vec<&str> = contents.split_whitespace().collect();
    let [start, end] = tokens.as_slice() else {
        return Err(RangeError::ParseFailed(format!(
            "expected two integers, got {contents:?}"
        )));
    };
    let parse = |token: &str| {
        token
            .parse::<u16>()
            .map_err(|e| RangeError::ParseFailed(format!("{token:?}: {e}")))
    };
    DynamicRange::new(parse(start)?, parse(end)?)
}

impl DynamicRangeProvider for ProcfsProvider {
    fn dynamic_range(&self) -> Result<DynamicRange, RangeError> {
        let contents = std::fs::read_to_string(&self.path)
            .map_err(|e| RangeError::QueryFailed(format!("{}: {e}", self.path.display())))?;
        let range = parse_port_range(&contents)?;
        debug!("{}: dynamic port range {range}", self.path.display());
        Ok(range)
    }

    fn name(&self) -> &'static str {
        "procfs"
    }
}

#[cfg(test)]
mod test {
    use super::{ProcfsProvider, parse_port_range};
    use crate::provider::DynamicRangeProvider;
    use crate::{DynamicRange, RangeError};
    use std::io::Write;

    #[test]
    fn accepted_contents() {
        let expected = DynamicRange::new(32768, 60999).unwrap();
        assert_eq!(parse_port_range("32768\t60999\n"), Ok(expected));
        assert_eq!(parse_port_range("  32768   60999  "), Ok(expected));
    }

    #[test]
    fn rejected_contents() {
        for contents in ["", "32768", "32768 60999 1", "a b", "-1 10", "1 70000"] {
            assert!(
                matches!(parse_port_range(contents), Err(RangeError::ParseFailed(_))),
                "{contents:?} should not parse"
            );
        }
        assert_eq!(
            parse_port_range("60999 32768"),
            Err(RangeError::Invalid {
                start: 60999,
                end: 32768,
            })
        );
        assert!(matches!(
            parse_port_range("0 100"),
            Err(RangeError::Invalid { .. })
        ));
    }

    #[test]
    fn reads_the_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "1024\t4999").unwrap();
        let provider = ProcfsProvider::with_path(file.path());
        assert_eq!(
            provider.dynamic_range(),
            Ok(DynamicRange::new(1024, 4999).unwrap())
        );
    }

    #[test]
    fn missing_file_is_a_query_failure() {
        let dir = tempfile::tempdir().unwrap();
        let provider = ProcfsProvider::with_path(dir.path().join("ip_local_port_range"));
        assert!(matches!(
            provider.dynamic_range(),
            Err(RangeError::QueryFailed(_))
        ));
    }
}
