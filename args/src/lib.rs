// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Configuration file model and command line arguments of the `netpool` tool.

pub use clap::Parser;

use ipam::{DefaultPools, IpamError};
use portalloc::provider::{
    DynamicRangeProvider, ProcfsProvider, StaticProvider, SysctlProvider, SystemCommandRunner,
    platform_default,
};
use portalloc::{AllocatorConfig, DynamicRange, Protocol};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

/// Where the dynamic port range is learned from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Whatever the build target supports.
    #[default]
    Auto,
    /// Linux procfs.
    Procfs,
    /// BSD `sysctl(8)`.
    Sysctl,
    /// The configured `static_range`.
    Static,
}

/// The `port_allocator` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PortAllocatorSection {
    pub exclude_dynamic_range: bool,
    pub provider: ProviderKind,
    pub procfs_path: Option<PathBuf>,
    pub static_range: Option<DynamicRange>,
    pub fallback_range: Option<DynamicRange>,
}

impl Default for PortAllocatorSection {
    fn default() -> Self {
        PortAllocatorSection {
            exclude_dynamic_range: true,
            provider: ProviderKind::Auto,
            procfs_path: None,
            static_range: None,
            fallback_range: None,
        }
    }
}

/// Configuration file contents.  Every section is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub host_id: Option<String>,
    pub default_pools: Option<DefaultPools>,
    pub port_allocator: PortAllocatorSection,
}

#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum ConfigError {
    #[error("failed to read configuration file {path}")]
    #[diagnostic(help("check that the file exists and is readable"))]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid configuration: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
    #[error(transparent)]
    Pools(#[from] IpamError),
    #[error("provider \"static\" needs a static_range")]
    #[diagnostic(help("add port_allocator.static_range: {{ start: <port>, end: <port> }}"))]
    MissingStaticRange,
}

impl Config {
    /// Parse a YAML document.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the document does not describe a valid configuration.
    pub fn from_yaml(yaml: &str) -> Result<Config, ConfigError> {
        let config: Config = serde_yaml_ng::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a YAML configuration file.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the file can't be read or is not valid.
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        debug!("loading configuration from {}", path.display());
        let yaml = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Config::from_yaml(&yaml)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let section = &self.port_allocator;
        if section.provider == ProviderKind::Static && section.static_range.is_none() {
            return Err(ConfigError::MissingStaticRange);
        }
        Ok(())
    }

    /// The default pools: the configured ones, or the built-in catalog.
    #[must_use]
    pub fn pools(&self) -> DefaultPools {
        self.default_pools.clone().unwrap_or_default()
    }

    /// Allocator tunables.
    #[must_use]
    pub fn allocator_config(&self) -> AllocatorConfig {
        AllocatorConfig {
            exclude_dynamic_range: self.port_allocator.exclude_dynamic_range,
            fallback_range: self.port_allocator.fallback_range,
        }
    }

    /// Build the configured dynamic range provider.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingStaticRange`] for a static provider without a range.
    pub fn provider(&self) -> Result<Arc<dyn DynamicRangeProvider>, ConfigError> {
        let section = &self.port_allocator;
        let provider: Arc<dyn DynamicRangeProvider> = match section.provider {
            ProviderKind::Auto => platform_default(),
            ProviderKind::Procfs => match &section.procfs_path {
                Some(path) => Arc::new(ProcfsProvider::with_path(path)),
                None => Arc::new(ProcfsProvider::new()),
            },
            ProviderKind::Sysctl => Arc::new(SysctlProvider::new(SystemCommandRunner)),
            ProviderKind::Static => Arc::new(StaticProvider::new(
                section.static_range.ok_or(ConfigError::MissingStaticRange)?,
            )),
        };
        debug!("dynamic port range provider: {}", provider.name());
        Ok(provider)
    }
}

/// Which default pools to show.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum Scope {
    Local,
    Global,
    #[default]
    All,
}

#[derive(Debug, Clone, PartialEq, Eq, clap::Subcommand)]
pub enum Command {
    /// Print the default address pools
    Pools {
        #[arg(long, value_enum, default_value_t = Scope::All)]
        scope: Scope,
        #[arg(long, default_value_t = false, help = "Print the pools as JSON")]
        json: bool,
    },
    /// Print the unique local IPv6 pool of this host
    Ula {
        #[arg(
            long,
            value_name = "ID",
            help = "Host identifier; defaults to the configured host_id, then to the host name"
        )]
        host_id: Option<String>,
    },
    /// Query and print the dynamic port range of the operating system
    DynamicRange,
    /// Reserve ports with an in-process allocator and print them
    Allocate {
        #[arg(
            long,
            value_name = "tcp|udp|sctp",
            value_parser = Protocol::from_str,
            default_value = "tcp"
        )]
        proto: Protocol,
        #[arg(long, value_name = "IP", default_value = "0.0.0.0")]
        addr: IpAddr,
        #[arg(
            long,
            default_value_t = 0,
            help = "Port to reserve, 0 for any free port"
        )]
        port: u16,
        #[arg(
            long,
            default_value_t = 1,
            value_parser = clap::value_parser!(u16).range(1..),
            help = "Number of reservations to make"
        )]
        count: u16,
        #[arg(
            long,
            default_value_t = false,
            help = "Let anonymous requests use the dynamic port range"
        )]
        include_dynamic: bool,
    },
}

#[derive(Debug, Parser)]
#[command(name = "netpool")]
#[command(version)]
#[command(
    about = "Inspect container network address pools and port reservations",
    long_about = None
)]
pub struct CmdArgs {
    #[arg(
        long,
        global = true,
        value_name = "FILE",
        help = "YAML configuration file"
    )]
    config: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        value_name = "tracing configuration",
        help = "Tracing config string as comma-separated sequence of target=level, with level one in [off,error,warn,info,debug,trace].
A bare level sets the default log-level. Targets may be named by crate (portalloc, ipam, net, ...).
E.g. warn,portalloc=debug"
    )]
    tracing: Option<String>,

    #[command(subcommand)]
    command: Command,
}

impl CmdArgs {
    #[must_use]
    pub fn config_path(&self) -> Option<&Path> {
        self.config.as_deref()
    }

    #[must_use]
    pub fn tracing(&self) -> Option<&str> {
        self.tracing.as_deref()
    }

    #[must_use]
    pub fn command(&self) -> &Command {
        &self.command
    }

    /// The configuration named by `--config`, or the defaults.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the file can't be loaded.
    pub fn load_config(&self) -> Result<Config, ConfigError> {
        match self.config_path() {
            Some(path) => Config::load(path),
            None => Ok(Config::default()),
        }
    }
}
