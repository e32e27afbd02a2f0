// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Subcommand handlers

use args::{Command, Config, Scope};
use ipam::{DefaultPools, SplitSpec, derive_ula_base};
use miette::{IntoDiagnostic, WrapErr};
use nix::unistd::gethostname;
use portalloc::{PortAllocator, Protocol, RangePolicy};
use serde::Serialize;
use std::io::Write;
use std::net::IpAddr;
use tracing::{debug, info};

#[derive(Serialize)]
struct PoolsView {
    #[serde(skip_serializing_if = "Option::is_none")]
    local: Option<Vec<SplitSpec>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    global: Option<Vec<SplitSpec>>,
}

impl PoolsView {
    fn new(pools: &DefaultPools, scope: Scope) -> PoolsView {
        let local = matches!(scope, Scope::Local | Scope::All);
        let global = matches!(scope, Scope::Global | Scope::All);
        PoolsView {
            local: local.then(|| pools.local_scope_defaults()),
            global: global.then(|| pools.global_scope_defaults()),
        }
    }
}

pub(crate) fn show_pools(
    pools: &DefaultPools,
    scope: Scope,
    json: bool,
    out: &mut impl Write,
) -> miette::Result<()> {
    let view = PoolsView::new(pools, scope);
    if json {
        serde_json::to_writer_pretty(&mut *out, &view).into_diagnostic()?;
        return writeln!(out).into_diagnostic();
    }
    let scoped = [("local", &view.local), ("global", &view.global)];
    for (name, specs) in scoped {
        for spec in specs.iter().flatten() {
            let base = spec.base().to_string();
            writeln!(out, "{name:<8}{base:<20}/{}", spec.size()).into_diagnostic()?;
        }
    }
    Ok(())
}

fn host_id(arg: Option<&str>, config: &Config) -> miette::Result<String> {
    if let Some(id) = arg.or(config.host_id.as_deref()) {
        return Ok(id.to_string());
    }
    let hostname = gethostname()
        .into_diagnostic()
        .wrap_err("failed to get hostname")?;
    hostname
        .into_string()
        .map_err(|name| miette::miette!("hostname {name:?} is not valid UTF-8"))
}

pub(crate) fn show_ula(host_id: &str, out: &mut impl Write) -> miette::Result<()> {
    let spec = derive_ula_base(host_id);
    writeln!(out, "host id {host_id:?}: {spec}").into_diagnostic()
}

fn show_dynamic_range(config: &Config, out: &mut impl Write) -> miette::Result<()> {
    let provider = config.provider()?;
    let range = provider
        .dynamic_range()
        .into_diagnostic()
        .wrap_err_with(|| format!("{} query failed", provider.name()))?;
    writeln!(out, "{range} (from {})", provider.name()).into_diagnostic()
}

pub(crate) struct AllocateRequest {
    pub proto: Protocol,
    pub addr: IpAddr,
    pub port: u16,
    pub count: u16,
    pub policy: RangePolicy,
}

pub(crate) fn allocate(
    allocator: &PortAllocator,
    request: &AllocateRequest,
    out: &mut impl Write,
) -> miette::Result<()> {
    for _ in 0..request.count {
        let port = allocator
            .allocate_with(request.proto, request.addr, request.port, request.policy)
            .into_diagnostic()?;
        let addr = std::net::SocketAddr::new(request.addr, port);
        writeln!(out, "{} {addr}", request.proto).into_diagnostic()?;
    }
    info!("{} ports reserved", allocator.reserved_count());
    Ok(())
}

pub(crate) fn run(command: &Command, config: &Config, out: &mut impl Write) -> miette::Result<()> {
    debug!("running {command:?}");
    match command {
        Command::Pools { scope, json } => show_pools(&config.pools(), *scope, *json, out),
        Command::Ula { host_id: arg } => show_ula(&host_id(arg.as_deref(), config)?, out),
        Command::DynamicRange => show_dynamic_range(config, out),
        Command::Allocate {
            proto,
            addr,
            port,
            count,
            include_dynamic,
        } => {
            let allocator = PortAllocator::new(config.provider()?, config.allocator_config());
            let policy = if *include_dynamic || !config.allocator_config().exclude_dynamic_range {
                RangePolicy::IncludeDynamic
            } else {
                RangePolicy::ExcludeDynamic
            };
            let request = AllocateRequest {
                proto: *proto,
                addr: *addr,
                port: *port,
                count: *count,
                policy,
            };
            allocate(&allocator, &request, out)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{AllocateRequest, allocate, run, show_pools, show_ula};
    use args::{Command, Config, Scope};
    use ipam::DefaultPools;
    use portalloc::provider::StaticProvider;
    use portalloc::{AllocatorConfig, DynamicRange, PortAllocator, Protocol, RangePolicy};
    use pretty_assertions::assert_eq;
    use std::net::{IpAddr, Ipv4Addr};
    use std::sync::Arc;

    fn output(f: impl FnOnce(&mut Vec<u8>) -> miette::Result<()>) -> String {
        let mut out = Vec::new();
        f(&mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn pools_as_text() {
        let pools = DefaultPools::builtin();
        let text = output(|out| show_pools(&pools, Scope::Global, false, out));
        assert_eq!(text, "global  10.0.0.0/8          /24\n");
        let text = output(|out| show_pools(&pools, Scope::All, false, out));
        assert_eq!(text.lines().count(), 8);
        assert!(text.starts_with("local   172.17.0.0/16"));
    }

    #[test]
    fn pools_as_json() {
        let pools = DefaultPools::builtin();
        let text = output(|out| show_pools(&pools, Scope::Global, true, out));
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"global": [{"base": "10.0.0.0/8", "size": 24}]})
        );
    }

    #[test]
    fn ula_output() {
        let text = output(|out| show_ula("", out));
        assert_eq!(text, "host id \"\": fd42:98fc:1c14::/48 (/64 subnets)\n");
    }

    #[test]
    fn ula_prefers_the_argument_then_the_config() {
        let config = Config::from_yaml("host_id: from-config").unwrap();
        let ula = Command::Ula { host_id: None };
        let from_config = output(|out| run(&ula, &config, out));
        assert!(from_config.starts_with("host id \"from-config\""));
        let ula = Command::Ula {
            host_id: Some("from-arg".to_string()),
        };
        let from_arg = output(|out| run(&ula, &config, out));
        assert!(from_arg.starts_with("host id \"from-arg\""));
    }

    #[test]
    fn allocations_are_printed() {
        let allocator = PortAllocator::new(
            Arc::new(StaticProvider::new(DynamicRange::new(1, 1023).unwrap())),
            AllocatorConfig::default(),
        );
        let request = AllocateRequest {
            proto: Protocol::Tcp,
            addr: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 0,
            count: 2,
            policy: RangePolicy::ExcludeDynamic,
        };
        let text = output(|out| allocate(&allocator, &request, out));
        assert_eq!(text, "tcp 127.0.0.1:1024\ntcp 127.0.0.1:1025\n");
    }

    #[test]
    fn allocate_command_uses_the_configured_provider() {
        let yaml = "port_allocator: { provider: static, static_range: { start: 1, end: 99 } }";
        let config = Config::from_yaml(yaml).unwrap();
        let command = Command::Allocate {
            proto: Protocol::Udp,
            addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 0,
            count: 1,
            include_dynamic: false,
        };
        let text = output(|out| run(&command, &config, out));
        assert_eq!(text, "udp 0.0.0.0:100\n");
        let explicit = Command::Allocate {
            proto: Protocol::Udp,
            addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 53,
            count: 2,
            include_dynamic: false,
        };
        let mut out = Vec::new();
        assert!(run(&explicit, &config, &mut out).is_err());
        assert_eq!(String::from_utf8(out).unwrap(), "udp 0.0.0.0:53\n");
    }
}
