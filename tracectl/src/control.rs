// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Process wide tracing setup and runtime filter changes.

use crate::targets::{Directive, parse_spec, render};
use arc_swap::ArcSwap;
use std::sync::{Arc, OnceLock};
use tracing::debug;
use tracing_error::ErrorLayer;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry, fmt, reload};

/// Level of targets not named by any directive.
pub const DEFAULT_DEFAULT_LOGLEVEL: LevelFilter = LevelFilter::INFO;

/// Errors controlling tracing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TraceCtlError {
    #[error("invalid tracing directive '{0}': {1}")]
    InvalidDirective(String, String),
    #[error("failed to apply tracing filter: {0}")]
    Reload(String),
}

/// Handle on the installed subscriber.
pub struct TracingControl {
    handle: reload::Handle<EnvFilter, Registry>,
    current: ArcSwap<String>,
    installed: bool,
}

static TRACE_CTL: OnceLock<TracingControl> = OnceLock::new();

fn build_filter(spec: &str) -> Result<EnvFilter, TraceCtlError> {
    EnvFilter::builder()
        .with_default_directive(DEFAULT_DEFAULT_LOGLEVEL.into())
        .parse(spec)
        .map_err(|e| TraceCtlError::InvalidDirective(spec.to_string(), e.to_string()))
}

impl TracingControl {
    fn install() -> TracingControl {
        // RUST_LOG applies until a filter is set explicitly
        let from_env = std::env::var(EnvFilter::DEFAULT_ENV).unwrap_or_default();
        let (filter, current) = match build_filter(&from_env) {
            Ok(filter) => (filter, from_env),
            Err(_) => (
                EnvFilter::default().add_directive(DEFAULT_DEFAULT_LOGLEVEL.into()),
                String::new(),
            ),
        };
        let (filter, handle) = reload::Layer::new(filter);
        let installed = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_thread_names(true))
            .with(ErrorLayer::default())
            .try_init()
            .is_ok();
        if !installed {
            debug!("a tracing subscriber is already installed, filter changes will not apply");
        }
        TracingControl {
            handle,
            current: ArcSwap::from_pointee(current),
            installed,
        }
    }

    /// Replace the active filter with `spec` (see [`crate::targets`]).
    pub fn setup_from_string(&self, spec: &str) -> Result<(), TraceCtlError> {
        let rendered = render(&parse_spec(spec)?);
        let filter = build_filter(&rendered)?;
        if self.installed {
            self.handle
                .reload(filter)
                .map_err(|e| TraceCtlError::Reload(e.to_string()))?;
        }
        debug!("tracing filter set to '{rendered}'");
        self.current.store(Arc::new(rendered));
        Ok(())
    }

    /// Change the level of targets not named by any directive, keeping the other directives.
    pub fn set_default_level(&self, level: LevelFilter) -> Result<(), TraceCtlError> {
        let mut directives = parse_spec(&self.current())?;
        directives.retain(|d| d.target.is_some());
        directives.insert(
            0,
            Directive {
                target: None,
                level,
            },
        );
        self.setup_from_string(&render(&directives))
    }

    /// The filter in effect, in directive syntax.  Empty for the default.
    #[must_use]
    pub fn current(&self) -> String {
        String::clone(&self.current.load())
    }

    /// False if another subscriber was installed first, in which case filters do not apply.
    #[must_use]
    pub fn is_installed(&self) -> bool {
        self.installed
    }
}

/// The process wide [`TracingControl`], installing the subscriber on first use.
pub fn get_trace_ctl() -> &'static TracingControl {
    TRACE_CTL.get_or_init(TracingControl::install)
}

/// Install the subscriber (if not done yet) and apply `spec` when given.  Safe to call repeatedly.
pub fn init(spec: Option<&str>) -> Result<&'static TracingControl, TraceCtlError> {
    let ctl = get_trace_ctl();
    if let Some(spec) = spec {
        ctl.setup_from_string(spec)?;
    }
    Ok(ctl)
}
