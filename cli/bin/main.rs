// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

#![deny(clippy::all, clippy::pedantic)]

mod commands;

use args::{CmdArgs, Parser};
use miette::{IntoDiagnostic, WrapErr};
use tracing::debug;

fn main() -> miette::Result<()> {
    let args = CmdArgs::parse();
    tracectl::init(args.tracing())
        .into_diagnostic()
        .wrap_err("invalid tracing configuration")?;
    let config = args.load_config()?;
    debug!("configuration: {config:?}");
    let mut out = std::io::stdout().lock();
    commands::run(args.command(), &config, &mut out)
}
