//! omni-retention CLI: prune, simulate, or settings.
//!
//! Settings come from `packages/conf/settings.yaml` with the user overlay under
//! `<PRJ_CONFIG_HOME>/omni-retention/`. Override the config home with `--conf <dir>`.
//!
//! Logging: set `RUST_LOG=omni_window=debug` (or `warn`, `trace`) to see engine logs on stderr.

mod cli;

use std::io::{Read, Write};
use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use omni_retention::{
    ResolvedSettings, load_runtime_settings, policy_with_overrides, prune_json, set_config_home_override, simulate,
};

use crate::cli::{Cli, Command};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    if let Some(conf_dir) = cli.conf.clone() {
        set_config_home_override(conf_dir);
    }

    // Initialize tracing: RUST_LOG overrides; --verbose => debug; else info
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if cli.verbose {
            "omni_retention=debug,omni_window=debug,omni_prune=debug"
        } else {
            "omni_retention=info,omni_window=info,omni_prune=info"
        })
    });
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let runtime_settings = load_runtime_settings();

    match cli.command {
        Command::Prune {
            input,
            output,
            keep_rounds,
            pretty,
        } => {
            let policy = policy_with_overrides(&runtime_settings, keep_rounds, None)?;
            let raw = read_input(&input)?;
            let report = prune_json(&raw, policy.keep_rounds, pretty)?;
            match output {
                Some(path) => std::fs::write(&path, report.output)
                    .with_context(|| format!("failed to write {}", path.display()))?,
                None => println!("{}", report.output),
            }
            Ok(())
        }
        Command::Simulate {
            document,
            keep_rounds,
            trim_mode,
        } => {
            let policy = policy_with_overrides(&runtime_settings, keep_rounds, trim_mode.map(Into::into))?;
            let fixture = std::fs::read_to_string(&document)
                .with_context(|| format!("failed to read {}", document.display()))?;
            let report = simulate(&fixture, policy, runtime_settings.engine_config()).await?;
            print_json(&report)
        }
        Command::Settings => print_json(&ResolvedSettings::from_settings(&runtime_settings)),
    }
}

fn read_input(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut raw = String::new();
        std::io::stdin()
            .read_to_string(&mut raw)
            .context("failed to read payload from stdin")?;
        return Ok(raw);
    }
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("failed to encode output")?;
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{rendered}").context("failed to write output")?;
    Ok(())
}
