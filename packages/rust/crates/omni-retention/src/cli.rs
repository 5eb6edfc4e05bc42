use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use omni_types::TrimMode;

#[derive(Parser)]
#[command(name = "omni-retention")]
#[command(about = "Keep long conversations bounded: prune payloads, simulate the live view engine.")]
pub(crate) struct Cli {
    /// Override config directory (same semantics as `PRJ_CONFIG_HOME`).
    #[arg(long, global = true)]
    pub(crate) conf: Option<PathBuf>,

    /// Debug logging (ignored when `RUST_LOG` is set).
    #[arg(long, short, global = true)]
    pub(crate) verbose: bool,

    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub(crate) enum TrimModeArg {
    Hide,
    Placeholder,
}

impl From<TrimModeArg> for TrimMode {
    fn from(value: TrimModeArg) -> Self {
        match value {
            TrimModeArg::Hide => Self::Hide,
            TrimModeArg::Placeholder => Self::Placeholder,
        }
    }
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// Rewrite a conversation payload ({mapping, current_node}) to the last N rounds.
    Prune {
        /// Payload file, or `-` for stdin.
        #[arg(long)]
        input: PathBuf,

        /// Write the payload here instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,

        /// Rounds to keep (default: from settings).
        #[arg(long)]
        keep_rounds: Option<usize>,

        /// Pretty-print the JSON output.
        #[arg(long)]
        pretty: bool,
    },
    /// Run the live view engine over a document fixture and print the final status.
    Simulate {
        /// Document fixture (JSON).
        #[arg(long)]
        document: PathBuf,

        /// Rounds to keep (default: from settings).
        #[arg(long)]
        keep_rounds: Option<usize>,

        /// Removal strategy (default: from settings).
        #[arg(long, value_enum)]
        trim_mode: Option<TrimModeArg>,
    },
    /// Print the resolved retention policy and engine configuration.
    Settings,
}
