// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines all subcommands and their arguments.

use berth::runtime::BackendMode;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "berth")]
#[command(about = "Inspect Docker, Podman and Apple container engines from one place")]
#[command(version)]
pub struct Cli {
    /// Enable verbose output (debug logging)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Print JSON lines instead of text
    #[arg(long, global = true)]
    pub json: bool,

    /// Configuration file (default: berth.yml in the current directory)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Backend to use instead of auto-detection (socket, embedded, cli, legacy)
    #[arg(long, global = true)]
    pub backend: Option<BackendMode>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show which engine endpoint discovery selects
    Detect,

    /// List containers grouped by pod and compose service
    Ps {
        /// Include exited containers
        #[arg(short, long)]
        all: bool,
    },

    /// Sample CPU and memory usage of a running container
    Stats {
        /// Container name or ID prefix
        container: String,

        /// Number of samples to collect
        #[arg(short = 'n', long, default_value_t = 3)]
        samples: usize,
    },

    /// Show which optional features the container CLI tool supports
    Features {
        /// CLI binary to probe (default from config)
        #[arg(long)]
        binary: Option<String>,
    },
}
