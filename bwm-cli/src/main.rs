//! bwm — Bitwarden entries through dmenu-style menus, typed or copied.
//!
//! # Usage
//!
//! ```text
//! bwm [--autotype SEQ] [--vault URL] [--lock] [--clipboard]
//! bwm logs [--lines N]
//! ```
//!
//! The first invocation unlocks a vault and stays resident until the
//! inactivity timeout; later invocations only ask it to open the menu.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{logs::LogsArgs, run::RunArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "bwm",
    version,
    about = "Type or copy Bitwarden entries from a dmenu-style menu",
    long_about = None,
    args_conflicts_with_subcommands = true,
)]
struct Cli {
    #[command(flatten)]
    run: RunArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the tail of the daemon log.
    Logs(LogsArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Some(Commands::Logs(args)) => args.run(),
        None => cli.run.run(),
    }
}
