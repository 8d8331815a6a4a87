//! CLI argument definitions.

use clap::{Parser, Subcommand};

use crate::commands::{ConfigCmd, ScanCmd};

#[derive(Parser)]
#[command(name = "depinv")]
#[command(about = "depinv - dependency inventory from Gradle, Maven, npm, Cargo and Go manifests")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Extract the dependency inventory from build manifests
    Scan(ScanCmd),

    /// Inspect or create configuration
    Config(ConfigCmd),
}

impl Command {
    pub fn execute(&self) -> anyhow::Result<()> {
        match self {
            Command::Scan(cmd) => cmd.run(),
            Command::Config(cmd) => cmd.run(),
        }
    }
}
