//! Config command - inspect and create extractor configuration.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use crate::config::{ExtractorConfig, PROJECT_CONFIG_FILE};

#[derive(Args)]
pub struct ConfigCmd {
    #[command(subcommand)]
    pub command: ConfigSubCmd,
}

#[derive(Subcommand)]
pub enum ConfigSubCmd {
    /// Show the effective configuration for a project
    Show(ShowCmd),

    /// Write a default .depinv.toml
    Init(InitCmd),
}

#[derive(Args)]
pub struct ShowCmd {
    /// Project directory (default: current directory)
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Config file to show instead of the discovered one
    #[arg(long, env = "DEPINV_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Args)]
pub struct InitCmd {
    /// Directory to write the config into (default: current directory)
    #[arg(default_value = ".")]
    pub dir: PathBuf,

    /// Overwrite an existing config file
    #[arg(long)]
    pub force: bool,
}

impl ConfigCmd {
    pub fn run(&self) -> Result<()> {
        match &self.command {
            ConfigSubCmd::Show(cmd) => {
                let (config, source) = ExtractorConfig::load(cmd.config.as_deref(), &cmd.path)?;
                match source {
                    Some(path) => println!("Config: {}", path.display()),
                    None => println!(
                        "Config: (defaults; user config would be {})",
                        ExtractorConfig::user_config_path()?.display()
                    ),
                }
                println!();
                print!(
                    "{}",
                    toml::to_string_pretty(&config).context("Failed to serialize config")?
                );
            }
            ConfigSubCmd::Init(cmd) => {
                let path = cmd.dir.join(PROJECT_CONFIG_FILE);
                if path.exists() && !cmd.force {
                    anyhow::bail!(
                        "{} already exists. Use --force to overwrite.",
                        path.display()
                    );
                }
                ExtractorConfig::default().save(&path)?;
                println!("Wrote {}", path.display());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_init_writes_loadable_config() {
        let tmp = TempDir::new().unwrap();
        let cmd = ConfigCmd {
            command: ConfigSubCmd::Init(InitCmd {
                dir: tmp.path().to_path_buf(),
                force: false,
            }),
        };
        cmd.run().unwrap();

        let (config, source) = ExtractorConfig::load(None, tmp.path()).unwrap();
        assert_eq!(source, Some(tmp.path().join(PROJECT_CONFIG_FILE)));
        assert!(config.keywords.configurations.contains("implementation"));

        // Refuses to overwrite without --force
        assert!(cmd.run().is_err());
    }
}
