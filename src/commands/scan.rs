//! Scan command - extract the dependency inventory from build manifests.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use tracing::{info, warn};

use crate::config::ExtractorConfig;
use crate::inventory::Inventory;
use crate::manifests::{ScanRoot, discover_manifests, extract_files};
use crate::report::{self, OutputFormat};
use crate::types::{Dialect, ExtractError};

#[derive(Args)]
pub struct ScanCmd {
    /// Directories or manifest files to scan (default: current directory)
    #[arg(default_value = ".")]
    pub paths: Vec<PathBuf>,

    /// External substitution for `$name` references (repeatable)
    #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_substitution)]
    pub set: Vec<(String, String)>,

    /// Fail the run on any fatal or warning diagnostic
    #[arg(long)]
    pub strict: bool,

    /// Output format for the inventory and the diagnostics file
    #[arg(long, short = 'f', value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,

    /// Write the inventory to a file instead of stdout
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,

    /// Write the diagnostics report to a file (default: text on stderr)
    #[arg(long)]
    pub diagnostics: Option<PathBuf>,

    /// Config file (default: .depinv.toml in the first path, then the user config)
    #[arg(long, env = "DEPINV_CONFIG")]
    pub config: Option<PathBuf>,

    /// Only scan manifests of this dialect
    #[arg(long, value_enum)]
    pub dialect: Option<Dialect>,

    /// Number of files to extract in parallel (default: one per CPU)
    #[arg(long, short = 'j')]
    pub jobs: Option<usize>,
}

impl ScanCmd {
    pub fn run(&self) -> Result<()> {
        let first = self.paths.first().map(PathBuf::as_path).unwrap_or(Path::new("."));
        let config_root = if first.is_file() {
            first.parent().unwrap_or(Path::new("."))
        } else {
            first
        };

        let (config, source) = ExtractorConfig::load(self.config.as_deref(), config_root)?;
        if let Some(path) = &source {
            info!(config = %path.display(), "loaded config");
        }
        let config = config.with_overrides(self.set.clone(), self.strict);

        let pool = match self.jobs {
            Some(n) => Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(n)
                    .build()
                    .context("Failed to build thread pool")?,
            ),
            None => None,
        };

        let mut results = Vec::new();
        let mut seen = HashSet::new();
        for root in &self.paths {
            if !root.exists() {
                anyhow::bail!("Path not found: {}", root.display());
            }
            // With several roots, manifests are reported under their root so
            // equal relative paths stay distinct.
            let scan_root = if self.paths.len() > 1 {
                ScanRoot::labeled(root)
            } else {
                ScanRoot::new(root)
            };

            let mut files = discover_manifests(scan_root.path(), &config.discovery)
                .with_context(|| format!("Failed to discover manifests under {}", root.display()))?;
            if let Some(dialect) = self.dialect {
                files.retain(|f| Dialect::from_path(f) == Some(dialect));
            }
            // Overlapping roots extract each manifest once
            files.retain(|f| seen.insert(f.canonicalize().unwrap_or_else(|_| f.clone())));
            if files.is_empty() {
                warn!(root = %root.display(), "no manifests found");
                continue;
            }

            info!(root = %root.display(), manifests = files.len(), "scanning");
            let batch = match &pool {
                Some(pool) => pool.install(|| extract_files(&files, &scan_root, &config)),
                None => extract_files(&files, &scan_root, &config),
            };
            results.extend(batch);
        }

        if results.is_empty() {
            return Err(ExtractError::NoManifests(first.to_path_buf()).into());
        }

        let inventory = Inventory::merge(results);

        match &self.diagnostics {
            Some(path) => {
                let report = report::render_diagnostics(&inventory, self.format)?;
                write_file(path, &report)?;
            }
            None => eprint!("{}", report::render_diagnostics(&inventory, OutputFormat::Text)?),
        }

        // The diagnostics report is always written; the inventory only when the run passes
        inventory.check_strict(config.mode)?;

        let rendered = report::render_inventory(&inventory, self.format)?;
        match &self.output {
            Some(path) => write_file(path, &rendered)?,
            None => print!("{}", rendered),
        }

        Ok(())
    }
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
}

/// Parse a substitution: key=value
fn parse_substitution(arg: &str) -> Result<(String, String), String> {
    let (key, value) = arg
        .split_once('=')
        .ok_or_else(|| format!("Invalid format '{}'. Use: key=value (e.g., version=4.8.0)", arg))?;

    let key = key.trim();
    if key.is_empty() {
        return Err(format!("Missing key in '{}'", arg));
    }

    Ok((key.to_string(), value.to_string()))
}
