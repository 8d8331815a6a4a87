//! Run configuration.
//!
//! Looked up in order:
//! - `--config FILE`
//! - `.depinv.toml` at the scan root
//! - `~/.config/depinv/config.toml`
//! - built-in defaults
//!
//! Built once per run and passed by reference into every extraction stage.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::manifests::DiscoveryConfig;

const CONFIG_DIR: &str = "depinv";
const CONFIG_FILE: &str = "config.toml";

/// Project-level config file name, looked up at the scan root.
pub const PROJECT_CONFIG_FILE: &str = ".depinv.toml";

/// What a fatal finding does to the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum RunMode {
    /// Fatal findings abandon only the offending file or declaration.
    #[default]
    ContinueOnError,
    /// Any fatal or warning finding fails the whole run.
    Strict,
}

/// Extraction configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    pub mode: RunMode,
    pub keywords: KeywordConfig,
    /// Values for `$name` references that are not bound in the manifest itself.
    pub substitutions: BTreeMap<String, String>,
    pub discovery: DiscoveryConfig,
    pub inventory: InventoryConfig,
}

/// Call names the classifier recognizes. Matching is exact and case-sensitive.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeywordConfig {
    /// Dependency configurations (`implementation`, `api`, ...).
    pub configurations: BTreeSet<String>,
    /// Project-specific calls that look like declarations but must never be inventoried.
    pub ignore: BTreeSet<String>,
    /// Known non-dependency calls that legitimately appear next to declarations.
    pub skip: BTreeSet<String>,
    /// Helpers wrapping a single coordinate (`platform('g:a:v')`).
    pub wrappers: BTreeSet<String>,
    /// Block names that open a dependencies context.
    pub blocks: BTreeSet<String>,
}

fn string_set(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for KeywordConfig {
    fn default() -> Self {
        Self {
            configurations: string_set(&[
                "androidTestImplementation",
                "annotationProcessor",
                "api",
                "classpath",
                "compile",
                "compileOnly",
                "compileOnlyApi",
                "coreLibraryDesugaring",
                "debugImplementation",
                "developmentOnly",
                "implementation",
                "kapt",
                "ksp",
                "releaseImplementation",
                "runtime",
                "runtimeOnly",
                "testAnnotationProcessor",
                "testCompile",
                "testCompileOnly",
                "testFixturesApi",
                "testFixturesImplementation",
                "testImplementation",
                "testRuntimeOnly",
            ]),
            ignore: BTreeSet::new(),
            skip: string_set(&[
                "add",
                "components",
                "constraints",
                "files",
                "fileTree",
                "gradleApi",
                "gradleTestKit",
                "localGroovy",
                "modules",
                "project",
            ]),
            wrappers: string_set(&["enforcedPlatform", "platform", "testFixtures"]),
            blocks: string_set(&["dependencies"]),
        }
    }
}

/// Inventory-level settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InventoryConfig {
    /// Group names or glob patterns of first-party artifacts. Matching records
    /// stay in the inventory flagged `excluded`.
    pub excluded_groups: Vec<String>,
}

impl InventoryConfig {
    pub fn is_excluded(&self, group: &str) -> bool {
        self.excluded_groups.iter().any(|pattern| {
            pattern == group
                || glob::Pattern::new(pattern)
                    .map(|p| p.matches(group))
                    .unwrap_or(false)
        })
    }
}

impl ExtractorConfig {
    /// Load the effective config for a scan root.
    ///
    /// Returns the config and the file it came from (`None` for defaults).
    pub fn load(explicit: Option<&Path>, root: &Path) -> Result<(Self, Option<PathBuf>)> {
        let path = match explicit {
            Some(p) => Some(p.to_path_buf()),
            None => Self::discover_path(root),
        };

        match path {
            Some(p) => Ok((Self::load_from(&p)?, Some(p))),
            None => Ok((Self::default(), None)),
        }
    }

    /// Load config from a specific TOML file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Write config as TOML.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(path, content).context("Failed to write config file")
    }

    /// Get the user config file path.
    pub fn user_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().context("Could not determine config directory")?;

        Ok(config_dir.join(CONFIG_DIR).join(CONFIG_FILE))
    }

    fn discover_path(root: &Path) -> Option<PathBuf> {
        let project = root.join(PROJECT_CONFIG_FILE);
        if project.is_file() {
            return Some(project);
        }

        Self::user_config_path().ok().filter(|p| p.is_file())
    }

    /// Apply `--set` substitutions and the `--strict` flag from the command line.
    pub fn with_overrides(mut self, substitutions: Vec<(String, String)>, strict: bool) -> Self {
        self.substitutions.extend(substitutions);
        if strict {
            self.mode = RunMode::Strict;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = ExtractorConfig::default();
        assert_eq!(config.mode, RunMode::ContinueOnError);
        assert!(config.keywords.configurations.contains("implementation"));
        assert!(config.keywords.configurations.contains("api"));
        assert!(config.keywords.skip.contains("fileTree"));
        assert!(config.keywords.ignore.is_empty());
        assert!(config.keywords.blocks.contains("dependencies"));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: ExtractorConfig = toml::from_str(
            r#"
mode = "strict"

[keywords]
ignore = ["to_ignore"]

[substitutions]
version = "4.8.0"
"#,
        )
        .unwrap();

        assert_eq!(config.mode, RunMode::Strict);
        assert!(config.keywords.ignore.contains("to_ignore"));
        // Unlisted keyword tables fall back to their defaults
        assert!(config.keywords.configurations.contains("implementation"));
        assert_eq!(config.substitutions.get("version").unwrap(), "4.8.0");
    }

    #[test]
    fn test_serialize_deserialize() {
        let mut config = ExtractorConfig::default();
        config.keywords.ignore.insert("to_ignore".to_string());
        config.inventory.excluded_groups.push("com.example.*".to_string());

        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: ExtractorConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(parsed.keywords.ignore, config.keywords.ignore);
        assert_eq!(parsed.inventory.excluded_groups, config.inventory.excluded_groups);
    }

    #[test]
    fn test_load_project_config() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join(PROJECT_CONFIG_FILE),
            "[keywords]\nignore = [\"legacy\"]\n",
        )
        .unwrap();

        let (config, source) = ExtractorConfig::load(None, tmp.path()).unwrap();
        assert!(config.keywords.ignore.contains("legacy"));
        assert_eq!(source, Some(tmp.path().join(PROJECT_CONFIG_FILE)));
    }

    #[test]
    fn test_load_invalid_config_fails() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("bad.toml");
        std::fs::write(&path, "mode = [").unwrap();

        assert!(ExtractorConfig::load(Some(&path), tmp.path()).is_err());
    }

    #[test]
    fn test_overrides() {
        let config = ExtractorConfig::default()
            .with_overrides(vec![("version".into(), "1.2.3".into())], true);
        assert_eq!(config.mode, RunMode::Strict);
        assert_eq!(config.substitutions.get("version").unwrap(), "1.2.3");
    }

    #[test]
    fn test_excluded_groups() {
        let inventory = InventoryConfig {
            excluded_groups: vec!["com.example.*".into(), "internal".into()],
        };
        assert!(inventory.is_excluded("com.example.core"));
        assert!(inventory.is_excluded("internal"));
        assert!(!inventory.is_excluded("org.apache"));
    }
}
