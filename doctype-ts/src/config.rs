//! Configuration management for the CLI.
//!
//! This module handles loading configuration from `doctype-ts.toml` files
//! and merging with command-line arguments.

use crate::error::{CliResult, ConfigError};
use crate::generator::{AppDoctypeMap, GeneratorOptions};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Default configuration filename.
pub const CONFIG_FILENAME: &str = "doctype-ts.toml";

/// Main configuration structure.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Input and output locations.
    pub paths: PathsConfig,

    /// Root doctypes to compile, per application.
    pub apps: AppDoctypeMap,
}

/// Input and output locations.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Directory containing one subdirectory per application.
    pub apps: PathBuf,

    /// Generated TypeScript file.
    pub output: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            apps: PathBuf::from("./apps"),
            output: PathBuf::from("./types/doctypes.ts"),
        }
    }
}

impl Config {
    /// Reject configurations with nothing to compile.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.apps.values().all(|doctypes| doctypes.is_empty()) {
            return Err(ConfigError::invalid_value(
                "apps",
                "no doctypes requested; add an [apps] entry or pass --doctype APP:NAME",
            ));
        }
        Ok(())
    }

    /// Generator options for these paths.
    pub fn generator_options(&self, dry_run: bool) -> GeneratorOptions {
        GeneratorOptions::new(&self.paths.apps, &self.paths.output).dry_run(dry_run)
    }

    /// Total number of requested root doctypes.
    pub fn doctype_count(&self) -> usize {
        self.apps.values().map(Vec::len).sum()
    }
}

/// Configuration manager for loading and merging configs.
pub struct ConfigManager;

impl ConfigManager {
    /// Load configuration from a file path.
    ///
    /// If the path is None, attempts to load from the default location.
    /// If no config file exists, returns default configuration.
    pub fn load(path: Option<&Path>) -> CliResult<Config> {
        let config_path = path
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(CONFIG_FILENAME));

        if !config_path.exists() {
            tracing::debug!(path = %config_path.display(), "no config file, using defaults");
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(&config_path).map_err(|e| ConfigError::Io {
            path: config_path.clone(),
            source: e,
        })?;

        let config = Self::parse(&content)
            .map_err(|e| ConfigError::invalid_toml(config_path, e.to_string()))?;

        Ok(config)
    }

    /// Parse configuration from TOML text.
    pub fn parse(content: &str) -> Result<Config, toml::de::Error> {
        toml::from_str(content)
    }

    /// Merge CLI arguments into configuration.
    ///
    /// CLI arguments take precedence over config file values. Doctypes given
    /// on the command line are appended to the configured ones.
    pub fn merge_cli_args(mut config: Config, args: &CliArgs) -> Config {
        if let Some(ref apps) = args.apps {
            config.paths.apps = apps.clone();
        }

        if let Some(ref output) = args.output {
            config.paths.output = output.clone();
        }

        for (app, doctype) in &args.doctypes {
            let doctypes = config.apps.entry(app.clone()).or_default();
            if !doctypes.contains(doctype) {
                doctypes.push(doctype.clone());
            }
        }

        config
    }

    /// Generate default configuration file content with comments.
    pub fn default_config_content() -> &'static str {
        r#"# doctype-ts configuration file

[paths]
# Directory containing one subdirectory per application
apps = "./apps"

# Generated TypeScript file (rewritten only when a doctype changed)
output = "./types/doctypes.ts"

[apps]
# Root doctypes to compile, per application, using their directory names.
# Child doctypes referenced by Table fields are compiled automatically.
# erpnext = ["sales_invoice", "item"]
# frappe = ["user"]
"#
    }
}

/// CLI arguments that can override configuration.
#[derive(Debug, Default)]
pub struct CliArgs {
    /// Apps directory override.
    pub apps: Option<PathBuf>,

    /// Output file override.
    pub output: Option<PathBuf>,

    /// Extra `(application, doctype)` roots.
    pub doctypes: Vec<(String, String)>,
}

/// Parse an `APP:DOCTYPE` pair.
pub fn parse_doctype_arg(value: &str) -> Result<(String, String), String> {
    match value.split_once(':') {
        Some((app, doctype)) if !app.is_empty() && !doctype.is_empty() => {
            Ok((app.to_string(), doctype.to_string()))
        }
        _ => Err(format!("expected APP:DOCTYPE, got '{value}'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.paths.apps, PathBuf::from("./apps"));
        assert_eq!(config.paths.output, PathBuf::from("./types/doctypes.ts"));
        assert!(config.apps.is_empty());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_toml_config() {
        let toml = r#"
[paths]
apps = "../bench/apps"
output = "src/types/doctypes.ts"

[apps]
erpnext = ["sales_invoice", "item"]
frappe = ["user"]
"#;

        let config = ConfigManager::parse(toml).unwrap();
        assert_eq!(config.paths.apps, PathBuf::from("../bench/apps"));
        assert_eq!(config.paths.output, PathBuf::from("src/types/doctypes.ts"));
        assert_eq!(config.apps["erpnext"], vec!["sales_invoice", "item"]);
        assert_eq!(config.apps["frappe"], vec!["user"]);
        assert_eq!(config.doctype_count(), 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_config_content_parses() {
        let config = ConfigManager::parse(ConfigManager::default_config_content()).unwrap();
        assert_eq!(config.paths.apps, PathBuf::from("./apps"));
        assert!(config.apps.is_empty());
    }

    #[test]
    fn test_merge_cli_args_overrides_paths() {
        let args = CliArgs {
            output: Some(PathBuf::from("./custom.ts")),
            ..Default::default()
        };

        let merged = ConfigManager::merge_cli_args(Config::default(), &args);
        assert_eq!(merged.paths.output, PathBuf::from("./custom.ts"));
        assert_eq!(merged.paths.apps, PathBuf::from("./apps"));
    }

    #[test]
    fn test_merge_cli_args_appends_doctypes() {
        let config = ConfigManager::parse("[apps]\nerpnext = [\"item\"]\n").unwrap();
        let args = CliArgs {
            doctypes: vec![
                ("erpnext".to_string(), "item".to_string()),
                ("erpnext".to_string(), "customer".to_string()),
                ("hrms".to_string(), "employee".to_string()),
            ],
            ..Default::default()
        };

        let merged = ConfigManager::merge_cli_args(config, &args);
        assert_eq!(merged.apps["erpnext"], vec!["item", "customer"]);
        assert_eq!(merged.apps["hrms"], vec!["employee"]);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let config = ConfigManager::load(Some(&dir.path().join("doctype-ts.toml"))).unwrap();
        assert_eq!(config.paths.apps, PathBuf::from("./apps"));
    }

    #[test]
    fn test_load_invalid_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("doctype-ts.toml");
        std::fs::write(&path, "[paths\napps = ").unwrap();

        let err = ConfigManager::load(Some(&path)).unwrap_err();
        assert!(matches!(
            err,
            crate::error::CliError::Config(ConfigError::InvalidToml { .. })
        ));
    }

    #[test]
    fn test_parse_doctype_arg() {
        assert_eq!(
            parse_doctype_arg("erpnext:sales_invoice").unwrap(),
            ("erpnext".to_string(), "sales_invoice".to_string())
        );
        assert!(parse_doctype_arg("erpnext").is_err());
        assert!(parse_doctype_arg(":item").is_err());
    }
}
