//! Configuration management commands.
//!
//! Stores CLI settings in `~/.taskgate/config.toml`.

use anyhow::{Context, Result};
use clap::{Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::output::{self, OutputFormat};

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Set a configuration value
    Set { key: ConfigKey, value: String },

    /// Get a configuration value
    Get { key: ConfigKey },

    /// Show all configuration
    Show,

    /// Reset configuration to defaults
    Reset {
        /// Skip confirmation
        #[arg(short, long)]
        force: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ConfigKey {
    /// Base URL of the API server
    ApiUrl,
    /// Where the login session is saved
    SessionFile,
}

/// Persistent CLI configuration stored on disk.
#[derive(Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CliConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_file: Option<PathBuf>,
}

impl CliConfig {
    fn get(&self, key: ConfigKey) -> Option<String> {
        match key {
            ConfigKey::ApiUrl => self.api_url.clone(),
            ConfigKey::SessionFile => self.session_file.as_ref().map(|p| p.display().to_string()),
        }
    }

    fn set(&mut self, key: ConfigKey, value: String) -> Result<()> {
        match key {
            ConfigKey::ApiUrl => {
                if !value.starts_with("http://") && !value.starts_with("https://") {
                    anyhow::bail!("api-url must start with http:// or https://");
                }
                self.api_url = Some(value);
            }
            ConfigKey::SessionFile => self.session_file = Some(PathBuf::from(value)),
        }
        Ok(())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&content).context("Failed to parse config file")
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
    }
}

fn config_path() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".taskgate").join("config.toml"))
}

/// Load the CLI configuration, returning defaults if the file does not exist.
pub fn load_config() -> Result<CliConfig> {
    CliConfig::load_from(&config_path()?)
}

fn key_name(key: ConfigKey) -> String {
    key.to_possible_value()
        .map(|v| v.get_name().to_string())
        .unwrap_or_default()
}

pub async fn execute(cmd: ConfigCommands, format: OutputFormat) -> Result<()> {
    let path = config_path()?;

    match cmd {
        ConfigCommands::Set { key, value } => {
            let mut cfg = CliConfig::load_from(&path)?;
            cfg.set(key, value.clone())?;
            cfg.save_to(&path)?;

            match format {
                OutputFormat::Table => output::print_success(&format!("{} = {}", key_name(key), value)),
                _ => output::print_item(
                    &serde_json::json!({ "key": key_name(key), "value": value }),
                    format,
                )?,
            }
        }

        ConfigCommands::Get { key } => match CliConfig::load_from(&path)?.get(key) {
            Some(value) => match format {
                OutputFormat::Table => println!("{}", value),
                _ => output::print_item(
                    &serde_json::json!({ "key": key_name(key), "value": value }),
                    format,
                )?,
            },
            None => output::print_error(&format!("Key '{}' not set", key_name(key))),
        },

        ConfigCommands::Show => {
            let cfg = CliConfig::load_from(&path)?;
            if cfg == CliConfig::default() {
                output::print_info("No configuration values set.");
                return Ok(());
            }

            match format {
                OutputFormat::Table => {
                    output::print_header("Configuration");
                    for key in [ConfigKey::ApiUrl, ConfigKey::SessionFile] {
                        if let Some(value) = cfg.get(key) {
                            output::print_detail(&key_name(key), &value);
                        }
                    }
                }
                _ => output::print_item(&cfg, format)?,
            }
        }

        ConfigCommands::Reset { force } => {
            if !force {
                output::print_info("This will reset all CLI configuration. Use --force to confirm.");
                return Ok(());
            }
            if path.exists() {
                std::fs::remove_file(&path)
                    .with_context(|| format!("Failed to remove {}", path.display()))?;
            }
            output::print_success("Configuration reset to defaults");
        }
    }

    Ok(())
}
