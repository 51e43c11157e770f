//! Configuration management CLI commands.
//!
//! Provides `config get`, `config set`, `config list`, and `config path` commands
//! for viewing and modifying `config.ini` from the command line.

use std::path::Path;

use clap::Subcommand;
use ollama_dl::config::{config_file_path, ConfigFile, ConfigKey};

use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Get a configuration value
    Get {
        /// Configuration key in format section.key (e.g., download.parallel)
        key: String,
    },

    /// Set a configuration value
    Set {
        /// Configuration key in format section.key (e.g., download.parallel)
        key: String,

        /// Value to set
        value: String,
    },

    /// List all configuration settings
    List,

    /// Show the configuration file path
    Path,
}

/// Run a config subcommand against the default config file.
pub fn run(command: ConfigCommands) -> Result<(), CliError> {
    run_at(command, &config_file_path())
}

/// Run a config subcommand against the file at `path`.
pub fn run_at(command: ConfigCommands, path: &Path) -> Result<(), CliError> {
    match command {
        ConfigCommands::Get { key } => {
            println!("{}", get_value(&key, path)?);
            Ok(())
        }
        ConfigCommands::Set { key, value } => {
            let name = set_value(&key, &value, path)?;
            println!("Set {} = {}", name, value);
            Ok(())
        }
        ConfigCommands::List => run_list(path),
        ConfigCommands::Path => {
            println!("{}", path.display());
            Ok(())
        }
    }
}

fn parse_key(key: &str) -> Result<ConfigKey, CliError> {
    key.parse().map_err(|_| {
        CliError::Config(format!(
            "Unknown configuration key '{}'. Use 'ollama-dl config list' to see available keys.",
            key
        ))
    })
}

/// Current value of `key`.
fn get_value(key: &str, path: &Path) -> Result<String, CliError> {
    let config_key = parse_key(key)?;
    let config = ConfigFile::load_from(path)?;
    Ok(config_key.get(&config))
}

/// Validate, store and save `value`; returns the canonical key name.
fn set_value(key: &str, value: &str, path: &Path) -> Result<&'static str, CliError> {
    let config_key = parse_key(key)?;
    let mut config = ConfigFile::load_from(path)?;
    config_key.set(&mut config, value)?;
    config.save_to(path)?;
    Ok(config_key.name())
}

/// List all configuration settings.
fn run_list(path: &Path) -> Result<(), CliError> {
    let config = ConfigFile::load_from(path)?;

    println!("Configuration Settings");
    println!("======================");
    println!();

    let mut current_section = "";

    for key in ConfigKey::all() {
        let section = key.section();

        if section != current_section {
            if !current_section.is_empty() {
                println!();
            }
            println!("[{}]", section);
            current_section = section;
        }

        println!("  {} = {}", key.key_name(), key.get(&config));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_set_then_get() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.ini");

        assert_eq!(get_value("download.parallel", &path).unwrap(), "4");
        assert_eq!(set_value("download.parallel", "8", &path).unwrap(), "download.parallel");
        assert_eq!(get_value("download.parallel", &path).unwrap(), "8");
        assert!(path.exists());
    }

    #[test]
    fn test_unknown_key() {
        let dir = TempDir::new().unwrap();
        let err = get_value("cache.size", &dir.path().join("config.ini")).unwrap_err();
        assert!(err.to_string().contains("Unknown configuration key"));
    }

    #[test]
    fn test_invalid_value_not_saved() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.ini");
        assert!(set_value("download.retries", "-1", &path).is_err());
        assert!(!path.exists());
    }
}
