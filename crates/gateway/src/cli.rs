//! Command-line interface and config loading.

use clap::{Parser, Subcommand};

use dp_domain::config::Config;

/// DeployPilot — a conversational gateway over smart-contract analysis.
#[derive(Debug, Parser)]
#[command(name = "deploypilot", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the gateway server (default when no subcommand is given).
    Serve,
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Print version information.
    Version,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Parse the config file and report any errors.
    Validate,
    /// Dump the resolved configuration (with defaults) as TOML.
    Show,
}

/// Load config from `$DP_CONFIG` (default `config.toml`). A missing file
/// is not an error; defaults apply.
pub fn load_config() -> anyhow::Result<(Config, String)> {
    let config_path = std::env::var("DP_CONFIG").unwrap_or_else(|_| "config.toml".into());

    let config = if std::path::Path::new(&config_path).exists() {
        let raw = std::fs::read_to_string(&config_path)
            .map_err(|e| anyhow::anyhow!("reading {config_path}: {e}"))?;
        toml::from_str(&raw).map_err(|e| anyhow::anyhow!("parsing {config_path}: {e}"))?
    } else {
        Config::default()
    };

    Ok((config, config_path))
}

/// `config validate`: reparse and report.
pub fn validate(config_path: &str) -> bool {
    match load_config() {
        Ok(_) => {
            println!("{config_path}: OK");
            true
        }
        Err(e) => {
            eprintln!("{e}");
            false
        }
    }
}

/// `config show`: dump the resolved config as TOML.
pub fn show(config: &Config) {
    match toml::to_string_pretty(config) {
        Ok(s) => println!("{s}"),
        Err(e) => eprintln!("serializing config: {e}"),
    }
}
