use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;

/// Network the indexed chain belongs to.  The index itself is
/// network-agnostic; the value is validated and logged so an index built
/// against one network is not silently reopened against another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Network {
    Mainnet,
    Testnet,
    Simnet,
}

impl Network {
    pub fn name(self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
            Network::Simnet => "simnet",
        }
    }
}

fn parse_network(s: &str) -> Result<Network> {
    match s.trim().to_ascii_lowercase().as_str() {
        "mainnet" => Ok(Network::Mainnet),
        "testnet" => Ok(Network::Testnet),
        "simnet" => Ok(Network::Simnet),
        _ => Err(anyhow::anyhow!(
            "invalid value for network: expected mainnet | testnet | simnet"
        )),
    }
}

fn default_db_path() -> String {
    "./db".to_string()
}

fn default_network() -> String {
    "mainnet".to_string()
}

/// Raw shape of the JSON config file.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    #[serde(default = "default_db_path")]
    pub db_path: String,
    #[serde(default = "default_network")]
    pub network: String,
}

/// Validated application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_path: String,
    pub network: Network,
}

impl AppConfig {
    pub fn from_file(file: ConfigFile) -> Result<Self> {
        let network = parse_network(&file.network)?;
        Ok(Self { db_path: file.db_path, network })
    }
}

fn load_config_file(path: &str) -> Result<ConfigFile> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {path}"))?;
    serde_json::from_str(&raw).context("failed to parse config JSON")
}

/// Loads and validates the configuration at `path`.
pub fn load_app_config(path: &str) -> Result<AppConfig> {
    AppConfig::from_file(load_config_file(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_to_empty_config() {
        let file: ConfigFile = serde_json::from_str("{}").unwrap();
        let cfg = AppConfig::from_file(file).unwrap();
        assert_eq!(cfg.db_path, "./db");
        assert_eq!(cfg.network, Network::Mainnet);
    }

    #[test]
    fn network_parsing_is_case_insensitive() {
        let file: ConfigFile =
            serde_json::from_str(r#"{"db_path": "/tmp/x", "network": "Simnet"}"#).unwrap();
        let cfg = AppConfig::from_file(file).unwrap();
        assert_eq!(cfg.network, Network::Simnet);
        assert_eq!(cfg.db_path, "/tmp/x");
    }

    #[test]
    fn unknown_network_is_rejected() {
        let file: ConfigFile = serde_json::from_str(r#"{"network": "devnet"}"#).unwrap();
        assert!(AppConfig::from_file(file).is_err());
    }
}
