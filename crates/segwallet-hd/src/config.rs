//! Wallet configuration, parsed from a TOML file plus environment variable overrides.
//!
//! Priority: environment variables > config file > defaults.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Upper bound for any lookahead window
pub const MAX_LOOKAHEAD: u32 = 1000;

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WalletConfig {
    /// Bitcoin / Electrum settings
    #[serde(default)]
    pub bitcoin: BitcoinSection,

    /// Gap-limit discovery and oracle fan-out
    #[serde(default)]
    pub discovery: DiscoveryConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingSection,
}

/// Bitcoin network settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BitcoinSection {
    /// Bitcoin network: "bitcoin", "testnet", "signet", "regtest"
    #[serde(default = "default_network")]
    pub network: String,

    /// Electrum server URL
    #[serde(default = "default_electrum_url")]
    pub electrum_url: String,
}

impl Default for BitcoinSection {
    fn default() -> Self {
        Self {
            network: default_network(),
            electrum_url: default_electrum_url(),
        }
    }
}

/// Discovery settings consumed by the wallet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Receive-chain lookahead (default: 50)
    #[serde(default = "default_external_lookahead")]
    pub external_lookahead: u32,

    /// Change-chain lookahead (default: 5)
    #[serde(default = "default_internal_lookahead")]
    pub internal_lookahead: u32,

    /// Maximum concurrent oracle queries
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            external_lookahead: default_external_lookahead(),
            internal_lookahead: default_internal_lookahead(),
            max_in_flight: default_max_in_flight(),
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSection {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

// ============================================================================
// Default value functions
// ============================================================================

fn default_network() -> String {
    "bitcoin".to_string()
}

fn default_electrum_url() -> String {
    segwallet_electrum::default_server(bitcoin::Network::Bitcoin).to_string()
}

fn default_external_lookahead() -> u32 {
    50
}

fn default_internal_lookahead() -> u32 {
    5
}

fn default_max_in_flight() -> usize {
    8
}

fn default_log_level() -> String {
    "info".to_string()
}

// ============================================================================
// Loading & environment override
// ============================================================================

impl WalletConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml(&contents)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents).with_context(|| "Failed to parse TOML config")
    }

    /// Apply environment variable overrides.
    ///
    /// Supported env vars:
    /// - `SEGWALLET_NETWORK`
    /// - `SEGWALLET_ELECTRUM_URL`
    /// - `SEGWALLET_EXTERNAL_LOOKAHEAD`
    /// - `SEGWALLET_INTERNAL_LOOKAHEAD`
    /// - `SEGWALLET_MAX_IN_FLIGHT`
    /// - `SEGWALLET_LOG_LEVEL`
    pub fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("SEGWALLET_NETWORK") {
            self.bitcoin.network = v;
        }
        if let Ok(v) = std::env::var("SEGWALLET_ELECTRUM_URL") {
            self.bitcoin.electrum_url = v;
        }
        if let Ok(v) = std::env::var("SEGWALLET_EXTERNAL_LOOKAHEAD") {
            if let Ok(n) = v.parse::<u32>() {
                self.discovery.external_lookahead = n;
            }
        }
        if let Ok(v) = std::env::var("SEGWALLET_INTERNAL_LOOKAHEAD") {
            if let Ok(n) = v.parse::<u32>() {
                self.discovery.internal_lookahead = n;
            }
        }
        if let Ok(v) = std::env::var("SEGWALLET_MAX_IN_FLIGHT") {
            if let Ok(n) = v.parse::<usize>() {
                self.discovery.max_in_flight = n;
            }
        }
        if let Ok(v) = std::env::var("SEGWALLET_LOG_LEVEL") {
            self.logging.log_level = v;
        }
    }

    /// Parse the bitcoin network string to a `bitcoin::Network`.
    pub fn network(&self) -> bitcoin::Network {
        match self.bitcoin.network.as_str() {
            "testnet" | "testnet3" => bitcoin::Network::Testnet,
            "signet" => bitcoin::Network::Signet,
            "regtest" => bitcoin::Network::Regtest,
            _ => bitcoin::Network::Bitcoin,
        }
    }

    /// Validate that the configuration is usable.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            !self.bitcoin.electrum_url.is_empty(),
            "bitcoin.electrum_url must not be empty"
        );
        self.discovery.validate()
    }
}

impl DiscoveryConfig {
    /// Validate lookahead and concurrency bounds.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            (1..=MAX_LOOKAHEAD).contains(&self.external_lookahead),
            "discovery.external_lookahead must be between 1 and {}",
            MAX_LOOKAHEAD
        );
        anyhow::ensure!(
            (1..=MAX_LOOKAHEAD).contains(&self.internal_lookahead),
            "discovery.internal_lookahead must be between 1 and {}",
            MAX_LOOKAHEAD
        );
        anyhow::ensure!(
            self.max_in_flight >= 1,
            "discovery.max_in_flight must be >= 1"
        );
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn full_toml() -> &'static str {
        r#"
[bitcoin]
network = "testnet"
electrum_url = "ssl://electrum.blockstream.info:60002"

[discovery]
external_lookahead = 100
internal_lookahead = 10
max_in_flight = 2

[logging]
log_level = "debug"
"#
    }

    #[test]
    fn test_parse_empty_config_uses_defaults() {
        let config = WalletConfig::from_toml("").unwrap();
        assert_eq!(config.bitcoin.network, "bitcoin");
        assert_eq!(
            config.bitcoin.electrum_url,
            "ssl://electrum.blockstream.info:50002"
        );
        assert_eq!(config.discovery.external_lookahead, 50);
        assert_eq!(config.discovery.internal_lookahead, 5);
        assert_eq!(config.discovery.max_in_flight, 8);
        assert_eq!(config.logging.log_level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_full_config_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", full_toml()).unwrap();

        let config = WalletConfig::from_file(file.path()).unwrap();
        assert_eq!(config.network(), bitcoin::Network::Testnet);
        assert_eq!(config.discovery.external_lookahead, 100);
        assert_eq!(config.discovery.internal_lookahead, 10);
        assert_eq!(config.discovery.max_in_flight, 2);
        assert_eq!(config.logging.log_level, "debug");
    }

    #[test]
    fn test_missing_file() {
        let result = WalletConfig::from_file(Path::new("/nonexistent/segwallet.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = WalletConfig::from_toml(full_toml()).unwrap();

        std::env::set_var("SEGWALLET_NETWORK", "signet");
        std::env::set_var("SEGWALLET_INTERNAL_LOOKAHEAD", "20");
        std::env::set_var("SEGWALLET_MAX_IN_FLIGHT", "not-a-number");

        config.apply_env_overrides();

        assert_eq!(config.network(), bitcoin::Network::Signet);
        assert_eq!(config.discovery.internal_lookahead, 20);
        // Unparseable values are ignored
        assert_eq!(config.discovery.max_in_flight, 2);

        std::env::remove_var("SEGWALLET_NETWORK");
        std::env::remove_var("SEGWALLET_INTERNAL_LOOKAHEAD");
        std::env::remove_var("SEGWALLET_MAX_IN_FLIGHT");
    }

    #[test]
    fn test_validation_zero_lookahead() {
        let config = WalletConfig::from_toml("[discovery]\ninternal_lookahead = 0\n").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_lookahead_too_large() {
        let config = WalletConfig::from_toml("[discovery]\nexternal_lookahead = 5000\n").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_zero_in_flight() {
        let config = WalletConfig::from_toml("[discovery]\nmax_in_flight = 0\n").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_serde_roundtrip() {
        let config = WalletConfig::from_toml(full_toml()).unwrap();
        let serialized = toml::to_string_pretty(&config).unwrap();
        let reparsed = WalletConfig::from_toml(&serialized).unwrap();
        assert_eq!(reparsed.discovery, config.discovery);
        assert_eq!(reparsed.bitcoin.network, config.bitcoin.network);
    }
}
