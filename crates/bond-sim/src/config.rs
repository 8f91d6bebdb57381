//! Simulator configuration.

use std::path::{Path, PathBuf};

use bond_staking::ClassConfig;
use bond_types::{AssetClass, TokenId};
use bond_vault::VaultConfig;
use bond_vesting::VestingConfig;
use serde::{Deserialize, Serialize};

/// Environment variable naming a config file when `--config` is absent.
pub const CONFIG_ENV: &str = "BOND_SIM_CONFIG";

/// Complete simulator configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimConfig {
    /// Vesting ledger settings.
    #[serde(default)]
    pub vesting: VestingConfig,
    /// Bond vault settings.
    #[serde(default)]
    pub vault: VaultConfig,
    /// Staking pool settings.
    #[serde(default)]
    pub staking: StakingSection,
    /// Token identifiers.
    #[serde(default)]
    pub tokens: TokenSection,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Staking pool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StakingSection {
    /// Asset classes registered at start-up.
    #[serde(default = "default_classes")]
    pub classes: Vec<ClassConfig>,
}

/// Token identifiers used by the engines.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenSection {
    /// Rebasing underlying deposited into the vault.
    #[serde(default = "default_underlying")]
    pub underlying: TokenId,
    /// Principal claim minted on deposit.
    #[serde(default = "default_deposit_token")]
    pub deposit_token: TokenId,
    /// Yield claim minted on deposit and staked for rewards.
    #[serde(default = "default_yield_token")]
    pub yield_token: TokenId,
    /// Escrowed governance token.
    #[serde(default = "default_escrow_token")]
    pub escrow_token: TokenId,
    /// Liquid governance token released by vesting.
    #[serde(default = "default_liquid_token")]
    pub liquid_token: TokenId,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset, e.g. "info" or "bond_vault=debug".
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default value functions

/// Class used by scenario steps that do not name one.
pub fn default_class() -> AssetClass {
    AssetClass::new("bonds")
}

fn default_classes() -> Vec<ClassConfig> {
    vec![ClassConfig {
        class: default_class(),
        staking_token: default_yield_token(),
        weight: 1,
    }]
}

fn default_underlying() -> TokenId {
    TokenId::new("stETH")
}

fn default_deposit_token() -> TokenId {
    TokenId::new("dToken")
}

fn default_yield_token() -> TokenId {
    TokenId::new("yToken")
}

fn default_escrow_token() -> TokenId {
    TokenId::new("esBND")
}

fn default_liquid_token() -> TokenId {
    TokenId::new("BND")
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for StakingSection {
    fn default() -> Self {
        Self {
            classes: default_classes(),
        }
    }
}

impl Default for TokenSection {
    fn default() -> Self {
        Self {
            underlying: default_underlying(),
            deposit_token: default_deposit_token(),
            yield_token: default_yield_token(),
            escrow_token: default_escrow_token(),
            liquid_token: default_liquid_token(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl SimConfig {
    /// Load configuration from `path`, or from [`CONFIG_ENV`] when no path
    /// is given.
    ///
    /// Falls back to defaults if neither names a file.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let path = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var(CONFIG_ENV).ok().map(PathBuf::from));
        match path {
            Some(path) => Self::from_file(&path),
            None => Ok(Self::default()),
        }
    }

    /// Parse a TOML config file.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse TOML text and validate the engine settings.
    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let config: SimConfig = toml::from_str(content)?;
        config.vault.validate()?;
        Ok(config)
    }
}
