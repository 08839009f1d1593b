//! Application configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use alloy::primitives::Address;
use hlx_basket::{check_slippage_bps, BasketConfig, BasketManagerConfig};
use hlx_core::{AssetInfo, AssetTable};
use hlx_executor::{KeySource, MAINNET_API_URL, TESTNET_API_URL};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

/// Env var consulted when `--config` is not given.
pub const CONFIG_ENV_VAR: &str = "HLX_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub signing: SigningConfig,
    /// Symbol -> asset index table shared with the exchange.
    #[serde(default)]
    pub assets: Vec<AssetInfo>,
    #[serde(default)]
    pub basket: BasketDefaults,
    /// Baskets registered when `run` starts.
    #[serde(default)]
    pub baskets: Vec<BasketSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Selects the signature source and the default API URL.
    #[serde(default)]
    pub is_mainnet: bool,
    /// Overrides the default API URL for the network.
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            is_mainnet: false,
            base_url: None,
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl NetworkConfig {
    pub fn api_url(&self) -> &str {
        match &self.base_url {
            Some(url) => url,
            None if self.is_mainnet => MAINNET_API_URL,
            None => TESTNET_API_URL,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SigningConfig {
    /// Env var holding the hex private key. Ignored when `key_file` is set.
    #[serde(default = "default_key_env")]
    pub key_env: String,
    #[serde(default)]
    pub key_file: Option<PathBuf>,
    /// Refuse to start unless the key derives this address.
    #[serde(default)]
    pub expected_address: Option<String>,
    /// Trade on behalf of this vault / sub-account.
    #[serde(default)]
    pub vault_address: Option<String>,
    /// Signature validity window; unset means no expiry.
    #[serde(default)]
    pub expires_after_ms: Option<u64>,
}

fn default_key_env() -> String {
    "HLX_PRIVATE_KEY".to_string()
}

impl Default for SigningConfig {
    fn default() -> Self {
        Self {
            key_env: default_key_env(),
            key_file: None,
            expected_address: None,
            vault_address: None,
            expires_after_ms: None,
        }
    }
}

impl SigningConfig {
    pub fn key_source(&self) -> KeySource {
        match &self.key_file {
            Some(path) => KeySource::File { path: path.clone() },
            None => KeySource::EnvVar {
                var_name: self.key_env.clone(),
            },
        }
    }

    pub fn expected_address(&self) -> AppResult<Option<Address>> {
        parse_address("expected_address", self.expected_address.as_deref())
    }

    pub fn vault_address(&self) -> AppResult<Option<Address>> {
        parse_address("vault_address", self.vault_address.as_deref())
    }
}

fn parse_address(field: &str, value: Option<&str>) -> AppResult<Option<Address>> {
    value
        .map(|s| {
            s.trim()
                .parse::<Address>()
                .map_err(|e| AppError::Config(format!("invalid {field} {s:?}: {e}")))
        })
        .transpose()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BasketDefaults {
    #[serde(default = "default_slippage_bps")]
    pub slippage_bps: u32,
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    #[serde(default = "default_closed_history")]
    pub closed_history: usize,
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
    /// How long `run` waits for in-flight exits after input ends.
    #[serde(default = "default_drain_timeout_ms")]
    pub drain_timeout_ms: u64,
}

fn default_slippage_bps() -> u32 {
    hlx_basket::DEFAULT_SLIPPAGE_BPS
}

fn default_channel_capacity() -> usize {
    1024
}

fn default_closed_history() -> usize {
    256
}

fn default_event_capacity() -> usize {
    256
}

fn default_drain_timeout_ms() -> u64 {
    5_000
}

impl Default for BasketDefaults {
    fn default() -> Self {
        Self {
            slippage_bps: default_slippage_bps(),
            channel_capacity: default_channel_capacity(),
            closed_history: default_closed_history(),
            event_capacity: default_event_capacity(),
            drain_timeout_ms: default_drain_timeout_ms(),
        }
    }
}

impl From<&BasketDefaults> for BasketManagerConfig {
    fn from(cfg: &BasketDefaults) -> Self {
        Self {
            slippage_bps: cfg.slippage_bps,
            channel_capacity: cfg.channel_capacity,
            closed_history: cfg.closed_history,
            event_capacity: cfg.event_capacity,
        }
    }
}

/// A basket declared in the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BasketSpec {
    #[serde(flatten)]
    pub config: BasketConfig,
    /// Submit the entry leg on start. When false the position is assumed
    /// to exist already and the basket only guards it.
    #[serde(default)]
    pub submit_entry: bool,
}

impl AppConfig {
    /// Config path: CLI argument, then `HLX_CONFIG`, then the default.
    pub fn resolve_path(cli: Option<String>) -> String {
        cli.or_else(|| std::env::var(CONFIG_ENV_VAR).ok())
            .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string())
    }

    /// Load from a specific file.
    pub fn from_file(path: impl AsRef<Path>) -> AppResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> AppResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Cross-field checks that serde cannot express.
    pub fn validate(&self) -> AppResult<()> {
        self.asset_table()?;
        self.signing.expected_address()?;
        self.signing.vault_address()?;
        if self.network.request_timeout_ms == 0 {
            return Err(AppError::Config("network.request_timeout_ms must be > 0".into()));
        }
        if self.basket.channel_capacity == 0 || self.basket.event_capacity == 0 {
            return Err(AppError::Config(
                "basket channel and event capacities must be > 0".into(),
            ));
        }
        check_slippage_bps(self.basket.slippage_bps)
            .map_err(|e| AppError::Config(format!("basket.{e}")))?;
        for spec in &self.baskets {
            if let Some(bps) = spec.config.slippage_bps {
                check_slippage_bps(bps).map_err(|e| {
                    AppError::Config(format!("basket for {}: {e}", spec.config.symbol))
                })?;
            }
        }
        Ok(())
    }

    pub fn asset_table(&self) -> AppResult<AssetTable> {
        Ok(AssetTable::from_assets(self.assets.iter().cloned())?)
    }

    pub fn manager_config(&self) -> BasketManagerConfig {
        BasketManagerConfig::from(&self.basket)
    }
}
