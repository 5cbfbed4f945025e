use ::config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::models::BalanceSource;

/// Environment variable selecting the config profile ("production" = mainnet)
pub const ENV_VAR: &str = "ALERTBOT_ENV";

const ENV_PREFIX: &str = "ALERTBOT";

/// Exchange network the bot trades against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Network {
    Mainnet,
    #[default]
    Testnet,
}

impl Network {
    /// Directory name used under the export root
    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
        }
    }

    pub fn from_env_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "production" => Network::Mainnet,
            _ => Network::Testnet,
        }
    }
}

/// What to do when the trade log cannot be written after submission
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFailurePolicy {
    #[default]
    Warn,
    Fail,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    #[default]
    File,
    Redis,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OrderConfig {
    /// Fee rate applied to price * size
    pub limit_fee_rate: Decimal,
    /// Fraction the limit price is moved past the oracle price
    pub slippage: Decimal,
    /// Used when an alert carries no margin percentage
    pub default_margin_percentage: Option<Decimal>,
    pub balance_source: BalanceSource,
}

impl Default for OrderConfig {
    fn default() -> Self {
        Self {
            limit_fee_rate: dec!(0.0005),
            slippage: dec!(0.05),
            default_margin_percentage: None,
            balance_source: BalanceSource::Available,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub dir: PathBuf,
    pub file_name: String,
    /// Delay before the single status poll
    pub fill_poll_delay_ms: u64,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./data/exports"),
            file_name: "tradeHistoryApexpro.csv".to_string(),
            fill_poll_delay_ms: 2000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub path: PathBuf,
    pub redis_url: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::File,
            path: PathBuf::from("./data/strategies.json"),
            redis_url: "redis://127.0.0.1:6379".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ExchangeConfig {
    /// Overrides the network's default REST endpoint
    pub base_url: Option<String>,
    pub requests_per_minute: Option<u32>,
    /// Starting balance of the simulated account
    pub paper_balance: Option<Decimal>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct PipelineConfig {
    pub on_log_failure: LogFailurePolicy,
}

/// Application configuration, layered from files and environment
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    #[serde(skip)]
    pub network: Network,
    pub order: OrderConfig,
    pub export: ExportConfig,
    pub store: StoreConfig,
    pub exchange: ExchangeConfig,
    pub pipeline: PipelineConfig,
}

impl AppConfig {
    /// Load from `dir` using the profile named by `ALERTBOT_ENV` (default "development")
    pub fn load(dir: &Path) -> Result<Self, ConfigError> {
        let env_name = std::env::var(ENV_VAR).unwrap_or_else(|_| "development".to_string());
        Self::load_from(dir, &env_name)
    }

    /// Layers `default.*`, `{env_name}.*`, then `ALERTBOT__*` variables
    pub fn load_from(dir: &Path, env_name: &str) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name(&dir.join("default").to_string_lossy()).required(false))
            .add_source(File::with_name(&dir.join(env_name).to_string_lossy()).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?;

        let mut cfg: AppConfig = settings.try_deserialize()?;
        cfg.network = Network::from_env_name(env_name);
        cfg.validate()?;

        tracing::debug!("Loaded {} config from {:?}", cfg.network.as_str(), dir);

        Ok(cfg)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(pct) = self.order.default_margin_percentage {
            if pct <= Decimal::ZERO || pct > Decimal::ONE_HUNDRED {
                return Err(ConfigError::Message(format!(
                    "order.default_margin_percentage {} outside (0, 100]",
                    pct
                )));
            }
        }
        if self.order.limit_fee_rate < Decimal::ZERO {
            return Err(ConfigError::Message(
                "order.limit_fee_rate must not be negative".to_string(),
            ));
        }
        if self.order.slippage < Decimal::ZERO || self.order.slippage >= Decimal::ONE {
            return Err(ConfigError::Message(
                "order.slippage must be in [0, 1)".to_string(),
            ));
        }
        Ok(())
    }

    /// CSV audit trail location for the active network
    pub fn trade_history_path(&self) -> PathBuf {
        self.export
            .dir
            .join(self.network.as_str())
            .join(&self.export.file_name)
    }

    pub fn exchange_base_url(&self) -> String {
        self.exchange.base_url.clone().unwrap_or_else(|| {
            match self.network {
                Network::Mainnet => "https://pro.apex.exchange",
                Network::Testnet => "https://testnet.pro.apex.exchange",
            }
            .to_string()
        })
    }
}
