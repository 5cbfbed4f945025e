use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::num::NonZeroU32;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::ExchangeError;
use crate::exchange::{ExchangeResult, MarketData};
use crate::models::{MarketSpec, Ticker};

const DEFAULT_RATE_LIMIT_RPM: u32 = 120;

type ApexRateLimiter = RateLimiter<
    governor::state::direct::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

// ============== Response Types ==============

#[derive(Debug, Deserialize)]
struct ApexResponse<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SymbolsData {
    #[serde(default)]
    usdc_config: Option<ContractConfig>,
    #[serde(default)]
    usdt_config: Option<ContractConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContractConfig {
    #[serde(default)]
    currency: Vec<CurrencyRaw>,
    #[serde(default)]
    perpetual_contract: Vec<PerpetualContractRaw>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CurrencyRaw {
    id: String,
    stark_ex_resolution: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PerpetualContractRaw {
    symbol: String,
    cross_symbol_name: String,
    settle_currency_id: String,
    step_size: Decimal,
    tick_size: Decimal,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TickerRaw {
    symbol: String,
    oracle_price: Decimal,
}

// ============== Implementation ==============

/// Read-only client for the ApeX Pro public REST API
///
/// Symbol configs are fetched once and cached; tickers are fetched per call.
/// Requests are rate limited and never retried.
#[derive(Clone)]
pub struct ApexPublicClient {
    client: Client,
    base_url: String,
    contracts: Arc<RwLock<Option<ContractConfig>>>,
    rate_limiter: Arc<ApexRateLimiter>,
}

impl ApexPublicClient {
    pub fn new(
        base_url: impl Into<String>,
        requests_per_minute: Option<u32>,
    ) -> ExchangeResult<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()?;

        let rpm = requests_per_minute.unwrap_or(DEFAULT_RATE_LIMIT_RPM);
        let quota = NonZeroU32::new(rpm).map(Quota::per_minute).ok_or_else(|| {
            ExchangeError::Unsupported("requests_per_minute must be positive".to_string())
        })?;
        let rate_limiter = Arc::new(RateLimiter::direct(quota));

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            contracts: Arc::new(RwLock::new(None)),
            rate_limiter,
        })
    }

    async fn get<T: for<'de> Deserialize<'de>>(&self, path: &str) -> ExchangeResult<T> {
        self.rate_limiter.until_ready().await;

        let url = format!("{}{}", self.base_url, path);
        tracing::debug!("GET {}", url);

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ExchangeError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: ApexResponse<T> = response
            .json()
            .await
            .map_err(|e| ExchangeError::Malformed(format!("{}: {}", path, e)))?;
        Ok(body.data)
    }

    async fn load_contracts(&self) -> ExchangeResult<ContractConfig> {
        if let Some(cached) = self.contracts.read().await.as_ref() {
            return Ok(cached.clone());
        }

        tracing::info!("Loading ApeX symbol configs from {}", self.base_url);
        let data: SymbolsData = self.get("/api/v2/symbols").await?;

        let mut merged = ContractConfig::default();
        for config in [data.usdc_config, data.usdt_config].into_iter().flatten() {
            merged.currency.extend(config.currency);
            merged.perpetual_contract.extend(config.perpetual_contract);
        }
        tracing::info!(
            "Loaded {} perpetual contracts, {} currencies",
            merged.perpetual_contract.len(),
            merged.currency.len()
        );

        *self.contracts.write().await = Some(merged.clone());
        Ok(merged)
    }
}

fn to_market_spec(
    contract: &PerpetualContractRaw,
    currencies: &[CurrencyRaw],
) -> ExchangeResult<MarketSpec> {
    let currency = currencies
        .iter()
        .find(|c| c.id == contract.settle_currency_id)
        .ok_or_else(|| {
            ExchangeError::Malformed(format!(
                "settle currency {} missing for {}",
                contract.settle_currency_id, contract.symbol
            ))
        })?;

    let resolution: u64 = currency.stark_ex_resolution.parse().map_err(|_| {
        ExchangeError::Malformed(format!(
            "bad resolution '{}' for {}",
            currency.stark_ex_resolution, currency.id
        ))
    })?;

    Ok(MarketSpec {
        symbol: contract.symbol.clone(),
        cross_symbol_name: contract.cross_symbol_name.clone(),
        step_size: contract.step_size,
        tick_size: contract.tick_size,
        settle_currency_resolution: resolution,
    })
}

#[async_trait]
impl MarketData for ApexPublicClient {
    async fn market_spec(&self, symbol: &str) -> ExchangeResult<Option<MarketSpec>> {
        let contracts = self.load_contracts().await?;

        contracts
            .perpetual_contract
            .iter()
            .find(|c| c.cross_symbol_name == symbol || c.symbol == symbol)
            .map(|c| to_market_spec(c, &contracts.currency))
            .transpose()
    }

    async fn tickers(&self, symbol: &str) -> ExchangeResult<Vec<Ticker>> {
        let raw: Vec<TickerRaw> = self.get(&format!("/api/v2/ticker?symbol={}", symbol)).await?;

        Ok(raw
            .into_iter()
            .map(|t| Ticker {
                symbol: t.symbol,
                oracle_price: t.oracle_price,
            })
            .collect())
    }
}
