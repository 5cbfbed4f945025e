use rust_decimal::Decimal;
use std::sync::Arc;

use crate::config::{AppConfig, LogFailurePolicy};
use crate::error::PipelineError;
use crate::exchange::Exchange;
use crate::execution::order_builder::{normalize_symbol, OrderParameterBuilder};
use crate::export::{RecordOutcome, TradeLogger};
use crate::models::{Alert, BalanceSource, OrderRequest, SubmittedOrder};
use crate::persistence::PositionStore;

/// Result of handling one alert
#[derive(Debug, Clone)]
pub struct AlertOutcome {
    pub request: OrderRequest,
    pub order: SubmittedOrder,
    /// `None` when logging failed and the policy is to warn
    pub record: Option<RecordOutcome>,
}

/// Alert -> order -> submission -> trade log, for a single alert at a time
pub struct AlertPipeline {
    exchange: Arc<dyn Exchange>,
    builder: OrderParameterBuilder,
    logger: TradeLogger,
    balance_source: BalanceSource,
    on_log_failure: LogFailurePolicy,
}

impl AlertPipeline {
    pub fn new(
        exchange: Arc<dyn Exchange>,
        builder: OrderParameterBuilder,
        logger: TradeLogger,
        balance_source: BalanceSource,
        on_log_failure: LogFailurePolicy,
    ) -> Self {
        Self {
            exchange,
            builder,
            logger,
            balance_source,
            on_log_failure,
        }
    }

    pub fn from_config(
        config: &AppConfig,
        exchange: Arc<dyn Exchange>,
        store: Arc<dyn PositionStore>,
    ) -> Self {
        let logger = TradeLogger::from_config(config, exchange.clone(), store);
        Self::new(
            exchange,
            OrderParameterBuilder::new(config.order.clone()),
            logger,
            config.order.balance_source,
            config.pipeline.on_log_failure,
        )
    }

    /// Fetch market data and account, then derive the order request
    ///
    /// Returns the request together with the margin percentage it was sized with.
    pub async fn prepare(&self, alert: &Alert) -> Result<(OrderRequest, Decimal), PipelineError> {
        let symbol = normalize_symbol(&alert.market);

        let market = self.exchange.market_spec(&symbol).await?;
        let tickers = match &market {
            Some(m) => self.exchange.tickers(&m.cross_symbol_name).await?,
            None => Vec::new(),
        };
        let account = self.exchange.account().await?;
        let balance = account.balance(self.balance_source);

        let margin = self.builder.margin_percentage(alert)?;
        let request = self.builder.build(
            alert,
            market.as_ref(),
            &tickers,
            balance,
            self.exchange.client_order_id(),
            account.position_id,
        )?;

        Ok((request, margin))
    }

    /// Handle one alert end to end
    pub async fn handle(&self, alert: &Alert) -> Result<AlertOutcome, PipelineError> {
        tracing::info!(
            "Alert from {}: {} {} (ref price {})",
            alert.strategy,
            alert.order,
            alert.market,
            alert.price
        );

        let (request, margin) = self.prepare(alert).await?;
        let order = self.exchange.submit_order(&request).await?;
        tracing::info!(
            "Submitted {} order {} on {}",
            self.exchange.name(),
            order.id,
            order.symbol
        );

        let record = match self
            .logger
            .record(&alert.strategy, &order, alert.price, margin, &request.size)
            .await
        {
            Ok(outcome) => Some(outcome),
            Err(e) if self.on_log_failure == LogFailurePolicy::Warn => {
                tracing::warn!("Trade log for order {} failed: {}", order.id, e);
                None
            }
            Err(e) => return Err(e.into()),
        };

        Ok(AlertOutcome {
            request,
            order,
            record,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Network, OrderConfig};
    use crate::error::{OrderError, StoreError};
    use crate::exchange::PaperExchange;
    use crate::models::{AccountSnapshot, MarketSpec, StrategyPositionRecord, Ticker};
    use crate::persistence::{JsonFileStore, StoreResult};
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use std::time::Duration;

    struct BrokenStore;

    #[async_trait]
    impl PositionStore for BrokenStore {
        async fn get(&self, _strategy: &str) -> StoreResult<Option<StrategyPositionRecord>> {
            Ok(None)
        }

        async fn apply_fill(
            &self,
            _strategy: &str,
            _delta: Decimal,
        ) -> StoreResult<StrategyPositionRecord> {
            Err(StoreError::Corrupt {
                path: "/x".to_string(),
                value: "broken".to_string(),
            })
        }
    }

    fn exchange(account: AccountSnapshot) -> Arc<PaperExchange> {
        Arc::new(PaperExchange::with_static_markets(
            vec![MarketSpec {
                symbol: "BTC-USDC".to_string(),
                cross_symbol_name: "BTCUSDC".to_string(),
                step_size: dec!(0.001),
                tick_size: dec!(1),
                settle_currency_resolution: 1_000_000,
            }],
            vec![Ticker {
                symbol: "BTCUSDC".to_string(),
                oracle_price: dec!(50000),
            }],
            account,
        ))
    }

    fn pipeline(
        dir: &std::path::Path,
        exchange: Arc<PaperExchange>,
        store: Arc<dyn PositionStore>,
        source: BalanceSource,
        policy: LogFailurePolicy,
    ) -> AlertPipeline {
        let logger = TradeLogger::new(
            exchange.clone(),
            store,
            dir,
            Network::Testnet,
            "trades.csv",
            Duration::ZERO,
        );
        AlertPipeline::new(
            exchange,
            OrderParameterBuilder::new(OrderConfig::default()),
            logger,
            source,
            policy,
        )
    }

    fn alert(market: &str) -> Alert {
        Alert {
            strategy: "trend".to_string(),
            market: market.to_string(),
            order: "buy".to_string(),
            price: dec!(50000),
            margin_percentage: Some(dec!(50)),
        }
    }

    #[tokio::test]
    async fn test_balance_source_is_respected() {
        let dir = tempfile::tempdir().unwrap();
        let account = AccountSnapshot {
            account_id: "acc".to_string(),
            position_id: "77".to_string(),
            available_amount: dec!(1),
            pool_available_amount: dec!(0.4),
            total_equity: dec!(3),
        };
        let store = Arc::new(JsonFileStore::new(dir.path().join("s.json")));

        let p = pipeline(
            dir.path(),
            exchange(account.clone()),
            store.clone(),
            BalanceSource::PoolAvailable,
            LogFailurePolicy::Fail,
        );
        let (request, margin) = p.prepare(&alert("BTCUSD")).await.unwrap();
        assert_eq!(request.size, "0.200");
        assert_eq!(request.position_id, "77");
        assert_eq!(margin, dec!(50));

        let p = pipeline(
            dir.path(),
            exchange(account),
            store,
            BalanceSource::TotalEquity,
            LogFailurePolicy::Fail,
        );
        let (request, _) = p.prepare(&alert("BTCUSD")).await.unwrap();
        assert_eq!(request.size, "1.500");
    }

    #[tokio::test]
    async fn test_unknown_market_aborts_before_submission() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(JsonFileStore::new(dir.path().join("s.json")));
        let p = pipeline(
            dir.path(),
            exchange(PaperExchange::funded_account(dec!(1))),
            store,
            BalanceSource::Available,
            LogFailurePolicy::Fail,
        );

        let result = p.handle(&alert("DOGEUSD")).await;
        assert!(matches!(
            result,
            Err(PipelineError::Order(OrderError::MarketNotFound(ref s))) if s == "DOGEUSDC"
        ));
    }

    #[tokio::test]
    async fn test_empty_strategy_aborts_before_submission() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(JsonFileStore::new(dir.path().join("s.json")));
        let p = pipeline(
            dir.path(),
            exchange(PaperExchange::funded_account(dec!(1))),
            store.clone(),
            BalanceSource::Available,
            LogFailurePolicy::Fail,
        );

        let mut blank = alert("BTCUSD");
        blank.strategy = String::new();
        let result = p.handle(&blank).await;

        assert!(matches!(
            result,
            Err(PipelineError::Order(OrderError::InvalidStrategy(ref s))) if s.is_empty()
        ));
        assert!(!dir.path().join("testnet").join("trades.csv").exists());
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn test_log_failure_warn_keeps_submission() {
        let dir = tempfile::tempdir().unwrap();
        let p = pipeline(
            dir.path(),
            exchange(PaperExchange::funded_account(dec!(1))),
            Arc::new(BrokenStore),
            BalanceSource::Available,
            LogFailurePolicy::Warn,
        );

        let outcome = p.handle(&alert("BTCUSD")).await.unwrap();
        assert!(outcome.record.is_none());
        assert_eq!(outcome.request.size, "0.500");
    }

    #[tokio::test]
    async fn test_log_failure_fail_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let p = pipeline(
            dir.path(),
            exchange(PaperExchange::funded_account(dec!(1))),
            Arc::new(BrokenStore),
            BalanceSource::Available,
            LogFailurePolicy::Fail,
        );

        let result = p.handle(&alert("BTCUSD")).await;
        assert!(matches!(result, Err(PipelineError::Export(_))));
    }
}
