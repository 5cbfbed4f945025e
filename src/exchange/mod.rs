//! Exchange collaborator boundary
//!
//! The pipeline only talks to an exchange through these traits. `MarketData`
//! covers the public read-only endpoints; `Exchange` adds account and order
//! operations on top.

pub mod paper;

pub use paper::PaperExchange;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::ExchangeError;
use crate::models::{AccountSnapshot, MarketSpec, OrderRecord, OrderRequest, SubmittedOrder, Ticker};

pub type ExchangeResult<T> = std::result::Result<T, ExchangeError>;

#[async_trait]
pub trait MarketData: Send + Sync {
    /// Contract metadata for a symbol such as "BTCUSDC" or "BTC-USDC"
    async fn market_spec(&self, symbol: &str) -> ExchangeResult<Option<MarketSpec>>;

    /// Latest ticker snapshots; empty when the exchange has none
    async fn tickers(&self, symbol: &str) -> ExchangeResult<Vec<Ticker>>;
}

#[async_trait]
pub trait Exchange: MarketData {
    async fn account(&self) -> ExchangeResult<AccountSnapshot>;

    /// `None` when the exchange does not know the order
    async fn get_order(&self, order_id: &str) -> ExchangeResult<Option<OrderRecord>>;

    async fn submit_order(&self, request: &OrderRequest) -> ExchangeResult<SubmittedOrder>;

    /// Fresh client order id for idempotent submission
    fn client_order_id(&self) -> String {
        Uuid::new_v4().simple().to_string()
    }

    fn name(&self) -> &str {
        "exchange"
    }
}
