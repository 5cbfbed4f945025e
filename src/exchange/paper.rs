use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{Exchange, ExchangeResult, MarketData};
use crate::error::ExchangeError;
use crate::models::{
    AccountSnapshot, MarketSpec, OrderRecord, OrderRequest, OrderSide, OrderStatus,
    SubmittedOrder, Ticker, TimeInForce,
};

/// Fixed market data, for offline runs and tests
#[derive(Debug, Clone, Default)]
pub struct StaticMarketData {
    markets: Vec<MarketSpec>,
    tickers: Vec<Ticker>,
}

impl StaticMarketData {
    pub fn new(markets: Vec<MarketSpec>, tickers: Vec<Ticker>) -> Self {
        Self { markets, tickers }
    }
}

#[async_trait]
impl MarketData for StaticMarketData {
    async fn market_spec(&self, symbol: &str) -> ExchangeResult<Option<MarketSpec>> {
        Ok(self
            .markets
            .iter()
            .find(|m| m.symbol == symbol || m.cross_symbol_name == symbol)
            .cloned())
    }

    async fn tickers(&self, symbol: &str) -> ExchangeResult<Vec<Ticker>> {
        Ok(self
            .tickers
            .iter()
            .filter(|t| t.symbol == symbol)
            .cloned()
            .collect())
    }
}

/// How the simulated venue treats incoming orders
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FillMode {
    /// Fill when the limit crosses the oracle price, otherwise kill
    #[default]
    Cross,
    /// Leave every order pending
    Hold,
}

#[derive(Debug)]
struct PaperState {
    account: AccountSnapshot,
    orders: HashMap<String, OrderRecord>,
}

/// Simulated exchange over real or static market data
///
/// Orders never leave the process. FILL_OR_KILL orders fill in full at the
/// oracle price when their limit crosses it.
pub struct PaperExchange {
    market_data: Arc<dyn MarketData>,
    state: Mutex<PaperState>,
    fill_mode: FillMode,
}

impl PaperExchange {
    pub fn new(market_data: Arc<dyn MarketData>, account: AccountSnapshot) -> Self {
        Self {
            market_data,
            state: Mutex::new(PaperState {
                account,
                orders: HashMap::new(),
            }),
            fill_mode: FillMode::Cross,
        }
    }

    pub fn with_static_markets(
        markets: Vec<MarketSpec>,
        tickers: Vec<Ticker>,
        account: AccountSnapshot,
    ) -> Self {
        Self::new(Arc::new(StaticMarketData::new(markets, tickers)), account)
    }

    /// Simulated account holding `balance` in every balance figure
    pub fn funded_account(balance: Decimal) -> AccountSnapshot {
        AccountSnapshot {
            account_id: "paper".to_string(),
            position_id: "0".to_string(),
            available_amount: balance,
            pool_available_amount: balance,
            total_equity: balance,
        }
    }

    pub fn with_fill_mode(mut self, fill_mode: FillMode) -> Self {
        self.fill_mode = fill_mode;
        self
    }

    fn parse_decimal(field: &str, value: &str) -> ExchangeResult<Decimal> {
        value
            .parse::<Decimal>()
            .map_err(|_| ExchangeError::Rejected(format!("invalid {} '{}'", field, value)))
    }

    fn crosses(side: OrderSide, limit: Decimal, oracle: Decimal) -> bool {
        match side {
            OrderSide::Buy => limit >= oracle,
            OrderSide::Sell => limit <= oracle,
        }
    }
}

#[async_trait]
impl MarketData for PaperExchange {
    async fn market_spec(&self, symbol: &str) -> ExchangeResult<Option<MarketSpec>> {
        self.market_data.market_spec(symbol).await
    }

    async fn tickers(&self, symbol: &str) -> ExchangeResult<Vec<Ticker>> {
        self.market_data.tickers(symbol).await
    }
}

#[async_trait]
impl Exchange for PaperExchange {
    async fn account(&self) -> ExchangeResult<AccountSnapshot> {
        Ok(self.state.lock().await.account.clone())
    }

    async fn get_order(&self, order_id: &str) -> ExchangeResult<Option<OrderRecord>> {
        Ok(self.state.lock().await.orders.get(order_id).cloned())
    }

    async fn submit_order(&self, request: &OrderRequest) -> ExchangeResult<SubmittedOrder> {
        let size = Self::parse_decimal("size", &request.size)?;
        let price = Self::parse_decimal("price", &request.price)?;
        let fee = Self::parse_decimal("limitFee", &request.limit_fee)?;

        if size <= Decimal::ZERO {
            return Err(ExchangeError::Rejected(format!(
                "size {} must be positive",
                request.size
            )));
        }

        let market = self
            .market_data
            .market_spec(&request.symbol)
            .await?
            .ok_or_else(|| ExchangeError::Rejected(format!("unknown symbol {}", request.symbol)))?;
        let oracle = self
            .market_data
            .tickers(&market.cross_symbol_name)
            .await?
            .first()
            .map(|t| t.oracle_price);

        let (status, fill_price) = match (self.fill_mode, request.time_in_force, oracle) {
            (FillMode::Hold, _, _) => (OrderStatus::Pending, None),
            (_, TimeInForce::FillOrKill, Some(oracle))
                if Self::crosses(request.side, price, oracle) =>
            {
                (OrderStatus::Filled, Some(oracle))
            }
            (_, TimeInForce::FillOrKill, _) => (OrderStatus::Canceled, None),
            _ => (OrderStatus::Open, None),
        };

        let mut state = self.state.lock().await;
        if status == OrderStatus::Filled {
            state.account.available_amount -= fee;
            state.account.pool_available_amount -= fee;
            state.account.total_equity -= fee;
        }

        let id = Uuid::new_v4().to_string();
        let record = OrderRecord {
            id: id.clone(),
            account_id: state.account.account_id.clone(),
            symbol: market.symbol.clone(),
            side: request.side,
            size,
            status,
            latest_match_fill_price: fill_price,
            created_at: Utc::now(),
        };
        state.orders.insert(id.clone(), record);

        tracing::info!(
            "Paper order {} {} {} {} @ {} -> {}",
            id,
            request.side,
            size,
            market.symbol,
            price,
            status.as_str()
        );

        Ok(SubmittedOrder {
            id,
            client_order_id: request.client_order_id.clone(),
            symbol: request.symbol.clone(),
            side: request.side,
            size,
            price,
        })
    }

    fn name(&self) -> &str {
        "paper"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OrderType;
    use rust_decimal_macros::dec;

    fn market() -> MarketSpec {
        MarketSpec {
            symbol: "BTC-USDC".to_string(),
            cross_symbol_name: "BTCUSDC".to_string(),
            step_size: dec!(0.001),
            tick_size: dec!(1),
            settle_currency_resolution: 1_000_000,
        }
    }

    fn exchange() -> PaperExchange {
        PaperExchange::with_static_markets(
            vec![market()],
            vec![Ticker {
                symbol: "BTCUSDC".to_string(),
                oracle_price: dec!(50000),
            }],
            PaperExchange::funded_account(dec!(1000)),
        )
    }

    fn request(side: OrderSide, price: &str) -> OrderRequest {
        OrderRequest {
            symbol: "BTCUSDC".to_string(),
            side,
            size: "0.500".to_string(),
            price: price.to_string(),
            limit_fee: "13.125000".to_string(),
            client_order_id: "c1".to_string(),
            position_id: "0".to_string(),
            time_in_force: TimeInForce::FillOrKill,
            order_type: OrderType::Market,
            reduce_only: false,
            trailing_percent: String::new(),
            trigger_price: String::new(),
        }
    }

    #[tokio::test]
    async fn test_lookup_by_either_symbol_form() {
        let ex = exchange();
        assert!(ex.market_spec("BTCUSDC").await.unwrap().is_some());
        assert!(ex.market_spec("BTC-USDC").await.unwrap().is_some());
        assert!(ex.market_spec("ETHUSDC").await.unwrap().is_none());
        assert!(ex.tickers("ETHUSDC").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_crossing_buy_fills_at_oracle() {
        let ex = exchange();
        let ack = ex.submit_order(&request(OrderSide::Buy, "52500")).await.unwrap();

        let order = ex.get_order(&ack.id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Filled);
        assert_eq!(order.latest_match_fill_price, Some(dec!(50000)));
        assert_eq!(order.size, dec!(0.5));
        assert_eq!(order.account_id, "paper");

        let account = ex.account().await.unwrap();
        assert_eq!(account.available_amount, dec!(986.875));
    }

    #[tokio::test]
    async fn test_non_crossing_fok_is_canceled() {
        let ex = exchange();
        let ack = ex.submit_order(&request(OrderSide::Sell, "52500")).await.unwrap();

        let order = ex.get_order(&ack.id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Canceled);
        assert_eq!(order.latest_match_fill_price, None);
        assert_eq!(ex.account().await.unwrap().available_amount, dec!(1000));
    }

    #[tokio::test]
    async fn test_hold_mode_leaves_orders_pending() {
        let ex = exchange().with_fill_mode(FillMode::Hold);
        let ack = ex.submit_order(&request(OrderSide::Buy, "52500")).await.unwrap();

        let order = ex.get_order(&ack.id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn test_rejects_zero_size_and_unknown_symbol() {
        let ex = exchange();

        let mut zero = request(OrderSide::Buy, "52500");
        zero.size = "0.000".to_string();
        assert!(matches!(ex.submit_order(&zero).await, Err(ExchangeError::Rejected(_))));

        let mut unknown = request(OrderSide::Buy, "52500");
        unknown.symbol = "DOGEUSDC".to_string();
        assert!(matches!(ex.submit_order(&unknown).await, Err(ExchangeError::Rejected(_))));
    }

    #[tokio::test]
    async fn test_unknown_order_is_none() {
        let ex = exchange();
        assert!(ex.get_order("missing").await.unwrap().is_none());
    }
}
