use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Incoming trading alert (webhook payload)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub strategy: String,
    pub market: String,
    /// "buy" or "sell"; anything other than "buy" is treated as a sell
    pub order: String,
    /// Price the signal was generated at
    pub price: Decimal,
    #[serde(default)]
    pub margin_percentage: Option<Decimal>,
}

impl Alert {
    pub fn side(&self) -> OrderSide {
        if self.order == "buy" {
            OrderSide::Buy
        } else {
            OrderSide::Sell
        }
    }
}

/// Strategy names key the position store; empty names and '/' are rejected
pub fn is_valid_strategy_name(name: &str) -> bool {
    !name.trim().is_empty() && !name.contains('/')
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "BUY",
            OrderSide::Sell => "SELL",
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimeInForce {
    GoodTilCancel,
    FillOrKill,
    ImmediateOrCancel,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    Limit,
    Market,
}

/// Perpetual contract metadata
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MarketSpec {
    pub symbol: String,
    pub cross_symbol_name: String,
    pub step_size: Decimal,
    pub tick_size: Decimal,
    /// Settle currency resolution, e.g. 1000000 for six decimals
    pub settle_currency_resolution: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Ticker {
    pub symbol: String,
    pub oracle_price: Decimal,
}

/// Balance the order size is derived from
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AccountBalance {
    pub available_amount: Decimal,
}

/// Which account figure is used as the sizing balance
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum BalanceSource {
    #[default]
    Available,
    PoolAvailable,
    TotalEquity,
}

/// Account figures as reported by the exchange
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AccountSnapshot {
    pub account_id: String,
    pub position_id: String,
    pub available_amount: Decimal,
    pub pool_available_amount: Decimal,
    pub total_equity: Decimal,
}

impl AccountSnapshot {
    pub fn balance(&self, source: BalanceSource) -> AccountBalance {
        let available_amount = match source {
            BalanceSource::Available => self.available_amount,
            BalanceSource::PoolAvailable => self.pool_available_amount,
            BalanceSource::TotalEquity => self.total_equity,
        };
        AccountBalance { available_amount }
    }
}

/// Order payload handed to the exchange
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    pub symbol: String,
    pub side: OrderSide,
    pub size: String,
    pub price: String,
    pub limit_fee: String,
    pub client_order_id: String,
    pub position_id: String,
    pub time_in_force: TimeInForce,
    #[serde(rename = "type")]
    pub order_type: OrderType,
    pub reduce_only: bool,
    pub trailing_percent: String,
    pub trigger_price: String,
}

/// Exchange acknowledgement of a submitted order
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedOrder {
    pub id: String,
    pub client_order_id: String,
    pub symbol: String,
    pub side: OrderSide,
    pub size: Decimal,
    pub price: Decimal,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    Open,
    Filled,
    Canceled,
    Expired,
    Untriggered,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Open => "OPEN",
            OrderStatus::Filled => "FILLED",
            OrderStatus::Canceled => "CANCELED",
            OrderStatus::Expired => "EXPIRED",
            OrderStatus::Untriggered => "UNTRIGGERED",
        }
    }

    /// Whether the order can still change state
    pub fn is_working(&self) -> bool {
        matches!(
            self,
            OrderStatus::Pending | OrderStatus::Open | OrderStatus::Untriggered
        )
    }
}

/// Order as returned by a status poll
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderRecord {
    pub id: String,
    pub account_id: String,
    pub symbol: String,
    pub side: OrderSide,
    pub size: Decimal,
    pub status: OrderStatus,
    pub latest_match_fill_price: Option<Decimal>,
    pub created_at: DateTime<Utc>,
}

/// Persisted per-strategy state
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StrategyPositionRecord {
    pub is_first_order: bool,
    pub position: Decimal,
}

impl Default for StrategyPositionRecord {
    fn default() -> Self {
        Self {
            is_first_order: true,
            position: Decimal::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_alert_from_webhook_json() {
        let json = r#"{"strategy":"trend","market":"BTCUSD","order":"buy","price":50000.5,"marginPercentage":50}"#;
        let alert: Alert = serde_json::from_str(json).unwrap();

        assert_eq!(alert.market, "BTCUSD");
        assert_eq!(alert.price, dec!(50000.5));
        assert_eq!(alert.margin_percentage, Some(dec!(50)));
        assert_eq!(alert.side(), OrderSide::Buy);
    }

    #[test]
    fn test_alert_without_margin() {
        let json = r#"{"strategy":"trend","market":"ETHUSDC","order":"sell","price":"3000"}"#;
        let alert: Alert = serde_json::from_str(json).unwrap();

        assert_eq!(alert.margin_percentage, None);
        assert_eq!(alert.side(), OrderSide::Sell);
    }

    #[test]
    fn test_unknown_direction_is_sell() {
        let alert = Alert {
            strategy: "s".to_string(),
            market: "BTCUSDC".to_string(),
            order: "close".to_string(),
            price: dec!(1),
            margin_percentage: None,
        };
        assert_eq!(alert.side(), OrderSide::Sell);
    }

    #[test]
    fn test_balance_source_selection() {
        let snapshot = AccountSnapshot {
            account_id: "acc".to_string(),
            position_id: "pos".to_string(),
            available_amount: dec!(100),
            pool_available_amount: dec!(80),
            total_equity: dec!(150),
        };

        assert_eq!(snapshot.balance(BalanceSource::Available).available_amount, dec!(100));
        assert_eq!(snapshot.balance(BalanceSource::PoolAvailable).available_amount, dec!(80));
        assert_eq!(snapshot.balance(BalanceSource::TotalEquity).available_amount, dec!(150));
    }

    #[test]
    fn test_order_request_wire_names() {
        let request = OrderRequest {
            symbol: "BTC-USDC".to_string(),
            side: OrderSide::Buy,
            size: "0.500".to_string(),
            price: "52500".to_string(),
            limit_fee: "13.125000".to_string(),
            client_order_id: "abc".to_string(),
            position_id: "1".to_string(),
            time_in_force: TimeInForce::FillOrKill,
            order_type: OrderType::Market,
            reduce_only: false,
            trailing_percent: String::new(),
            trigger_price: String::new(),
        };

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["side"], "BUY");
        assert_eq!(value["timeInForce"], "FILL_OR_KILL");
        assert_eq!(value["type"], "MARKET");
        assert_eq!(value["limitFee"], "13.125000");
    }

    #[test]
    fn test_strategy_name_validation() {
        assert!(is_valid_strategy_name("trend"));
        assert!(is_valid_strategy_name("BTC trend v2"));
        assert!(!is_valid_strategy_name(""));
        assert!(!is_valid_strategy_name("  "));
        assert!(!is_valid_strategy_name("trend/position"));
    }

    #[test]
    fn test_working_statuses() {
        assert!(OrderStatus::Pending.is_working());
        assert!(OrderStatus::Open.is_working());
        assert!(!OrderStatus::Filled.is_working());
        assert!(!OrderStatus::Canceled.is_working());
    }
}
