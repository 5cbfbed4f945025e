use rust_decimal::Decimal;

use crate::config::OrderConfig;
use crate::error::OrderError;
use crate::execution::quantize::{format_size, quantize_down, resolution_digits, round_up};
use crate::models::{
    is_valid_strategy_name, AccountBalance, Alert, MarketSpec, OrderRequest, OrderSide,
    OrderType, Ticker, TimeInForce,
};

/// Rewrite a trailing "USD" to "USDC"; symbols already quoted in USDC pass through
pub fn normalize_symbol(market: &str) -> String {
    match market.strip_suffix("USD") {
        Some(base) => format!("{}USDC", base),
        None => market.to_string(),
    }
}

/// Derives a concrete exchange order from an alert
#[derive(Debug, Clone)]
pub struct OrderParameterBuilder {
    config: OrderConfig,
}

impl OrderParameterBuilder {
    pub fn new(config: OrderConfig) -> Self {
        Self { config }
    }

    /// Margin percentage that applies to `alert`, validated to (0, 100]
    ///
    /// Precedence: alert, then configured default, then 100.
    pub fn margin_percentage(&self, alert: &Alert) -> Result<Decimal, OrderError> {
        let pct = alert
            .margin_percentage
            .or(self.config.default_margin_percentage)
            .unwrap_or(Decimal::ONE_HUNDRED);

        if pct <= Decimal::ZERO || pct > Decimal::ONE_HUNDRED {
            return Err(OrderError::InvalidMarginPercentage(pct));
        }
        Ok(pct)
    }

    /// Slippage-adjusted limit price, before tick quantization
    pub fn limit_price(&self, side: OrderSide, oracle_price: Decimal) -> Decimal {
        match side {
            OrderSide::Buy => oracle_price * (Decimal::ONE + self.config.slippage),
            OrderSide::Sell => oracle_price * (Decimal::ONE - self.config.slippage),
        }
    }

    /// Build the order request
    ///
    /// `market` and `tickers` are the raw lookup results so that an empty
    /// lookup surfaces as `MarketNotFound` / `TickerUnavailable`.
    pub fn build(
        &self,
        alert: &Alert,
        market: Option<&MarketSpec>,
        tickers: &[Ticker],
        balance: AccountBalance,
        client_order_id: String,
        position_id: String,
    ) -> Result<OrderRequest, OrderError> {
        if !is_valid_strategy_name(&alert.strategy) {
            return Err(OrderError::InvalidStrategy(alert.strategy.clone()));
        }
        let symbol = normalize_symbol(&alert.market);

        let market = market.ok_or_else(|| {
            tracing::error!("Market data error, symbol={}", symbol);
            OrderError::MarketNotFound(symbol.clone())
        })?;
        validate_market(market)?;

        let ticker = tickers.first().ok_or_else(|| {
            tracing::error!("Ticker data error, symbol={}", market.cross_symbol_name);
            OrderError::TickerUnavailable(market.cross_symbol_name.clone())
        })?;

        let side = alert.side();
        let fraction = self.margin_percentage(alert)? / Decimal::ONE_HUNDRED;

        let raw_size = balance.available_amount * fraction;
        let size = format_size(raw_size, market.step_size);

        let price = quantize_down(self.limit_price(side, ticker.oracle_price), market.tick_size);

        // fee is charged on the quantized size, not the raw one
        let fee = self.config.limit_fee_rate * price * quantize_down(raw_size, market.step_size);
        let limit_fee = round_up(fee, resolution_digits(market.settle_currency_resolution));

        let request = OrderRequest {
            symbol,
            side,
            size,
            price: price.normalize().to_string(),
            limit_fee,
            client_order_id,
            position_id,
            time_in_force: TimeInForce::FillOrKill,
            order_type: OrderType::Market,
            reduce_only: false,
            trailing_percent: String::new(),
            trigger_price: String::new(),
        };

        tracing::info!(
            "Built {} order for {}: size={} price={} fee={} (oracle {}, balance {})",
            request.side,
            request.symbol,
            request.size,
            request.price,
            request.limit_fee,
            ticker.oracle_price,
            balance.available_amount
        );

        Ok(request)
    }
}

fn validate_market(market: &MarketSpec) -> Result<(), OrderError> {
    let reason = if market.step_size <= Decimal::ZERO {
        "step size must be positive"
    } else if market.tick_size <= Decimal::ZERO {
        "tick size must be positive"
    } else if market.settle_currency_resolution == 0 {
        "settle currency resolution must be positive"
    } else {
        return Ok(());
    };

    Err(OrderError::InvalidMarketSpec {
        symbol: market.symbol.clone(),
        reason: reason.to_string(),
    })
}
