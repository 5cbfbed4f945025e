//! Error types for order building, exchange access, persistence and export

use rust_decimal::Decimal;
use thiserror::Error;

/// Errors raised while deriving order parameters
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OrderError {
    #[error("Market data error, symbol={0}")]
    MarketNotFound(String),

    #[error("Ticker data error, symbol={0}")]
    TickerUnavailable(String),

    #[error("Margin percentage {0} outside (0, 100]")]
    InvalidMarginPercentage(Decimal),

    #[error("Invalid market spec for {symbol}: {reason}")]
    InvalidMarketSpec { symbol: String, reason: String },

    #[error("Invalid strategy name {0:?}")]
    InvalidStrategy(String),
}

#[derive(Error, Debug)]
pub enum ExchangeError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("Order rejected: {0}")]
    Rejected(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store encoding error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Corrupt value at {path}: {value}")]
    Corrupt { path: String, value: String },

    #[error("Invalid strategy key {0:?}")]
    InvalidKey(String),
}

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Export I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Order poll failed: {0}")]
    Exchange(#[from] ExchangeError),

    #[error("Position update failed: {0}")]
    Store(#[from] StoreError),
}

/// Errors surfaced by the alert pipeline
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Order(#[from] OrderError),

    #[error(transparent)]
    Exchange(#[from] ExchangeError),

    #[error("Trade logging failed: {0}")]
    Export(#[from] ExportError),
}
