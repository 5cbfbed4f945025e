// Core modules
pub mod api;
pub mod config;
pub mod error;
pub mod exchange;
pub mod execution;
pub mod export;
pub mod models;
pub mod persistence;

// Re-export commonly used types
pub use crate::config::AppConfig;
pub use error::{ExchangeError, ExportError, OrderError, PipelineError, StoreError};
pub use execution::{AlertPipeline, OrderParameterBuilder};
pub use export::TradeLogger;
pub use models::*;
