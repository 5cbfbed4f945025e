//! Per-strategy position storage
//!
//! Every backend applies a fill as one atomic step per strategy key, so
//! concurrent alerts for the same strategy cannot lose updates.

pub mod file;
pub mod redis_store;

pub use file::JsonFileStore;
pub use redis_store::RedisPositionStore;

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::error::StoreError;
use crate::models::{is_valid_strategy_name, StrategyPositionRecord};

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[async_trait]
pub trait PositionStore: Send + Sync {
    /// Stored record, `None` if the strategy has never traded
    async fn get(&self, strategy: &str) -> StoreResult<Option<StrategyPositionRecord>>;

    /// Add `delta` to the stored position (absent = 0) and clear `isFirstOrder`
    async fn apply_fill(
        &self,
        strategy: &str,
        delta: Decimal,
    ) -> StoreResult<StrategyPositionRecord>;
}

/// Rejects names that cannot be stored under their own key
pub(crate) fn check_strategy(strategy: &str) -> StoreResult<()> {
    if is_valid_strategy_name(strategy) {
        Ok(())
    } else {
        Err(StoreError::InvalidKey(strategy.to_string()))
    }
}
