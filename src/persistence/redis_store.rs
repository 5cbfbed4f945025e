use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::str::FromStr;
use tokio::time::{timeout, Duration};

use super::{check_strategy, PositionStore, StoreResult};
use crate::error::StoreError;
use crate::models::StrategyPositionRecord;

// HINCRBYFLOAT works in long double; anything past this is float noise
const POSITION_DP: u32 = 12;

/// Redis persistence for strategy positions
///
/// One hash per strategy: `strategy:{name}` with fields `position` and
/// `isFirstOrder`. Fills are applied in a MULTI block with HINCRBYFLOAT, so
/// the increment is atomic even on the shared multiplexed connection.
pub struct RedisPositionStore {
    conn: ConnectionManager,
}

impl RedisPositionStore {
    /// Connect to Redis
    ///
    /// # Arguments
    /// * `redis_url` - Redis connection URL (e.g., "redis://127.0.0.1:6379")
    pub async fn new(redis_url: &str) -> StoreResult<Self> {
        let client = Client::open(redis_url)?;

        let conn = timeout(Duration::from_secs(5), ConnectionManager::new(client))
            .await
            .map_err(|_| {
                StoreError::Io(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    "Redis connection timeout after 5 seconds",
                ))
            })??;

        tracing::info!("Connected to Redis at {}", redis_url);

        Ok(Self { conn })
    }

    fn key(strategy: &str) -> String {
        format!("strategy:{}", strategy)
    }

    fn parse_position(key: &str, raw: &str) -> StoreResult<Decimal> {
        Decimal::from_str(raw)
            .or_else(|_| Decimal::from_scientific(raw))
            .map(|d| d.round_dp(POSITION_DP).normalize())
            .map_err(|_| StoreError::Corrupt {
                path: format!("{}/position", key),
                value: raw.to_string(),
            })
    }

    /// Delete a strategy's record
    pub async fn clear(&self, strategy: &str) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(Self::key(strategy)).await?;
        Ok(())
    }
}

#[async_trait]
impl PositionStore for RedisPositionStore {
    async fn get(&self, strategy: &str) -> StoreResult<Option<StrategyPositionRecord>> {
        check_strategy(strategy)?;
        let key = Self::key(strategy);
        let mut conn = self.conn.clone();
        let fields: HashMap<String, String> = conn.hgetall(&key).await?;

        if fields.is_empty() {
            return Ok(None);
        }

        let position = match fields.get("position") {
            Some(raw) => Self::parse_position(&key, raw)?,
            None => Decimal::ZERO,
        };
        let is_first_order = fields
            .get("isFirstOrder")
            .map(|v| v != "false")
            .unwrap_or(true);

        Ok(Some(StrategyPositionRecord {
            is_first_order,
            position,
        }))
    }

    async fn apply_fill(
        &self,
        strategy: &str,
        delta: Decimal,
    ) -> StoreResult<StrategyPositionRecord> {
        check_strategy(strategy)?;
        let key = Self::key(strategy);
        let mut conn = self.conn.clone();

        let (raw,): (String,) = redis::pipe()
            .atomic()
            .hset(&key, "isFirstOrder", "false")
            .ignore()
            .cmd("HINCRBYFLOAT")
            .arg(&key)
            .arg("position")
            .arg(delta.to_string())
            .query_async(&mut conn)
            .await?;

        let position = Self::parse_position(&key, &raw)?;
        tracing::debug!("Position for {} moved by {} to {}", strategy, delta, position);

        Ok(StrategyPositionRecord {
            is_first_order: false,
            position,
        })
    }
}
