use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tokio::sync::Mutex;

use super::{check_strategy, PositionStore, StoreResult};
use crate::error::StoreError;
use crate::models::StrategyPositionRecord;

/// Path-addressable JSON document on disk
///
/// Layout: `{ "<strategy>": { "isFirstOrder": bool, "position": "<decimal>" } }`.
/// Values are addressed as `/<strategy>/position`; each strategy is a single
/// top-level key. Older files holding numbers or "true"/"false" strings are
/// read as well.
pub struct JsonFileStore {
    path: PathBuf,
    // held across every read-modify-write
    lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load_root(&self) -> StoreResult<Value> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(text) if text.trim().is_empty() => Ok(Value::Object(Map::new())),
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Value::Object(Map::new())),
            Err(e) => Err(e.into()),
        }
    }

    async fn save_root(&self, root: &Value) -> StoreResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let text = serde_json::to_string_pretty(root)?;
        tokio::fs::write(&self.path, text).await?;
        Ok(())
    }

    /// Read the value at `/a/b/...`, `None` when any segment is missing
    pub async fn get_data(&self, path: &str) -> StoreResult<Option<Value>> {
        let _guard = self.lock.lock().await;
        let root = self.load_root().await?;
        Ok(lookup(&root, path).cloned())
    }

    /// Set the value at `/a/b/...`, creating intermediate objects
    pub async fn push(&self, path: &str, value: Value) -> StoreResult<()> {
        let _guard = self.lock.lock().await;
        let mut root = self.load_root().await?;
        set_path(&mut root, path, value);
        self.save_root(&root).await
    }
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

fn lookup<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    segments(path).try_fold(root, |node, key| node.get(key))
}

fn set_path(root: &mut Value, path: &str, value: Value) {
    let keys: Vec<&str> = segments(path).collect();
    let Some((last, parents)) = keys.split_last() else {
        *root = value;
        return;
    };

    let mut node = root;
    for key in parents {
        if !node.is_object() {
            *node = Value::Object(Map::new());
        }
        node = match node {
            Value::Object(map) => map
                .entry(key.to_string())
                .or_insert_with(|| Value::Object(Map::new())),
            _ => return,
        };
    }
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    if let Value::Object(map) = node {
        map.insert(last.to_string(), value);
    }
}

fn parse_position(path: &str, value: &Value) -> StoreResult<Decimal> {
    let corrupt = || StoreError::Corrupt {
        path: path.to_string(),
        value: value.to_string(),
    };
    match value {
        Value::Null => Ok(Decimal::ZERO),
        Value::String(s) => Decimal::from_str(s).map_err(|_| corrupt()),
        Value::Number(n) => Decimal::from_str(&n.to_string())
            .or_else(|_| Decimal::from_scientific(&n.to_string()))
            .map_err(|_| corrupt()),
        _ => Err(corrupt()),
    }
}

fn parse_flag(path: &str, value: &Value) -> StoreResult<bool> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::String(s) if s == "true" => Ok(true),
        Value::String(s) if s == "false" => Ok(false),
        _ => Err(StoreError::Corrupt {
            path: path.to_string(),
            value: value.to_string(),
        }),
    }
}

fn read_record(root: &Value, strategy: &str) -> StoreResult<Option<StrategyPositionRecord>> {
    let Some(entry) = root.get(strategy) else {
        return Ok(None);
    };

    let position_path = format!("/{}/position", strategy);
    let flag_path = format!("/{}/isFirstOrder", strategy);

    let position = match entry.get("position") {
        Some(v) => parse_position(&position_path, v)?,
        None => Decimal::ZERO,
    };
    let is_first_order = match entry.get("isFirstOrder") {
        Some(v) => parse_flag(&flag_path, v)?,
        None => true,
    };

    Ok(Some(StrategyPositionRecord {
        is_first_order,
        position,
    }))
}

#[async_trait]
impl PositionStore for JsonFileStore {
    async fn get(&self, strategy: &str) -> StoreResult<Option<StrategyPositionRecord>> {
        check_strategy(strategy)?;
        let _guard = self.lock.lock().await;
        let root = self.load_root().await?;
        read_record(&root, strategy)
    }

    async fn apply_fill(
        &self,
        strategy: &str,
        delta: Decimal,
    ) -> StoreResult<StrategyPositionRecord> {
        check_strategy(strategy)?;
        let _guard = self.lock.lock().await;
        let mut root = self.load_root().await?;

        let stored = read_record(&root, strategy)?.unwrap_or_default();
        let record = StrategyPositionRecord {
            is_first_order: false,
            position: stored.position + delta,
        };

        if !root.is_object() {
            root = Value::Object(Map::new());
        }
        if let Value::Object(strategies) = &mut root {
            let mut entry = Map::new();
            entry.insert("isFirstOrder".to_string(), Value::Bool(false));
            entry.insert(
                "position".to_string(),
                Value::String(record.position.normalize().to_string()),
            );
            strategies.insert(strategy.to_string(), Value::Object(entry));
        }
        self.save_root(&root).await?;

        tracing::debug!(
            "Position for {} {} -> {}",
            strategy,
            stored.position,
            record.position
        );

        Ok(record)
    }
}
