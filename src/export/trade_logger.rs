use rust_decimal::Decimal;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

use crate::config::{AppConfig, Network};
use crate::error::ExportError;
use crate::exchange::Exchange;
use crate::models::{OrderRecord, OrderSide, OrderStatus, SubmittedOrder};
use crate::persistence::PositionStore;

pub const TRADE_HISTORY_HEADER: [&str; 13] = [
    "datetime",
    "strategy",
    "market",
    "side",
    "size",
    "orderPrice",
    "tradingviewPrice",
    "priceGap",
    "status",
    "orderId",
    "accountId",
    "marginPercentage",
    "calculatedOrderSize",
];

/// What `record` did with an order
#[derive(Debug, Clone, PartialEq)]
pub enum RecordOutcome {
    /// The exchange did not return the order
    NotFound,
    /// Order had not settled by the time it was polled
    StillWorking(OrderStatus),
    /// A row was appended
    Logged(TradeRow),
}

/// One audit row
#[derive(Debug, Clone, PartialEq)]
pub struct TradeRow {
    pub record: OrderRecord,
    pub strategy: String,
    pub fill_price: Option<Decimal>,
    pub reference_price: Decimal,
    pub margin_percentage: Decimal,
    pub calculated_size: String,
}

impl TradeRow {
    pub fn price_gap(&self) -> Option<Decimal> {
        self.fill_price.map(|p| p - self.reference_price)
    }

    fn fields(&self) -> [String; 13] {
        let opt = |v: Option<Decimal>| v.map(|d| d.normalize().to_string()).unwrap_or_default();
        [
            self.record.created_at.to_rfc3339(),
            self.strategy.clone(),
            self.record.symbol.clone(),
            self.record.side.to_string(),
            self.record.size.normalize().to_string(),
            opt(self.fill_price),
            self.reference_price.normalize().to_string(),
            opt(self.price_gap()),
            self.record.status.as_str().to_string(),
            self.record.id.clone(),
            self.record.account_id.clone(),
            self.margin_percentage.normalize().to_string(),
            self.calculated_size.clone(),
        ]
    }
}

/// Polls a submitted order once, books fills, and appends to the CSV trail
pub struct TradeLogger {
    exchange: Arc<dyn Exchange>,
    store: Arc<dyn PositionStore>,
    history_path: PathBuf,
    poll_delay: Duration,
}

impl TradeLogger {
    pub fn new(
        exchange: Arc<dyn Exchange>,
        store: Arc<dyn PositionStore>,
        export_dir: &Path,
        network: Network,
        file_name: &str,
        poll_delay: Duration,
    ) -> Self {
        Self {
            exchange,
            store,
            history_path: export_dir.join(network.as_str()).join(file_name),
            poll_delay,
        }
    }

    pub fn from_config(
        config: &AppConfig,
        exchange: Arc<dyn Exchange>,
        store: Arc<dyn PositionStore>,
    ) -> Self {
        Self::new(
            exchange,
            store,
            &config.export.dir,
            config.network,
            &config.export.file_name,
            Duration::from_millis(config.export.fill_poll_delay_ms),
        )
    }

    pub fn history_path(&self) -> &Path {
        &self.history_path
    }

    /// Record the outcome of a submitted order
    ///
    /// Waits the poll delay, polls once, and returns without side effects if
    /// the order is unknown or still working. Errors from the poll, the
    /// position store, or the filesystem are returned to the caller.
    pub async fn record(
        &self,
        strategy: &str,
        order: &SubmittedOrder,
        reference_price: Decimal,
        margin_percentage: Decimal,
        calculated_size: &str,
    ) -> Result<RecordOutcome, ExportError> {
        tokio::time::sleep(self.poll_delay).await;

        let Some(record) = self.exchange.get_order(&order.id).await? else {
            tracing::warn!("Order {} not found, skipping trade log", order.id);
            return Ok(RecordOutcome::NotFound);
        };
        tracing::debug!("Polled order: {:?}", record);

        if record.status.is_working() {
            tracing::warn!(
                "Order {} still {} after {:?}, skipping trade log",
                record.id,
                record.status.as_str(),
                self.poll_delay
            );
            return Ok(RecordOutcome::StillWorking(record.status));
        }

        let fill_price = if record.status == OrderStatus::Filled {
            let price = record.latest_match_fill_price;
            tracing::info!(
                "Order {} is filled at {}",
                order.id,
                price.map(|p| p.to_string()).unwrap_or_default()
            );

            let delta = match order.side {
                OrderSide::Buy => order.size,
                OrderSide::Sell => -order.size,
            };
            let position = self.store.apply_fill(strategy, delta).await?;
            tracing::info!("{} position is now {}", strategy, position.position);

            price
        } else {
            None
        };

        let row = TradeRow {
            record,
            strategy: strategy.to_string(),
            fill_price,
            reference_price,
            margin_percentage,
            calculated_size: calculated_size.to_string(),
        };
        self.append(&row).await?;

        Ok(RecordOutcome::Logged(row))
    }

    async fn append(&self, row: &TradeRow) -> Result<(), ExportError> {
        if let Some(dir) = self.history_path.parent() {
            fs::create_dir_all(dir).await?;
        }

        // a file left empty by an interrupted first write still needs its header
        let needs_header = match fs::metadata(&self.history_path).await {
            Ok(meta) => meta.len() == 0,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
            Err(e) => return Err(e.into()),
        };

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(Vec::new());
        if needs_header {
            writer.write_record(TRADE_HISTORY_HEADER)?;
        }
        writer.write_record(row.fields())?;
        let bytes = writer
            .into_inner()
            .map_err(|e| ExportError::Io(e.into_error()))?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.history_path)
            .await?;
        file.write_all(&bytes).await?;
        file.flush().await?;

        tracing::debug!("Appended trade row to {:?}", self.history_path);
        Ok(())
    }
}
