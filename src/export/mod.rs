// CSV audit trail of submitted orders
pub mod trade_logger;

pub use trade_logger::{RecordOutcome, TradeLogger, TradeRow, TRADE_HISTORY_HEADER};
