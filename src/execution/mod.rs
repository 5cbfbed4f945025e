// Order derivation and alert handling
pub mod order_builder;
pub mod pipeline;
pub mod quantize;

pub use order_builder::{normalize_symbol, OrderParameterBuilder};
pub use pipeline::{AlertOutcome, AlertPipeline};
