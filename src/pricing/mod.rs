//! Prices and protocol health.

pub mod historical;
pub mod metrics;

pub use historical::{HistoricalPriceEstimator, implied_price};
pub use metrics::{DerivedMetrics, MetricsError, ProtocolSnapshot};
