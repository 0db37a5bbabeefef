pub mod amount;
pub mod catalog;
pub mod config;
pub mod detection;
pub mod monitor;
pub mod pricing;
pub mod types;

pub use catalog::{AssetCatalog, AssetIdentity, AssetKind, TokenInfo};
pub use config::{AppConfig, create_default_config, load_config};
pub use detection::{ClassifyError, TradeClassifier};
pub use monitor::{MonitorError, MonitorResult, TradeScanner, TransactionFetcher, TransactionSnapshot};
pub use pricing::{DerivedMetrics, MetricsError, ProtocolSnapshot};
pub use types::{MonitorConfig, ProtocolPrograms, Registry, Trade, TradeParseResult, TradeSide};
