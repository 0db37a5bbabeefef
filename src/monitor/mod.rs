pub mod error;
pub mod fetcher;
pub mod scanner;
pub mod snapshot;

pub use error::{MonitorError, MonitorResult};
pub use fetcher::TransactionFetcher;
pub use scanner::{ScanFailure, ScanReport, TradeScanner};
pub use snapshot::{ProgramInvocation, TokenBalance, TransactionMeta, TransactionSnapshot};
