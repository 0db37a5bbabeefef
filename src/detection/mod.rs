//! Trade detection for the tracked leveraged token.
//!
//! Works from balance snapshots rather than decoded instructions: the
//! exchange program is only recognised by address, and every side and
//! amount is read off pre/post balances.

pub mod balance_analyzer;
pub mod counter_asset;
pub mod error;
pub mod instruction_intent;
pub mod trade_classifier;
pub mod types;

pub use balance_analyzer::BalanceDeltaResolver;
pub use counter_asset::CounterAssetResolver;
pub use error::ClassifyError;
pub use instruction_intent::InstructionIntentDetector;
pub use trade_classifier::TradeClassifier;
pub use types::{BalanceDelta, CounterAsset, CounterSource, Direction, InstructionIntent, TradeEvidence};
