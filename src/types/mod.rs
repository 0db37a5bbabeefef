use crate::catalog::AssetCatalog;
use crate::detection::types::{CounterSource, TradeEvidence};
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};
use solana_sdk::pubkey::Pubkey;
use std::fmt;

/// Which way the tracked token moved for the wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeSide {
    Buy,
    Sell,
    /// First funding of the token account, no exchange observed
    Receive,
}

impl fmt::Display for TradeSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeSide::Buy => write!(f, "BUY"),
            TradeSide::Sell => write!(f, "SELL"),
            TradeSide::Receive => write!(f, "RECEIVE"),
        }
    }
}

/// A classified trade of the leveraged token.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trade {
    /// The transaction signature
    pub signature: String,
    pub slot: u64,
    /// Unix seconds, 0 when the RPC did not report a block time
    pub block_time: i64,
    pub side: TradeSide,
    /// Tracked token amount in base units, > 0 for BUY and SELL
    pub xsol_amount_raw: u64,
    /// Tracked token amount as a decimal string
    pub xsol_amount: String,
    /// Counter asset symbol, absent for RECEIVE
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counter_asset: Option<String>,
    /// Counter mint, absent for lamports and RECEIVE
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counter_mint: Option<Pubkey>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counter_amount_raw: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counter_amount: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counter_source: Option<CounterSource>,
    /// Implied USD price, only when the counter asset is the stable unit
    #[serde(rename = "historicalPriceUSD", skip_serializing_if = "Option::is_none")]
    pub historical_price_usd: Option<String>,
    pub evidence: TradeEvidence,
    pub explorer_url: String,
}

impl Trade {
    /// Attach the implied USD price. The only mutation a trade accepts.
    pub fn with_historical_price(mut self, price: Option<String>) -> Self {
        self.historical_price_usd = price;
        self
    }

    /// Get a human-readable description of the trade
    pub fn description(&self) -> String {
        match (&self.counter_amount, &self.counter_asset) {
            (Some(amount), Some(asset)) => format!(
                "{} {} for {} {}",
                self.side, self.xsol_amount, amount, asset
            ),
            _ => format!("{} {}", self.side, self.xsol_amount),
        }
    }
}

/// Solscan link for a transaction
pub fn explorer_url(signature: &str) -> String {
    format!("https://solscan.io/tx/{}", signature)
}

/// Outcome of classifying one transaction.
///
/// At most one of `trade` and `error` is set; neither means the
/// transaction does not trade the tracked token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TradeParseResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    trade: Option<Trade>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl TradeParseResult {
    pub fn trade(trade: Trade) -> Self {
        Self {
            trade: Some(trade),
            error: None,
        }
    }

    pub fn not_a_trade() -> Self {
        Self::default()
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            trade: None,
            error: Some(message.into()),
        }
    }

    pub fn as_trade(&self) -> Option<&Trade> {
        self.trade.as_ref()
    }

    pub fn into_trade(self) -> Option<Trade> {
        self.trade
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_not_a_trade(&self) -> bool {
        self.trade.is_none() && self.error.is_none()
    }
}

/// Mainnet program and mint addresses used when configuration omits them.
pub mod program_ids {
    /// Hylo exchange (mint/redeem of hyUSD and xSOL)
    pub const EXCHANGE: &str = "HYEXCHtHkBagdStcJCp3xbbb9B7sdMdWXFNj6mdsG4hn";

    /// Hylo stability pool
    pub const STABILITY_POOL: &str = "HysTabVUfmQBFcmzu1ctRd1Y1fxd66RBpboy1bmtDSQQ";

    pub const HYUSD_MINT: &str = "5YMkXAYccHSGnHn9nob9xEvv6Pvka9DZWH7nTbotTu9E";
    pub const SHYUSD_MINT: &str = "HnnGv3HrSqjRpgdFmx7vQGjntNEoex1SU4e9Lxcxuihz";
    pub const XSOL_MINT: &str = "4sWNB8zGWHkh6UnmwiEtzNxL4XrN7uK9tosbESbJFfVs";

    pub const USDC_MINT: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";
    pub const USDT_MINT: &str = "Es9vMFrzaCERmJfrF4H2FYD4KCoNkY11McCe8BenwNYB";

    pub const JITOSOL_MINT: &str = "J1toso1uCk3RLmjorhTtrVwY9HJ7X8V9yYac6Y7kGCPn";
    pub const MSOL_MINT: &str = "mSoLzYCxHdYgdzU16g5QSh3i5K3z3KZK7ytfqcJm7So";
    pub const BSOL_MINT: &str = "bSo13r4TkiE4KumL71LsHTPpL2euBYLFx6h9HP3piy1";

    pub const WSOL_MINT: &str = "So11111111111111111111111111111111111111112";
}

/// Addresses of the protocol programs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolPrograms {
    pub exchange: Pubkey,
    pub stability_pool: Pubkey,
}

impl ProtocolPrograms {
    /// Short name of a protocol program, for logging.
    pub fn label(&self, program: &Pubkey) -> Option<&'static str> {
        if *program == self.exchange {
            Some("exchange")
        } else if *program == self.stability_pool {
            Some("stability_pool")
        } else {
            None
        }
    }
}

/// Everything classification reads besides the transaction itself.
///
/// Built once at startup and shared behind an `Arc`; never rebuilt per call.
#[derive(Debug, Clone)]
pub struct Registry {
    pub programs: ProtocolPrograms,
    pub catalog: AssetCatalog,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorConfig {
    /// RPC endpoint URL
    pub rpc_endpoint: String,

    /// Whether to use commitment level "confirmed" (faster) or "finalized" (safer)
    pub use_confirmed_commitment: bool,

    /// Attempts per getTransaction call before giving up
    pub max_retries: u32,

    /// Transactions fetched and classified at once
    pub concurrency: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            rpc_endpoint: "https://api.mainnet-beta.solana.com".to_string(),
            use_confirmed_commitment: true,
            max_retries: 3,
            concurrency: 8,
        }
    }
}
