//! Static registry of the mints the tracker knows about.
//!
//! Built once from configuration and shared read-only. The [`AssetKind`]
//! ordering is the tie-break used when several counter-asset candidates
//! move in the same direction.

use crate::monitor::error::{MonitorError, MonitorResult};
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use std::collections::HashMap;
use std::fmt;

/// Symbol reported for lamport movements.
pub const NATIVE_SYMBOL: &str = "SOL";

/// Symbol reported for mints missing from the catalog.
pub const UNKNOWN_SYMBOL: &str = "UNKNOWN";

/// Decimals of the native unit (lamports per SOL).
pub const NATIVE_DECIMALS: u8 = 9;

/// Role of an asset inside the protocol.
///
/// Variants are declared from lowest to highest priority so the derived
/// `Ord` is the tie-break order: `Stable` beats everything, `Unknown` loses
/// to everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    Unknown,
    NativeUnit,
    LiquidStakingToken,
    ReferenceStable,
    LeveragedToken,
    StakedStable,
    Stable,
}

impl AssetKind {
    /// Numeric rank, higher wins.
    pub fn priority_rank(&self) -> u8 {
        *self as u8
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetKind::Unknown => write!(f, "Unknown"),
            AssetKind::NativeUnit => write!(f, "Native"),
            AssetKind::LiquidStakingToken => write!(f, "LST"),
            AssetKind::ReferenceStable => write!(f, "Reference stable"),
            AssetKind::LeveragedToken => write!(f, "Leveraged"),
            AssetKind::StakedStable => write!(f, "Staked stable"),
            AssetKind::Stable => write!(f, "Stable"),
        }
    }
}

/// A registry entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenInfo {
    pub mint: Pubkey,
    pub symbol: String,
    pub name: String,
    pub decimals: u8,
    pub kind: AssetKind,
}

/// What an amount is denominated in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetIdentity {
    /// `None` for the native unit.
    pub mint: Option<Pubkey>,
    pub symbol: String,
    pub kind: AssetKind,
}

impl AssetIdentity {
    pub fn native() -> Self {
        Self {
            mint: None,
            symbol: NATIVE_SYMBOL.to_string(),
            kind: AssetKind::NativeUnit,
        }
    }

    pub fn unknown(mint: Pubkey) -> Self {
        Self {
            mint: Some(mint),
            symbol: UNKNOWN_SYMBOL.to_string(),
            kind: AssetKind::Unknown,
        }
    }

    pub fn priority_rank(&self) -> u8 {
        self.kind.priority_rank()
    }

    pub fn is_native(&self) -> bool {
        self.mint.is_none()
    }
}

impl From<&TokenInfo> for AssetIdentity {
    fn from(info: &TokenInfo) -> Self {
        Self {
            mint: Some(info.mint),
            symbol: info.symbol.clone(),
            kind: info.kind,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AssetCatalog {
    tokens: HashMap<Pubkey, TokenInfo>,
    stable_mint: Pubkey,
    leveraged_mint: Pubkey,
}

impl AssetCatalog {
    /// Build the catalog. Exactly one `Stable` and one `LeveragedToken`
    /// entry are required; later duplicates of a mint replace earlier ones.
    pub fn new(entries: Vec<TokenInfo>) -> MonitorResult<Self> {
        let mut tokens = HashMap::with_capacity(entries.len());
        for entry in entries {
            if entry.decimals > crate::amount::MAX_DECIMALS {
                return Err(MonitorError::ConfigError(format!(
                    "{} has {} decimals, at most {} supported",
                    entry.symbol,
                    entry.decimals,
                    crate::amount::MAX_DECIMALS
                )));
            }
            tokens.insert(entry.mint, entry);
        }

        let stable_mint = Self::single_of_kind(&tokens, AssetKind::Stable)?;
        let leveraged_mint = Self::single_of_kind(&tokens, AssetKind::LeveragedToken)?;

        Ok(Self {
            tokens,
            stable_mint,
            leveraged_mint,
        })
    }

    fn single_of_kind(tokens: &HashMap<Pubkey, TokenInfo>, kind: AssetKind) -> MonitorResult<Pubkey> {
        let mut matches = tokens.values().filter(|t| t.kind == kind);
        match (matches.next(), matches.next()) {
            (Some(info), None) => Ok(info.mint),
            (None, _) => Err(MonitorError::ConfigError(format!(
                "Token registry has no {} entry",
                kind
            ))),
            (Some(_), Some(_)) => Err(MonitorError::ConfigError(format!(
                "Token registry has more than one {} entry",
                kind
            ))),
        }
    }

    pub fn get(&self, mint: &Pubkey) -> Option<&TokenInfo> {
        self.tokens.get(mint)
    }

    /// Identity for a mint, falling back to the unknown-token identity.
    pub fn identify(&self, mint: &Pubkey) -> AssetIdentity {
        self.get(mint)
            .map(AssetIdentity::from)
            .unwrap_or_else(|| AssetIdentity::unknown(*mint))
    }

    /// The USD-pegged unit used as the pricing denominator.
    pub fn stable(&self) -> &TokenInfo {
        &self.tokens[&self.stable_mint]
    }

    /// The tracked leveraged token.
    pub fn leveraged(&self) -> &TokenInfo {
        &self.tokens[&self.leveraged_mint]
    }

    pub fn is_stable_mint(&self, mint: &Pubkey) -> bool {
        self.stable_mint == *mint
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}
