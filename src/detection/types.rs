use crate::catalog::AssetIdentity;
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;

/// Which way a balance moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Increase,
    Decrease,
    None,
}

impl Direction {
    fn of(delta: i128) -> Self {
        match delta {
            d if d > 0 => Direction::Increase,
            d if d < 0 => Direction::Decrease,
            _ => Direction::None,
        }
    }
}

/// Which sides of a balance were reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalancePresence {
    /// Neither side reported
    Absent,
    /// Account created in this transaction
    PostOnly,
    /// Account closed in this transaction
    PreOnly,
    Both,
}

/// Represents a change in one account's balance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceDelta {
    /// Position of the account in the transaction
    pub account_index: usize,

    /// Token mint, `None` for lamports
    pub mint: Option<Pubkey>,

    /// Balance before transaction, `None` when not reported
    pub raw_before: Option<u64>,

    /// Balance after transaction, `None` when not reported
    pub raw_after: Option<u64>,

    /// `after - before`, 0 unless both sides are present
    pub signed_delta: i128,

    /// `None` unless both sides are present and differ
    pub direction: Direction,

    pub decimals: u8,
}

impl BalanceDelta {
    pub fn new(
        account_index: usize,
        mint: Option<Pubkey>,
        raw_before: Option<u64>,
        raw_after: Option<u64>,
        decimals: u8,
    ) -> Self {
        let signed_delta = match (raw_before, raw_after) {
            (Some(before), Some(after)) => after as i128 - before as i128,
            _ => 0,
        };

        Self {
            account_index,
            mint,
            raw_before,
            raw_after,
            signed_delta,
            direction: Direction::of(signed_delta),
            decimals,
        }
    }

    pub fn presence(&self) -> BalancePresence {
        match (self.raw_before, self.raw_after) {
            (None, None) => BalancePresence::Absent,
            (None, Some(_)) => BalancePresence::PostOnly,
            (Some(_), None) => BalancePresence::PreOnly,
            (Some(_), Some(_)) => BalancePresence::Both,
        }
    }

    /// Change with a missing side read as zero.
    ///
    /// Used for counter-side scanning where an account opened or closed in
    /// the same transaction still moved value.
    pub fn net_change(&self) -> i128 {
        self.raw_after.unwrap_or(0) as i128 - self.raw_before.unwrap_or(0) as i128
    }

    pub fn net_direction(&self) -> Direction {
        Direction::of(self.net_change())
    }

    /// Absolute net change, always fits a u64.
    pub fn abs_net_change(&self) -> u64 {
        self.net_change().unsigned_abs() as u64
    }

    pub fn is_increase(&self) -> bool {
        self.direction == Direction::Increase
    }

    pub fn is_decrease(&self) -> bool {
        self.direction == Direction::Decrease
    }
}

/// Best-effort reading of what the exchange program did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstructionIntent {
    None,
    LikelyMint,
    LikelyRedeem,
}

/// How the side of a trade was established.
///
/// There is no instruction decoder, so no trade is ever reported as
/// decoded; consumers can tell heuristic trades apart from plain balance
/// reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "basis", content = "intent", rename_all = "snake_case")]
pub enum TradeEvidence {
    /// Exchange program invoked; side inferred from the tracked balance
    Inferred(InstructionIntent),
    /// No protocol instruction; side read from the tracked balance change
    BalanceDiff,
    /// Transfer-in with no observable exchange
    Unknown,
}

/// Where the counter-asset identity came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CounterSource {
    /// Token account whose mint is in the catalog
    Catalog,
    /// Token account whose mint the catalog does not know
    UnlistedMint,
    /// Lamport change; the account is assumed to hold native SOL, not verified
    NativeBalance,
    /// No candidate moved in the expected direction
    Default,
}

/// The asset and amount on the other side of a trade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterAsset {
    pub identity: AssetIdentity,
    pub raw_amount: u64,
    pub decimals: u8,
    pub source: CounterSource,
}

impl CounterAsset {
    pub fn formatted_amount(&self) -> String {
        crate::amount::format_amount(self.raw_amount, self.decimals)
    }
}
