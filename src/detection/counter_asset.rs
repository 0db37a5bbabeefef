//! Picks the asset exchanged against the tracked token.
//!
//! Multi-hop routes move several tokens in the same direction (an LST leg
//! on the way to a stablecoin, say). The winner is chosen by asset priority
//! first and raw magnitude second, so an intermediate hop never outranks the
//! settlement leg.

use crate::amount::AmountError;
use crate::catalog::{AssetCatalog, AssetIdentity, NATIVE_DECIMALS};
use crate::detection::balance_analyzer::BalanceDeltaResolver;
use crate::detection::types::{BalanceDelta, CounterAsset, CounterSource, Direction};
use crate::monitor::snapshot::TransactionMeta;
use crate::types::TradeSide;
use solana_sdk::pubkey::Pubkey;
use tracing::debug;

/// Direction the counter side must move for a given trade side.
///
/// On a BUY the wallet spent the counter asset; on a SELL it received it.
pub fn expected_direction(side: TradeSide) -> Option<Direction> {
    match side {
        TradeSide::Buy => Some(Direction::Decrease),
        TradeSide::Sell => Some(Direction::Increase),
        TradeSide::Receive => None,
    }
}

pub struct CounterAssetResolver<'a> {
    catalog: &'a AssetCatalog,
    balances: BalanceDeltaResolver,
}

impl<'a> CounterAssetResolver<'a> {
    pub fn new(catalog: &'a AssetCatalog) -> Self {
        Self {
            catalog,
            balances: BalanceDeltaResolver::new(),
        }
    }

    /// Resolve the counter asset of a trade on `target_index`.
    ///
    /// Returns the native unit with amount 0 when nothing moved the right way.
    /// Fails only when a token amount string is malformed.
    pub fn resolve(
        &self,
        meta: &TransactionMeta,
        target_index: usize,
        tracked_mint: &Pubkey,
        side: TradeSide,
    ) -> Result<CounterAsset, AmountError> {
        let Some(expected) = expected_direction(side) else {
            return Ok(Self::default_counter());
        };

        let native = self.best_native(meta, target_index, expected);
        let token = self.best_token(meta, target_index, tracked_mint, expected)?;

        let counter = match (token, native) {
            (Some(token), Some(native)) => {
                if native.raw_amount > token.raw_amount {
                    native
                } else {
                    token
                }
            }
            (Some(token), None) => token,
            (None, Some(native)) => native,
            (None, None) => Self::default_counter(),
        };

        debug!(
            "Counter asset for {}: {} {} ({:?})",
            side, counter.raw_amount, counter.identity.symbol, counter.source
        );

        Ok(counter)
    }

    fn default_counter() -> CounterAsset {
        CounterAsset {
            identity: AssetIdentity::native(),
            raw_amount: 0,
            decimals: NATIVE_DECIMALS,
            source: CounterSource::Default,
        }
    }

    /// Largest lamport move in the expected direction outside the target account.
    ///
    /// Lamport accounts carry no mint, so the identity is assumed to be
    /// native SOL; rent on token accounts and fees show up here too.
    fn best_native(
        &self,
        meta: &TransactionMeta,
        target_index: usize,
        expected: Direction,
    ) -> Option<CounterAsset> {
        self.balances
            .native_deltas(meta)
            .into_iter()
            .filter(|d| d.account_index != target_index && d.direction == expected)
            .max_by_key(|d| d.abs_net_change())
            .map(|d| CounterAsset {
                identity: AssetIdentity::native(),
                raw_amount: d.abs_net_change(),
                decimals: NATIVE_DECIMALS,
                source: CounterSource::NativeBalance,
            })
    }

    /// Highest-priority token move in the expected direction; magnitude breaks ties.
    fn best_token(
        &self,
        meta: &TransactionMeta,
        target_index: usize,
        tracked_mint: &Pubkey,
        expected: Direction,
    ) -> Result<Option<CounterAsset>, AmountError> {
        let mut best: Option<CounterAsset> = None;

        for delta in self.balances.token_deltas(meta)? {
            let Some(mint) = delta.mint else { continue };
            if delta.account_index == target_index || mint == *tracked_mint {
                continue;
            }
            if delta.net_direction() != expected {
                continue;
            }

            let candidate = self.token_candidate(&delta, mint);
            debug!(
                "Counter candidate [{}]: {} {} (rank {})",
                delta.account_index,
                candidate.raw_amount,
                candidate.identity.symbol,
                candidate.identity.priority_rank()
            );

            let replace = match &best {
                None => true,
                Some(current) => outranks(&candidate, current),
            };
            if replace {
                best = Some(candidate);
            }
        }

        Ok(best)
    }

    fn token_candidate(&self, delta: &BalanceDelta, mint: Pubkey) -> CounterAsset {
        let identity = self.catalog.identify(&mint);
        let source = if self.catalog.get(&mint).is_some() {
            CounterSource::Catalog
        } else {
            CounterSource::UnlistedMint
        };

        CounterAsset {
            identity,
            raw_amount: delta.abs_net_change(),
            decimals: delta.decimals,
            source,
        }
    }
}

/// Strictly higher priority wins regardless of size; equal priority goes to
/// the larger amount; a full tie keeps the incumbent.
fn outranks(candidate: &CounterAsset, current: &CounterAsset) -> bool {
    (candidate.identity.kind, candidate.raw_amount) > (current.identity.kind, current.raw_amount)
}
