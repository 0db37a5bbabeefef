use crate::amount::{AmountError, parse_raw};
use crate::catalog::NATIVE_DECIMALS;
use crate::detection::types::BalanceDelta;
use crate::monitor::snapshot::{TokenBalance, TransactionMeta};
use solana_sdk::pubkey::Pubkey;
use tracing::debug;

/// Computes per-account balance deltas from pre/post snapshots
#[derive(Debug, Default, Clone, Copy)]
pub struct BalanceDeltaResolver;

impl BalanceDeltaResolver {
    pub fn new() -> Self {
        Self
    }

    /// Lamport delta for one account. Missing entries stay `None`.
    pub fn native(&self, meta: &TransactionMeta, account_index: usize) -> BalanceDelta {
        BalanceDelta::new(
            account_index,
            None,
            meta.pre_balances.get(account_index).copied(),
            meta.post_balances.get(account_index).copied(),
            NATIVE_DECIMALS,
        )
    }

    /// Token delta for one account, using the first matching entry on each side.
    pub fn token(&self, meta: &TransactionMeta, account_index: usize) -> Result<BalanceDelta, AmountError> {
        let pre = meta.pre_token_balance(account_index);
        let post = meta.post_token_balance(account_index);

        let raw_before = pre.map(|b| parse_raw(&b.amount)).transpose()?;
        let raw_after = post.map(|b| parse_raw(&b.amount)).transpose()?;

        let reference: Option<&TokenBalance> = post.or(pre);
        let delta = BalanceDelta::new(
            account_index,
            reference.map(|b| b.mint),
            raw_before,
            raw_after,
            reference.map(|b| b.decimals).unwrap_or(0),
        );

        debug!(
            "Token delta [{}]: {:?} -> {:?} ({:?})",
            account_index, delta.raw_before, delta.raw_after, delta.direction
        );

        Ok(delta)
    }

    /// Token delta for one account restricted to entries of `mint`.
    pub fn token_for_mint(
        &self,
        meta: &TransactionMeta,
        account_index: usize,
        mint: &Pubkey,
    ) -> Result<BalanceDelta, AmountError> {
        let matches = |b: &&TokenBalance| b.account_index as usize == account_index && b.mint == *mint;
        let pre = meta.pre_token_balances.iter().find(matches);
        let post = meta.post_token_balances.iter().find(matches);

        Ok(BalanceDelta::new(
            account_index,
            Some(*mint),
            pre.map(|b| parse_raw(&b.amount)).transpose()?,
            post.map(|b| parse_raw(&b.amount)).transpose()?,
            post.or(pre).map(|b| b.decimals).unwrap_or(0),
        ))
    }

    /// Lamport deltas for every account index reported on either side.
    pub fn native_deltas(&self, meta: &TransactionMeta) -> Vec<BalanceDelta> {
        let n = meta.pre_balances.len().max(meta.post_balances.len());
        (0..n).map(|i| self.native(meta, i)).collect()
    }

    /// Token deltas for every account appearing in either balance list.
    pub fn token_deltas(&self, meta: &TransactionMeta) -> Result<Vec<BalanceDelta>, AmountError> {
        meta.token_account_indices()
            .into_iter()
            .map(|i| self.token(meta, i))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::types::{BalancePresence, Direction};
    use crate::monitor::snapshot::fixtures::balance;

    fn meta() -> TransactionMeta {
        TransactionMeta {
            err: None,
            pre_balances: vec![1_000_000_000, 2_000_000, 7],
            post_balances: vec![999_995_000, 2_000_000],
            pre_token_balances: Vec::new(),
            post_token_balances: Vec::new(),
        }
    }

    #[test]
    fn test_native_delta() {
        let resolver = BalanceDeltaResolver::new();
        let meta = meta();

        let payer = resolver.native(&meta, 0);
        assert_eq!(payer.signed_delta, -5_000);
        assert_eq!(payer.direction, Direction::Decrease);
        assert!(payer.mint.is_none());

        let unchanged = resolver.native(&meta, 1);
        assert_eq!(unchanged.direction, Direction::None);
        assert_eq!(unchanged.presence(), BalancePresence::Both);

        let truncated = resolver.native(&meta, 2);
        assert_eq!(truncated.presence(), BalancePresence::PreOnly);
        assert_eq!(truncated.direction, Direction::None);
    }

    #[test]
    fn test_token_delta_sides() {
        let resolver = BalanceDeltaResolver::new();
        let mint = Pubkey::new_unique();
        let mut meta = meta();
        meta.pre_token_balances = vec![balance(1, mint, 1_000_000, 6)];
        meta.post_token_balances = vec![balance(1, mint, 2_500_000, 6), balance(2, mint, 10, 6)];

        let grown = resolver.token(&meta, 1).unwrap();
        assert_eq!(grown.signed_delta, 1_500_000);
        assert_eq!(grown.mint, Some(mint));
        assert_eq!(grown.decimals, 6);
        assert!(grown.is_increase());

        let created = resolver.token(&meta, 2).unwrap();
        assert_eq!(created.presence(), BalancePresence::PostOnly);
        assert_eq!(created.direction, Direction::None);

        let missing = resolver.token(&meta, 5).unwrap();
        assert_eq!(missing.presence(), BalancePresence::Absent);
        assert!(missing.mint.is_none());

        assert_eq!(resolver.token_deltas(&meta).unwrap().len(), 2);
    }

    #[test]
    fn test_token_for_mint_skips_other_mints() {
        let resolver = BalanceDeltaResolver::new();
        let tracked = Pubkey::new_unique();
        let other = Pubkey::new_unique();
        let mut meta = meta();
        meta.pre_token_balances = vec![balance(1, other, 7, 9), balance(1, tracked, 100, 6)];
        meta.post_token_balances = vec![balance(1, other, 3, 9), balance(1, tracked, 40, 6)];

        let delta = resolver.token_for_mint(&meta, 1, &tracked).unwrap();
        assert_eq!(delta.signed_delta, -60);
        assert_eq!(delta.decimals, 6);

        let absent = resolver.token_for_mint(&meta, 2, &tracked).unwrap();
        assert_eq!(absent.presence(), BalancePresence::Absent);
        assert_eq!(absent.abs_net_change(), 0);
    }

    #[test]
    fn test_malformed_amount_is_parse_failure() {
        let resolver = BalanceDeltaResolver::new();
        let mint = Pubkey::new_unique();
        let mut meta = meta();
        let mut bad = balance(1, mint, 0, 6);
        bad.amount = "12x".to_string();
        meta.post_token_balances = vec![bad];

        assert!(matches!(resolver.token(&meta, 1), Err(AmountError::Invalid(_))));
        assert!(resolver.token_deltas(&meta).is_err());
    }
}
