use crate::amount::{AmountError, format_amount};
use crate::catalog::TokenInfo;
use crate::detection::balance_analyzer::BalanceDeltaResolver;
use crate::detection::counter_asset::CounterAssetResolver;
use crate::detection::error::ClassifyError;
use crate::detection::instruction_intent::InstructionIntentDetector;
use crate::detection::types::{BalancePresence, CounterAsset, InstructionIntent, TradeEvidence};
use crate::monitor::snapshot::{TransactionMeta, TransactionSnapshot};
use crate::pricing::historical::HistoricalPriceEstimator;
use crate::types::{Registry, Trade, TradeParseResult, TradeSide, explorer_url};
use solana_sdk::pubkey::Pubkey;
use std::cmp::Ordering;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, warn};

/// Side and size of the tracked token movement, before the counter side is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Movement {
    side: TradeSide,
    raw_amount: u64,
    decimals: u8,
    evidence: TradeEvidence,
}

/// Decides whether a transaction trades the leveraged token for a wallet
/// token account, and builds the trade record when it does.
pub struct TradeClassifier {
    registry: Arc<Registry>,
    balances: BalanceDeltaResolver,
}

impl TradeClassifier {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            balances: BalanceDeltaResolver::new(),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Classify `snapshot` for the token account at `target_account` (base58).
    ///
    /// `Err` only for caller mistakes. A failed transaction or malformed
    /// balance data is reported inside the returned result.
    pub fn classify(
        &self,
        snapshot: &TransactionSnapshot,
        target_account: &str,
    ) -> Result<TradeParseResult, ClassifyError> {
        let target_account = target_account.trim();
        if target_account.is_empty() {
            return Err(ClassifyError::InvalidInput(
                "target account address is empty".to_string(),
            ));
        }
        let target = Pubkey::from_str(target_account).map_err(|e| {
            ClassifyError::InvalidInput(format!("invalid target account {}: {}", target_account, e))
        })?;

        self.classify_account(snapshot, &target)
    }

    /// Same as [`classify`](Self::classify) with an already parsed address.
    pub fn classify_account(
        &self,
        snapshot: &TransactionSnapshot,
        target: &Pubkey,
    ) -> Result<TradeParseResult, ClassifyError> {
        let Some(meta) = snapshot.meta.as_ref() else {
            return Err(ClassifyError::InvalidInput(format!(
                "transaction {} has no metadata",
                snapshot.signature
            )));
        };

        if snapshot.is_failed() {
            debug!("Transaction {} failed on chain: {:?}", snapshot.signature, meta.err);
            return Ok(TradeParseResult::error("transaction failed"));
        }

        let Some(target_index) = snapshot.account_index(target) else {
            debug!("Account {} not in {}", target, snapshot.signature);
            return Ok(TradeParseResult::not_a_trade());
        };

        match self.detect(snapshot, meta, target_index) {
            Ok(Some(trade)) => {
                debug!("Trade in {}: {}", trade.signature, trade.description());
                Ok(TradeParseResult::trade(trade))
            }
            Ok(None) => Ok(TradeParseResult::not_a_trade()),
            Err(e) => {
                warn!("Failed to parse balances of {}: {}", snapshot.signature, e);
                Ok(TradeParseResult::error(e.to_string()))
            }
        }
    }

    fn detect(
        &self,
        snapshot: &TransactionSnapshot,
        meta: &TransactionMeta,
        target_index: usize,
    ) -> Result<Option<Trade>, AmountError> {
        let tracked = self.registry.catalog.leveraged();

        let intent = InstructionIntentDetector::new(&self.registry.programs).detect(
            snapshot,
            target_index,
            &tracked.mint,
        )?;

        let movement = match intent {
            InstructionIntent::None => self.via_balance_diff(meta, target_index, tracked)?,
            intent => self.via_instruction(meta, target_index, tracked, intent)?,
        };

        let Some(movement) = movement else {
            return Ok(None);
        };

        self.emit(snapshot, meta, target_index, tracked, movement).map(Some)
    }

    fn via_instruction(
        &self,
        meta: &TransactionMeta,
        target_index: usize,
        tracked: &TokenInfo,
        intent: InstructionIntent,
    ) -> Result<Option<Movement>, AmountError> {
        let side = match intent {
            InstructionIntent::LikelyMint => TradeSide::Buy,
            InstructionIntent::LikelyRedeem => TradeSide::Sell,
            InstructionIntent::None => return Ok(None),
        };

        let delta = self.balances.token_for_mint(meta, target_index, &tracked.mint)?;
        let raw_amount = delta.abs_net_change();
        if raw_amount == 0 {
            debug!("Exchange invoked but tracked balance did not move");
            return Ok(None);
        }

        Ok(Some(Movement {
            side,
            raw_amount,
            decimals: delta.decimals,
            evidence: TradeEvidence::Inferred(intent),
        }))
    }

    fn via_balance_diff(
        &self,
        meta: &TransactionMeta,
        target_index: usize,
        tracked: &TokenInfo,
    ) -> Result<Option<Movement>, AmountError> {
        let delta = self.balances.token(meta, target_index)?;
        if let Some(mint) = delta.mint {
            if mint != tracked.mint {
                debug!("Account {} holds {}, not {}", target_index, mint, tracked.symbol);
                return Ok(None);
            }
        }

        let (before, after) = match (delta.presence(), delta.raw_before, delta.raw_after) {
            // opening an empty account is not a transfer-in
            (BalancePresence::PostOnly, _, Some(0)) => return Ok(None),
            (BalancePresence::PostOnly, _, Some(after)) => {
                return Ok(Some(Movement {
                    side: TradeSide::Receive,
                    raw_amount: after,
                    decimals: delta.decimals,
                    evidence: TradeEvidence::Unknown,
                }));
            }
            (BalancePresence::Both, Some(before), Some(after)) => (before, after),
            (presence, _, _) => {
                debug!("Tracked balance {:?}, not a trade", presence);
                return Ok(None);
            }
        };

        let side = match after.cmp(&before) {
            Ordering::Greater => TradeSide::Buy,
            Ordering::Less => TradeSide::Sell,
            Ordering::Equal => return Ok(None),
        };

        Ok(Some(Movement {
            side,
            raw_amount: delta.abs_net_change(),
            decimals: delta.decimals,
            evidence: TradeEvidence::BalanceDiff,
        }))
    }

    fn emit(
        &self,
        snapshot: &TransactionSnapshot,
        meta: &TransactionMeta,
        target_index: usize,
        tracked: &TokenInfo,
        movement: Movement,
    ) -> Result<Trade, AmountError> {
        let catalog = &self.registry.catalog;

        let counter: Option<CounterAsset> = match movement.side {
            TradeSide::Receive => None,
            side => Some(CounterAssetResolver::new(catalog).resolve(
                meta,
                target_index,
                &tracked.mint,
                side,
            )?),
        };

        let trade = Trade {
            signature: snapshot.signature.clone(),
            slot: snapshot.slot,
            block_time: snapshot.timestamp(),
            side: movement.side,
            xsol_amount_raw: movement.raw_amount,
            xsol_amount: format_amount(movement.raw_amount, movement.decimals),
            counter_asset: counter.as_ref().map(|c| c.identity.symbol.clone()),
            counter_mint: counter.as_ref().and_then(|c| c.identity.mint),
            counter_amount_raw: counter.as_ref().map(|c| c.raw_amount),
            counter_amount: counter.as_ref().map(|c| c.formatted_amount()),
            counter_source: counter.as_ref().map(|c| c.source),
            historical_price_usd: None,
            evidence: movement.evidence,
            explorer_url: explorer_url(&snapshot.signature),
        };

        let price = HistoricalPriceEstimator::new(catalog).estimate(&trade);
        Ok(trade.with_historical_price(price))
    }
}
