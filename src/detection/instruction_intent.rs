//! Protocol fast path: was the exchange program called, and which way?
//!
//! Instruction data is not decoded. When the exchange program appears the
//! direction is read off the tracked account's own balance, which can be
//! wrong if one transaction both mints and redeems, or if unrelated
//! transfers touch the same account.

use crate::amount::AmountError;
use crate::detection::balance_analyzer::BalanceDeltaResolver;
use crate::detection::types::{BalancePresence, Direction, InstructionIntent};
use crate::monitor::snapshot::TransactionSnapshot;
use crate::types::ProtocolPrograms;
use solana_sdk::pubkey::Pubkey;
use tracing::debug;

pub struct InstructionIntentDetector<'a> {
    programs: &'a ProtocolPrograms,
}

impl<'a> InstructionIntentDetector<'a> {
    pub fn new(programs: &'a ProtocolPrograms) -> Self {
        Self { programs }
    }

    /// Whether the exchange program is invoked anywhere in the transaction.
    pub fn has_exchange_invocation(&self, snapshot: &TransactionSnapshot) -> bool {
        for invocation in &snapshot.invocations {
            let Some(label) = snapshot.program_of(invocation).and_then(|p| self.programs.label(p)) else {
                continue;
            };
            let discriminator = invocation
                .data_bytes()
                .map(|d| d.into_iter().take(8).collect::<Vec<_>>())
                .unwrap_or_default();
            debug!(
                "Protocol {} invocation at depth {} (data prefix {:?})",
                label, invocation.stack_depth, discriminator
            );
        }
        snapshot.invokes(&self.programs.exchange)
    }

    /// Infer mint vs redeem for `tracked_mint` on `tracked_index`.
    pub fn detect(
        &self,
        snapshot: &TransactionSnapshot,
        tracked_index: usize,
        tracked_mint: &Pubkey,
    ) -> Result<InstructionIntent, AmountError> {
        if !self.has_exchange_invocation(snapshot) {
            return Ok(InstructionIntent::None);
        }
        let Some(meta) = snapshot.meta.as_ref() else {
            return Ok(InstructionIntent::None);
        };

        let delta = BalanceDeltaResolver::new().token_for_mint(meta, tracked_index, tracked_mint)?;
        let intent = match (delta.presence(), delta.direction) {
            (BalancePresence::Both, Direction::Increase) => InstructionIntent::LikelyMint,
            (BalancePresence::Both, Direction::Decrease) => InstructionIntent::LikelyRedeem,
            // first acquisition through the exchange
            (BalancePresence::PostOnly, _) => InstructionIntent::LikelyMint,
            _ => InstructionIntent::None,
        };

        debug!("Exchange invoked in {}, intent {:?}", snapshot.signature, intent);
        Ok(intent)
    }
}
