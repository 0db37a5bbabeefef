//! Fetch and classify many transactions for one token account.

use crate::detection::TradeClassifier;
use crate::monitor::error::MonitorResult;
use crate::monitor::fetcher::TransactionFetcher;
use crate::types::{Registry, Trade, TradeParseResult};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A transaction that could not be classified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanFailure {
    pub signature: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanReport {
    /// Newest first
    pub trades: Vec<Trade>,
    pub failures: Vec<ScanFailure>,
    /// Transactions examined, trades or not
    pub scanned: usize,
}

impl ScanReport {
    /// Fold one transaction's outcome into the report.
    pub fn record(&mut self, signature: &str, outcome: Result<TradeParseResult, String>) {
        self.scanned += 1;
        match outcome {
            Ok(result) => {
                if let Some(reason) = result.error_message() {
                    self.failures.push(ScanFailure {
                        signature: signature.to_string(),
                        reason: reason.to_string(),
                    });
                } else if let Some(trade) = result.into_trade() {
                    self.trades.push(trade);
                }
            }
            Err(reason) => self.failures.push(ScanFailure {
                signature: signature.to_string(),
                reason,
            }),
        }
    }

    /// Order trades by slot, newest first; equal slots by signature.
    pub fn finish(mut self) -> Self {
        self.trades
            .sort_by(|a, b| b.slot.cmp(&a.slot).then_with(|| a.signature.cmp(&b.signature)));
        self.failures.sort_by(|a, b| a.signature.cmp(&b.signature));
        self
    }
}

/// Classifies an account's history with a bounded number of requests in flight
pub struct TradeScanner {
    fetcher: Arc<TransactionFetcher>,
    classifier: Arc<TradeClassifier>,
    concurrency: usize,
}

impl TradeScanner {
    pub fn new(fetcher: Arc<TransactionFetcher>, registry: Arc<Registry>, concurrency: usize) -> Self {
        Self {
            fetcher,
            classifier: Arc::new(TradeClassifier::new(registry)),
            concurrency: concurrency.max(1),
        }
    }

    /// Classify the `limit` most recent transactions of `account`.
    pub async fn scan(&self, account: &Pubkey, limit: usize) -> MonitorResult<ScanReport> {
        info!("Scanning up to {} transactions of {}", limit, account);
        let signatures = self.fetcher.recent_signatures(account, limit).await?;
        Ok(self.scan_signatures(account, signatures).await)
    }

    /// Classify the given signatures. Per-transaction failures end up in
    /// the report, never abort the scan.
    pub async fn scan_signatures(&self, account: &Pubkey, signatures: Vec<Signature>) -> ScanReport {
        let account = *account;
        let mut outcomes = stream::iter(signatures)
            .map(|signature| {
                let fetcher = Arc::clone(&self.fetcher);
                let classifier = Arc::clone(&self.classifier);
                async move {
                    let outcome = match fetcher.fetch_snapshot(&signature).await {
                        Ok(snapshot) => classifier
                            .classify_account(&snapshot, &account)
                            .map_err(|e| e.to_string()),
                        Err(e) => Err(e.to_string()),
                    };
                    (signature, outcome)
                }
            })
            .buffer_unordered(self.concurrency);

        let mut report = ScanReport::default();
        while let Some((signature, outcome)) = outcomes.next().await {
            match &outcome {
                Ok(result) if result.as_trade().is_some() => debug!("Trade in {}", signature),
                Ok(result) if result.error_message().is_some() => {
                    warn!("Could not classify {}: {:?}", signature, result.error_message())
                }
                Ok(_) => {}
                Err(e) => warn!("Skipping {}: {}", signature, e),
            }
            report.record(&signature.to_string(), outcome);
        }

        let report = report.finish();
        info!(
            "Scanned {} transactions: {} trades, {} failures",
            report.scanned,
            report.trades.len(),
            report.failures.len()
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::types::TradeEvidence;
    use crate::types::{TradeSide, explorer_url};

    fn trade(signature: &str, slot: u64) -> Trade {
        Trade {
            signature: signature.to_string(),
            slot,
            block_time: 0,
            side: TradeSide::Receive,
            xsol_amount_raw: 1,
            xsol_amount: "0.000001".to_string(),
            counter_asset: None,
            counter_mint: None,
            counter_amount_raw: None,
            counter_amount: None,
            counter_source: None,
            historical_price_usd: None,
            evidence: TradeEvidence::Unknown,
            explorer_url: explorer_url(signature),
        }
    }

    #[test]
    fn test_report_orders_newest_first() {
        let mut report = ScanReport::default();
        report.record("a", Ok(TradeParseResult::trade(trade("a", 10))));
        report.record("c", Ok(TradeParseResult::trade(trade("c", 30))));
        report.record("b", Ok(TradeParseResult::trade(trade("b", 30))));
        report.record("d", Ok(TradeParseResult::not_a_trade()));

        let report = report.finish();
        let order: Vec<_> = report.trades.iter().map(|t| t.signature.as_str()).collect();
        assert_eq!(order, vec!["b", "c", "a"]);
        assert_eq!(report.scanned, 4);
        assert!(report.failures.is_empty());
    }

    #[test]
    fn test_failures_do_not_stop_the_report() {
        let mut report = ScanReport::default();
        report.record("x", Err("Transaction x not found after 3 attempts".to_string()));
        report.record("y", Ok(TradeParseResult::error("transaction failed")));
        report.record("z", Ok(TradeParseResult::trade(trade("z", 5))));

        let report = report.finish();
        assert_eq!(report.trades.len(), 1);
        assert_eq!(report.failures.len(), 2);
        assert_eq!(report.failures[1].reason, "transaction failed");
        assert_eq!(report.scanned, 3);
    }
}
