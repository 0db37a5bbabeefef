use crate::amount::parse_raw;
use crate::catalog::AssetCatalog;
use crate::monitor::error::{MonitorError, MonitorResult};
use crate::monitor::snapshot::TransactionSnapshot;
use crate::pricing::metrics::ProtocolSnapshot;
use crate::types::MonitorConfig;
use rust_decimal::Decimal;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_client::GetConfirmedSignaturesForAddress2Config;
use solana_client::rpc_config::RpcTransactionConfig;
use solana_client::rpc_response::RpcConfirmedTransactionStatusWithSignature;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_transaction_status::{EncodedConfirmedTransactionWithStatusMeta, UiTransactionEncoding};
use std::str::FromStr;
use std::sync::Arc;
use tokio::time::{Duration, sleep};
use tracing::{debug, error, info, warn};

/// Largest page `getSignaturesForAddress` returns.
const SIGNATURE_PAGE_LIMIT: usize = 1_000;

/// Reads transactions and token supplies over JSON-RPC
pub struct TransactionFetcher {
    rpc_client: Arc<RpcClient>,
    max_retries: u32,
}

impl TransactionFetcher {
    pub fn new(config: &MonitorConfig) -> Self {
        let commitment = if config.use_confirmed_commitment {
            CommitmentConfig::confirmed()
        } else {
            CommitmentConfig::finalized()
        };

        Self {
            rpc_client: Arc::new(RpcClient::new_with_commitment(
                config.rpc_endpoint.clone(),
                commitment,
            )),
            max_retries: config.max_retries.max(1),
        }
    }

    /// Most recent successful signatures touching `address`, newest first.
    pub async fn recent_signatures(&self, address: &Pubkey, limit: usize) -> MonitorResult<Vec<Signature>> {
        let mut signatures = Vec::with_capacity(limit);
        let mut before: Option<Signature> = None;
        let mut skipped = 0usize;

        while signatures.len() < limit {
            let requested = (limit - signatures.len()).min(SIGNATURE_PAGE_LIMIT);
            let page = self
                .rpc_client
                .get_signatures_for_address_with_config(
                    address,
                    GetConfirmedSignaturesForAddress2Config {
                        before,
                        until: None,
                        limit: Some(requested),
                        commitment: Some(self.rpc_client.commitment()),
                    },
                )
                .await?;

            let outcome = absorb_page(page, requested, &mut signatures)?;
            skipped += outcome.skipped;
            if outcome.exhausted {
                break;
            }
            before = outcome.before;
        }

        signatures.truncate(limit);
        debug!(
            "Collected {} signatures for {} ({} failed skipped)",
            signatures.len(),
            address,
            skipped
        );
        Ok(signatures)
    }

    /// Fetch a transaction, retrying with a growing delay.
    pub async fn fetch_transaction(
        &self,
        signature: &Signature,
    ) -> MonitorResult<EncodedConfirmedTransactionWithStatusMeta> {
        let mut retries = 0;

        loop {
            match self
                .rpc_client
                .get_transaction_with_config(
                    signature,
                    RpcTransactionConfig {
                        encoding: Some(UiTransactionEncoding::Json),
                        commitment: Some(self.rpc_client.commitment()),
                        max_supported_transaction_version: Some(0),
                    },
                )
                .await
            {
                Ok(transaction) => {
                    debug!("Fetched transaction: {}", signature);
                    return Ok(transaction);
                }
                Err(e) => {
                    retries += 1;
                    if retries >= self.max_retries {
                        error!(
                            "Failed to fetch transaction {} after {} attempts: {}",
                            signature, retries, e
                        );
                        return Err(MonitorError::NotFound(signature.to_string(), retries));
                    }

                    warn!(
                        "Retry {}/{} - Error fetching transaction {}: {}",
                        retries, self.max_retries, signature, e
                    );
                    sleep(Duration::from_millis(1000 * retries as u64)).await;
                }
            }
        }
    }

    pub async fn fetch_snapshot(&self, signature: &Signature) -> MonitorResult<TransactionSnapshot> {
        let transaction = self.fetch_transaction(signature).await?;
        TransactionSnapshot::from_encoded(&transaction)
    }

    /// Raw supply and decimals of a mint.
    pub async fn token_supply(&self, mint: &Pubkey) -> MonitorResult<(u64, u8)> {
        let supply = self.rpc_client.get_token_supply(mint).await?;
        let raw = parse_raw(&supply.amount)
            .map_err(|e| MonitorError::InvalidResponse(format!("Supply of {}: {}", mint, e)))?;
        Ok((raw, supply.decimals))
    }

    /// Read both protocol supplies at the current slot.
    ///
    /// The reserve and the SOL price come from the caller; neither is
    /// readable without the protocol's account layouts or a price feed.
    pub async fn protocol_snapshot(
        &self,
        catalog: &AssetCatalog,
        reserve_lamports: u64,
        native_usd_price: Decimal,
    ) -> MonitorResult<ProtocolSnapshot> {
        let slot = self.rpc_client.get_slot().await?;
        let (stable_supply_raw, stable_decimals) = self.token_supply(&catalog.stable().mint).await?;
        let (leveraged_supply_raw, leveraged_decimals) =
            self.token_supply(&catalog.leveraged().mint).await?;

        let timestamp = match self.rpc_client.get_block_time(slot).await {
            Ok(time) => time,
            Err(e) => {
                warn!("No block time for slot {}: {}", slot, e);
                0
            }
        };

        info!(
            "Supplies at slot {}: {} {} / {} {}",
            slot,
            stable_supply_raw,
            catalog.stable().symbol,
            leveraged_supply_raw,
            catalog.leveraged().symbol
        );

        Ok(ProtocolSnapshot {
            timestamp,
            slot,
            stable_supply_raw,
            leveraged_supply_raw,
            stable_decimals,
            leveraged_decimals,
            reserve_lamports,
            native_usd_price,
        })
    }
}

/// What one `getSignaturesForAddress` page contributed.
#[derive(Debug, PartialEq, Eq)]
struct PageOutcome {
    /// Cursor for the next page: the oldest entry, failed or not
    before: Option<Signature>,
    /// The RPC returned fewer entries than asked for
    exhausted: bool,
    skipped: usize,
}

fn parse_signature(value: &str) -> MonitorResult<Signature> {
    Signature::from_str(value)
        .map_err(|e| MonitorError::InvalidResponse(format!("Invalid signature {}: {}", value, e)))
}

/// Append the successful signatures of `page` to `signatures`.
fn absorb_page(
    page: Vec<RpcConfirmedTransactionStatusWithSignature>,
    requested: usize,
    signatures: &mut Vec<Signature>,
) -> MonitorResult<PageOutcome> {
    let before = page.last().map(|last| parse_signature(&last.signature)).transpose()?;
    let exhausted = page.len() < requested;

    let mut skipped = 0;
    for status in page {
        if status.err.is_some() {
            skipped += 1;
            continue;
        }
        signatures.push(parse_signature(&status.signature)?);
    }

    Ok(PageOutcome {
        before,
        exhausted,
        skipped,
    })
}
