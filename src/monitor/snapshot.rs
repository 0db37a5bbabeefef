//! Read-only view of one confirmed transaction.
//!
//! Everything the classifier needs is extracted once from the RPC response
//! so classification itself never touches the network.

use crate::monitor::error::{MonitorError, MonitorResult};
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};
use solana_sdk::pubkey::Pubkey;
use solana_transaction_status::option_serializer::OptionSerializer;
use solana_transaction_status::{
    EncodedConfirmedTransactionWithStatusMeta, EncodedTransaction, UiInstruction, UiMessage,
    UiParsedInstruction, UiTransactionTokenBalance,
};
use std::str::FromStr;
use tracing::{debug, warn};

/// A program call, outer or inner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgramInvocation {
    /// Index of the program in the account key list
    pub program_id_index: u8,

    /// Account indices passed to the program
    #[serde(default)]
    pub accounts: Vec<u8>,

    /// Base58-encoded instruction data, empty when the RPC returned it parsed
    #[serde(default)]
    pub data: String,

    /// 0 = outer instruction, 1+ = CPI
    #[serde(default)]
    pub stack_depth: u8,
}

impl ProgramInvocation {
    /// Decode the instruction payload.
    pub fn data_bytes(&self) -> MonitorResult<Vec<u8>> {
        bs58::decode(&self.data)
            .into_vec()
            .map_err(|e| MonitorError::ParseError(format!("Failed to decode data: {}", e)))
    }
}

/// Token balance entry as reported in pre/post token balances.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenBalance {
    /// Account index in the transaction
    pub account_index: u8,

    /// Token mint address
    #[serde_as(as = "DisplayFromStr")]
    pub mint: Pubkey,

    /// Amount in base units, kept as the RPC string
    pub amount: String,

    pub decimals: u8,
}

/// Execution metadata. The RPC may omit it entirely.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionMeta {
    /// On-chain error, `None` when the transaction succeeded
    #[serde(default)]
    pub err: Option<String>,

    #[serde(default)]
    pub pre_balances: Vec<u64>,

    #[serde(default)]
    pub post_balances: Vec<u64>,

    #[serde(default)]
    pub pre_token_balances: Vec<TokenBalance>,

    #[serde(default)]
    pub post_token_balances: Vec<TokenBalance>,
}

#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionSnapshot {
    pub signature: String,

    pub slot: u64,

    /// Unix seconds
    #[serde(default)]
    pub block_time: Option<i64>,

    /// Static keys followed by loaded writable and readonly addresses
    #[serde_as(as = "Vec<DisplayFromStr>")]
    pub account_keys: Vec<Pubkey>,

    /// Outer instructions followed by inner instructions
    #[serde(default)]
    pub invocations: Vec<ProgramInvocation>,

    #[serde(default)]
    pub meta: Option<TransactionMeta>,
}

impl TransactionSnapshot {
    /// Parse a snapshot stored as JSON.
    pub fn from_json(text: &str) -> MonitorResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Extract a snapshot from a `getTransaction` response in JSON encoding.
    pub fn from_encoded(transaction: &EncodedConfirmedTransactionWithStatusMeta) -> MonitorResult<Self> {
        let ui_transaction = match &transaction.transaction.transaction {
            EncodedTransaction::Json(tx) => tx,
            _ => {
                return Err(MonitorError::InvalidResponse(
                    "Transaction not in JSON format".to_string(),
                ));
            }
        };

        let signature = ui_transaction
            .signatures
            .first()
            .cloned()
            .ok_or_else(|| MonitorError::ParseError("No signature found".to_string()))?;

        let ui_meta = transaction.transaction.meta.as_ref();

        let (mut account_keys, outer) = match &ui_transaction.message {
            UiMessage::Raw(raw) => {
                let keys = parse_keys(raw.account_keys.iter().map(String::as_str))?;
                let outer: Vec<UiInstruction> = raw
                    .instructions
                    .iter()
                    .cloned()
                    .map(UiInstruction::Compiled)
                    .collect();
                (keys, outer)
            }
            UiMessage::Parsed(parsed) => {
                let keys = parse_keys(parsed.account_keys.iter().map(|k| k.pubkey.as_str()))?;
                (keys, parsed.instructions.clone())
            }
        };

        // Parsed messages already list loaded addresses.
        if matches!(ui_transaction.message, UiMessage::Raw(_)) {
            if let Some(OptionSerializer::Some(loaded)) = ui_meta.map(|m| &m.loaded_addresses) {
                let loaded_keys = parse_keys(
                    loaded
                        .writable
                        .iter()
                        .chain(loaded.readonly.iter())
                        .map(String::as_str),
                )?;
                account_keys.extend(loaded_keys);
            }
        }

        let mut invocations = Vec::new();
        for instruction in &outer {
            if let Some(invocation) = convert_instruction(instruction, &account_keys, 0) {
                invocations.push(invocation);
            }
        }

        if let Some(OptionSerializer::Some(groups)) = ui_meta.map(|m| &m.inner_instructions) {
            for group in groups {
                for instruction in &group.instructions {
                    if let Some(invocation) = convert_instruction(instruction, &account_keys, 1) {
                        invocations.push(invocation);
                    }
                }
            }
        }

        let meta = match ui_meta {
            Some(m) => Some(TransactionMeta {
                err: m.err.as_ref().map(|e| e.to_string()),
                pre_balances: m.pre_balances.clone(),
                post_balances: m.post_balances.clone(),
                pre_token_balances: convert_token_balances(&m.pre_token_balances)?,
                post_token_balances: convert_token_balances(&m.post_token_balances)?,
            }),
            None => {
                warn!("Transaction {} has no metadata", signature);
                None
            }
        };

        debug!(
            "Snapshot {}: {} keys, {} invocations",
            signature,
            account_keys.len(),
            invocations.len()
        );

        Ok(Self {
            signature,
            slot: transaction.slot,
            block_time: transaction.block_time,
            account_keys,
            invocations,
            meta,
        })
    }

    /// Position of an address in the account key list.
    pub fn account_index(&self, address: &Pubkey) -> Option<usize> {
        self.account_keys.iter().position(|k| k == address)
    }

    pub fn account_at(&self, index: usize) -> Option<&Pubkey> {
        self.account_keys.get(index)
    }

    /// Whether the transaction failed on chain.
    pub fn is_failed(&self) -> bool {
        self.meta.as_ref().is_some_and(|m| m.err.is_some())
    }

    /// Program address of an invocation.
    pub fn program_of(&self, invocation: &ProgramInvocation) -> Option<&Pubkey> {
        self.account_at(invocation.program_id_index as usize)
    }

    /// Whether any invocation, outer or inner, targets `program_id`.
    pub fn invokes(&self, program_id: &Pubkey) -> bool {
        self.invocations
            .iter()
            .any(|ix| self.program_of(ix) == Some(program_id))
    }

    /// Block time, 0 when the RPC did not report one.
    pub fn timestamp(&self) -> i64 {
        self.block_time.unwrap_or(0)
    }
}

impl TransactionMeta {
    /// First pre-balance entry for an account index. Entries are not sorted.
    pub fn pre_token_balance(&self, account_index: usize) -> Option<&TokenBalance> {
        self.pre_token_balances
            .iter()
            .find(|b| b.account_index as usize == account_index)
    }

    /// First post-balance entry for an account index.
    pub fn post_token_balance(&self, account_index: usize) -> Option<&TokenBalance> {
        self.post_token_balances
            .iter()
            .find(|b| b.account_index as usize == account_index)
    }

    /// Account indices appearing in either token balance list, in first-seen order.
    pub fn token_account_indices(&self) -> Vec<usize> {
        let mut indices = Vec::new();
        for balance in self
            .pre_token_balances
            .iter()
            .chain(self.post_token_balances.iter())
        {
            let index = balance.account_index as usize;
            if !indices.contains(&index) {
                indices.push(index);
            }
        }
        indices
    }
}

fn parse_keys<'a>(keys: impl Iterator<Item = &'a str>) -> MonitorResult<Vec<Pubkey>> {
    keys.map(|key| {
        Pubkey::from_str(key)
            .map_err(|e| MonitorError::ParseError(format!("Invalid pubkey {}: {}", key, e)))
    })
    .collect()
}

fn convert_token_balances(
    balances: &OptionSerializer<Vec<UiTransactionTokenBalance>>,
) -> MonitorResult<Vec<TokenBalance>> {
    let balances = match balances {
        OptionSerializer::Some(balances) => balances,
        OptionSerializer::None | OptionSerializer::Skip => return Ok(Vec::new()),
    };

    balances
        .iter()
        .map(|b| {
            let mint = Pubkey::from_str(&b.mint)
                .map_err(|e| MonitorError::ParseError(format!("Invalid mint address: {}", e)))?;
            Ok(TokenBalance {
                account_index: b.account_index,
                mint,
                amount: b.ui_token_amount.amount.clone(),
                decimals: b.ui_token_amount.decimals,
            })
        })
        .collect()
}

/// Runtime stack height: 1 for outer instructions, 2+ for CPIs.
fn stack_height(instruction: &UiInstruction) -> Option<u32> {
    match instruction {
        UiInstruction::Compiled(compiled) => compiled.stack_height,
        UiInstruction::Parsed(UiParsedInstruction::Parsed(parsed)) => parsed.stack_height,
        UiInstruction::Parsed(UiParsedInstruction::PartiallyDecoded(partial)) => partial.stack_height,
    }
}

/// `default_depth` applies when the RPC omits the stack height.
fn convert_instruction(
    instruction: &UiInstruction,
    account_keys: &[Pubkey],
    default_depth: u8,
) -> Option<ProgramInvocation> {
    let stack_depth = stack_height(instruction)
        .map(|height| u8::try_from(height.saturating_sub(1)).unwrap_or(u8::MAX))
        .unwrap_or(default_depth);

    let index_of = |address: &str| -> Option<u8> {
        let pubkey = Pubkey::from_str(address).ok()?;
        let position = account_keys.iter().position(|k| *k == pubkey)?;
        u8::try_from(position).ok()
    };

    match instruction {
        UiInstruction::Compiled(compiled) => Some(ProgramInvocation {
            program_id_index: compiled.program_id_index,
            accounts: compiled.accounts.clone(),
            data: compiled.data.clone(),
            stack_depth,
        }),
        UiInstruction::Parsed(UiParsedInstruction::Parsed(parsed)) => {
            let Some(program_id_index) = index_of(&parsed.program_id) else {
                warn!("Program {} not in account keys", parsed.program_id);
                return None;
            };
            Some(ProgramInvocation {
                program_id_index,
                accounts: Vec::new(),
                data: String::new(),
                stack_depth,
            })
        }
        UiInstruction::Parsed(UiParsedInstruction::PartiallyDecoded(partial)) => {
            let Some(program_id_index) = index_of(&partial.program_id) else {
                warn!("Program {} not in account keys", partial.program_id);
                return None;
            };
            Some(ProgramInvocation {
                program_id_index,
                accounts: partial.accounts.iter().filter_map(|a| index_of(a.as_str())).collect(),
                data: partial.data.clone(),
                stack_depth,
            })
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// Minimal successful snapshot with the given keys and no balances.
    pub(crate) fn snapshot(account_keys: Vec<Pubkey>) -> TransactionSnapshot {
        let n = account_keys.len();
        TransactionSnapshot {
            signature: "5xTestSignature".to_string(),
            slot: 250_000_000,
            block_time: Some(1_703_001_234),
            account_keys,
            invocations: Vec::new(),
            meta: Some(TransactionMeta {
                err: None,
                pre_balances: vec![0; n],
                post_balances: vec![0; n],
                pre_token_balances: Vec::new(),
                post_token_balances: Vec::new(),
            }),
        }
    }

    pub(crate) fn balance(account_index: u8, mint: Pubkey, amount: u64, decimals: u8) -> TokenBalance {
        TokenBalance {
            account_index,
            mint,
            amount: amount.to_string(),
            decimals,
        }
    }

    pub(crate) fn invoke(program_id_index: u8) -> ProgramInvocation {
        ProgramInvocation {
            program_id_index,
            accounts: Vec::new(),
            data: String::new(),
            stack_depth: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use solana_transaction_status::{UiCompiledInstruction, UiPartiallyDecodedInstruction};

    #[test]
    fn test_first_matching_token_balance_wins() {
        let mint = Pubkey::new_unique();
        let mut snap = snapshot(vec![Pubkey::new_unique(), Pubkey::new_unique()]);
        let meta = snap.meta.as_mut().unwrap();
        meta.pre_token_balances = vec![
            balance(0, mint, 5, 6),
            balance(1, mint, 10, 6),
            balance(1, mint, 99, 6),
        ];

        let meta = snap.meta.as_ref().unwrap();
        assert_eq!(meta.pre_token_balance(1).unwrap().amount, "10");
        assert!(meta.post_token_balance(1).is_none());
        assert_eq!(meta.token_account_indices(), vec![0, 1]);
    }

    #[test]
    fn test_invokes_resolves_program_index() {
        let program = Pubkey::new_unique();
        let mut snap = snapshot(vec![Pubkey::new_unique(), program]);
        assert!(!snap.invokes(&program));

        snap.invocations.push(invoke(1));
        assert!(snap.invokes(&program));

        // out-of-range index resolves to nothing
        snap.invocations = vec![invoke(7)];
        assert!(!snap.invokes(&program));
    }

    #[test]
    fn test_failed_flag_and_timestamp() {
        let mut snap = snapshot(vec![Pubkey::new_unique()]);
        assert!(!snap.is_failed());
        assert_eq!(snap.timestamp(), 1_703_001_234);

        snap.meta.as_mut().unwrap().err = Some("InstructionError(0, Custom(6001))".to_string());
        assert!(snap.is_failed());

        snap.block_time = None;
        assert_eq!(snap.timestamp(), 0);
    }

    #[test]
    fn test_snapshot_json_shape() {
        let wallet = Pubkey::new_unique();
        let mint = Pubkey::new_unique();
        let json = format!(
            r#"{{
                "signature": "sig123",
                "slot": 42,
                "blockTime": 1703001234,
                "accountKeys": ["{wallet}"],
                "invocations": [{{ "programIdIndex": 0, "data": "2VfUX" }}],
                "meta": {{
                    "err": null,
                    "preBalances": [10],
                    "postBalances": [5],
                    "postTokenBalances": [
                        {{ "accountIndex": 0, "mint": "{mint}", "amount": "2500000", "decimals": 6 }}
                    ]
                }}
            }}"#
        );

        let snap: TransactionSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(snap.account_keys, vec![wallet]);
        assert_eq!(snap.invocations[0].stack_depth, 0);
        assert_eq!(snap.invocations[0].data_bytes().unwrap(), vec![1, 2, 3, 4]);

        let meta = snap.meta.as_ref().unwrap();
        assert!(meta.pre_token_balances.is_empty());
        assert_eq!(meta.post_token_balance(0).unwrap().mint, mint);

        let back = serde_json::to_string(&snap).unwrap();
        let again: TransactionSnapshot = serde_json::from_str(&back).unwrap();
        assert_eq!(snap, again);
    }

    fn compiled(program_id_index: u8, stack_height: Option<u32>) -> UiInstruction {
        UiInstruction::Compiled(UiCompiledInstruction {
            program_id_index,
            accounts: vec![0],
            data: "2VfUX".to_string(),
            stack_height,
        })
    }

    #[test]
    fn test_inner_depth_follows_stack_height() {
        let keys = vec![Pubkey::new_unique(), Pubkey::new_unique()];

        let nested = convert_instruction(&compiled(1, Some(3)), &keys, 1).unwrap();
        assert_eq!(nested.stack_depth, 2);

        let outer = convert_instruction(&compiled(1, Some(1)), &keys, 0).unwrap();
        assert_eq!(outer.stack_depth, 0);

        // older nodes omit the height
        let unknown = convert_instruction(&compiled(1, None), &keys, 1).unwrap();
        assert_eq!(unknown.stack_depth, 1);
    }

    #[test]
    fn test_partially_decoded_depth_and_accounts() {
        let program = Pubkey::new_unique();
        let keys = vec![Pubkey::new_unique(), program];
        let instruction = UiInstruction::Parsed(UiParsedInstruction::PartiallyDecoded(
            UiPartiallyDecodedInstruction {
                program_id: program.to_string(),
                accounts: vec![keys[0].to_string(), Pubkey::new_unique().to_string()],
                data: "2VfUX".to_string(),
                stack_height: Some(2),
            },
        ));

        let invocation = convert_instruction(&instruction, &keys, 1).unwrap();
        assert_eq!(invocation.program_id_index, 1);
        assert_eq!(invocation.accounts, vec![0]);
        assert_eq!(invocation.stack_depth, 1);
    }

    #[test]
    fn test_from_json_reports_malformed_input() {
        let result = TransactionSnapshot::from_json("{\"signature\": 5}");
        assert!(matches!(result, Err(MonitorError::SerializationError(_))));
    }
}
