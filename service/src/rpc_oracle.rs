// Chain oracle backed by a Solana JSON-RPC node
use crate::oracle::{ChainOracle, ConfirmedTransaction, InstructionKind, ParsedInstruction, TokenBalance, TokenTransfer};
use crate::raffle_error::OracleError;

use serde::Deserialize;
use serde_json::{json, Value};
use solana_client::{nonblocking::rpc_client::RpcClient, rpc_request::RpcRequest};
use solana_sdk::{commitment_config::CommitmentConfig, signature::Signature};
use std::{str::FromStr, time::Duration};

pub struct RpcChainOracle {
    client: RpcClient,
}

impl RpcChainOracle {
    pub fn new(rpc_url: &str, timeout: Duration) -> Self {
        Self {
            client: RpcClient::new_with_timeout_and_commitment(
                rpc_url.to_string(),
                timeout,
                CommitmentConfig::confirmed(),
            ),
        }
    }

    pub fn url(&self) -> String {
        self.client.url()
    }
}

impl ChainOracle for RpcChainOracle {
    async fn fetch_confirmed_transaction(
        &self,
        signature: &str,
    ) -> Result<Option<ConfirmedTransaction>, OracleError> {
        Signature::from_str(signature)
            .map_err(|e| OracleError::InvalidSignature(format!("{}: {}", signature, e)))?;

        let params = json!([
            signature,
            {
                "encoding": "jsonParsed",
                "commitment": "confirmed",
                "maxSupportedTransactionVersion": 0,
            }
        ]);
        let response: Value = self
            .client
            .send(RpcRequest::GetTransaction, params)
            .await
            .map_err(|e| OracleError::Rpc(e.to_string()))?;

        parse_transaction_json(signature, response)
    }
}

/// Decode a `getTransaction` (`jsonParsed`) result. A JSON `null` means the
/// node has no confirmed transaction under this signature.
pub fn parse_transaction_json(
    signature: &str,
    response: Value,
) -> Result<Option<ConfirmedTransaction>, OracleError> {
    let tx: Option<RpcTransaction> =
        serde_json::from_value(response).map_err(|e| OracleError::Malformed(e.to_string()))?;
    Ok(tx.map(|tx| tx.into_confirmed(signature)))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcTransaction {
    slot: u64,
    #[serde(default)]
    block_time: Option<i64>,
    #[serde(default)]
    meta: Option<RpcMeta>,
    transaction: RpcEnvelope,
}

#[derive(Deserialize)]
struct RpcEnvelope {
    message: RpcMessage,
}

#[derive(Deserialize)]
struct RpcMessage {
    instructions: Vec<RpcInstruction>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcInstruction {
    program_id: String,
    #[serde(default)]
    parsed: Option<Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcMeta {
    #[serde(default)]
    err: Option<Value>,
    #[serde(default)]
    inner_instructions: Option<Vec<RpcInnerInstructions>>,
    #[serde(default)]
    pre_token_balances: Option<Vec<RpcTokenBalance>>,
    #[serde(default)]
    post_token_balances: Option<Vec<RpcTokenBalance>>,
}

#[derive(Deserialize)]
struct RpcInnerInstructions {
    instructions: Vec<RpcInstruction>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcTokenBalance {
    account_index: u8,
    mint: String,
    #[serde(default)]
    owner: Option<String>,
    ui_token_amount: RpcTokenAmount,
}

#[derive(Deserialize)]
struct RpcTokenAmount {
    amount: String,
}

impl RpcTransaction {
    fn into_confirmed(self, signature: &str) -> ConfirmedTransaction {
        let instructions = self
            .transaction
            .message
            .instructions
            .into_iter()
            .map(RpcInstruction::into_parsed)
            .collect();

        let mut confirmed = ConfirmedTransaction {
            signature: signature.to_string(),
            slot: self.slot,
            block_time: self.block_time,
            instructions,
            ..ConfirmedTransaction::default()
        };

        if let Some(meta) = self.meta {
            confirmed.error = meta.err.filter(|err| !err.is_null()).map(|err| err.to_string());
            confirmed.inner_instructions = meta
                .inner_instructions
                .unwrap_or_default()
                .into_iter()
                .map(|group| group.instructions.into_iter().map(RpcInstruction::into_parsed).collect())
                .collect();
            confirmed.pre_token_balances = meta.pre_token_balances.map(into_balances);
            confirmed.post_token_balances = meta.post_token_balances.map(into_balances);
        }
        confirmed
    }
}

fn into_balances(balances: Vec<RpcTokenBalance>) -> Vec<TokenBalance> {
    // An amount the node cannot express as u64 cannot match any payment
    balances
        .into_iter()
        .filter_map(|b| {
            let amount = b.ui_token_amount.amount.parse::<u64>().ok()?;
            Some(TokenBalance {
                account_index: b.account_index,
                owner: b.owner,
                mint: b.mint,
                amount,
            })
        })
        .collect()
}

impl RpcInstruction {
    fn into_parsed(self) -> ParsedInstruction {
        let kind = match &self.parsed {
            Some(Value::Object(parsed)) => {
                let kind = parsed.get("type").and_then(Value::as_str).unwrap_or_default();
                let info = parsed.get("info");
                match (kind, info.and_then(parse_transfer)) {
                    ("transfer", Some(transfer)) => InstructionKind::Transfer(transfer),
                    ("transferChecked", Some(transfer)) => InstructionKind::TransferChecked(transfer),
                    (kind, _) => InstructionKind::Other(kind.to_string()),
                }
            }
            Some(Value::String(kind)) => InstructionKind::Other(kind.clone()),
            _ => InstructionKind::Unparsed,
        };
        ParsedInstruction { program_id: self.program_id, kind }
    }
}

fn parse_transfer(info: &Value) -> Option<TokenTransfer> {
    let text = |key: &str| info.get(key).and_then(Value::as_str).map(str::to_string);
    let amount = info
        .get("amount")
        .or_else(|| info.get("tokenAmount").and_then(|t| t.get("amount")))
        .and_then(|amount| match amount {
            Value::String(s) => s.parse::<u64>().ok(),
            Value::Number(n) => n.as_u64(),
            _ => None,
        })?;

    Some(TokenTransfer {
        amount,
        source: text("source"),
        destination: text("destination"),
        authority: text("authority").or_else(|| text("multisigAuthority")),
        mint: text("mint"),
    })
}
