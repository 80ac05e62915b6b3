use crate::raffle_error::OracleError;

/// A confirmed transaction as reported by the chain
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConfirmedTransaction {
    pub signature: String,
    pub slot: u64,
    pub block_time: Option<i64>,
    /// Execution error reported by the runtime, if the transaction failed
    pub error: Option<String>,
    /// Top-level instructions in message order
    pub instructions: Vec<ParsedInstruction>,
    /// Inner instructions, one group per invoking top-level instruction
    pub inner_instructions: Vec<Vec<ParsedInstruction>>,
    pub pre_token_balances: Option<Vec<TokenBalance>>,
    pub post_token_balances: Option<Vec<TokenBalance>>,
}

impl ConfirmedTransaction {
    pub fn failed(&self) -> bool {
        self.error.is_some()
    }

    /// Top-level instructions followed by every inner instruction, in order
    pub fn all_instructions(&self) -> impl Iterator<Item = &ParsedInstruction> {
        self.instructions
            .iter()
            .chain(self.inner_instructions.iter().flatten())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedInstruction {
    /// Base58 id of the invoked program
    pub program_id: String,
    pub kind: InstructionKind,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InstructionKind {
    Transfer(TokenTransfer),
    TransferChecked(TokenTransfer),
    /// Parsed, but not a token transfer
    Other(String),
    /// The node could not parse the instruction
    Unparsed,
}

impl ParsedInstruction {
    pub fn token_transfer(&self) -> Option<&TokenTransfer> {
        match &self.kind {
            InstructionKind::Transfer(transfer) | InstructionKind::TransferChecked(transfer) => {
                Some(transfer)
            }
            _ => None,
        }
    }
}

/// Fields of a parsed token transfer
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TokenTransfer {
    /// Raw amount in the token's smallest unit
    pub amount: u64,
    pub source: Option<String>,
    pub destination: Option<String>,
    /// Signer that authorized the transfer
    pub authority: Option<String>,
    /// Only present on `transferChecked`
    pub mint: Option<String>,
}

/// Token account balance snapshot
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenBalance {
    pub account_index: u8,
    pub owner: Option<String>,
    pub mint: String,
    pub amount: u64,
}

/// Read-only source of confirmed transaction facts
#[allow(async_fn_in_trait)]
pub trait ChainOracle {
    /// Fetch a confirmed transaction with parsed instructions and inner
    /// instructions expanded. `Ok(None)` when the chain has no confirmed
    /// transaction under this signature.
    async fn fetch_confirmed_transaction(
        &self,
        signature: &str,
    ) -> Result<Option<ConfirmedTransaction>, OracleError>;
}
