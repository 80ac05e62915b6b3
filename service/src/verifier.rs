// Hollow Raffle - On-chain payment verification
use crate::config::format_token_amount;
use crate::oracle::{ChainOracle, ConfirmedTransaction};
use crate::raffle_error::VerificationError;
use crate::raffle_state::RaffleConfig;

use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VerificationOutcome {
    Valid,
    Invalid,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerificationResult {
    pub outcome: VerificationOutcome,
    pub reason: String,
}

impl VerificationResult {
    pub fn is_valid(&self) -> bool {
        self.outcome == VerificationOutcome::Valid
    }
}

impl From<Result<VerifiedTransfer, VerificationError>> for VerificationResult {
    fn from(result: Result<VerifiedTransfer, VerificationError>) -> Self {
        match result {
            Ok(_) => Self {
                outcome: VerificationOutcome::Valid,
                reason: "Transaction verified.".to_string(),
            },
            Err(e) => Self {
                outcome: VerificationOutcome::Invalid,
                reason: e.to_string(),
            },
        }
    }
}

/// The transfer that proved a payment
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerifiedTransfer {
    pub slot: u64,
    /// Position in the flattened instruction sequence
    pub instruction_position: usize,
    pub amount: u64,
}

pub struct TransactionVerifier<O> {
    oracle: O,
    config: Arc<RaffleConfig>,
}

impl<O: ChainOracle> TransactionVerifier<O> {
    pub fn new(oracle: O, config: Arc<RaffleConfig>) -> Self {
        Self { oracle, config }
    }

    /// Decide whether `signature` paid for `quantity` tickets, from any payer
    pub async fn verify(&self, signature: &str, quantity: u32) -> VerificationResult {
        self.verify_payment(signature, quantity, None).await.into()
    }

    /// Verify a payment. With `payer` set, the transfer must also be
    /// authorized by that wallet.
    pub async fn verify_payment(
        &self,
        signature: &str,
        quantity: u32,
        payer: Option<&str>,
    ) -> Result<VerifiedTransfer, VerificationError> {
        log::debug!("Verifying signature {} for {} tickets", signature, quantity);
        if quantity == 0 {
            return Err(VerificationError::ZeroQuantity);
        }

        let transaction = self
            .oracle
            .fetch_confirmed_transaction(signature)
            .await
            .map_err(|e| {
                log::warn!("Oracle error while verifying {}: {}", signature, e);
                VerificationError::Oracle(e.to_string())
            })?
            .ok_or(VerificationError::NotFound)?;

        if transaction.failed() {
            return Err(VerificationError::FailedOnChain);
        }

        let expected_amount = self
            .config
            .price_for(quantity)
            .ok_or(VerificationError::AmountOverflow)?;

        self.find_payment(&transaction, expected_amount, payer)
            .ok_or_else(|| VerificationError::TransferNotFound {
                amount: format!(
                    "{} {}",
                    format_token_amount(expected_amount, self.config.token_decimals),
                    self.config.token_symbol
                ),
            })
    }

    fn find_payment(
        &self,
        transaction: &ConfirmedTransaction,
        expected_amount: u64,
        payer: Option<&str>,
    ) -> Option<VerifiedTransfer> {
        let token_program = spl_token::id().to_string();
        let mint = self.config.token_mint.to_string();

        for (position, instruction) in transaction.all_instructions().enumerate() {
            if instruction.program_id != token_program {
                continue;
            }
            let transfer = match instruction.token_transfer() {
                Some(transfer) => transfer,
                None => continue,
            };
            if transfer.amount != expected_amount {
                continue;
            }
            if matches!(&transfer.mint, Some(transfer_mint) if *transfer_mint != mint) {
                continue;
            }
            if let Some(payer) = payer {
                if transfer.authority.as_deref() != Some(payer) {
                    log::debug!("Transfer at {} not authorized by {}", position, payer);
                    continue;
                }
            }
            // The parsed amount alone proves nothing about where funds landed
            if self.vault_delta(transaction) == Some(i128::from(expected_amount)) {
                return Some(VerifiedTransfer {
                    slot: transaction.slot,
                    instruction_position: position,
                    amount: expected_amount,
                });
            }
        }
        None
    }

    /// Change in the vault's token balance across the transaction
    fn vault_delta(&self, transaction: &ConfirmedTransaction) -> Option<i128> {
        let pre_balances = transaction.pre_token_balances.as_ref()?;
        let post_balances = transaction.post_token_balances.as_ref()?;

        let vault = self.config.vault_address.to_string();
        let mint = self.config.token_mint.to_string();

        let post = post_balances
            .iter()
            .find(|b| b.owner.as_deref() == Some(vault.as_str()) && b.mint == mint)?;
        let pre_amount = pre_balances
            .iter()
            .find(|b| b.account_index == post.account_index)
            .map_or(0, |b| b.amount);

        Some(i128::from(post.amount) - i128::from(pre_amount))
    }
}
