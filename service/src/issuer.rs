// Hollow Raffle - Ticket issuance
use crate::ledger::LedgerStore;
use crate::oracle::ChainOracle;
use crate::raffle_error::{LedgerError, PurchaseError, VerificationError};
use crate::raffle_state::{
    PayerPolicy, RaffleConfig, TicketBatch, MAX_ALLOCATION_ATTEMPTS, MAX_TICKETS_PER_PURCHASE,
    MIN_TICKETS_PER_PURCHASE,
};
use crate::randomness;
use crate::verifier::TransactionVerifier;

use std::{
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

/// Tickets stored for a verified purchase
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IssuedTickets {
    pub buyer_address: String,
    pub tx_signature: String,
    pub ticket_ids: Vec<u32>,
}

pub struct TicketIssuer<L, O> {
    ledger: Arc<L>,
    verifier: TransactionVerifier<O>,
    config: Arc<RaffleConfig>,
}

impl<L: LedgerStore, O: ChainOracle> TicketIssuer<L, O> {
    pub fn new(ledger: Arc<L>, oracle: O, config: Arc<RaffleConfig>) -> Self {
        Self {
            ledger,
            verifier: TransactionVerifier::new(oracle, config.clone()),
            config,
        }
    }

    pub fn verifier(&self) -> &TransactionVerifier<O> {
        &self.verifier
    }

    /// Verify the payment behind `signature` and store `quantity` new tickets
    /// for `buyer_address`.
    ///
    /// Nothing is written unless the chain proves the payment. A batch is
    /// stored whole or not at all.
    pub async fn issue_tickets(
        &self,
        buyer_address: &str,
        signature: &str,
        quantity: i64,
    ) -> Result<IssuedTickets, PurchaseError> {
        if buyer_address.is_empty() || signature.is_empty() {
            return Err(PurchaseError::MissingFields);
        }
        if !(MIN_TICKETS_PER_PURCHASE..=MAX_TICKETS_PER_PURCHASE).contains(&quantity) {
            return Err(PurchaseError::InvalidQuantity);
        }
        let quantity = quantity as u32;
        if self.config.has_ended(unix_now()) {
            return Err(PurchaseError::RaffleEnded);
        }

        // Both pre-checks are advisory; insert_batch enforces them again
        let sold = self.ledger.count().await?;
        let capacity = u64::from(self.config.max_tickets);
        if sold + u64::from(quantity) > capacity {
            return Err(PurchaseError::CapacityExceeded {
                remaining: capacity.saturating_sub(sold),
            });
        }
        if self.ledger.find_by_signature(signature).await?.is_some() {
            return Err(PurchaseError::SignatureAlreadyUsed);
        }

        let payer = match self.config.payer_policy {
            PayerPolicy::AnyPayer => None,
            PayerPolicy::BuyerOnly => Some(buyer_address),
        };
        let verification = tokio::time::timeout(
            self.config.verification_timeout,
            self.verifier.verify_payment(signature, quantity, payer),
        )
        .await
        .unwrap_or(Err(VerificationError::TimedOut));
        let transfer = verification.map_err(|e| {
            log::warn!("Rejected signature {} from {}: {}", signature, buyer_address, e);
            PurchaseError::VerificationFailed(e.to_string())
        })?;
        log::debug!(
            "Payment {} verified at slot {} (instruction {})",
            signature,
            transfer.slot,
            transfer.instruction_position
        );

        let ticket_ids = self.allocate(buyer_address, signature, quantity).await?;
        log::info!(
            "New purchase: {} bought {} tickets with {}",
            buyer_address,
            ticket_ids.len(),
            signature
        );

        Ok(IssuedTickets {
            buyer_address: buyer_address.to_string(),
            tx_signature: signature.to_string(),
            ticket_ids,
        })
    }

    /// Sample unused ids and store them as one batch. A concurrent buyer
    /// taking one of the sampled ids sends us back for a fresh read of the
    /// issued set.
    async fn allocate(
        &self,
        buyer_address: &str,
        signature: &str,
        quantity: u32,
    ) -> Result<Vec<u32>, PurchaseError> {
        for attempt in 1..=MAX_ALLOCATION_ATTEMPTS {
            let issued = self.ledger.issued_ids().await?;
            let remaining = randomness::free_ids(&issued, self.config.max_tickets);
            if remaining < u64::from(quantity) {
                return Err(PurchaseError::CapacityExceeded { remaining });
            }

            let seed = randomness::fresh_seed();
            let batch = TicketBatch {
                buyer_address: buyer_address.to_string(),
                tx_signature: signature.to_string(),
                ids: randomness::sample_unissued(
                    &seed,
                    &issued,
                    self.config.max_tickets,
                    quantity as usize,
                ),
            };

            match self.ledger.insert_batch(&batch, self.config.max_tickets).await {
                Ok(()) => return Ok(batch.ids),
                Err(LedgerError::DuplicateId(id)) => {
                    log::warn!("Ticket id {} taken during attempt {} for {}", id, attempt, signature);
                }
                Err(LedgerError::SignatureClaimed(_)) => return Err(PurchaseError::SignatureAlreadyUsed),
                Err(LedgerError::CapacityExhausted { remaining }) => {
                    return Err(PurchaseError::CapacityExceeded { remaining })
                }
                Err(e) => {
                    log::error!("Critical ledger error while storing {}: {}", signature, e);
                    return Err(e.into());
                }
            }
        }

        log::error!(
            "Gave up allocating {} tickets for verified payment {} after {} attempts",
            quantity,
            signature,
            MAX_ALLOCATION_ATTEMPTS
        );
        Err(PurchaseError::IssuanceFailed)
    }
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_secs() as i64)
}
