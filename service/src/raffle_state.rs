use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use solana_program::{clock::UnixTimestamp, pubkey::Pubkey};
use std::time::Duration;

/// Smallest quantity a single purchase may request
pub const MIN_TICKETS_PER_PURCHASE: i64 = 1;
/// Largest quantity a single purchase may request
pub const MAX_TICKETS_PER_PURCHASE: i64 = 100;
/// Pool reads before an allocation gives up on a contended batch
pub const MAX_ALLOCATION_ATTEMPTS: usize = 5;

/// One numbered raffle entry
#[derive(BorshSerialize, BorshDeserialize, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    /// Entry number in 1..=max_tickets
    pub id: u32,
    /// Wallet that owns the entry
    pub buyer_address: String,
    /// Transaction that paid for the batch this ticket belongs to
    pub tx_signature: String,
}

/// Tickets issued together against a single payment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketBatch {
    pub buyer_address: String,
    pub tx_signature: String,
    pub ids: Vec<u32>,
}

impl TicketBatch {
    pub fn tickets(&self) -> impl Iterator<Item = Ticket> + '_ {
        self.ids.iter().map(move |id| Ticket {
            id: *id,
            buyer_address: self.buyer_address.clone(),
            tx_signature: self.tx_signature.clone(),
        })
    }
}

/// Who may fund a purchase
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PayerPolicy {
    /// Any wallet can pay for any buyer's entry
    AnyPayer,
    /// The transfer authority must be the claimed buyer
    BuyerOnly,
}

/// Raffle settings, fixed at startup
#[derive(Clone, Debug)]
pub struct RaffleConfig {
    /// Price per ticket in the token's smallest unit (2 USDC = 2,000,000)
    pub unit_price_micros: u64,
    /// Total tickets that can ever be sold
    pub max_tickets: u32,
    /// Sales close at this time, if set
    pub end_time: Option<UnixTimestamp>,
    /// Wallet whose token account must receive payment
    pub vault_address: Pubkey,
    /// Mint of the payment token
    pub token_mint: Pubkey,
    pub token_decimals: u8,
    pub token_symbol: String,
    pub payer_policy: PayerPolicy,
    /// Shared secret for administrative draws
    pub admin_secret: Option<String>,
    /// Upper bound on a single verification round trip
    pub verification_timeout: Duration,
}

impl RaffleConfig {
    pub fn new(unit_price_micros: u64, max_tickets: u32, vault_address: Pubkey, token_mint: Pubkey) -> Self {
        Self {
            unit_price_micros,
            max_tickets,
            end_time: None,
            vault_address,
            token_mint,
            token_decimals: 6,
            token_symbol: "USDC".to_string(),
            payer_policy: PayerPolicy::AnyPayer,
            admin_secret: None,
            verification_timeout: Duration::from_secs(45),
        }
    }

    /// Check if sales have closed
    pub fn has_ended(&self, current_time: UnixTimestamp) -> bool {
        matches!(self.end_time, Some(end_time) if current_time >= end_time)
    }

    /// Raw token amount owed for `quantity` tickets
    pub fn price_for(&self, quantity: u32) -> Option<u64> {
        self.unit_price_micros.checked_mul(u64::from(quantity))
    }
}
