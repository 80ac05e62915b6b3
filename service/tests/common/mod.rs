#![allow(dead_code)]

use hollow_raffle::{
    ledger::{LedgerStore, MemoryLedger},
    oracle::{ChainOracle, ConfirmedTransaction, InstructionKind, ParsedInstruction, TokenBalance, TokenTransfer},
    raffle_error::{LedgerError, OracleError},
    raffle_state::{RaffleConfig, Ticket, TicketBatch},
};
use solana_sdk::pubkey::Pubkey;
use std::{
    collections::{BTreeSet, HashMap},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

/// 2 USDC in raw units
pub const UNIT_PRICE: u64 = 2_000_000;

pub fn test_config(max_tickets: u32) -> RaffleConfig {
    let mut config = RaffleConfig::new(UNIT_PRICE, max_tickets, Pubkey::new_unique(), Pubkey::new_unique());
    config.admin_secret = Some("let-me-draw".to_string());
    config
}

/// Chain oracle serving canned transactions
#[derive(Clone, Default)]
pub struct MemoryOracle {
    transactions: Arc<Mutex<HashMap<String, ConfirmedTransaction>>>,
    failure: Arc<Mutex<Option<String>>>,
    delay: Option<Duration>,
    calls: Arc<AtomicUsize>,
}

impl MemoryOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, transaction: ConfirmedTransaction) {
        self.transactions
            .lock()
            .unwrap()
            .insert(transaction.signature.clone(), transaction);
    }

    /// Fail every fetch with an RPC error
    pub fn fail_with(&self, message: &str) {
        *self.failure.lock().unwrap() = Some(message.to_string());
    }

    /// Stall every fetch
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ChainOracle for MemoryOracle {
    async fn fetch_confirmed_transaction(
        &self,
        signature: &str,
    ) -> Result<Option<ConfirmedTransaction>, OracleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = self.failure.lock().unwrap().clone() {
            return Err(OracleError::Rpc(message));
        }
        Ok(self.transactions.lock().unwrap().get(signature).cloned())
    }
}

pub fn token_transfer(amount: u64, authority: &str) -> ParsedInstruction {
    ParsedInstruction {
        program_id: spl_token::id().to_string(),
        kind: InstructionKind::Transfer(TokenTransfer {
            amount,
            source: Some(Pubkey::new_unique().to_string()),
            destination: Some(Pubkey::new_unique().to_string()),
            authority: Some(authority.to_string()),
            mint: None,
        }),
    }
}

pub fn balance(account_index: u8, owner: &Pubkey, mint: &Pubkey, amount: u64) -> TokenBalance {
    TokenBalance {
        account_index,
        owner: Some(owner.to_string()),
        mint: mint.to_string(),
        amount,
    }
}

/// A successful top-level transfer of `amount` into the vault's token account
pub fn vault_payment(signature: &str, config: &RaffleConfig, amount: u64, payer: &str) -> ConfirmedTransaction {
    let payer_key = Pubkey::new_unique();
    ConfirmedTransaction {
        signature: signature.to_string(),
        slot: 42,
        block_time: Some(1_700_000_000),
        error: None,
        instructions: vec![token_transfer(amount, payer)],
        inner_instructions: vec![],
        pre_token_balances: Some(vec![
            balance(1, &payer_key, &config.token_mint, 50_000_000),
            balance(2, &config.vault_address, &config.token_mint, 10_000_000),
        ]),
        post_token_balances: Some(vec![
            balance(1, &payer_key, &config.token_mint, 50_000_000 - amount),
            balance(2, &config.vault_address, &config.token_mint, 10_000_000 + amount),
        ]),
    }
}

pub fn sold_tickets(ids: impl IntoIterator<Item = u32>) -> Vec<Ticket> {
    ids.into_iter()
        .map(|id| Ticket {
            id,
            buyer_address: "EarlyBird".to_string(),
            tx_signature: format!("EarlySig{}", id),
        })
        .collect()
}

/// Ledger whose backing store is down
pub struct OfflineLedger;

fn offline() -> LedgerError {
    LedgerError::Unavailable("connection refused".to_string())
}

impl LedgerStore for OfflineLedger {
    async fn count(&self) -> Result<u64, LedgerError> {
        Err(offline())
    }

    async fn find_by_signature(&self, _signature: &str) -> Result<Option<Ticket>, LedgerError> {
        Err(offline())
    }

    async fn tickets_by_owner(&self, _owner: &str) -> Result<Vec<Ticket>, LedgerError> {
        Err(offline())
    }

    async fn all_tickets(&self) -> Result<Vec<Ticket>, LedgerError> {
        Err(offline())
    }

    async fn issued_ids(&self) -> Result<BTreeSet<u32>, LedgerError> {
        Err(offline())
    }

    async fn insert_batch(&self, _batch: &TicketBatch, _capacity: u32) -> Result<(), LedgerError> {
        Err(offline())
    }
}

/// Ledger that loses the id race for its first `collisions` inserts, then
/// stores batches in memory
pub struct CollidingLedger {
    inner: MemoryLedger,
    collisions: AtomicUsize,
    inserts: AtomicUsize,
}

impl CollidingLedger {
    pub fn new(collisions: usize) -> Self {
        Self {
            inner: MemoryLedger::new(),
            collisions: AtomicUsize::new(collisions),
            inserts: AtomicUsize::new(0),
        }
    }

    /// Every insert collides
    pub fn always() -> Self {
        Self::new(usize::MAX)
    }

    pub fn inserts(&self) -> usize {
        self.inserts.load(Ordering::SeqCst)
    }
}

impl LedgerStore for CollidingLedger {
    async fn count(&self) -> Result<u64, LedgerError> {
        self.inner.count().await
    }

    async fn find_by_signature(&self, signature: &str) -> Result<Option<Ticket>, LedgerError> {
        self.inner.find_by_signature(signature).await
    }

    async fn tickets_by_owner(&self, owner: &str) -> Result<Vec<Ticket>, LedgerError> {
        self.inner.tickets_by_owner(owner).await
    }

    async fn all_tickets(&self) -> Result<Vec<Ticket>, LedgerError> {
        self.inner.all_tickets().await
    }

    async fn issued_ids(&self) -> Result<BTreeSet<u32>, LedgerError> {
        self.inner.issued_ids().await
    }

    async fn insert_batch(&self, batch: &TicketBatch, capacity: u32) -> Result<(), LedgerError> {
        self.inserts.fetch_add(1, Ordering::SeqCst);
        let collided = self
            .collisions
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if collided {
            return Err(LedgerError::DuplicateId(batch.ids.first().copied().unwrap_or(1)));
        }
        self.inner.insert_batch(batch, capacity).await
    }
}
