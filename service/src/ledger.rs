// Hollow Raffle - Ticket ledger
use crate::raffle_error::LedgerError;
use crate::raffle_state::{Ticket, TicketBatch};

use borsh::{BorshDeserialize, BorshSerialize};
use std::{
    collections::{BTreeMap, BTreeSet, HashSet},
    path::{Path, PathBuf},
    sync::Mutex,
};
use tokio::io::AsyncWriteExt;

/// Storage for sold tickets.
///
/// `insert_batch` is the only write and is atomic: either every ticket of the
/// batch is stored or none is. Stores reject a batch whose signature already
/// backs tickets, a batch that would push the count past `capacity`, and any
/// id already taken.
#[allow(async_fn_in_trait)]
pub trait LedgerStore {
    async fn count(&self) -> Result<u64, LedgerError>;

    async fn find_by_signature(&self, signature: &str) -> Result<Option<Ticket>, LedgerError>;

    async fn tickets_by_owner(&self, owner: &str) -> Result<Vec<Ticket>, LedgerError>;

    /// Every ticket, ordered by id
    async fn all_tickets(&self) -> Result<Vec<Ticket>, LedgerError>;

    async fn issued_ids(&self) -> Result<BTreeSet<u32>, LedgerError>;

    async fn insert_batch(&self, batch: &TicketBatch, capacity: u32) -> Result<(), LedgerError>;
}

#[derive(Debug, Default)]
struct LedgerState {
    tickets: BTreeMap<u32, Ticket>,
    signatures: HashSet<String>,
}

#[derive(BorshSerialize, BorshDeserialize)]
struct LedgerSnapshot {
    tickets: Vec<Ticket>,
}

impl LedgerState {
    fn from_tickets(tickets: Vec<Ticket>) -> Result<Self, LedgerError> {
        let mut state = Self::default();
        for ticket in tickets {
            let id = ticket.id;
            state.signatures.insert(ticket.tx_signature.clone());
            if state.tickets.insert(id, ticket).is_some() {
                return Err(LedgerError::Corrupt(format!("ticket id {} appears twice", id)));
            }
        }
        Ok(state)
    }

    fn count(&self) -> u64 {
        self.tickets.len() as u64
    }

    fn find_by_signature(&self, signature: &str) -> Option<Ticket> {
        if !self.signatures.contains(signature) {
            return None;
        }
        self.tickets.values().find(|t| t.tx_signature == signature).cloned()
    }

    fn tickets_by_owner(&self, owner: &str) -> Vec<Ticket> {
        self.tickets
            .values()
            .filter(|t| t.buyer_address == owner)
            .cloned()
            .collect()
    }

    fn check_batch(&self, batch: &TicketBatch, capacity: u32) -> Result<(), LedgerError> {
        if self.signatures.contains(&batch.tx_signature) {
            return Err(LedgerError::SignatureClaimed(batch.tx_signature.clone()));
        }

        let sold = self.count();
        let capacity = u64::from(capacity);
        if sold + batch.ids.len() as u64 > capacity {
            return Err(LedgerError::CapacityExhausted {
                remaining: capacity.saturating_sub(sold),
            });
        }

        let mut seen = HashSet::with_capacity(batch.ids.len());
        for id in &batch.ids {
            if self.tickets.contains_key(id) || !seen.insert(*id) {
                return Err(LedgerError::DuplicateId(*id));
            }
        }
        Ok(())
    }

    fn apply(&mut self, batch: &TicketBatch) {
        self.signatures.insert(batch.tx_signature.clone());
        for ticket in batch.tickets() {
            self.tickets.insert(ticket.id, ticket);
        }
    }

    fn snapshot_with(&self, batch: &TicketBatch) -> LedgerSnapshot {
        LedgerSnapshot {
            tickets: self.tickets.values().cloned().chain(batch.tickets()).collect(),
        }
    }
}

/// Process-local ledger
#[derive(Debug, Default)]
pub struct MemoryLedger {
    state: Mutex<LedgerState>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from already sold tickets
    pub fn with_tickets(tickets: Vec<Ticket>) -> Result<Self, LedgerError> {
        Ok(Self {
            state: Mutex::new(LedgerState::from_tickets(tickets)?),
        })
    }

    fn read<T>(&self, f: impl FnOnce(&LedgerState) -> T) -> Result<T, LedgerError> {
        let state = self
            .state
            .lock()
            .map_err(|_| LedgerError::Unavailable("ledger lock poisoned".to_string()))?;
        Ok(f(&state))
    }
}

impl LedgerStore for MemoryLedger {
    async fn count(&self) -> Result<u64, LedgerError> {
        self.read(LedgerState::count)
    }

    async fn find_by_signature(&self, signature: &str) -> Result<Option<Ticket>, LedgerError> {
        self.read(|state| state.find_by_signature(signature))
    }

    async fn tickets_by_owner(&self, owner: &str) -> Result<Vec<Ticket>, LedgerError> {
        self.read(|state| state.tickets_by_owner(owner))
    }

    async fn all_tickets(&self) -> Result<Vec<Ticket>, LedgerError> {
        self.read(|state| state.tickets.values().cloned().collect())
    }

    async fn issued_ids(&self) -> Result<BTreeSet<u32>, LedgerError> {
        self.read(|state| state.tickets.keys().copied().collect())
    }

    async fn insert_batch(&self, batch: &TicketBatch, capacity: u32) -> Result<(), LedgerError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| LedgerError::Unavailable("ledger lock poisoned".to_string()))?;
        state.check_batch(batch, capacity)?;
        state.apply(batch);
        Ok(())
    }
}

/// Ledger persisted as a borsh snapshot, rewritten on every batch
#[derive(Debug)]
pub struct FileLedger {
    path: PathBuf,
    state: tokio::sync::Mutex<LedgerState>,
}

impl FileLedger {
    /// Open the snapshot at `path`, starting empty if it does not exist yet
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, LedgerError> {
        let path = path.as_ref().to_path_buf();
        let state = match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let snapshot = LedgerSnapshot::try_from_slice(&bytes)
                    .map_err(|e| LedgerError::Corrupt(e.to_string()))?;
                LedgerState::from_tickets(snapshot.tickets)?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => LedgerState::default(),
            Err(e) => return Err(e.into()),
        };
        log::info!("Opened ledger {} with {} tickets", path.display(), state.count());

        Ok(Self {
            path,
            state: tokio::sync::Mutex::new(state),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LedgerStore for FileLedger {
    async fn count(&self) -> Result<u64, LedgerError> {
        Ok(self.state.lock().await.count())
    }

    async fn find_by_signature(&self, signature: &str) -> Result<Option<Ticket>, LedgerError> {
        Ok(self.state.lock().await.find_by_signature(signature))
    }

    async fn tickets_by_owner(&self, owner: &str) -> Result<Vec<Ticket>, LedgerError> {
        Ok(self.state.lock().await.tickets_by_owner(owner))
    }

    async fn all_tickets(&self) -> Result<Vec<Ticket>, LedgerError> {
        Ok(self.state.lock().await.tickets.values().cloned().collect())
    }

    async fn issued_ids(&self) -> Result<BTreeSet<u32>, LedgerError> {
        Ok(self.state.lock().await.tickets.keys().copied().collect())
    }

    async fn insert_batch(&self, batch: &TicketBatch, capacity: u32) -> Result<(), LedgerError> {
        let mut state = self.state.lock().await;
        state.check_batch(batch, capacity)?;

        let bytes = state.snapshot_with(batch).try_to_vec()?;
        let staging = self.path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&staging).await?;
        file.write_all(&bytes).await?;
        // Durable on disk before the rename publishes it
        file.sync_all().await?;
        drop(file);
        tokio::fs::rename(&staging, &self.path).await?;

        // Memory follows disk only once the snapshot is in place
        state.apply(batch);
        Ok(())
    }
}
