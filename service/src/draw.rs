// Hollow Raffle - Winner selection
use crate::ledger::LedgerStore;
use crate::raffle_error::LedgerError;
use crate::raffle_state::Ticket;
use crate::randomness;

use solana_program::hash::{hashv, Hash};
use std::sync::Arc;

/// Everything needed to recompute a draw from the ticket list
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DrawProof {
    pub seed: Hash,
    /// Commitment to the ordered ticket set the draw ran over
    pub ticket_set_hash: Hash,
    pub ticket_count: u64,
    pub winning_index: u64,
}

impl DrawProof {
    /// Check that `tickets` is the set this draw committed to and that the
    /// seed selects `winner` from it.
    pub fn audit(&self, tickets: &[Ticket], winner: &Ticket) -> bool {
        let mut ordered = tickets.to_vec();
        ordered.sort_by_key(|t| t.id);

        if ordered.len() as u64 != self.ticket_count || ticket_set_hash(&ordered) != self.ticket_set_hash {
            return false;
        }
        let index = randomness::uniform_index(&self.seed, 0, self.ticket_count);
        index == self.winning_index && ordered.get(index as usize) == Some(winner)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WinningDraw {
    pub ticket: Ticket,
    pub proof: DrawProof,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DrawOutcome {
    Winner(WinningDraw),
    NoTicketsSold,
}

pub struct DrawEngine<L> {
    ledger: Arc<L>,
}

impl<L: LedgerStore> DrawEngine<L> {
    pub fn new(ledger: Arc<L>) -> Self {
        Self { ledger }
    }

    /// Pick one sold ticket uniformly at random. Nothing is recorded, so
    /// every call is an independent draw.
    pub async fn draw_winner(&self) -> Result<DrawOutcome, LedgerError> {
        self.draw_with_seed(randomness::fresh_seed()).await
    }

    pub async fn draw_with_seed(&self, seed: Hash) -> Result<DrawOutcome, LedgerError> {
        let mut tickets = self.ledger.all_tickets().await?;
        if tickets.is_empty() {
            return Ok(DrawOutcome::NoTicketsSold);
        }
        tickets.sort_by_key(|t| t.id);

        let ticket_count = tickets.len() as u64;
        let winning_index = randomness::uniform_index(&seed, 0, ticket_count);
        let proof = DrawProof {
            seed,
            ticket_set_hash: ticket_set_hash(&tickets),
            ticket_count,
            winning_index,
        };
        let ticket = tickets.swap_remove(winning_index as usize);

        log::info!(
            "Drew ticket {} ({}) from {} tickets with seed {}",
            ticket.id,
            ticket.buyer_address,
            ticket_count,
            proof.seed
        );
        Ok(DrawOutcome::Winner(WinningDraw { ticket, proof }))
    }
}

/// sha256 chain over (id, buyer, signature) of tickets sorted by id
pub fn ticket_set_hash(tickets: &[Ticket]) -> Hash {
    tickets.iter().fold(Hash::default(), |acc, ticket| {
        hashv(&[
            acc.as_ref(),
            &ticket.id.to_le_bytes(),
            ticket.buyer_address.as_bytes(),
            &[0u8],
            ticket.tx_signature.as_bytes(),
        ])
    })
}
