use crate::config::format_token_amount;
use crate::draw::{DrawEngine, DrawOutcome, DrawProof};
use crate::issuer::TicketIssuer;
use crate::ledger::LedgerStore;
use crate::oracle::ChainOracle;
use crate::raffle_command::RaffleCommand;
use crate::raffle_error::DrawError;
use crate::raffle_state::{RaffleConfig, Ticket};

use serde::Serialize;
use solana_program::clock::UnixTimestamp;
use std::sync::Arc;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum RaffleResponse {
    Purchase(PurchaseResponse),
    Draw(DrawResponse),
    Info(RaffleInfo),
    Tickets(TicketsResponse),
    Failure(FailureResponse),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FailureResponse {
    pub success: bool,
    pub message: String,
}

impl FailureResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseResponse {
    pub success: bool,
    pub message: String,
    pub ticket_ids: Vec<u32>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DrawResponse {
    pub success: bool,
    pub winner: Winner,
    pub proof: ProofView,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Winner {
    pub address: String,
    pub ticket_id: u32,
    pub tx: String,
}

/// Base58 rendering of a `DrawProof`
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofView {
    pub seed: String,
    pub ticket_set_hash: String,
    pub ticket_count: u64,
    pub winning_index: u64,
}

impl From<&DrawProof> for ProofView {
    fn from(proof: &DrawProof) -> Self {
        Self {
            seed: proof.seed.to_string(),
            ticket_set_hash: proof.ticket_set_hash.to_string(),
            ticket_count: proof.ticket_count,
            winning_index: proof.winning_index,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RaffleInfo {
    /// Unit price in whole tokens, as a decimal string
    pub ticket_price: String,
    pub ticket_price_micros: u64,
    pub end_date: Option<UnixTimestamp>,
    pub total_tickets: u64,
    pub max_tickets: u32,
    pub remaining_tickets: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TicketsResponse {
    pub success: bool,
    pub tickets: Vec<Ticket>,
}

/// Request-facing front of the raffle. Every command resolves to a response;
/// failures are reported in the body, never as errors.
pub struct RaffleService<L, O> {
    config: Arc<RaffleConfig>,
    ledger: Arc<L>,
    issuer: TicketIssuer<L, O>,
    draw: DrawEngine<L>,
}

impl<L: LedgerStore, O: ChainOracle> RaffleService<L, O> {
    pub fn new(config: Arc<RaffleConfig>, ledger: Arc<L>, oracle: O) -> Self {
        Self {
            issuer: TicketIssuer::new(ledger.clone(), oracle, config.clone()),
            draw: DrawEngine::new(ledger.clone()),
            config,
            ledger,
        }
    }

    pub fn config(&self) -> &RaffleConfig {
        &self.config
    }

    pub async fn process(&self, command: RaffleCommand) -> RaffleResponse {
        match command {
            RaffleCommand::BuyTicket {
                buyer_address,
                tx_signature,
                quantity,
            } => {
                log::info!("Command: Buy Ticket");
                self.buy_ticket(
                    buyer_address.as_deref().unwrap_or_default(),
                    tx_signature.as_deref().unwrap_or_default(),
                    quantity,
                )
                .await
            }
            RaffleCommand::DrawWinner { admin_key } => {
                log::info!("Command: Draw Winner");
                self.draw_winner(admin_key.as_deref().unwrap_or_default()).await
            }
            RaffleCommand::RaffleInfo => {
                log::debug!("Command: Raffle Info");
                RaffleResponse::Info(self.raffle_info().await)
            }
            RaffleCommand::Tickets { wallet } => {
                log::debug!("Command: Tickets");
                self.tickets(wallet.as_deref()).await
            }
        }
    }

    pub async fn buy_ticket(&self, buyer_address: &str, tx_signature: &str, quantity: i64) -> RaffleResponse {
        match self.issuer.issue_tickets(buyer_address, tx_signature, quantity).await {
            Ok(issued) => RaffleResponse::Purchase(PurchaseResponse {
                success: true,
                message: format!("{} tickets purchased successfully!", issued.ticket_ids.len()),
                ticket_ids: issued.ticket_ids,
            }),
            Err(e) => {
                if e.is_server_fault() {
                    log::error!("Purchase error for {}: {:?}", tx_signature, e);
                } else {
                    log::warn!("Purchase refused for {}: {}", tx_signature, e);
                }
                RaffleResponse::Failure(FailureResponse::new(e.to_string()))
            }
        }
    }

    pub async fn draw_winner(&self, admin_key: &str) -> RaffleResponse {
        let outcome = match self.authorize(admin_key) {
            Ok(()) => self.draw.draw_winner().await.map_err(DrawError::from),
            Err(e) => Err(e),
        };

        match outcome {
            Ok(DrawOutcome::Winner(draw)) => RaffleResponse::Draw(DrawResponse {
                success: true,
                proof: ProofView::from(&draw.proof),
                winner: Winner {
                    address: draw.ticket.buyer_address,
                    ticket_id: draw.ticket.id,
                    tx: draw.ticket.tx_signature,
                },
            }),
            Ok(DrawOutcome::NoTicketsSold) => {
                RaffleResponse::Failure(FailureResponse::new("No tickets sold yet."))
            }
            Err(e) => {
                log::warn!("Draw error: {:?}", e);
                RaffleResponse::Failure(FailureResponse::new(e.to_string()))
            }
        }
    }

    /// Counts fall back to zero sold when the ledger is unreachable
    pub async fn raffle_info(&self) -> RaffleInfo {
        let sold = match self.ledger.count().await {
            Ok(sold) => sold,
            Err(e) => {
                log::error!("Error fetching raffle info: {}", e);
                0
            }
        };
        let max_tickets = self.config.max_tickets;

        RaffleInfo {
            ticket_price: format_token_amount(self.config.unit_price_micros, self.config.token_decimals),
            ticket_price_micros: self.config.unit_price_micros,
            end_date: self.config.end_time,
            total_tickets: sold,
            max_tickets,
            remaining_tickets: u64::from(max_tickets).saturating_sub(sold),
        }
    }

    pub async fn tickets(&self, wallet: Option<&str>) -> RaffleResponse {
        let tickets = match wallet.filter(|w| !w.is_empty()) {
            Some(wallet) => self.ledger.tickets_by_owner(wallet).await,
            None => self.ledger.all_tickets().await,
        };
        match tickets {
            Ok(tickets) => RaffleResponse::Tickets(TicketsResponse { success: true, tickets }),
            Err(e) => {
                log::error!("Error fetching tickets: {}", e);
                RaffleResponse::Failure(FailureResponse::new("Failed to fetch tickets"))
            }
        }
    }

    fn authorize(&self, admin_key: &str) -> Result<(), DrawError> {
        match &self.config.admin_secret {
            Some(secret) if constant_time_eq(secret.as_bytes(), admin_key.as_bytes()) => Ok(()),
            _ => Err(DrawError::Unauthorized),
        }
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
