// Hollow Raffle
// Verifies USDC payments on Solana, issues numbered raffle tickets and draws winners

// Shared state and errors
pub mod config;
pub mod raffle_error;
pub mod raffle_state;

// External collaborators
pub mod ledger;
pub mod oracle;
pub mod rpc_oracle;

// Core pipeline
pub mod draw;
pub mod issuer;
pub mod randomness;
pub mod verifier;

// Request surface
pub mod raffle_command;
pub mod raffle_service;

pub use raffle_command::RaffleCommand;
pub use raffle_service::{RaffleResponse, RaffleService};
