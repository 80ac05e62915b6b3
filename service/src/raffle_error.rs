// Hollow Raffle - Errors
use thiserror::Error;

/// Errors that end a ticket purchase. The display strings are the messages
/// returned to the buyer.
#[derive(Error, Debug)]
pub enum PurchaseError {
    /// Buyer address or transaction signature was empty
    #[error("Missing details")]
    MissingFields,

    /// Quantity outside 1..=100
    #[error("Invalid quantity (1-100).")]
    InvalidQuantity,

    /// Sales are closed
    #[error("Raffle has ended")]
    RaffleEnded,

    /// Selling the batch would exceed the raffle capacity
    #[error("Not enough tickets remaining. Only {remaining} left.")]
    CapacityExceeded { remaining: u64 },

    /// The signature already paid for an earlier batch
    #[error("Transaction already used")]
    SignatureAlreadyUsed,

    /// The transaction did not prove the payment
    #[error("{0}")]
    VerificationFailed(String),

    /// Payment was verified but no tickets could be stored
    #[error("Failed to generate tickets. Please contact support.")]
    IssuanceFailed,

    /// The ledger could not be read or written
    #[error("Server error processing purchase")]
    Ledger(#[from] LedgerError),
}

impl PurchaseError {
    /// Faults on our side that the buyer cannot fix by changing the request.
    pub fn is_server_fault(&self) -> bool {
        matches!(self, PurchaseError::IssuanceFailed | PurchaseError::Ledger(_))
    }
}

/// Reasons a transaction is rejected as payment
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VerificationError {
    #[error("Transaction not found or not confirmed yet.")]
    NotFound,

    #[error("Transaction failed on-chain.")]
    FailedOnChain,

    #[error("Valid {amount} transfer to vault not found.")]
    TransferNotFound { amount: String },

    #[error("Ticket total overflows the token amount range.")]
    AmountOverflow,

    /// A zero-ticket purchase would match an empty transfer
    #[error("Ticket quantity must be at least 1.")]
    ZeroQuantity,

    #[error("Verification timed out.")]
    TimedOut,

    #[error("Verification failed: {0}")]
    Oracle(String),
}

/// Errors surfaced by a ledger store
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// A ticket with this id already exists
    #[error("Ticket id {0} is already taken")]
    DuplicateId(u32),

    /// Another batch already consumed this signature
    #[error("Signature {0} already backs issued tickets")]
    SignatureClaimed(String),

    /// The batch does not fit in the remaining capacity
    #[error("Only {remaining} tickets remain")]
    CapacityExhausted { remaining: u64 },

    /// The store could not be reached
    #[error("Ledger unavailable: {0}")]
    Unavailable(String),

    /// Persisted data could not be decoded
    #[error("Ledger data is corrupt: {0}")]
    Corrupt(String),
}

impl From<std::io::Error> for LedgerError {
    fn from(e: std::io::Error) -> Self {
        LedgerError::Unavailable(e.to_string())
    }
}

/// Errors from the chain oracle
#[derive(Error, Debug)]
pub enum OracleError {
    #[error("invalid transaction signature: {0}")]
    InvalidSignature(String),

    #[error("rpc request failed: {0}")]
    Rpc(String),

    #[error("malformed transaction data: {0}")]
    Malformed(String),
}

/// Errors that stop a draw from producing a result
#[derive(Error, Debug)]
pub enum DrawError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Failed to draw winner")]
    Ledger(#[from] LedgerError),
}

/// Errors raised while loading configuration
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Errors decoding an incoming command
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Invalid request")]
    Malformed(#[from] serde_json::Error),
}
