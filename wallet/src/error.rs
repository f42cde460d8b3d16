use channel::FundingError;
use dependencies::bitcoin::OutPoint;
use thiserror::Error;
use wire::Satoshi;

use crate::interface::FundsError;
use crate::reservation::ReservationState;

/// Failure of a funding workflow command. Reported to the caller that issued
/// the command, the reservation keeps the state it had before.
#[derive(Debug, Error)]
pub enum WalletError {
    #[error("reservation {0} is not registered")]
    UnknownReservation(u64),
    #[error("counterparty contributes {contributed}, at least {required} is required")]
    InsufficientFunds { contributed: Satoshi, required: Satoshi },
    #[error("signature for input {0} does not verify")]
    SignatureVerificationFailed(usize),
    #[error("expected {expected} signatures, got {actual}")]
    SignatureCountMismatch { expected: usize, actual: usize },
    #[error("reservation {id} is {state:?}, cannot apply {command}")]
    InvalidStateTransition { id: u64, state: ReservationState, command: &'static str },
    #[error("outpoint {0} is contributed more than once")]
    DuplicateInput(OutPoint),
    #[error("invalid channel terms: {0}")]
    InvalidTerms(String),
    #[error("too many pending reservations, limit is {0}")]
    ReservationLimit(usize),
    #[error("funds source: {0}")]
    Funds(#[from] FundsError),
    #[error("funding transaction: {0}")]
    Funding(#[from] FundingError),
    #[error("wallet is shut down")]
    WalletShutdown,
}
