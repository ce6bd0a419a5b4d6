// Raffle VRF Program - Errors
use solana_program::{
    decode_error::DecodeError,
    msg,
    program_error::{PrintProgramError, ProgramError},
    pubkey::Pubkey,
};
use thiserror::Error;

use crate::state::RaffleState;

/// Errors that may be returned by the raffle program
#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum RaffleError {
    /// Invalid instruction data passed
    #[error("Invalid instruction data")]
    InvalidInstruction,

    #[error("Raffle already initialized")]
    AlreadyInitialized,

    #[error("Raffle not initialized")]
    NotInitialized,

    /// Entry fee, interval or capacity out of range
    #[error("Invalid raffle configuration")]
    InvalidConfig,

    #[error("Not enough lamports sent to enter the raffle")]
    InsufficientPayment,

    /// Entry attempted while a round is being drawn
    #[error("Raffle is not open")]
    NotOpen,

    #[error("Raffle has no free player slots")]
    RaffleFull,

    #[error("Upkeep not needed")]
    UpkeepNotReady,

    #[error("Round has no players")]
    NoPlayers,

    /// Fulfillment does not match the outstanding request
    #[error("Unknown randomness request")]
    UnknownRequest,

    #[error("Winner account does not match the drawn player")]
    WinnerMismatch,

    #[error("No randomness request is pending")]
    NoPendingRequest,

    #[error("Randomness request has not timed out yet")]
    RequestNotTimedOut,

    /// Only the raffle owner can perform this action
    #[error("Only the raffle owner can perform this action")]
    NotOwner,

    #[error("Only the VRF coordinator can fulfill randomness")]
    NotCoordinator,

    #[error("Funding vault does not belong to this raffle")]
    InvalidVault,

    #[error("Arithmetic overflow")]
    Overflow,
}

impl From<RaffleError> for ProgramError {
    fn from(e: RaffleError) -> Self {
        ProgramError::Custom(e as u32)
    }
}

impl<T> DecodeError<T> for RaffleError {
    fn type_of() -> &'static str {
        "Raffle Error"
    }
}

impl PrintProgramError for RaffleError {
    fn print<E>(&self) {
        msg!(&self.to_string());
    }
}

/// Failures of the raffle state machine.
///
/// Unlike [`RaffleError`] these carry the values a caller needs to see why a
/// transition was refused. They collapse into a program error code once they
/// leave the engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("Raffle is not open (state: {0:?})")]
    NotOpen(RaffleState),

    #[error("Insufficient payment: paid {paid} lamports, entry fee is {required}")]
    InsufficientPayment { paid: u64, required: u64 },

    #[error("Raffle is full: {capacity} players")]
    RaffleFull { capacity: u32 },

    #[error("Upkeep not needed: balance={balance}, players={player_count}, state={state:?}")]
    UpkeepNotReady {
        balance: u64,
        player_count: u64,
        state: RaffleState,
    },

    #[error("Unknown request {received}, pending request is {expected:?}")]
    UnknownRequest { expected: Option<u64>, received: u64 },

    #[error("Round has no players to draw from")]
    NoPlayers,

    /// The round stays in `Calculating` when this is returned.
    #[error("Payout to {winner} failed: {reason}")]
    PayoutFailed { winner: Pubkey, reason: ProgramError },

    #[error("Randomness request rejected by the oracle: {0}")]
    OracleRequest(ProgramError),

    #[error("No randomness request is pending")]
    NoPendingRequest,

    #[error("Request pending for {elapsed}s, cancel allowed after {required}s")]
    RequestNotTimedOut { elapsed: i64, required: i64 },

    #[error("Arithmetic overflow")]
    Overflow,
}

impl From<EngineError> for ProgramError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::NotOpen(_) => RaffleError::NotOpen.into(),
            EngineError::InsufficientPayment { .. } => RaffleError::InsufficientPayment.into(),
            EngineError::RaffleFull { .. } => RaffleError::RaffleFull.into(),
            EngineError::UpkeepNotReady { .. } => RaffleError::UpkeepNotReady.into(),
            EngineError::UnknownRequest { .. } => RaffleError::UnknownRequest.into(),
            EngineError::NoPlayers => RaffleError::NoPlayers.into(),
            // Infrastructure failures surface unchanged
            EngineError::PayoutFailed { reason, .. } => reason,
            EngineError::OracleRequest(reason) => reason,
            EngineError::NoPendingRequest => RaffleError::NoPendingRequest.into(),
            EngineError::RequestNotTimedOut { .. } => RaffleError::RequestNotTimedOut.into(),
            EngineError::Overflow => RaffleError::Overflow.into(),
        }
    }
}
