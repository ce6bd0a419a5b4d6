// Raffle VRF Program - Events
use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{entrypoint::ProgramResult, log::sol_log_data, msg, pubkey::Pubkey};

/// Notifications emitted by the raffle, logged as borsh program data so
/// indexers and keepers can follow the round lifecycle.
#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq, Eq)]
pub enum RaffleEvent {
    RaffleEntered { player: Pubkey },
    RequestedRaffleWinner { request_id: u64 },
    WinnerPicked { winner: Pubkey, request_id: u64, prize: u64 },
    RoundCancelled { request_id: u64 },
    FundingDeposited { amount: u64 },
    FundingWithdrawn { amount: u64 },
}

impl RaffleEvent {
    pub fn emit(&self) -> ProgramResult {
        msg!("Event: {:?}", self);
        let data = self.try_to_vec()?;
        sol_log_data(&[&data]);
        Ok(())
    }
}
