// Raffle VRF Program
// A self-running lottery: players buy in, a keeper closes the round, and a
// VRF coordinator picks the winner.

// State machine
pub mod engine;
pub mod oracle;
pub mod state;

// Program surface
pub mod error;
pub mod events;
pub mod instruction;
pub mod processor;
pub mod utils;

#[cfg(not(feature = "no-entrypoint"))]
pub mod entrypoint;

use solana_program::{account_info::AccountInfo, entrypoint::ProgramResult, pubkey::Pubkey};

pub fn process_instruction(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    instruction_data: &[u8],
) -> ProgramResult {
    processor::Processor::process(program_id, accounts, instruction_data)
}
