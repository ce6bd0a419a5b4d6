// VRF coordinator integration for the raffle program
use solana_program::{msg, program_error::ProgramError, pubkey::Pubkey};

use crate::{error::RaffleError, state::VrfConfig};

/// Source of verifiable randomness.
///
/// A request is accepted synchronously and answered later, out of band, by a
/// fulfillment carrying the returned id.
pub trait RandomnessOracle {
    fn request_randomness(
        &mut self,
        consumer: &Pubkey,
        config: &VrfConfig,
    ) -> Result<u64, ProgramError>;
}

/// On-chain side of the coordinator protocol.
///
/// Request ids come from the raffle's own counter. The request is published
/// in the transaction log, where the coordinator's off-chain node picks it up
/// and answers with a signed `FulfillRandomWords` instruction.
pub struct CoordinatorOracle {
    next_request_id: u64,
}

impl CoordinatorOracle {
    pub fn new(next_request_id: u64) -> Self {
        Self { next_request_id }
    }

    /// Counter value to persist once the request has been accepted
    pub fn next_request_id(&self) -> u64 {
        self.next_request_id
    }
}

impl RandomnessOracle for CoordinatorOracle {
    fn request_randomness(
        &mut self,
        consumer: &Pubkey,
        config: &VrfConfig,
    ) -> Result<u64, ProgramError> {
        if config.num_words == 0 {
            msg!("VRF config must request at least one word");
            return Err(ProgramError::InvalidArgument);
        }

        let request_id = self.next_request_id;
        self.next_request_id = request_id
            .checked_add(1)
            .ok_or(RaffleError::Overflow)?;

        msg!(
            "RandomWordsRequested: id={} consumer={} coordinator={} subscription={} confirmations={} compute_limit={} words={}",
            request_id,
            consumer,
            config.coordinator,
            config.subscription_id,
            config.request_confirmations,
            config.callback_compute_limit,
            config.num_words
        );
        Ok(request_id)
    }
}

/// Reduce a 256-bit big-endian random word modulo the player count.
///
/// Plain modulo reduction: lower indices are very slightly favored when 2^256
/// is not a multiple of `player_count`.
pub fn winner_index(random_word: &[u8; 32], player_count: usize) -> Option<usize> {
    if player_count == 0 {
        return None;
    }

    let modulus = player_count as u128;
    let remainder = random_word
        .iter()
        .fold(0u128, |acc, byte| (acc * 256 + *byte as u128) % modulus);
    Some(remainder as usize)
}
