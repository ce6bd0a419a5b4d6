// Raffle state machine
//
//   OPEN --begin_round(eligible)--> CALCULATING --complete_round(pending id)--> OPEN
//   OPEN --enter--> OPEN
//   CALCULATING --cancel_round(timed out)--> OPEN
//
// The engine never touches accounts. Lamports, time and the oracle are handed
// in by the processor, which makes every transition checkable in isolation.
use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{clock::UnixTimestamp, program_error::ProgramError, pubkey::Pubkey};

use crate::{
    error::EngineError,
    events::RaffleEvent,
    oracle::{winner_index, RandomnessOracle},
    state::{Raffle, RaffleState},
};

/// How long a randomness request may stay unanswered before the owner can
/// cancel it and reopen the raffle.
pub const REQUEST_TIMEOUT_SECS: i64 = 24 * 60 * 60;

/// Moves the round balance to the drawn winner
pub trait PrizePayout {
    fn pay(&mut self, winner: &Pubkey, amount: u64) -> Result<(), ProgramError>;
}

/// Result of an upkeep eligibility check, returned to keepers as-is
#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq, Eq)]
pub struct UpkeepCheck {
    pub upkeep_needed: bool,
    pub balance: u64,
    pub player_count: u64,
    pub state: RaffleState,
    pub time_passed: bool,
    /// Opaque payload forwarded to `PerformUpkeep`
    pub perform_data: Vec<u8>,
}

impl Raffle {
    /// Read-only eligibility evaluation at `now` with `balance` lamports in the pool
    pub fn check_upkeep(&self, now: UnixTimestamp, balance: u64) -> UpkeepCheck {
        let elapsed = now.saturating_sub(self.last_timestamp);
        let time_passed = elapsed >= 0 && elapsed as u64 >= self.interval;
        let is_open = self.state == RaffleState::Open;
        let has_players = !self.players.is_empty();
        let has_balance = balance > 0;

        UpkeepCheck {
            upkeep_needed: is_open && time_passed && has_players && has_balance,
            balance,
            player_count: self.players.len() as u64,
            state: self.state,
            time_passed,
            perform_data: Vec::new(),
        }
    }
}

/// Exclusive handle on the raffle record for one transition.
///
/// Notifications produced by a transition are buffered and handed back with
/// [`RaffleEngine::into_events`] so the caller emits them only after the new
/// state is persisted.
pub struct RaffleEngine<'a> {
    raffle: &'a mut Raffle,
    events: Vec<RaffleEvent>,
}

impl<'a> RaffleEngine<'a> {
    pub fn new(raffle: &'a mut Raffle) -> Self {
        Self {
            raffle,
            events: Vec::new(),
        }
    }

    pub fn raffle(&self) -> &Raffle {
        self.raffle
    }

    pub fn events(&self) -> &[RaffleEvent] {
        &self.events
    }

    pub fn into_events(self) -> Vec<RaffleEvent> {
        self.events
    }

    /// Record `participant` for the current round
    pub fn enter(&mut self, participant: Pubkey, amount_paid: u64) -> Result<(), EngineError> {
        if amount_paid < self.raffle.entry_fee {
            return Err(EngineError::InsufficientPayment {
                paid: amount_paid,
                required: self.raffle.entry_fee,
            });
        }
        if self.raffle.state != RaffleState::Open {
            return Err(EngineError::NotOpen(self.raffle.state));
        }
        if self.raffle.is_full() {
            return Err(EngineError::RaffleFull {
                capacity: self.raffle.max_players,
            });
        }

        self.raffle.players.push(participant);
        self.events.push(RaffleEvent::RaffleEntered {
            player: participant,
        });
        Ok(())
    }

    pub fn check_upkeep(&self, now: UnixTimestamp, balance: u64) -> UpkeepCheck {
        self.raffle.check_upkeep(now, balance)
    }

    /// Start a round: re-check eligibility and issue the randomness request.
    ///
    /// Eligibility is evaluated here again rather than trusted from an
    /// earlier `check_upkeep`, since time and state may have moved since.
    pub fn begin_round<O>(
        &mut self,
        now: UnixTimestamp,
        balance: u64,
        consumer: &Pubkey,
        oracle: &mut O,
    ) -> Result<u64, EngineError>
    where
        O: RandomnessOracle + ?Sized,
    {
        let check = self.raffle.check_upkeep(now, balance);
        if !check.upkeep_needed {
            return Err(EngineError::UpkeepNotReady {
                balance: check.balance,
                player_count: check.player_count,
                state: check.state,
            });
        }

        let request_id = oracle
            .request_randomness(consumer, &self.raffle.vrf)
            .map_err(EngineError::OracleRequest)?;

        self.raffle.state = RaffleState::Calculating;
        self.raffle.pending_request_id = Some(request_id);
        self.raffle.requested_at = now;
        self.events
            .push(RaffleEvent::RequestedRaffleWinner { request_id });
        Ok(request_id)
    }

    /// Finish the pending round with the oracle's answer and pay the winner.
    ///
    /// Nothing is mutated unless the payout succeeds.
    pub fn complete_round<P>(
        &mut self,
        request_id: u64,
        random_word: &[u8; 32],
        now: UnixTimestamp,
        balance: u64,
        payout: &mut P,
    ) -> Result<Pubkey, EngineError>
    where
        P: PrizePayout + ?Sized,
    {
        if self.raffle.pending_request_id != Some(request_id) {
            return Err(EngineError::UnknownRequest {
                expected: self.raffle.pending_request_id,
                received: request_id,
            });
        }

        let index =
            winner_index(random_word, self.raffle.players.len()).ok_or(EngineError::NoPlayers)?;
        let winner = self.raffle.players[index];
        let completed_rounds = self
            .raffle
            .completed_rounds
            .checked_add(1)
            .ok_or(EngineError::Overflow)?;

        payout
            .pay(&winner, balance)
            .map_err(|reason| EngineError::PayoutFailed { winner, reason })?;

        self.raffle.recent_winner = Some(winner);
        self.raffle.players.clear();
        self.raffle.last_timestamp = now;
        self.raffle.state = RaffleState::Open;
        self.raffle.pending_request_id = None;
        self.raffle.requested_at = 0;
        self.raffle.completed_rounds = completed_rounds;
        self.events.push(RaffleEvent::WinnerPicked {
            winner,
            request_id,
            prize: balance,
        });
        Ok(winner)
    }

    /// Abandon a request the oracle never answered.
    ///
    /// Players and balance stay in place so upkeep can start a fresh request;
    /// a late fulfillment of the abandoned id is then rejected.
    pub fn cancel_round(&mut self, now: UnixTimestamp) -> Result<u64, EngineError> {
        let request_id = self
            .raffle
            .pending_request_id
            .ok_or(EngineError::NoPendingRequest)?;

        let elapsed = now.saturating_sub(self.raffle.requested_at);
        if elapsed < REQUEST_TIMEOUT_SECS {
            return Err(EngineError::RequestNotTimedOut {
                elapsed,
                required: REQUEST_TIMEOUT_SECS,
            });
        }

        self.raffle.state = RaffleState::Open;
        self.raffle.pending_request_id = None;
        self.raffle.requested_at = 0;
        self.events.push(RaffleEvent::RoundCancelled { request_id });
        Ok(request_id)
    }
}
