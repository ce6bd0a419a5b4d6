// Raffle VRF Program - State
use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{
    borsh::try_from_slice_unchecked,
    clock::UnixTimestamp,
    program_error::ProgramError,
    program_pack::{IsInitialized, Sealed},
    pubkey::Pubkey,
};

/// Upper bound on players per round; keeps the raffle account under the
/// size a single `create_account` CPI may allocate.
pub const MAX_PLAYERS: u32 = 250;

/// Whether the raffle is accepting entries
#[derive(BorshSerialize, BorshDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum RaffleState {
    /// Raffle is open for entries
    Open,
    /// A randomness request is in flight; entries are refused
    Calculating,
}

/// Parameters forwarded to the VRF coordinator with every request
#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct VrfConfig {
    /// Authority allowed to fulfill randomness requests
    pub coordinator: Pubkey,
    /// Gas lane / key hash identifying the oracle proving key
    pub key_hash: [u8; 32],
    /// Coordinator-side subscription paying for requests
    pub subscription_id: u64,
    pub request_confirmations: u16,
    /// Compute budget the coordinator should attach to the fulfillment
    pub callback_compute_limit: u32,
    pub num_words: u32,
}

impl VrfConfig {
    pub const LEN: usize = 32 + 32 + 8 + 2 + 4 + 4;
}

/// Raffle account data. One per program deployment.
#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq, Eq)]
pub struct Raffle {
    /// Is the account initialized
    pub is_initialized: bool,
    /// Identity allowed to manage the funding vault and cancel stuck rounds
    pub owner: Pubkey,
    /// Bump of the raffle PDA
    pub bump: u8,
    pub state: RaffleState,
    /// Lamports required per entry
    pub entry_fee: u64,
    /// Minimum seconds between rounds
    pub interval: u64,
    /// Creation time or time of the last completed round
    pub last_timestamp: UnixTimestamp,
    /// In-flight randomness request
    pub pending_request_id: Option<u64>,
    /// When the pending request was issued, zero when none is pending
    pub requested_at: UnixTimestamp,
    pub recent_winner: Option<Pubkey>,
    /// Next id handed out by the coordinator oracle
    pub next_request_id: u64,
    pub completed_rounds: u64,
    pub vrf: VrfConfig,
    /// SPL mint of the auxiliary balance paying oracle and keeper fees
    pub funding_mint: Pubkey,
    /// Associated token account of the raffle PDA for `funding_mint`
    pub funding_vault: Pubkey,
    /// Player capacity the account was sized for
    pub max_players: u32,
    /// Players of the current round in entry order. Kept last so the
    /// account tail is the only part that grows.
    pub players: Vec<Pubkey>,
}

impl Sealed for Raffle {}

impl IsInitialized for Raffle {
    fn is_initialized(&self) -> bool {
        self.is_initialized
    }
}

impl Raffle {
    /// Serialized size with every optional field present and no players
    pub const BASE_LEN: usize = 1 // is_initialized
        + 32 // owner
        + 1 // bump
        + 1 // state
        + 8 // entry_fee
        + 8 // interval
        + 8 // last_timestamp
        + 1 + 8 // pending_request_id
        + 8 // requested_at
        + 1 + 32 // recent_winner
        + 8 // next_request_id
        + 8 // completed_rounds
        + VrfConfig::LEN
        + 32 // funding_mint
        + 32 // funding_vault
        + 4 // max_players
        + 4; // players length prefix

    /// Account size needed to hold `max_players` entries
    pub fn space(max_players: u32) -> usize {
        Self::BASE_LEN + 32 * max_players as usize
    }

    /// Create a fresh, open raffle
    pub fn new(
        owner: Pubkey,
        bump: u8,
        entry_fee: u64,
        interval: u64,
        max_players: u32,
        vrf: VrfConfig,
        now: UnixTimestamp,
    ) -> Self {
        Self {
            is_initialized: true,
            owner,
            bump,
            state: RaffleState::Open,
            entry_fee,
            interval,
            last_timestamp: now,
            pending_request_id: None,
            requested_at: 0,
            recent_winner: None,
            next_request_id: 1,
            completed_rounds: 0,
            vrf,
            funding_mint: Pubkey::default(),
            funding_vault: Pubkey::default(),
            max_players,
            players: Vec::with_capacity(max_players as usize),
        }
    }

    /// Deserialize from account data; trailing unused capacity is ignored
    pub fn load(src: &[u8]) -> Result<Self, ProgramError> {
        let raffle: Raffle = try_from_slice_unchecked(src)?;
        Ok(raffle)
    }

    pub fn save(&self, mut dst: &mut [u8]) -> Result<(), ProgramError> {
        self.serialize(&mut dst)?;
        Ok(())
    }

    pub fn is_full(&self) -> bool {
        self.players.len() >= self.max_players as usize
    }
}
