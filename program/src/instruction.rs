use arrayref::array_ref;
use solana_program::{
    instruction::{AccountMeta, Instruction},
    program_error::ProgramError,
    pubkey::Pubkey,
    system_program,
};
use std::mem::size_of;

use crate::{
    error::RaffleError,
    utils::{
        find_raffle_address, funding_vault_address, DEFAULT_CALLBACK_COMPUTE_LIMIT,
        DEFAULT_ENTRY_FEE, DEFAULT_INTERVAL, DEFAULT_NUM_WORDS, DEFAULT_REQUEST_CONFIRMATIONS,
    },
};

/// Deployment parameters of a raffle
#[derive(Clone, Debug, PartialEq)]
pub struct RaffleParams {
    /// Lamports required per entry
    pub entry_fee: u64,
    /// Seconds between rounds
    pub interval: u64,
    /// Player capacity per round, at most `MAX_PLAYERS`
    pub max_players: u32,
    pub key_hash: [u8; 32],
    pub subscription_id: u64,
    pub request_confirmations: u16,
    pub callback_compute_limit: u32,
    pub num_words: u32,
}

impl Default for RaffleParams {
    fn default() -> Self {
        Self {
            entry_fee: DEFAULT_ENTRY_FEE,
            interval: DEFAULT_INTERVAL,
            max_players: 100,
            key_hash: [0u8; 32],
            subscription_id: 0,
            request_confirmations: DEFAULT_REQUEST_CONFIRMATIONS,
            callback_compute_limit: DEFAULT_CALLBACK_COMPUTE_LIMIT,
            num_words: DEFAULT_NUM_WORDS,
        }
    }
}

impl RaffleParams {
    const LEN: usize = 8 + 8 + 4 + 32 + 8 + 2 + 4 + 4;
}

#[derive(Clone, Debug, PartialEq)]
pub enum RaffleInstruction {
    /// Create the raffle and its funding vault
    ///
    /// Accounts expected:
    /// 0. `[signer, writable]` The owner, pays for both accounts
    /// 1. `[writable]` The raffle account (PDA)
    /// 2. `[]` VRF coordinator authority
    /// 3. `[]` Funding token mint
    /// 4. `[writable]` Funding vault, associated token account of the raffle PDA
    /// 5. `[]` The system program
    /// 6. `[]` The token program
    /// 7. `[]` The associated token account program
    Initialize { params: RaffleParams },

    /// Enter the current round
    ///
    /// Accounts expected:
    /// 0. `[signer, writable]` The player, pays the entry fee
    /// 1. `[writable]` The raffle account
    /// 2. `[]` The system program
    EnterRaffle {
        /// Lamports sent, at least the entry fee
        amount: u64,
    },

    /// Evaluate upkeep eligibility; the `UpkeepCheck` is set as return data
    ///
    /// Accounts expected:
    /// 0. `[]` The raffle account
    CheckUpkeep {},

    /// Start a round by requesting randomness (any keeper)
    ///
    /// Accounts expected:
    /// 0. `[signer]` The keeper
    /// 1. `[writable]` The raffle account
    PerformUpkeep {},

    /// Deliver the coordinator's answer and pay the winner
    ///
    /// The random words are trusted on the coordinator's signature alone;
    /// no VRF proof is verified on-chain.
    ///
    /// Accounts expected:
    /// 0. `[signer]` The VRF coordinator authority
    /// 1. `[writable]` The raffle account
    /// 2. `[writable]` The drawn winner
    FulfillRandomWords {
        request_id: u64,
        random_words: Vec<[u8; 32]>,
    },

    /// Reopen a raffle whose request timed out (owner only)
    ///
    /// Accounts expected:
    /// 0. `[signer]` The owner
    /// 1. `[writable]` The raffle account
    CancelRound {},

    /// Move tokens from the owner into the funding vault
    ///
    /// Accounts expected:
    /// 0. `[signer]` The owner
    /// 1. `[]` The raffle account
    /// 2. `[writable]` Owner's source token account
    /// 3. `[writable]` Funding vault
    /// 4. `[]` The token program
    DepositFunding { amount: u64 },

    /// Move tokens out of the funding vault (owner only)
    ///
    /// Accounts expected:
    /// 0. `[signer]` The owner
    /// 1. `[]` The raffle account
    /// 2. `[writable]` Funding vault
    /// 3. `[writable]` Destination token account
    /// 4. `[]` The token program
    WithdrawFunding { amount: u64 },
}

impl RaffleInstruction {
    /// Unpacks a byte buffer into a RaffleInstruction
    pub fn unpack(input: &[u8]) -> Result<Self, ProgramError> {
        let (tag, rest) = input
            .split_first()
            .ok_or(RaffleError::InvalidInstruction)?;

        Ok(match tag {
            0 => {
                let (entry_fee, rest) = Self::unpack_u64(rest)?;
                let (interval, rest) = Self::unpack_u64(rest)?;
                let (max_players, rest) = Self::unpack_u32(rest)?;
                let (key_hash, rest) = Self::unpack_fixed_bytes::<32>(rest)?;
                let (subscription_id, rest) = Self::unpack_u64(rest)?;
                let (request_confirmations, rest) = Self::unpack_u16(rest)?;
                let (callback_compute_limit, rest) = Self::unpack_u32(rest)?;
                let (num_words, _) = Self::unpack_u32(rest)?;
                Self::Initialize {
                    params: RaffleParams {
                        entry_fee,
                        interval,
                        max_players,
                        key_hash,
                        subscription_id,
                        request_confirmations,
                        callback_compute_limit,
                        num_words,
                    },
                }
            }
            1 => {
                let (amount, _) = Self::unpack_u64(rest)?;
                Self::EnterRaffle { amount }
            }
            2 => Self::CheckUpkeep {},
            3 => Self::PerformUpkeep {},
            4 => {
                let (request_id, rest) = Self::unpack_u64(rest)?;
                let (count, rest) = Self::unpack_u32(rest)?;
                let count = count as usize;
                if count == 0 || rest.len() != count * 32 {
                    return Err(RaffleError::InvalidInstruction.into());
                }
                let random_words = rest
                    .chunks_exact(32)
                    .map(|chunk| *array_ref![chunk, 0, 32])
                    .collect();
                Self::FulfillRandomWords {
                    request_id,
                    random_words,
                }
            }
            5 => Self::CancelRound {},
            6 => {
                let (amount, _) = Self::unpack_u64(rest)?;
                Self::DepositFunding { amount }
            }
            7 => {
                let (amount, _) = Self::unpack_u64(rest)?;
                Self::WithdrawFunding { amount }
            }
            _ => return Err(RaffleError::InvalidInstruction.into()),
        })
    }

    /// Packs a RaffleInstruction into a byte buffer
    pub fn pack(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(size_of::<Self>());
        match self {
            Self::Initialize { params } => {
                buf.reserve(RaffleParams::LEN);
                buf.push(0);
                buf.extend_from_slice(&params.entry_fee.to_le_bytes());
                buf.extend_from_slice(&params.interval.to_le_bytes());
                buf.extend_from_slice(&params.max_players.to_le_bytes());
                buf.extend_from_slice(&params.key_hash);
                buf.extend_from_slice(&params.subscription_id.to_le_bytes());
                buf.extend_from_slice(&params.request_confirmations.to_le_bytes());
                buf.extend_from_slice(&params.callback_compute_limit.to_le_bytes());
                buf.extend_from_slice(&params.num_words.to_le_bytes());
            }
            Self::EnterRaffle { amount } => {
                buf.push(1);
                buf.extend_from_slice(&amount.to_le_bytes());
            }
            Self::CheckUpkeep {} => buf.push(2),
            Self::PerformUpkeep {} => buf.push(3),
            Self::FulfillRandomWords {
                request_id,
                random_words,
            } => {
                buf.push(4);
                buf.extend_from_slice(&request_id.to_le_bytes());
                buf.extend_from_slice(&(random_words.len() as u32).to_le_bytes());
                for word in random_words {
                    buf.extend_from_slice(word);
                }
            }
            Self::CancelRound {} => buf.push(5),
            Self::DepositFunding { amount } => {
                buf.push(6);
                buf.extend_from_slice(&amount.to_le_bytes());
            }
            Self::WithdrawFunding { amount } => {
                buf.push(7);
                buf.extend_from_slice(&amount.to_le_bytes());
            }
        }
        buf
    }

    fn unpack_fixed_bytes<const N: usize>(input: &[u8]) -> Result<([u8; N], &[u8]), ProgramError> {
        if input.len() < N {
            return Err(RaffleError::InvalidInstruction.into());
        }
        let (bytes, rest) = input.split_at(N);
        let mut value = [0u8; N];
        value.copy_from_slice(bytes);
        Ok((value, rest))
    }

    fn unpack_u64(input: &[u8]) -> Result<(u64, &[u8]), ProgramError> {
        let (bytes, rest) = Self::unpack_fixed_bytes::<8>(input)?;
        Ok((u64::from_le_bytes(bytes), rest))
    }

    fn unpack_u32(input: &[u8]) -> Result<(u32, &[u8]), ProgramError> {
        let (bytes, rest) = Self::unpack_fixed_bytes::<4>(input)?;
        Ok((u32::from_le_bytes(bytes), rest))
    }

    fn unpack_u16(input: &[u8]) -> Result<(u16, &[u8]), ProgramError> {
        let (bytes, rest) = Self::unpack_fixed_bytes::<2>(input)?;
        Ok((u16::from_le_bytes(bytes), rest))
    }
}

/// Create initialize instruction
pub fn initialize(
    program_id: &Pubkey,
    owner: &Pubkey,
    coordinator: &Pubkey,
    funding_mint: &Pubkey,
    params: RaffleParams,
) -> Instruction {
    let (raffle, _) = find_raffle_address(program_id);
    let vault = funding_vault_address(&raffle, funding_mint);

    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new(*owner, true),
            AccountMeta::new(raffle, false),
            AccountMeta::new_readonly(*coordinator, false),
            AccountMeta::new_readonly(*funding_mint, false),
            AccountMeta::new(vault, false),
            AccountMeta::new_readonly(system_program::id(), false),
            AccountMeta::new_readonly(spl_token::id(), false),
            AccountMeta::new_readonly(spl_associated_token_account::id(), false),
        ],
        data: RaffleInstruction::Initialize { params }.pack(),
    }
}

/// Create enter_raffle instruction
pub fn enter_raffle(program_id: &Pubkey, player: &Pubkey, amount: u64) -> Instruction {
    let (raffle, _) = find_raffle_address(program_id);

    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new(*player, true),
            AccountMeta::new(raffle, false),
            AccountMeta::new_readonly(system_program::id(), false),
        ],
        data: RaffleInstruction::EnterRaffle { amount }.pack(),
    }
}

/// Create check_upkeep instruction
pub fn check_upkeep(program_id: &Pubkey) -> Instruction {
    let (raffle, _) = find_raffle_address(program_id);

    Instruction {
        program_id: *program_id,
        accounts: vec![AccountMeta::new_readonly(raffle, false)],
        data: RaffleInstruction::CheckUpkeep {}.pack(),
    }
}

/// Create perform_upkeep instruction
pub fn perform_upkeep(program_id: &Pubkey, keeper: &Pubkey) -> Instruction {
    let (raffle, _) = find_raffle_address(program_id);

    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new_readonly(*keeper, true),
            AccountMeta::new(raffle, false),
        ],
        data: RaffleInstruction::PerformUpkeep {}.pack(),
    }
}

/// Create fulfill_random_words instruction
pub fn fulfill_random_words(
    program_id: &Pubkey,
    coordinator: &Pubkey,
    winner: &Pubkey,
    request_id: u64,
    random_words: Vec<[u8; 32]>,
) -> Instruction {
    let (raffle, _) = find_raffle_address(program_id);

    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new_readonly(*coordinator, true),
            AccountMeta::new(raffle, false),
            AccountMeta::new(*winner, false),
        ],
        data: RaffleInstruction::FulfillRandomWords {
            request_id,
            random_words,
        }
        .pack(),
    }
}

/// Create cancel_round instruction
pub fn cancel_round(program_id: &Pubkey, owner: &Pubkey) -> Instruction {
    let (raffle, _) = find_raffle_address(program_id);

    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new_readonly(*owner, true),
            AccountMeta::new(raffle, false),
        ],
        data: RaffleInstruction::CancelRound {}.pack(),
    }
}

/// Create deposit_funding instruction
pub fn deposit_funding(
    program_id: &Pubkey,
    owner: &Pubkey,
    source: &Pubkey,
    funding_mint: &Pubkey,
    amount: u64,
) -> Instruction {
    let (raffle, _) = find_raffle_address(program_id);
    let vault = funding_vault_address(&raffle, funding_mint);

    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new_readonly(*owner, true),
            AccountMeta::new_readonly(raffle, false),
            AccountMeta::new(*source, false),
            AccountMeta::new(vault, false),
            AccountMeta::new_readonly(spl_token::id(), false),
        ],
        data: RaffleInstruction::DepositFunding { amount }.pack(),
    }
}

/// Create withdraw_funding instruction
pub fn withdraw_funding(
    program_id: &Pubkey,
    owner: &Pubkey,
    destination: &Pubkey,
    funding_mint: &Pubkey,
    amount: u64,
) -> Instruction {
    let (raffle, _) = find_raffle_address(program_id);
    let vault = funding_vault_address(&raffle, funding_mint);

    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new_readonly(*owner, true),
            AccountMeta::new_readonly(raffle, false),
            AccountMeta::new(vault, false),
            AccountMeta::new(*destination, false),
            AccountMeta::new_readonly(spl_token::id(), false),
        ],
        data: RaffleInstruction::WithdrawFunding { amount }.pack(),
    }
}
