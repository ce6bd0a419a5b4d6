// Raffle VRF Program - Utility Functions
use solana_program::{
    account_info::AccountInfo,
    program_error::ProgramError,
    pubkey::Pubkey,
    sysvar::{rent::Rent, Sysvar},
};

/// Seed of the raffle PDA; one raffle per program deployment
pub const RAFFLE_SEED: &[u8] = b"raffle";

/// 0.01 SOL
pub const DEFAULT_ENTRY_FEE: u64 = 10_000_000;
pub const DEFAULT_INTERVAL: u64 = 30;
pub const DEFAULT_CALLBACK_COMPUTE_LIMIT: u32 = 300_000;
pub const DEFAULT_REQUEST_CONFIRMATIONS: u16 = 3;
pub const DEFAULT_NUM_WORDS: u32 = 1;

/// Find the program derived address of the raffle
pub fn find_raffle_address(program_id: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[RAFFLE_SEED], program_id)
}

/// Associated token account holding the raffle's funding balance
pub fn funding_vault_address(raffle: &Pubkey, funding_mint: &Pubkey) -> Pubkey {
    spl_associated_token_account::get_associated_token_address(raffle, funding_mint)
}

/// Lamports held by `account` above its rent-exempt minimum
pub fn pool_balance(account: &AccountInfo) -> Result<u64, ProgramError> {
    let rent = Rent::get()?;
    Ok(account
        .lamports()
        .saturating_sub(rent.minimum_balance(account.data_len())))
}

/// Convert lamports to SOL (for display purposes)
pub fn lamports_to_sol(lamports: u64) -> f64 {
    lamports as f64 / 1_000_000_000.0
}
