// Raffle VRF Program - Instruction Processor
use borsh::BorshSerialize;
use solana_program::{
    account_info::{next_account_info, AccountInfo},
    entrypoint::ProgramResult,
    msg,
    program::{invoke, invoke_signed, set_return_data},
    program_error::ProgramError,
    pubkey::Pubkey,
    system_instruction, system_program,
    sysvar::{clock::Clock, rent::Rent, Sysvar},
};

use crate::{
    engine::{PrizePayout, RaffleEngine},
    error::{EngineError, RaffleError},
    events::RaffleEvent,
    instruction::{RaffleInstruction, RaffleParams},
    oracle::CoordinatorOracle,
    state::{Raffle, VrfConfig, MAX_PLAYERS},
    utils::{find_raffle_address, funding_vault_address, lamports_to_sol, pool_balance, RAFFLE_SEED},
};

/// Pays the prize straight out of the raffle account's lamports
struct LamportPayout<'a, 'b> {
    raffle_info: &'a AccountInfo<'b>,
    winner_info: &'a AccountInfo<'b>,
}

impl PrizePayout for LamportPayout<'_, '_> {
    fn pay(&mut self, winner: &Pubkey, amount: u64) -> Result<(), ProgramError> {
        if self.winner_info.key != winner {
            msg!(
                "Winner account {} does not match drawn player {}",
                self.winner_info.key,
                winner
            );
            return Err(RaffleError::WinnerMismatch.into());
        }
        if !self.winner_info.is_writable {
            msg!("Winner account must be writable");
            return Err(ProgramError::InvalidArgument);
        }

        let raffle_lamports = self
            .raffle_info
            .lamports()
            .checked_sub(amount)
            .ok_or(ProgramError::InsufficientFunds)?;
        let winner_lamports = self
            .winner_info
            .lamports()
            .checked_add(amount)
            .ok_or(RaffleError::Overflow)?;

        **self.raffle_info.try_borrow_mut_lamports()? = raffle_lamports;
        **self.winner_info.try_borrow_mut_lamports()? = winner_lamports;
        Ok(())
    }
}

pub struct Processor;

impl Processor {
    pub fn process(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        instruction_data: &[u8],
    ) -> ProgramResult {
        let instruction = RaffleInstruction::unpack(instruction_data)?;

        match instruction {
            RaffleInstruction::Initialize { params } => {
                msg!("Instruction: Initialize");
                Self::process_initialize(program_id, accounts, params)
            }
            RaffleInstruction::EnterRaffle { amount } => {
                msg!("Instruction: Enter Raffle");
                Self::process_enter_raffle(program_id, accounts, amount)
            }
            RaffleInstruction::CheckUpkeep {} => {
                msg!("Instruction: Check Upkeep");
                Self::process_check_upkeep(program_id, accounts)
            }
            RaffleInstruction::PerformUpkeep {} => {
                msg!("Instruction: Perform Upkeep");
                Self::process_perform_upkeep(program_id, accounts)
            }
            RaffleInstruction::FulfillRandomWords {
                request_id,
                random_words,
            } => {
                msg!("Instruction: Fulfill Random Words");
                Self::process_fulfill_random_words(program_id, accounts, request_id, &random_words)
            }
            RaffleInstruction::CancelRound {} => {
                msg!("Instruction: Cancel Round");
                Self::process_cancel_round(program_id, accounts)
            }
            RaffleInstruction::DepositFunding { amount } => {
                msg!("Instruction: Deposit Funding");
                Self::process_deposit_funding(program_id, accounts, amount)
            }
            RaffleInstruction::WithdrawFunding { amount } => {
                msg!("Instruction: Withdraw Funding");
                Self::process_withdraw_funding(program_id, accounts, amount)
            }
        }
    }

    /// Create the raffle PDA and the associated token account backing the
    /// funding vault. Called once per deployment.
    fn process_initialize(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        params: RaffleParams,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let owner_info = next_account_info(account_info_iter)?;
        let raffle_info = next_account_info(account_info_iter)?;
        let coordinator_info = next_account_info(account_info_iter)?;
        let mint_info = next_account_info(account_info_iter)?;
        let vault_info = next_account_info(account_info_iter)?;
        let system_program_info = next_account_info(account_info_iter)?;
        let token_program_info = next_account_info(account_info_iter)?;
        let ata_program_info = next_account_info(account_info_iter)?;

        if !owner_info.is_signer {
            msg!("Owner must sign the transaction");
            return Err(ProgramError::MissingRequiredSignature);
        }

        if params.entry_fee == 0
            || params.interval == 0
            || params.max_players == 0
            || params.max_players > MAX_PLAYERS
            || params.num_words == 0
        {
            msg!(
                "Invalid raffle config: fee={}, interval={}, max_players={} (limit {}), words={}",
                params.entry_fee,
                params.interval,
                params.max_players,
                MAX_PLAYERS,
                params.num_words
            );
            return Err(RaffleError::InvalidConfig.into());
        }

        let (expected_raffle, bump) = find_raffle_address(program_id);
        if *raffle_info.key != expected_raffle {
            msg!("Invalid raffle account address");
            return Err(ProgramError::InvalidArgument);
        }
        if raffle_info.owner == program_id {
            msg!("Raffle account is already initialized");
            return Err(RaffleError::AlreadyInitialized.into());
        }

        if *system_program_info.key != system_program::id()
            || *token_program_info.key != spl_token::id()
            || *ata_program_info.key != spl_associated_token_account::id()
        {
            return Err(ProgramError::IncorrectProgramId);
        }
        if *mint_info.owner != spl_token::id() {
            msg!("Funding mint must be owned by the token program");
            return Err(ProgramError::IncorrectProgramId);
        }
        if *vault_info.key != funding_vault_address(raffle_info.key, mint_info.key) {
            msg!("Funding vault must be the raffle's associated token account");
            return Err(RaffleError::InvalidVault.into());
        }

        let space = Raffle::space(params.max_players);
        Self::create_raffle_account(
            program_id,
            owner_info,
            raffle_info,
            system_program_info,
            space,
            &[RAFFLE_SEED, &[bump]],
        )?;

        invoke(
            &spl_associated_token_account::instruction::create_associated_token_account(
                owner_info.key,
                raffle_info.key,
                mint_info.key,
                token_program_info.key,
            ),
            &[
                owner_info.clone(),
                vault_info.clone(),
                raffle_info.clone(),
                mint_info.clone(),
                system_program_info.clone(),
                token_program_info.clone(),
                ata_program_info.clone(),
            ],
        )?;

        let clock = Clock::get()?;
        let vrf = VrfConfig {
            coordinator: *coordinator_info.key,
            key_hash: params.key_hash,
            subscription_id: params.subscription_id,
            request_confirmations: params.request_confirmations,
            callback_compute_limit: params.callback_compute_limit,
            num_words: params.num_words,
        };
        let mut raffle = Raffle::new(
            *owner_info.key,
            bump,
            params.entry_fee,
            params.interval,
            params.max_players,
            vrf,
            clock.unix_timestamp,
        );
        raffle.funding_mint = *mint_info.key;
        raffle.funding_vault = *vault_info.key;
        raffle.save(&mut raffle_info.data.borrow_mut())?;

        msg!(
            "Raffle initialized: Owner={}, EntryFee={} SOL, Interval={}s, MaxPlayers={}, Coordinator={}",
            owner_info.key,
            lamports_to_sol(params.entry_fee),
            params.interval,
            params.max_players,
            coordinator_info.key
        );
        Ok(())
    }

    fn process_enter_raffle(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        amount: u64,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let player_info = next_account_info(account_info_iter)?;
        let raffle_info = next_account_info(account_info_iter)?;
        let system_program_info = next_account_info(account_info_iter)?;

        if !player_info.is_signer {
            msg!("Player must sign the transaction");
            return Err(ProgramError::MissingRequiredSignature);
        }

        let mut raffle = Self::load_raffle(program_id, raffle_info)?;

        let mut engine = RaffleEngine::new(&mut raffle);
        engine
            .enter(*player_info.key, amount)
            .map_err(Self::engine_failure)?;
        let events = engine.into_events();

        invoke(
            &system_instruction::transfer(player_info.key, raffle_info.key, amount),
            &[
                player_info.clone(),
                raffle_info.clone(),
                system_program_info.clone(),
            ],
        )?;

        raffle.save(&mut raffle_info.data.borrow_mut())?;
        Self::emit(&events)?;

        msg!(
            "Player {} entered with {} lamports, {} players in round",
            player_info.key,
            amount,
            raffle.players.len()
        );
        Ok(())
    }

    /// Read-only; the keeper reads the `UpkeepCheck` from return data
    fn process_check_upkeep(program_id: &Pubkey, accounts: &[AccountInfo]) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let raffle_info = next_account_info(account_info_iter)?;

        let raffle = Self::load_raffle(program_id, raffle_info)?;
        let clock = Clock::get()?;
        let check = raffle.check_upkeep(clock.unix_timestamp, pool_balance(raffle_info)?);

        msg!(
            "Upkeep needed: {} (balance={}, players={}, state={:?}, time_passed={})",
            check.upkeep_needed,
            check.balance,
            check.player_count,
            check.state,
            check.time_passed
        );
        set_return_data(&check.try_to_vec()?);
        Ok(())
    }

    fn process_perform_upkeep(program_id: &Pubkey, accounts: &[AccountInfo]) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let keeper_info = next_account_info(account_info_iter)?;
        let raffle_info = next_account_info(account_info_iter)?;

        // Any keeper may trigger the round
        if !keeper_info.is_signer {
            msg!("Keeper must sign the transaction");
            return Err(ProgramError::MissingRequiredSignature);
        }

        let mut raffle = Self::load_raffle(program_id, raffle_info)?;
        let clock = Clock::get()?;
        let balance = pool_balance(raffle_info)?;
        let mut oracle = CoordinatorOracle::new(raffle.next_request_id);

        let mut engine = RaffleEngine::new(&mut raffle);
        let request_id = engine
            .begin_round(clock.unix_timestamp, balance, raffle_info.key, &mut oracle)
            .map_err(Self::engine_failure)?;
        let events = engine.into_events();
        raffle.next_request_id = oracle.next_request_id();

        raffle.save(&mut raffle_info.data.borrow_mut())?;
        Self::emit(&events)?;

        msg!(
            "Requested raffle winner: request_id={}, players={}, pool={} lamports",
            request_id,
            raffle.players.len(),
            balance
        );
        Ok(())
    }

    fn process_fulfill_random_words(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        request_id: u64,
        random_words: &[[u8; 32]],
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let coordinator_info = next_account_info(account_info_iter)?;
        let raffle_info = next_account_info(account_info_iter)?;
        let winner_info = next_account_info(account_info_iter)?;

        let mut raffle = Self::load_raffle(program_id, raffle_info)?;

        if *coordinator_info.key != raffle.vrf.coordinator {
            msg!("Only the VRF coordinator can fulfill randomness");
            return Err(RaffleError::NotCoordinator.into());
        }
        if !coordinator_info.is_signer {
            msg!("Coordinator must sign the fulfillment");
            return Err(ProgramError::MissingRequiredSignature);
        }

        let random_word = random_words
            .first()
            .ok_or(RaffleError::InvalidInstruction)?;
        let clock = Clock::get()?;
        let balance = pool_balance(raffle_info)?;
        let mut payout = LamportPayout {
            raffle_info,
            winner_info,
        };

        let mut engine = RaffleEngine::new(&mut raffle);
        let winner = engine
            .complete_round(request_id, random_word, clock.unix_timestamp, balance, &mut payout)
            .map_err(Self::engine_failure)?;
        let events = engine.into_events();

        raffle.save(&mut raffle_info.data.borrow_mut())?;
        Self::emit(&events)?;

        msg!(
            "Winner picked: {} receives {} SOL (request_id={})",
            winner,
            lamports_to_sol(balance),
            request_id
        );
        Ok(())
    }

    fn process_cancel_round(program_id: &Pubkey, accounts: &[AccountInfo]) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let owner_info = next_account_info(account_info_iter)?;
        let raffle_info = next_account_info(account_info_iter)?;

        let mut raffle = Self::load_raffle(program_id, raffle_info)?;
        Self::check_owner(&raffle, owner_info)?;

        let clock = Clock::get()?;
        let mut engine = RaffleEngine::new(&mut raffle);
        let request_id = engine
            .cancel_round(clock.unix_timestamp)
            .map_err(Self::engine_failure)?;
        let events = engine.into_events();

        raffle.save(&mut raffle_info.data.borrow_mut())?;
        Self::emit(&events)?;

        msg!("Cancelled randomness request {}", request_id);
        Ok(())
    }

    fn process_deposit_funding(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        amount: u64,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let owner_info = next_account_info(account_info_iter)?;
        let raffle_info = next_account_info(account_info_iter)?;
        let source_info = next_account_info(account_info_iter)?;
        let vault_info = next_account_info(account_info_iter)?;
        let token_program_info = next_account_info(account_info_iter)?;

        let raffle = Self::load_raffle(program_id, raffle_info)?;
        Self::check_owner(&raffle, owner_info)?;
        Self::check_vault(&raffle, vault_info, token_program_info)?;

        invoke(
            &spl_token::instruction::transfer(
                token_program_info.key,
                source_info.key,
                vault_info.key,
                owner_info.key,
                &[],
                amount,
            )?,
            &[
                source_info.clone(),
                vault_info.clone(),
                owner_info.clone(),
                token_program_info.clone(),
            ],
        )?;

        RaffleEvent::FundingDeposited { amount }.emit()?;
        Ok(())
    }

    fn process_withdraw_funding(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        amount: u64,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let owner_info = next_account_info(account_info_iter)?;
        let raffle_info = next_account_info(account_info_iter)?;
        let vault_info = next_account_info(account_info_iter)?;
        let destination_info = next_account_info(account_info_iter)?;
        let token_program_info = next_account_info(account_info_iter)?;

        let raffle = Self::load_raffle(program_id, raffle_info)?;
        Self::check_owner(&raffle, owner_info)?;
        Self::check_vault(&raffle, vault_info, token_program_info)?;

        invoke_signed(
            &spl_token::instruction::transfer(
                token_program_info.key,
                vault_info.key,
                destination_info.key,
                raffle_info.key,
                &[],
                amount,
            )?,
            &[
                vault_info.clone(),
                destination_info.clone(),
                raffle_info.clone(),
                token_program_info.clone(),
            ],
            &[&[RAFFLE_SEED, &[raffle.bump]]],
        )?;

        RaffleEvent::FundingWithdrawn { amount }.emit()?;
        Ok(())
    }

    /// Create the raffle PDA. The address is fixed, so it may already hold
    /// lamports sent before initialization; `create_account` refuses such an
    /// account, which is topped up, allocated and assigned instead.
    fn create_raffle_account<'a>(
        program_id: &Pubkey,
        payer_info: &AccountInfo<'a>,
        raffle_info: &AccountInfo<'a>,
        system_program_info: &AccountInfo<'a>,
        space: usize,
        seeds: &[&[u8]],
    ) -> ProgramResult {
        let rent = Rent::get()?;
        let required_lamports = rent.minimum_balance(space);

        if raffle_info.lamports() == 0 {
            return invoke_signed(
                &system_instruction::create_account(
                    payer_info.key,
                    raffle_info.key,
                    required_lamports,
                    space as u64,
                    program_id,
                ),
                &[
                    payer_info.clone(),
                    raffle_info.clone(),
                    system_program_info.clone(),
                ],
                &[seeds],
            );
        }

        msg!(
            "Raffle address already holds {} lamports, reusing it",
            raffle_info.lamports()
        );
        let top_up = required_lamports.saturating_sub(raffle_info.lamports());
        if top_up > 0 {
            invoke(
                &system_instruction::transfer(payer_info.key, raffle_info.key, top_up),
                &[
                    payer_info.clone(),
                    raffle_info.clone(),
                    system_program_info.clone(),
                ],
            )?;
        }
        invoke_signed(
            &system_instruction::allocate(raffle_info.key, space as u64),
            &[raffle_info.clone(), system_program_info.clone()],
            &[seeds],
        )?;
        invoke_signed(
            &system_instruction::assign(raffle_info.key, program_id),
            &[raffle_info.clone(), system_program_info.clone()],
            &[seeds],
        )
    }

    fn load_raffle(program_id: &Pubkey, raffle_info: &AccountInfo) -> Result<Raffle, ProgramError> {
        if raffle_info.owner != program_id {
            msg!("Raffle account must be owned by this program");
            return Err(ProgramError::IncorrectProgramId);
        }

        let raffle = Raffle::load(&raffle_info.data.borrow())?;
        if !raffle.is_initialized {
            return Err(RaffleError::NotInitialized.into());
        }
        Ok(raffle)
    }

    fn check_owner(raffle: &Raffle, owner_info: &AccountInfo) -> ProgramResult {
        if raffle.owner != *owner_info.key {
            msg!("Only the raffle owner can perform this action");
            return Err(RaffleError::NotOwner.into());
        }
        if !owner_info.is_signer {
            msg!("Owner must sign the transaction");
            return Err(ProgramError::MissingRequiredSignature);
        }
        Ok(())
    }

    fn check_vault(
        raffle: &Raffle,
        vault_info: &AccountInfo,
        token_program_info: &AccountInfo,
    ) -> ProgramResult {
        if *token_program_info.key != spl_token::id() {
            return Err(ProgramError::IncorrectProgramId);
        }
        if *vault_info.key != raffle.funding_vault {
            msg!("Vault {} is not the raffle funding vault", vault_info.key);
            return Err(RaffleError::InvalidVault.into());
        }
        Ok(())
    }

    /// Log the diagnostic payload before it collapses into an error code
    fn engine_failure(err: EngineError) -> ProgramError {
        msg!("Raffle error: {}", err);
        err.into()
    }

    fn emit(events: &[RaffleEvent]) -> ProgramResult {
        for event in events {
            event.emit()?;
        }
        Ok(())
    }
}
