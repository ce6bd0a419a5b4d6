use solana_program::program_pack::Pack;
use solana_program_test::*;
use solana_sdk::{
    account::Account,
    instruction::{Instruction, InstructionError},
    pubkey::Pubkey,
    signature::{Keypair, Signer},
    system_instruction,
    sysvar::clock::Clock,
    transaction::{Transaction, TransactionError},
};

use borsh::BorshDeserialize;
use raffle_vrf::{
    engine::{UpkeepCheck, REQUEST_TIMEOUT_SECS},
    error::RaffleError,
    instruction::{self as raffle_instruction, RaffleParams},
    process_instruction,
    state::{Raffle, RaffleState},
    utils::{find_raffle_address, funding_vault_address},
};

const ENTRY_FEE: u64 = 10_000_000;
const INTERVAL: u64 = 30;
const PLAYER_LAMPORTS: u64 = 1_000_000_000;
/// Encoded `UpkeepCheck` with empty perform data
const UPKEEP_CHECK_LEN: usize = 1 + 8 + 8 + 1 + 1 + 4;

struct TestRaffle {
    context: ProgramTestContext,
    program_id: Pubkey,
    raffle: Pubkey,
    coordinator: Keypair,
    mint: Keypair,
    players: Vec<Keypair>,
}

// Setup program test with an initialized raffle and funded players
async fn setup(player_count: usize) -> TestRaffle {
    setup_with_prefunded_raffle(player_count, 0).await
}

/// Same as `setup`, but the raffle address already holds `raffle_lamports`
/// when `Initialize` runs
async fn setup_with_prefunded_raffle(player_count: usize, raffle_lamports: u64) -> TestRaffle {
    let program_id = Pubkey::new_unique();
    let (raffle, _) = find_raffle_address(&program_id);
    let mut program_test = ProgramTest::new(
        "raffle_vrf",
        program_id,
        processor!(process_instruction),
    );

    if raffle_lamports > 0 {
        program_test.add_account(
            raffle,
            Account {
                lamports: raffle_lamports,
                ..Account::default()
            },
        );
    }

    let players: Vec<Keypair> = (0..player_count).map(|_| Keypair::new()).collect();
    for player in &players {
        program_test.add_account(
            player.pubkey(),
            Account {
                lamports: PLAYER_LAMPORTS,
                ..Account::default()
            },
        );
    }

    let mut context = program_test.start_with_context().await;
    let coordinator = Keypair::new();
    let mint = Keypair::new();
    let payer = context.payer.pubkey();

    let rent = context.banks_client.get_rent().await.unwrap();
    let create_mint = [
        system_instruction::create_account(
            &payer,
            &mint.pubkey(),
            rent.minimum_balance(spl_token::state::Mint::LEN),
            spl_token::state::Mint::LEN as u64,
            &spl_token::id(),
        ),
        spl_token::instruction::initialize_mint(&spl_token::id(), &mint.pubkey(), &payer, None, 0)
            .unwrap(),
    ];
    process(&mut context, &create_mint, &[&mint]).await.unwrap();

    let params = RaffleParams {
        entry_fee: ENTRY_FEE,
        interval: INTERVAL,
        max_players: 10,
        ..RaffleParams::default()
    };
    let initialize = raffle_instruction::initialize(
        &program_id,
        &payer,
        &coordinator.pubkey(),
        &mint.pubkey(),
        params,
    );
    process(&mut context, &[initialize], &[]).await.unwrap();

    TestRaffle {
        context,
        program_id,
        raffle,
        coordinator,
        mint,
        players,
    }
}

/// Sign with the payer plus `signers` and process
async fn process(
    context: &mut ProgramTestContext,
    instructions: &[Instruction],
    signers: &[&Keypair],
) -> Result<(), TransactionError> {
    let mut all_signers = vec![&context.payer];
    all_signers.extend_from_slice(signers);

    let mut transaction =
        Transaction::new_with_payer(instructions, Some(&context.payer.pubkey()));
    transaction.sign(&all_signers, context.last_blockhash);

    context
        .banks_client
        .process_transaction(transaction)
        .await
        .map_err(|e| e.unwrap())
}

fn raffle_error(error: RaffleError) -> TransactionError {
    TransactionError::InstructionError(0, InstructionError::Custom(error as u32))
}

fn word(value: u64) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[24..].copy_from_slice(&value.to_be_bytes());
    word
}

impl TestRaffle {
    async fn state(&mut self) -> Raffle {
        let account = self
            .context
            .banks_client
            .get_account(self.raffle)
            .await
            .unwrap()
            .unwrap();
        Raffle::load(&account.data).unwrap()
    }

    async fn lamports(&mut self, address: Pubkey) -> u64 {
        self.context.banks_client.get_balance(address).await.unwrap()
    }

    async fn advance_clock(&mut self, seconds: i64) {
        let mut clock: Clock = self.context.banks_client.get_sysvar().await.unwrap();
        clock.unix_timestamp += seconds;
        self.context.set_sysvar(&clock);
    }

    async fn enter(&mut self, player: usize, amount: u64) -> Result<(), TransactionError> {
        let player = &self.players[player];
        let ix = raffle_instruction::enter_raffle(&self.program_id, &player.pubkey(), amount);
        let player = Keypair::from_bytes(&player.to_bytes()).unwrap();
        process(&mut self.context, &[ix], &[&player]).await
    }

    /// Simulate `CheckUpkeep` and decode the returned `UpkeepCheck`
    async fn check_upkeep(&mut self) -> UpkeepCheck {
        let ix = raffle_instruction::check_upkeep(&self.program_id);
        let mut transaction =
            Transaction::new_with_payer(&[ix], Some(&self.context.payer.pubkey()));
        transaction.sign(&[&self.context.payer], self.context.last_blockhash);

        let simulation = self
            .context
            .banks_client
            .simulate_transaction(transaction)
            .await
            .unwrap();
        assert!(matches!(simulation.result, Some(Ok(()))));
        let return_data = simulation
            .simulation_details
            .unwrap()
            .return_data
            .unwrap();
        assert_eq!(return_data.program_id, self.program_id);

        // Trailing zero bytes may be trimmed from return data
        let mut data = return_data.data;
        if data.len() < UPKEEP_CHECK_LEN {
            data.resize(UPKEEP_CHECK_LEN, 0);
        }
        UpkeepCheck::try_from_slice(&data).unwrap()
    }

    async fn perform_upkeep(&mut self) -> Result<(), TransactionError> {
        let keeper = self.context.payer.pubkey();
        let ix = raffle_instruction::perform_upkeep(&self.program_id, &keeper);
        process(&mut self.context, &[ix], &[]).await
    }

    async fn fulfill(
        &mut self,
        coordinator: &Keypair,
        winner: &Pubkey,
        request_id: u64,
        random_word: [u8; 32],
    ) -> Result<(), TransactionError> {
        let ix = raffle_instruction::fulfill_random_words(
            &self.program_id,
            &coordinator.pubkey(),
            winner,
            request_id,
            vec![random_word],
        );
        process(&mut self.context, &[ix], &[coordinator]).await
    }

    /// Enter every player and move the round to `Calculating`
    async fn start_round(&mut self) -> u64 {
        for player in 0..self.players.len() {
            self.enter(player, ENTRY_FEE).await.unwrap();
        }
        self.advance_clock(INTERVAL as i64).await;
        self.perform_upkeep().await.unwrap();
        self.state().await.pending_request_id.unwrap()
    }

    fn coordinator(&self) -> Keypair {
        Keypair::from_bytes(&self.coordinator.to_bytes()).unwrap()
    }
}

#[tokio::test]
async fn test_initialize() {
    let mut test = setup(0).await;
    let raffle = test.state().await;

    assert!(raffle.is_initialized);
    assert_eq!(raffle.owner, test.context.payer.pubkey());
    assert_eq!(raffle.state, RaffleState::Open);
    assert_eq!(raffle.entry_fee, ENTRY_FEE);
    assert_eq!(raffle.interval, INTERVAL);
    assert_eq!(raffle.vrf.coordinator, test.coordinator.pubkey());
    assert_eq!(raffle.vrf.num_words, 1);
    assert_eq!(raffle.pending_request_id, None);
    assert_eq!(raffle.recent_winner, None);
    assert!(raffle.players.is_empty());
    assert_eq!(
        raffle.funding_vault,
        funding_vault_address(&test.raffle, &test.mint.pubkey())
    );

    let vault = test
        .context
        .banks_client
        .get_account(raffle.funding_vault)
        .await
        .unwrap()
        .unwrap();
    let vault = spl_token::state::Account::unpack(&vault.data).unwrap();
    assert_eq!(vault.owner, test.raffle);
    assert_eq!(vault.amount, 0);
}

#[tokio::test]
async fn test_initialize_with_prefunded_pda() {
    let mut test = setup_with_prefunded_raffle(1, 1_000).await;
    let raffle = test.state().await;
    assert!(raffle.is_initialized);
    assert_eq!(raffle.owner, test.context.payer.pubkey());

    let account = test
        .context
        .banks_client
        .get_account(test.raffle)
        .await
        .unwrap()
        .unwrap();
    let rent = test.context.banks_client.get_rent().await.unwrap();
    assert_eq!(account.owner, test.program_id);
    assert_eq!(account.data.len(), Raffle::space(10));
    assert_eq!(account.lamports, rent.minimum_balance(Raffle::space(10)));

    // The reused account behaves like a freshly created one
    test.enter(0, ENTRY_FEE).await.unwrap();
    assert_eq!(test.state().await.players, vec![test.players[0].pubkey()]);
}

#[tokio::test]
async fn test_initialize_twice_fails() {
    let mut test = setup(0).await;
    let payer = test.context.payer.pubkey();
    let ix = raffle_instruction::initialize(
        &test.program_id,
        &payer,
        &test.coordinator.pubkey(),
        &test.mint.pubkey(),
        RaffleParams {
            interval: INTERVAL + 1,
            ..RaffleParams::default()
        },
    );

    let err = process(&mut test.context, &[ix], &[]).await.unwrap_err();
    assert_eq!(err, raffle_error(RaffleError::AlreadyInitialized));
}

#[tokio::test]
async fn test_enter_raffle() {
    let mut test = setup(2).await;
    let balance_before = test.lamports(test.raffle).await;

    test.enter(0, ENTRY_FEE).await.unwrap();
    test.enter(1, ENTRY_FEE + 5).await.unwrap();

    let raffle = test.state().await;
    assert_eq!(
        raffle.players,
        vec![test.players[0].pubkey(), test.players[1].pubkey()]
    );
    assert_eq!(
        test.lamports(test.raffle).await,
        balance_before + 2 * ENTRY_FEE + 5
    );
}

#[tokio::test]
async fn test_enter_with_insufficient_payment() {
    let mut test = setup(1).await;

    let err = test.enter(0, ENTRY_FEE - 1).await.unwrap_err();
    assert_eq!(err, raffle_error(RaffleError::InsufficientPayment));
    assert!(test.state().await.players.is_empty());
}

#[tokio::test]
async fn test_check_upkeep_returns_eligibility() {
    let mut test = setup(2).await;
    test.enter(0, ENTRY_FEE).await.unwrap();
    test.enter(1, ENTRY_FEE).await.unwrap();

    let check = test.check_upkeep().await;
    assert!(!check.upkeep_needed);
    assert!(!check.time_passed);
    assert_eq!(check.balance, 2 * ENTRY_FEE);
    assert_eq!(check.player_count, 2);
    assert_eq!(check.state, RaffleState::Open);

    test.advance_clock(INTERVAL as i64).await;
    let check = test.check_upkeep().await;
    assert!(check.upkeep_needed);
    assert!(check.time_passed);
    assert_eq!(check.balance, 2 * ENTRY_FEE);
    assert_eq!(check.player_count, 2);
    assert!(check.perform_data.is_empty());

    test.perform_upkeep().await.unwrap();
    let check = test.check_upkeep().await;
    assert!(!check.upkeep_needed);
    assert_eq!(check.state, RaffleState::Calculating);
}

#[tokio::test]
async fn test_check_upkeep_is_read_only() {
    let mut test = setup(1).await;
    test.enter(0, ENTRY_FEE).await.unwrap();
    let before = test.state().await;

    let ix = raffle_instruction::check_upkeep(&test.program_id);
    process(&mut test.context, &[ix], &[]).await.unwrap();

    assert_eq!(test.state().await, before);
}

#[tokio::test]
async fn test_perform_upkeep_before_interval() {
    let mut test = setup(1).await;
    test.enter(0, ENTRY_FEE).await.unwrap();

    let err = test.perform_upkeep().await.unwrap_err();
    assert_eq!(err, raffle_error(RaffleError::UpkeepNotReady));
    assert_eq!(test.state().await.state, RaffleState::Open);
}

#[tokio::test]
async fn test_perform_upkeep_without_players() {
    let mut test = setup(0).await;
    test.advance_clock(INTERVAL as i64).await;

    let err = test.perform_upkeep().await.unwrap_err();
    assert_eq!(err, raffle_error(RaffleError::UpkeepNotReady));
}

#[tokio::test]
async fn test_perform_upkeep_requests_winner() {
    let mut test = setup(2).await;
    let request_id = test.start_round().await;

    let raffle = test.state().await;
    assert_eq!(request_id, 1);
    assert_eq!(raffle.state, RaffleState::Calculating);
    assert_eq!(raffle.next_request_id, 2);
    assert_eq!(raffle.players.len(), 2);

    // Entries are closed while the draw is pending
    let err = test.enter(0, ENTRY_FEE + 1).await.unwrap_err();
    assert_eq!(err, raffle_error(RaffleError::NotOpen));
}

#[tokio::test]
async fn test_fulfill_from_unknown_signer() {
    let mut test = setup(1).await;
    let request_id = test.start_round().await;
    let impostor = Keypair::new();
    let winner = test.players[0].pubkey();

    let err = test
        .fulfill(&impostor, &winner, request_id, word(0))
        .await
        .unwrap_err();
    assert_eq!(err, raffle_error(RaffleError::NotCoordinator));
    assert_eq!(test.state().await.state, RaffleState::Calculating);
}

#[tokio::test]
async fn test_fulfill_unknown_request() {
    let mut test = setup(1).await;
    let request_id = test.start_round().await;
    let coordinator = test.coordinator();
    let winner = test.players[0].pubkey();

    let err = test
        .fulfill(&coordinator, &winner, request_id + 1, word(0))
        .await
        .unwrap_err();
    assert_eq!(err, raffle_error(RaffleError::UnknownRequest));
}

#[tokio::test]
async fn test_fulfill_with_wrong_winner_can_be_retried() {
    let mut test = setup(2).await;
    let request_id = test.start_round().await;
    let coordinator = test.coordinator();
    let loser = test.players[0].pubkey();
    let winner = test.players[1].pubkey();

    // word(1) draws index 1
    let err = test
        .fulfill(&coordinator, &loser, request_id, word(1))
        .await
        .unwrap_err();
    assert_eq!(err, raffle_error(RaffleError::WinnerMismatch));

    let raffle = test.state().await;
    assert_eq!(raffle.state, RaffleState::Calculating);
    assert_eq!(raffle.pending_request_id, Some(request_id));

    test.fulfill(&coordinator, &winner, request_id, word(1))
        .await
        .unwrap();
    assert_eq!(test.state().await.recent_winner, Some(winner));
}

#[tokio::test]
async fn test_full_round() {
    let mut test = setup(2).await;
    let request_id = test.start_round().await;
    let coordinator = test.coordinator();
    let winner = test.players[1].pubkey();
    let raffle_lamports = test.lamports(test.raffle).await;
    let winner_lamports = test.lamports(winner).await;

    test.fulfill(&coordinator, &winner, request_id, word(3))
        .await
        .unwrap();

    let raffle = test.state().await;
    assert_eq!(raffle.state, RaffleState::Open);
    assert_eq!(raffle.recent_winner, Some(winner));
    assert_eq!(raffle.pending_request_id, None);
    assert_eq!(raffle.completed_rounds, 1);
    assert!(raffle.players.is_empty());
    assert_eq!(test.lamports(winner).await, winner_lamports + 2 * ENTRY_FEE);
    assert_eq!(
        test.lamports(test.raffle).await,
        raffle_lamports - 2 * ENTRY_FEE
    );

    // Replaying the fulfillment is rejected
    test.context.last_blockhash = test
        .context
        .banks_client
        .get_new_latest_blockhash(&test.context.last_blockhash)
        .await
        .unwrap();
    let err = test
        .fulfill(&coordinator, &winner, request_id, word(3))
        .await
        .unwrap_err();
    assert_eq!(err, raffle_error(RaffleError::UnknownRequest));

    // The next round opens for entries straight away
    test.enter(0, ENTRY_FEE + 1).await.unwrap();
    assert_eq!(test.state().await.players, vec![test.players[0].pubkey()]);
}

#[tokio::test]
async fn test_cancel_round_after_timeout() {
    let mut test = setup(1).await;
    let request_id = test.start_round().await;
    let owner = test.context.payer.pubkey();
    let coordinator = test.coordinator();
    let player = test.players[0].pubkey();

    let ix = raffle_instruction::cancel_round(&test.program_id, &owner);
    let err = process(&mut test.context, &[ix.clone()], &[])
        .await
        .unwrap_err();
    assert_eq!(err, raffle_error(RaffleError::RequestNotTimedOut));

    test.advance_clock(REQUEST_TIMEOUT_SECS).await;
    test.context.last_blockhash = test
        .context
        .banks_client
        .get_new_latest_blockhash(&test.context.last_blockhash)
        .await
        .unwrap();
    process(&mut test.context, &[ix], &[]).await.unwrap();

    let raffle = test.state().await;
    assert_eq!(raffle.state, RaffleState::Open);
    assert_eq!(raffle.pending_request_id, None);
    assert_eq!(raffle.players, vec![player]);

    let err = test
        .fulfill(&coordinator, &player, request_id, word(0))
        .await
        .unwrap_err();
    assert_eq!(err, raffle_error(RaffleError::UnknownRequest));
}

#[tokio::test]
async fn test_cancel_round_by_non_owner() {
    let mut test = setup(1).await;
    test.start_round().await;
    test.advance_clock(REQUEST_TIMEOUT_SECS).await;
    let stranger = Keypair::new();

    let ix = raffle_instruction::cancel_round(&test.program_id, &stranger.pubkey());
    let err = process(&mut test.context, &[ix], &[&stranger])
        .await
        .unwrap_err();
    assert_eq!(err, raffle_error(RaffleError::NotOwner));
}

#[tokio::test]
async fn test_deposit_and_withdraw_funding() {
    let mut test = setup(0).await;
    let owner = test.context.payer.pubkey();
    let mint = test.mint.pubkey();
    let owner_tokens =
        spl_associated_token_account::get_associated_token_address(&owner, &mint);

    let fund_owner = [
        spl_associated_token_account::instruction::create_associated_token_account(
            &owner,
            &owner,
            &mint,
            &spl_token::id(),
        ),
        spl_token::instruction::mint_to(&spl_token::id(), &mint, &owner_tokens, &owner, &[], 1_000)
            .unwrap(),
    ];
    process(&mut test.context, &fund_owner, &[]).await.unwrap();

    let deposit =
        raffle_instruction::deposit_funding(&test.program_id, &owner, &owner_tokens, &mint, 400);
    process(&mut test.context, &[deposit], &[]).await.unwrap();

    let withdraw =
        raffle_instruction::withdraw_funding(&test.program_id, &owner, &owner_tokens, &mint, 150);
    process(&mut test.context, &[withdraw], &[]).await.unwrap();

    let vault = funding_vault_address(&test.raffle, &mint);
    let vault = test
        .context
        .banks_client
        .get_account(vault)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(spl_token::state::Account::unpack(&vault.data).unwrap().amount, 250);

    let stranger = Keypair::new();
    let withdraw = raffle_instruction::withdraw_funding(
        &test.program_id,
        &stranger.pubkey(),
        &owner_tokens,
        &mint,
        1,
    );
    let err = process(&mut test.context, &[withdraw], &[&stranger])
        .await
        .unwrap_err();
    assert_eq!(err, raffle_error(RaffleError::NotOwner));
}
