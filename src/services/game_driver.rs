use std::time::Duration;

use tokio::{
    sync::watch,
    time::{Instant, timeout},
};
use tracing::warn;

use crate::{
    agent::client::{AgentFailure, MoveRequest},
    domain::{
        board::{Board, Player, Terminal},
        record::{GameEndReason, GameOutcome, GameRecord, MatchRecord, MoveEntry, TeamSide},
    },
    dto::events::MatchEvent,
    state::SharedState,
};

/// The surrounding match was cancelled while a game was in flight.
#[derive(Debug, PartialEq, Eq)]
pub struct Cancelled;

/// Execution context a match runner threads through its four games: the
/// record under its exclusive write lease, team endpoints and names by side,
/// and the cancellation signal observed at every suspension point.
pub struct MatchContext {
    pub state: SharedState,
    pub record: MatchRecord,
    /// Agent endpoints for team A and team B.
    pub endpoints: [String; 2],
    /// Display names for team A and team B.
    pub names: [String; 2],
    pub cancel: watch::Receiver<bool>,
}

impl MatchContext {
    pub fn endpoint(&self, side: TeamSide) -> &str {
        match side {
            TeamSide::A => &self.endpoints[0],
            TeamSide::B => &self.endpoints[1],
        }
    }

    pub fn name(&self, side: TeamSide) -> &str {
        match side {
            TeamSide::A => &self.names[0],
            TeamSide::B => &self.names[1],
        }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }

    /// Publish an event on this match's topic.
    pub fn publish(&self, event: MatchEvent) {
        self.state.hub().publish_match(self.record.id, event);
    }

    /// Write the current record to the store. Storage trouble is logged and
    /// the match keeps running on the in-memory record.
    pub async fn persist(&self) {
        if let Err(err) = self.state.store().update_match(self.record.clone()).await {
            warn!(match_id = %self.record.id, error = %err, "failed to persist match record");
        }
    }

    /// Sync one game into the record and persist the whole match state.
    async fn upsert_game(&mut self, game: &GameRecord) {
        match self
            .record
            .games
            .iter_mut()
            .find(|slot| slot.game_index == game.game_index)
        {
            Some(slot) => *slot = game.clone(),
            None => self.record.games.push(game.clone()),
        }
        self.persist().await;
    }
}

/// Resolves once cancellation is requested (or the controller vanished).
pub(crate) async fn cancel_requested(cancel: &mut watch::Receiver<bool>) {
    let _ = cancel.wait_for(|stop| *stop).await;
}

fn failure_reason(failure: AgentFailure) -> GameEndReason {
    match failure {
        AgentFailure::Timeout => GameEndReason::Timeout,
        AgentFailure::Transport => GameEndReason::Transport,
        AgentFailure::Malformed => GameEndReason::Malformed,
        AgentFailure::Illegal => GameEndReason::IllegalMove,
    }
}

/// Drive one game to its terminal state, alternating turns between the two
/// agents under the per-turn and match-bank deadlines.
///
/// Every agent call is bounded by `min(per_turn_cap, bank)`; the elapsed
/// wall-clock is charged to the moving side's bank whatever the outcome, so
/// a forfeit by time exhaustion stands even if the agent replies later. Any
/// agent failure forfeits the game for the side on turn.
pub async fn drive_game(ctx: &mut MatchContext, game_index: u8) -> Result<(), Cancelled> {
    let mut game = GameRecord::open(game_index);
    let mut board = Board::new();
    let match_id = ctx.record.id;

    ctx.publish(MatchEvent::GameStart {
        match_id,
        game_index,
        first_mover: game.first_mover,
        color_a: game.color_a,
        color_b: game.color_b(),
    });
    ctx.upsert_game(&game).await;

    let per_turn_cap = ctx.state.config().per_turn_cap;
    let connector = ctx.state.connector();
    let mut player = Player::One;

    let (outcome, reason) = loop {
        if ctx.is_cancelled() {
            return Err(Cancelled);
        }

        let side = game.side_of(player);
        let bank_ms = ctx.record.bank_ms(side);
        if bank_ms == 0 {
            // No agent call: an empty bank at the start of a turn is an
            // immediate forfeit.
            break (GameOutcome::Forfeit(side), GameEndReason::BankExhausted);
        }

        let deadline = per_turn_cap.min(Duration::from_millis(bank_ms));
        let legal: Vec<usize> = board.legal_moves().collect();
        let request = MoveRequest {
            board: board.grid(),
            current_player: player.index(),
            valid_moves: legal.clone(),
        };
        let endpoint = ctx.endpoint(side);

        let started = Instant::now();
        let call = timeout(deadline, connector.request_move(endpoint, request, deadline));
        let result = tokio::select! {
            _ = cancel_requested(&mut ctx.cancel) => return Err(Cancelled),
            result = call => result
                .map_err(|_| AgentFailure::Timeout)
                .and_then(std::convert::identity),
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        game.charge(side, elapsed_ms);
        ctx.record.drain_bank(side, elapsed_ms);

        match result {
            Ok(column) if legal.contains(&column) => {
                if board.drop_piece(column, player).is_err() {
                    break (GameOutcome::Forfeit(side), GameEndReason::IllegalMove);
                }
                game.moves.push(MoveEntry {
                    side,
                    column: column as u8,
                });
                ctx.publish(MatchEvent::MoveMade {
                    match_id,
                    game_index,
                    side,
                    player: player.index(),
                    column: column as u8,
                    board_after: board.grid(),
                });

                let terminal = board.terminal();
                ctx.publish(MatchEvent::GameUpdate {
                    match_id,
                    game_index,
                    board: board.grid(),
                    current_player: terminal
                        .is_none()
                        .then(|| player.opponent().index()),
                    game_over: terminal.is_some(),
                    winner: match terminal {
                        Some(Terminal::Win(seat)) => Some(game.side_of(seat)),
                        _ => None,
                    },
                });
                ctx.upsert_game(&game).await;

                match terminal {
                    Some(Terminal::Win(seat)) => {
                        break (
                            GameOutcome::Win(game.side_of(seat)),
                            GameEndReason::ConnectFour,
                        );
                    }
                    Some(Terminal::Draw) => break (GameOutcome::Draw, GameEndReason::BoardFull),
                    None => player = player.opponent(),
                }
            }
            Ok(_) => break (GameOutcome::Forfeit(side), GameEndReason::IllegalMove),
            Err(failure) => break (GameOutcome::Forfeit(side), failure_reason(failure)),
        }
    };

    seal_game(ctx, game, outcome, reason).await;
    Ok(())
}

/// Credit a game to the opponent without any play. Used when a side's bank
/// is already empty before the game begins; start and complete events are
/// still emitted so spectator UIs see all four games.
pub async fn forfeit_game_without_play(ctx: &mut MatchContext, game_index: u8, side: TeamSide) {
    let game = GameRecord::open(game_index);
    ctx.publish(MatchEvent::GameStart {
        match_id: ctx.record.id,
        game_index,
        first_mover: game.first_mover,
        color_a: game.color_a,
        color_b: game.color_b(),
    });
    seal_game(
        ctx,
        game,
        GameOutcome::Forfeit(side),
        GameEndReason::BankExhausted,
    )
    .await;
}

async fn seal_game(
    ctx: &mut MatchContext,
    mut game: GameRecord,
    outcome: GameOutcome,
    reason: GameEndReason,
) {
    let game_index = game.game_index;
    game.seal(outcome, reason);
    ctx.record.score_game(outcome);
    ctx.upsert_game(&game).await;
    ctx.publish(MatchEvent::GameComplete {
        match_id: ctx.record.id,
        game_index,
        outcome,
        reason,
        winner: outcome.winner().map(|side| ctx.name(side).to_string()),
        points_a: ctx.record.points_a,
        points_b: ctx.record.points_b,
        bank_a_ms: ctx.record.bank_a_ms,
        bank_b_ms: ctx.record.bank_b_ms,
    });
}

#[cfg(test)]
pub(crate) mod tests {
    use std::{
        collections::HashMap,
        sync::{
            Arc,
            atomic::{AtomicUsize, Ordering},
        },
    };

    use futures::future::BoxFuture;
    use tokio::sync::watch;
    use uuid::Uuid;

    use super::*;
    use crate::{
        agent::client::AgentConnector,
        config::AppConfig,
        dao::memory::MemoryStore,
        domain::{
            board::{COLS, ROWS},
            record::MatchStatus,
        },
        state::{AppState, SharedState},
    };

    /// One scripted remote agent: optional reply delay plus a deterministic
    /// policy over the request.
    pub(crate) struct ScriptedAgent {
        pub delay: Duration,
        pub calls: Arc<AtomicUsize>,
        pub play: Box<dyn Fn(&MoveRequest) -> Result<usize, AgentFailure> + Send + Sync>,
    }

    impl ScriptedAgent {
        pub fn new(
            delay: Duration,
            play: impl Fn(&MoveRequest) -> Result<usize, AgentFailure> + Send + Sync + 'static,
        ) -> Self {
            Self {
                delay,
                calls: Arc::new(AtomicUsize::new(0)),
                play: Box::new(play),
            }
        }
    }

    /// Connector resolving endpoints against a table of scripted agents.
    /// Unknown endpoints behave like a dead host.
    #[derive(Default)]
    pub(crate) struct ScriptedConnector {
        pub agents: HashMap<String, ScriptedAgent>,
    }

    impl AgentConnector for ScriptedConnector {
        fn request_move(
            &self,
            endpoint: &str,
            request: MoveRequest,
            _deadline: Duration,
        ) -> BoxFuture<'static, Result<usize, AgentFailure>> {
            let Some(agent) = self.agents.get(endpoint) else {
                return Box::pin(async { Err(AgentFailure::Transport) });
            };
            agent.calls.fetch_add(1, Ordering::SeqCst);
            let delay = agent.delay;
            let reply = (agent.play)(&request);
            Box::pin(async move {
                if delay > Duration::ZERO {
                    tokio::time::sleep(delay).await;
                }
                reply
            })
        }
    }

    /// Play the center column while it is open, then the leftmost open one.
    pub(crate) fn center_then_left(request: &MoveRequest) -> Result<usize, AgentFailure> {
        if request.valid_moves.contains(&3) {
            Ok(3)
        } else {
            request
                .valid_moves
                .first()
                .copied()
                .ok_or(AgentFailure::Illegal)
        }
    }

    pub(crate) fn state_with(agents: Vec<(&str, ScriptedAgent)>) -> SharedState {
        let connector = ScriptedConnector {
            agents: agents
                .into_iter()
                .map(|(endpoint, agent)| (endpoint.to_string(), agent))
                .collect(),
        };
        AppState::new(
            AppConfig::default(),
            Arc::new(MemoryStore::new()),
            Arc::new(connector),
        )
    }

    fn context(state: &SharedState) -> (MatchContext, watch::Sender<bool>) {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let record = MatchRecord::scheduled(
            Uuid::new_v4(),
            0,
            Uuid::new_v4(),
            Uuid::new_v4(),
            state.config().match_bank_ms(),
        );
        let ctx = MatchContext {
            state: state.clone(),
            record,
            endpoints: ["http://a/move".into(), "http://b/move".into()],
            names: ["alpha".into(), "beta".into()],
            cancel: cancel_rx,
        };
        (ctx, cancel_tx)
    }

    fn grid_is_well_formed(grid: &[[u8; COLS]; ROWS]) -> bool {
        (0..COLS).all(|col| (0..ROWS - 1).all(|row| grid[row][col] == 0 || grid[row + 1][col] != 0))
    }

    #[tokio::test(start_paused = true)]
    async fn first_mover_wins_the_center_then_left_duel() {
        let state = state_with(vec![
            ("http://a/move", ScriptedAgent::new(Duration::ZERO, center_then_left)),
            ("http://b/move", ScriptedAgent::new(Duration::ZERO, center_then_left)),
        ]);
        let (mut ctx, _cancel) = context(&state);

        drive_game(&mut ctx, 1).await.unwrap();

        let game = &ctx.record.games[0];
        // Game 1: team A moves first and completes the bottom row.
        assert_eq!(game.outcome, Some(GameOutcome::Win(TeamSide::A)));
        assert_eq!(game.reason, Some(GameEndReason::ConnectFour));
        assert_eq!(game.moves.len(), 19);
        assert_eq!(
            (ctx.record.points_a, ctx.record.points_b),
            (1.0, 0.0)
        );

        drive_game(&mut ctx, 2).await.unwrap();
        // Game 2: team B moves first and mirrors the win.
        assert_eq!(
            ctx.record.games[1].outcome,
            Some(GameOutcome::Win(TeamSide::B))
        );
        assert_eq!(
            (ctx.record.points_a, ctx.record.points_b),
            (1.0, 1.0)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn slow_agent_forfeits_by_timeout_and_is_charged_the_cap() {
        let slow = ScriptedAgent::new(Duration::from_secs(11), center_then_left);
        let state = state_with(vec![
            ("http://a/move", ScriptedAgent::new(Duration::ZERO, center_then_left)),
            ("http://b/move", slow),
        ]);
        let (mut ctx, _cancel) = context(&state);

        drive_game(&mut ctx, 1).await.unwrap();

        let game = &ctx.record.games[0];
        assert_eq!(game.outcome, Some(GameOutcome::Forfeit(TeamSide::B)));
        assert_eq!(game.reason, Some(GameEndReason::Timeout));
        // A's opening move is the only one on the board.
        assert_eq!(game.moves.len(), 1);
        assert_eq!(game.elapsed_b_ms, 10_000);
        assert_eq!(ctx.record.bank_b_ms, 240_000 - 10_000);
        assert_eq!((ctx.record.points_a, ctx.record.points_b), (1.0, 0.0));
    }

    #[tokio::test(start_paused = true)]
    async fn out_of_range_move_forfeits_immediately() {
        let state = state_with(vec![
            ("http://a/move", ScriptedAgent::new(Duration::ZERO, |_| Ok(7))),
            ("http://b/move", ScriptedAgent::new(Duration::ZERO, center_then_left)),
        ]);
        let (mut ctx, _cancel) = context(&state);

        drive_game(&mut ctx, 1).await.unwrap();

        let game = &ctx.record.games[0];
        assert_eq!(game.outcome, Some(GameOutcome::Forfeit(TeamSide::A)));
        assert_eq!(game.reason, Some(GameEndReason::IllegalMove));
        assert!(game.moves.is_empty());
        assert_eq!((ctx.record.points_a, ctx.record.points_b), (0.0, 1.0));
    }

    #[tokio::test(start_paused = true)]
    async fn full_column_choice_is_an_illegal_move() {
        // A stacks column 0 from both sides' turns; B always answers 0 even
        // once the column has filled up.
        let state = state_with(vec![
            ("http://a/move", ScriptedAgent::new(Duration::ZERO, |req: &MoveRequest| {
                Ok(*req.valid_moves.first().unwrap())
            })),
            ("http://b/move", ScriptedAgent::new(Duration::ZERO, |_| Ok(0))),
        ]);
        let (mut ctx, _cancel) = context(&state);

        // Game 2 puts B on the first move so column 0 fills with 3 B pieces
        // and 3 A pieces before anyone connects four.
        drive_game(&mut ctx, 2).await.unwrap();

        let game = &ctx.record.games[0];
        assert_eq!(game.outcome, Some(GameOutcome::Forfeit(TeamSide::B)));
        assert_eq!(game.reason, Some(GameEndReason::IllegalMove));
        assert_eq!(game.moves.len(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_bank_at_turn_start_forfeits_without_an_agent_call() {
        let untouchable = ScriptedAgent::new(Duration::ZERO, |_| {
            panic!("agent must not be called with an empty bank")
        });
        let calls = untouchable.calls.clone();
        let state = state_with(vec![
            ("http://a/move", ScriptedAgent::new(Duration::ZERO, center_then_left)),
            ("http://b/move", untouchable),
        ]);
        let (mut ctx, _cancel) = context(&state);
        ctx.record.bank_b_ms = 0;

        // Game 2: B is first mover and forfeits before any call goes out.
        drive_game(&mut ctx, 2).await.unwrap();

        let game = &ctx.record.games[0];
        assert_eq!(game.outcome, Some(GameOutcome::Forfeit(TeamSide::B)));
        assert_eq!(game.reason, Some(GameEndReason::BankExhausted));
        assert!(game.moves.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_shrinks_to_the_remaining_bank() {
        // B has 4 s of bank left; its 5 s reply overruns that reduced
        // deadline even though it beats the 10 s cap.
        let slow = ScriptedAgent::new(Duration::from_secs(5), center_then_left);
        let state = state_with(vec![
            ("http://a/move", ScriptedAgent::new(Duration::ZERO, center_then_left)),
            ("http://b/move", slow),
        ]);
        let (mut ctx, _cancel) = context(&state);
        ctx.record.bank_b_ms = 4_000;

        drive_game(&mut ctx, 1).await.unwrap();

        let game = &ctx.record.games[0];
        assert_eq!(game.outcome, Some(GameOutcome::Forfeit(TeamSide::B)));
        assert_eq!(game.reason, Some(GameEndReason::Timeout));
        assert_eq!(ctx.record.bank_b_ms, 0);
        assert_eq!(game.elapsed_b_ms, 4_000);
    }

    #[tokio::test(start_paused = true)]
    async fn events_flow_in_order_with_well_formed_boards() {
        let state = state_with(vec![
            ("http://a/move", ScriptedAgent::new(Duration::ZERO, center_then_left)),
            ("http://b/move", ScriptedAgent::new(Duration::ZERO, center_then_left)),
        ]);
        let (mut ctx, _cancel) = context(&state);
        let mut events = state.hub().match_topic(ctx.record.id).subscribe();

        drive_game(&mut ctx, 1).await.unwrap();

        let first = events.recv().await.unwrap();
        assert!(matches!(first, MatchEvent::GameStart { game_index: 1, .. }));

        let mut moves_seen = 0;
        let mut complete_seen = false;
        while let Ok(event) = events.try_recv() {
            match event {
                MatchEvent::MoveMade { board_after, .. } => {
                    assert!(!complete_seen, "moves must precede completion");
                    assert!(grid_is_well_formed(&board_after));
                    moves_seen += 1;
                }
                MatchEvent::GameComplete { game_index, .. } => {
                    assert_eq!(game_index, 1);
                    complete_seen = true;
                }
                _ => {}
            }
        }
        assert_eq!(moves_seen, 19);
        assert!(complete_seen);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_an_in_flight_game() {
        let stuck = ScriptedAgent::new(Duration::from_secs(3600), center_then_left);
        let state = state_with(vec![
            ("http://a/move", stuck),
            ("http://b/move", ScriptedAgent::new(Duration::ZERO, center_then_left)),
        ]);
        let (ctx, cancel) = context(&state);
        let mut ctx = ctx;

        let driver = tokio::spawn(async move { drive_game(&mut ctx, 1).await });
        tokio::task::yield_now().await;
        cancel.send(true).unwrap();

        assert_eq!(driver.await.unwrap(), Err(Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn bankless_forfeit_game_still_emits_start_and_complete() {
        let state = state_with(vec![]);
        let (mut ctx, _cancel) = context(&state);
        let mut events = state.hub().match_topic(ctx.record.id).subscribe();

        forfeit_game_without_play(&mut ctx, 3, TeamSide::B).await;

        assert!(matches!(
            events.recv().await.unwrap(),
            MatchEvent::GameStart { game_index: 3, .. }
        ));
        assert!(matches!(
            events.recv().await.unwrap(),
            MatchEvent::GameComplete { game_index: 3, .. }
        ));
        assert_eq!((ctx.record.points_a, ctx.record.points_b), (1.0, 0.0));
        assert_eq!(ctx.record.status, MatchStatus::Scheduled);
    }
}
