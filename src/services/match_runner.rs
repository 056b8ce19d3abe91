use tokio::{sync::watch, time::timeout};
use tracing::{info, warn};

use crate::{
    agent::client::{AgentFailure, MoveRequest},
    domain::{
        board::{Board, COLS},
        record::{GAMES_PER_MATCH, MatchRecord, MatchStatus, ROTATION, TeamSide},
        team::Team,
    },
    services::{
        events,
        game_driver::{self, Cancelled, MatchContext},
    },
    state::SharedState,
};

/// Work item handed to a runner by the scheduler: the record to drive plus
/// the resolved teams on each side.
pub struct MatchAssignment {
    pub record: MatchRecord,
    pub team_a: Team,
    pub team_b: Team,
}

enum Setup {
    Reachable,
    NeitherReachable,
    Cancelled,
}

/// Drive one match to a terminal status: setup probe, four games with the
/// rotation applied, then the sealing write followed by the leaderboard
/// broadcast.
///
/// Agent failures and time exhaustion never escape this function; they are
/// absorbed as game forfeits. Only cancellation ends a match early without
/// sealing it.
pub async fn run_match(
    state: SharedState,
    assignment: MatchAssignment,
    cancel: watch::Receiver<bool>,
) {
    let MatchAssignment {
        mut record,
        team_a,
        team_b,
    } = assignment;

    record.status = MatchStatus::InProgress;
    record.bank_a_ms = state.config().match_bank_ms();
    record.bank_b_ms = state.config().match_bank_ms();

    let mut ctx = MatchContext {
        state: state.clone(),
        record,
        endpoints: [team_a.endpoint.clone(), team_b.endpoint.clone()],
        names: [team_a.name.clone(), team_b.name.clone()],
        cancel,
    };
    ctx.persist().await;
    events::broadcast_match_update(&state, &ctx.record).await;

    match probe_setup(&mut ctx).await {
        Setup::Reachable => {}
        Setup::NeitherReachable => {
            abort_unreachable(&mut ctx).await;
            return;
        }
        Setup::Cancelled => {
            halt_cancelled(&mut ctx).await;
            return;
        }
    }

    for game_index in 1..=GAMES_PER_MATCH as u8 {
        let result = match drained_side(&ctx.record, game_index) {
            Some(side) => {
                game_driver::forfeit_game_without_play(&mut ctx, game_index, side).await;
                Ok(())
            }
            None => game_driver::drive_game(&mut ctx, game_index).await,
        };
        match result {
            Ok(()) => events::broadcast_match_update(&state, &ctx.record).await,
            Err(Cancelled) => {
                halt_cancelled(&mut ctx).await;
                return;
            }
        }
    }

    ctx.record.status = MatchStatus::Finished;
    ctx.persist().await;
    events::broadcast_match_update(&state, &ctx.record).await;
    events::broadcast_leaderboard(&state).await;
    info!(
        match_id = %ctx.record.id,
        points_a = ctx.record.points_a,
        points_b = ctx.record.points_b,
        "match finished"
    );
}

/// Side conceding the upcoming game because its bank is already empty, the
/// would-be first mover taking precedence when both are drained.
fn drained_side(record: &MatchRecord, game_index: u8) -> Option<TeamSide> {
    let (first_mover, _) = ROTATION[usize::from(game_index) - 1];
    [first_mover, first_mover.other()]
        .into_iter()
        .find(|side| record.bank_ms(*side) == 0)
}

/// Concurrently probe both endpoints inside the setup window. A reply of any
/// kind, even malformed or illegal, proves the endpoint is alive; only two
/// silent endpoints abort the match.
async fn probe_setup(ctx: &mut MatchContext) -> Setup {
    let window = ctx.state.config().setup_window;
    let connector = ctx.state.connector();
    let request = MoveRequest {
        board: Board::new().grid(),
        current_player: 1,
        valid_moves: (0..COLS).collect(),
    };
    let endpoint_a = ctx.endpoint(TeamSide::A).to_string();
    let endpoint_b = ctx.endpoint(TeamSide::B).to_string();

    let probes = async {
        tokio::join!(
            timeout(window, connector.request_move(&endpoint_a, request.clone(), window)),
            timeout(window, connector.request_move(&endpoint_b, request.clone(), window)),
        )
    };
    let (result_a, result_b) = tokio::select! {
        _ = game_driver::cancel_requested(&mut ctx.cancel) => return Setup::Cancelled,
        results = probes => results,
    };

    let reachable = |result: Result<Result<usize, AgentFailure>, _>| match result {
        Ok(Ok(_)) => true,
        Ok(Err(failure)) => !failure.is_unreachable(),
        Err(_elapsed) => false,
    };

    if reachable(result_a) || reachable(result_b) {
        Setup::Reachable
    } else {
        Setup::NeitherReachable
    }
}

/// Seal a match that could not even start: zero points for both sides, and
/// standings showing two losses.
async fn abort_unreachable(ctx: &mut MatchContext) {
    warn!(match_id = %ctx.record.id, "neither agent reachable in the setup window; aborting match");
    ctx.record.status = MatchStatus::Aborted;
    ctx.persist().await;
    let state = ctx.state.clone();
    events::broadcast_match_update(&state, &ctx.record).await;
    events::broadcast_leaderboard(&state).await;
}

/// Wind down after a cancellation: the record keeps its in-progress status
/// and the controller that requested the cancellation decides whether it is
/// rescheduled (restart) or wiped (reset).
async fn halt_cancelled(ctx: &mut MatchContext) {
    info!(match_id = %ctx.record.id, "match runner cancelled");
    ctx.persist().await;
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::sync::watch;
    use uuid::Uuid;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::memory::MemoryStore,
        domain::record::{GameEndReason, GameOutcome},
        dto::events::DashboardEvent,
        services::game_driver::tests::{ScriptedAgent, center_then_left, state_with},
        state::{AppState, SharedState},
    };
    use std::sync::Arc;

    fn assignment(state: &SharedState) -> MatchAssignment {
        let team_a = Team::new("alpha".into(), "http://a/move".into());
        let team_b = Team::new("beta".into(), "http://b/move".into());
        let record = MatchRecord::scheduled(
            Uuid::new_v4(),
            0,
            team_a.id,
            team_b.id,
            state.config().match_bank_ms(),
        );
        MatchAssignment {
            record,
            team_a,
            team_b,
        }
    }

    async fn seed_roster(state: &SharedState, assignment: &MatchAssignment) {
        let store = state.store();
        store.save_team(assignment.team_a.clone()).await.unwrap();
        store.save_team(assignment.team_b.clone()).await.unwrap();
    }

    fn cancel_pair() -> (watch::Sender<bool>, watch::Receiver<bool>) {
        watch::channel(false)
    }

    async fn stored_record(state: &SharedState, id: Uuid) -> MatchRecord {
        state.store().find_match(id).await.unwrap().unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn evenly_matched_agents_draw_the_match_two_two() {
        let state = state_with(vec![
            ("http://a/move", ScriptedAgent::new(Duration::ZERO, center_then_left)),
            ("http://b/move", ScriptedAgent::new(Duration::ZERO, center_then_left)),
        ]);
        let assignment = assignment(&state);
        seed_roster(&state, &assignment).await;
        let match_id = assignment.record.id;
        let (_tx, cancel) = cancel_pair();

        run_match(state.clone(), assignment, cancel).await;

        let record = stored_record(&state, match_id).await;
        assert_eq!(record.status, MatchStatus::Finished);
        assert_eq!(record.games.len(), 4);
        assert_eq!((record.points_a, record.points_b), (2.0, 2.0));
        assert_eq!(record.points_a + record.points_b, 4.0);
        assert_eq!(record.winner(), None);
        // The alternating first mover wins each game of this mirror duel.
        let winners: Vec<_> = record
            .games
            .iter()
            .map(|game| game.outcome.unwrap().winner().unwrap())
            .collect();
        assert_eq!(
            winners,
            vec![TeamSide::A, TeamSide::B, TeamSide::A, TeamSide::B]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn sleepy_agent_forfeits_every_game_on_its_first_turn() {
        let slow = ScriptedAgent::new(Duration::from_secs(11), center_then_left);
        let slow_calls = slow.calls.clone();
        let state = state_with(vec![
            ("http://a/move", ScriptedAgent::new(Duration::from_secs(1), center_then_left)),
            ("http://b/move", slow),
        ]);
        let assignment = assignment(&state);
        seed_roster(&state, &assignment).await;
        let match_id = assignment.record.id;
        let (_tx, cancel) = cancel_pair();

        run_match(state.clone(), assignment, cancel).await;

        let record = stored_record(&state, match_id).await;
        assert_eq!(record.status, MatchStatus::Finished);
        assert_eq!((record.points_a, record.points_b), (4.0, 0.0));
        for game in &record.games {
            assert_eq!(game.outcome, Some(GameOutcome::Forfeit(TeamSide::B)));
            assert_eq!(game.reason, Some(GameEndReason::Timeout));
            // At most the opener landed before the forfeit.
            assert!(game.moves.len() <= 1);
        }
        // Only the per-turn cap was deducted each game; the probe is free.
        assert_eq!(record.bank_b_ms, 240_000 - 4 * 10_000);
        // One probe plus one timed-out call per game.
        assert_eq!(slow_calls.load(std::sync::atomic::Ordering::SeqCst), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn illegal_agent_concedes_all_four_games() {
        let state = state_with(vec![
            ("http://a/move", ScriptedAgent::new(Duration::ZERO, |_| Ok(7))),
            ("http://b/move", ScriptedAgent::new(Duration::ZERO, center_then_left)),
        ]);
        let assignment = assignment(&state);
        seed_roster(&state, &assignment).await;
        let match_id = assignment.record.id;
        let (_tx, cancel) = cancel_pair();

        run_match(state.clone(), assignment, cancel).await;

        let record = stored_record(&state, match_id).await;
        assert_eq!((record.points_a, record.points_b), (0.0, 4.0));
        for game in &record.games {
            assert_eq!(game.outcome, Some(GameOutcome::Forfeit(TeamSide::A)));
            assert_eq!(game.reason, Some(GameEndReason::IllegalMove));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn two_silent_endpoints_abort_the_match() {
        // No scripted agents at all: both probes fail as transport errors.
        let state = state_with(vec![]);
        let assignment = assignment(&state);
        seed_roster(&state, &assignment).await;
        let match_id = assignment.record.id;
        let (_tx, cancel) = cancel_pair();
        let mut dashboard = state.hub().dashboard().subscribe();

        run_match(state.clone(), assignment, cancel).await;

        let record = stored_record(&state, match_id).await;
        assert_eq!(record.status, MatchStatus::Aborted);
        assert!(record.games.is_empty());
        assert_eq!((record.points_a, record.points_b), (0.0, 0.0));

        // The sealing update and the standings refresh both reached the
        // dashboard.
        let mut saw_aborted = false;
        let mut saw_leaderboard = false;
        while let Ok(event) = dashboard.try_recv() {
            match event {
                DashboardEvent::MatchUpdate { summary } => {
                    saw_aborted |= summary.status == MatchStatus::Aborted;
                }
                DashboardEvent::LeaderboardUpdate { leaderboard } => {
                    saw_leaderboard = true;
                    assert!(leaderboard.iter().all(|row| row.lost == 1));
                }
                _ => {}
            }
        }
        assert!(saw_aborted);
        assert!(saw_leaderboard);
    }

    #[tokio::test(start_paused = true)]
    async fn one_reachable_endpoint_is_enough_to_play() {
        // B never answers: its probe fails but A's succeeds, so the match
        // runs and B forfeits every game by transport.
        let state = state_with(vec![(
            "http://a/move",
            ScriptedAgent::new(Duration::ZERO, center_then_left),
        )]);
        let assignment = assignment(&state);
        seed_roster(&state, &assignment).await;
        let match_id = assignment.record.id;
        let (_tx, cancel) = cancel_pair();

        run_match(state.clone(), assignment, cancel).await;

        let record = stored_record(&state, match_id).await;
        assert_eq!(record.status, MatchStatus::Finished);
        assert_eq!((record.points_a, record.points_b), (4.0, 0.0));
        for game in &record.games {
            assert_eq!(game.reason, Some(GameEndReason::Transport));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_bank_carries_across_games_and_concedes_the_rest() {
        // 15 s of bank per team: B burns 10 s in game 1 and the remaining
        // 5 s in game 2, then concedes games 3 and 4 without being called.
        let config = AppConfig {
            match_bank: Duration::from_secs(15),
            ..AppConfig::default()
        };
        let slow = ScriptedAgent::new(Duration::from_secs(11), center_then_left);
        let slow_calls = slow.calls.clone();
        let connector = crate::services::game_driver::tests::ScriptedConnector {
            agents: [
                (
                    "http://a/move".to_string(),
                    ScriptedAgent::new(Duration::ZERO, center_then_left),
                ),
                ("http://b/move".to_string(), slow),
            ]
            .into_iter()
            .collect(),
        };
        let state = AppState::new(config, Arc::new(MemoryStore::new()), Arc::new(connector));
        let assignment = assignment(&state);
        seed_roster(&state, &assignment).await;
        let match_id = assignment.record.id;
        let (_tx, cancel) = cancel_pair();

        run_match(state.clone(), assignment, cancel).await;

        let record = stored_record(&state, match_id).await;
        assert_eq!(record.status, MatchStatus::Finished);
        assert_eq!((record.points_a, record.points_b), (4.0, 0.0));
        assert_eq!(record.bank_b_ms, 0);
        let reasons: Vec<_> = record.games.iter().map(|game| game.reason.unwrap()).collect();
        assert_eq!(
            reasons,
            vec![
                GameEndReason::Timeout,
                GameEndReason::Timeout,
                GameEndReason::BankExhausted,
                GameEndReason::BankExhausted,
            ]
        );
        // Probe, game 1, game 2; games 3 and 4 never call the agent.
        assert_eq!(slow_calls.load(std::sync::atomic::Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_leaves_the_record_unsealed() {
        let stuck = ScriptedAgent::new(Duration::from_secs(3600), center_then_left);
        let state = state_with(vec![
            ("http://a/move", stuck),
            ("http://b/move", ScriptedAgent::new(Duration::ZERO, center_then_left)),
        ]);
        let assignment = assignment(&state);
        seed_roster(&state, &assignment).await;
        let match_id = assignment.record.id;
        let (tx, cancel) = cancel_pair();

        let runner = tokio::spawn(run_match(state.clone(), assignment, cancel));
        tokio::task::yield_now().await;
        tx.send(true).unwrap();
        runner.await.unwrap();

        let record = stored_record(&state, match_id).await;
        assert_eq!(record.status, MatchStatus::InProgress);
        assert!(!record.is_sealed());
    }
}
