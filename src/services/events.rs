use std::collections::HashMap;

use tracing::warn;
use uuid::Uuid;

use crate::{
    domain::{
        leaderboard::standings,
        record::{GameRecord, MatchRecord},
    },
    dto::{
        championship::{LeaderboardRow, MatchView, StatusResponse, round_views},
        events::{DashboardEvent, MatchEvent, MatchTeamInfo},
    },
    state::SharedState,
};

/// Team names keyed by id, resolved once per emission site. Storage trouble
/// degrades to raw ids rather than muting the stream.
pub async fn roster_names(state: &SharedState) -> HashMap<Uuid, String> {
    match state.store().list_teams().await {
        Ok(teams) => teams.into_iter().map(|team| (team.id, team.name)).collect(),
        Err(err) => {
            warn!(error = %err, "failed to resolve roster names for events");
            HashMap::new()
        }
    }
}

/// Championship progress as served by the status route and the dashboard.
pub async fn status_response(state: &SharedState) -> StatusResponse {
    let team_count = match state.store().list_teams().await {
        Ok(teams) => teams.len(),
        Err(err) => {
            warn!(error = %err, "failed to count teams for status");
            0
        }
    };
    let (current_round, total_rounds) = state.rounds().await;
    StatusResponse {
        status: state.phase().await,
        team_count,
        current_round,
        total_rounds,
    }
}

/// Broadcast the current lifecycle status on the dashboard topic.
pub async fn broadcast_status(state: &SharedState) {
    let status = status_response(state).await;
    state
        .hub()
        .dashboard()
        .publish(DashboardEvent::StatusUpdate { status });
}

pub fn broadcast_round_start(state: &SharedState, round_index: usize) {
    state.hub().dashboard().publish(DashboardEvent::RoundStart {
        round: round_index + 1,
    });
}

pub fn broadcast_round_complete(state: &SharedState, round_index: usize) {
    state
        .hub()
        .dashboard()
        .publish(DashboardEvent::RoundComplete {
            round: round_index + 1,
        });
}

/// Broadcast a match summary change on the dashboard topic.
pub async fn broadcast_match_update(state: &SharedState, record: &MatchRecord) {
    let names = roster_names(state).await;
    state.hub().dashboard().publish(DashboardEvent::MatchUpdate {
        summary: MatchView::from_record(record, &names),
    });
}

/// Current standings, sorted for publication.
pub async fn leaderboard_rows(state: &SharedState) -> Vec<LeaderboardRow> {
    let store = state.store();
    let (teams, matches) = match (store.list_teams().await, store.list_matches().await) {
        (Ok(teams), Ok(matches)) => (teams, matches),
        (Err(err), _) | (_, Err(err)) => {
            warn!(error = %err, "failed to load standings inputs");
            return Vec::new();
        }
    };
    standings(&teams, &matches).iter().map(Into::into).collect()
}

/// Recompute and broadcast the leaderboard. Callers invoke this only after
/// the sealing store write of a match, never before.
pub async fn broadcast_leaderboard(state: &SharedState) {
    let leaderboard = leaderboard_rows(state).await;
    state
        .hub()
        .dashboard()
        .publish(DashboardEvent::LeaderboardUpdate { leaderboard });
}

/// Full dashboard snapshot delivered to a freshly connected subscriber.
pub async fn dashboard_snapshot(state: &SharedState) -> DashboardEvent {
    let status = status_response(state).await;
    let leaderboard = leaderboard_rows(state).await;
    let rounds = match state.store().snapshot().await {
        Ok(snapshot) => {
            let names: HashMap<Uuid, String> = snapshot
                .teams
                .iter()
                .map(|team| (team.id, team.name.clone()))
                .collect();
            let matches: HashMap<Uuid, MatchRecord> = snapshot
                .matches
                .into_iter()
                .map(|record| (record.id, record))
                .collect();
            snapshot
                .schedule
                .map(|schedule| round_views(&schedule, &matches, &names))
                .unwrap_or_default()
        }
        Err(err) => {
            warn!(error = %err, "failed to build dashboard snapshot");
            Vec::new()
        }
    };

    DashboardEvent::InitialState {
        status,
        rounds,
        leaderboard,
    }
}

/// Match header sent to spectators joining a match topic.
pub fn match_info_event(record: &MatchRecord, names: &HashMap<Uuid, String>) -> MatchEvent {
    let info = |id: Uuid| MatchTeamInfo {
        team_id: id,
        team_name: names.get(&id).cloned().unwrap_or_else(|| id.to_string()),
    };
    MatchEvent::ChampionshipMatchInfo {
        match_id: record.id,
        round: record.round + 1,
        team_a: info(record.team_a),
        team_b: info(record.team_b),
        status: record.status,
        points_a: record.points_a,
        points_b: record.points_b,
        bank_a_ms: record.bank_a_ms,
        bank_b_ms: record.bank_b_ms,
    }
}

/// Snapshot of the latest game of a match, replayed from its move log.
pub fn game_info_event(record: &MatchRecord, game: &GameRecord) -> MatchEvent {
    let board = game.replay_board();
    let current_player = match game.outcome {
        Some(_) => None,
        None => {
            let seat = if game.moves.len() % 2 == 0 {
                crate::domain::board::Player::One
            } else {
                crate::domain::board::Player::Two
            };
            Some(seat.index())
        }
    };
    MatchEvent::GameInfo {
        match_id: record.id,
        game_index: game.game_index,
        first_mover: game.first_mover,
        color_a: game.color_a,
        color_b: game.color_b(),
        board: board.grid(),
        current_player,
        moves_played: game.moves.len(),
    }
}

/// Publish the spectator count of a match topic to its subscribers.
pub fn broadcast_spectator_count(state: &SharedState, match_id: Uuid) {
    let count = state.hub().match_spectators(match_id);
    state
        .hub()
        .publish_match(match_id, MatchEvent::SpectatorCount { match_id, count });
}
