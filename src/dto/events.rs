use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    domain::{
        board::{COLS, ROWS},
        record::{GameEndReason, GameOutcome, MatchStatus, StoneColor, TeamSide},
    },
    dto::championship::{LeaderboardRow, MatchView, RoundView, StatusResponse},
};

/// Integer grid carried by board-bearing events (0 empty, 1 player one,
/// 2 player two).
pub type Grid = [[u8; COLS]; ROWS];

/// Team identity as carried on the per-match topic.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MatchTeamInfo {
    pub team_id: Uuid,
    pub team_name: String,
}

/// Events published on the `dashboard` topic.
///
/// Serialized with an explicit `type` tag; the tag doubles as the SSE event
/// name through [`DashboardEvent::name`].
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DashboardEvent {
    /// Full snapshot sent to a subscriber when it connects.
    InitialState {
        status: StatusResponse,
        rounds: Vec<RoundView>,
        leaderboard: Vec<LeaderboardRow>,
    },
    /// Championship lifecycle or progress change.
    StatusUpdate { status: StatusResponse },
    RoundStart {
        /// One-based round number.
        round: usize,
    },
    RoundComplete {
        round: usize,
    },
    /// A match record changed (status, points, or games).
    MatchUpdate { summary: MatchView },
    /// Standings recomputed after a match sealed.
    LeaderboardUpdate {
        leaderboard: Vec<LeaderboardRow>,
    },
}

impl DashboardEvent {
    /// SSE event name for this payload.
    pub fn name(&self) -> &'static str {
        match self {
            DashboardEvent::InitialState { .. } => "initial_state",
            DashboardEvent::StatusUpdate { .. } => "status_update",
            DashboardEvent::RoundStart { .. } => "round_start",
            DashboardEvent::RoundComplete { .. } => "round_complete",
            DashboardEvent::MatchUpdate { .. } => "match_update",
            DashboardEvent::LeaderboardUpdate { .. } => "leaderboard_update",
        }
    }
}

/// Events published on a `match:{id}` topic.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MatchEvent {
    /// Match header sent to a subscriber when it connects.
    ChampionshipMatchInfo {
        match_id: Uuid,
        /// One-based round number.
        round: usize,
        team_a: MatchTeamInfo,
        team_b: MatchTeamInfo,
        status: MatchStatus,
        points_a: f64,
        points_b: f64,
        bank_a_ms: u64,
        bank_b_ms: u64,
    },
    /// Current game snapshot sent after the match header on connect.
    GameInfo {
        match_id: Uuid,
        game_index: u8,
        first_mover: TeamSide,
        color_a: StoneColor,
        color_b: StoneColor,
        #[schema(value_type = Vec<Vec<u8>>)]
        board: Grid,
        /// Seat to move, absent once the game is over.
        current_player: Option<u8>,
        moves_played: usize,
    },
    GameStart {
        match_id: Uuid,
        game_index: u8,
        first_mover: TeamSide,
        color_a: StoneColor,
        color_b: StoneColor,
    },
    /// Board state after an applied move, mirroring the single-game stream.
    GameUpdate {
        match_id: Uuid,
        game_index: u8,
        #[schema(value_type = Vec<Vec<u8>>)]
        board: Grid,
        current_player: Option<u8>,
        game_over: bool,
        winner: Option<TeamSide>,
    },
    MoveMade {
        match_id: Uuid,
        game_index: u8,
        /// Side that played, normalized to team identity.
        side: TeamSide,
        /// Seat that played (1 or 2).
        player: u8,
        column: u8,
        #[schema(value_type = Vec<Vec<u8>>)]
        board_after: Grid,
    },
    GameComplete {
        match_id: Uuid,
        game_index: u8,
        outcome: GameOutcome,
        reason: GameEndReason,
        /// Winning team name, if the game was not drawn.
        winner: Option<String>,
        points_a: f64,
        points_b: f64,
        bank_a_ms: u64,
        bank_b_ms: u64,
    },
    SpectatorCount {
        match_id: Uuid,
        count: usize,
    },
    /// The match is being replayed from game 1; spectators should reload.
    MatchRestart {
        match_id: Uuid,
    },
}

impl MatchEvent {
    /// SSE event name for this payload.
    pub fn name(&self) -> &'static str {
        match self {
            MatchEvent::ChampionshipMatchInfo { .. } => "championship_match_info",
            MatchEvent::GameInfo { .. } => "game_info",
            MatchEvent::GameStart { .. } => "game_start",
            MatchEvent::GameUpdate { .. } => "game_update",
            MatchEvent::MoveMade { .. } => "move_made",
            MatchEvent::GameComplete { .. } => "game_complete",
            MatchEvent::SpectatorCount { .. } => "spectator_count",
            MatchEvent::MatchRestart { .. } => "match_restart",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_carry_their_tag_and_name() {
        let event = DashboardEvent::RoundStart { round: 2 };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "round_start");
        assert_eq!(value["round"], 2);
        assert_eq!(event.name(), "round_start");

        let event = MatchEvent::MatchRestart {
            match_id: Uuid::new_v4(),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "match_restart");
        assert_eq!(event.name(), "match_restart");
    }

    #[test]
    fn move_made_serializes_board_and_seat() {
        let event = MatchEvent::MoveMade {
            match_id: Uuid::new_v4(),
            game_index: 1,
            side: TeamSide::B,
            player: 2,
            column: 3,
            board_after: [[0; COLS]; ROWS],
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["side"], "b");
        assert_eq!(value["player"], 2);
        assert_eq!(value["column"], 3);
        assert_eq!(value["board_after"].as_array().unwrap().len(), ROWS);
    }
}
