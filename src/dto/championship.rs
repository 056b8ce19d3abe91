use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    domain::{
        leaderboard::LeaderboardEntry,
        record::{MatchRecord, MatchStatus},
        schedule::{Round, Schedule},
        team::Team,
    },
    dto::format_system_time,
    state::phase::Phase,
};

/// Payload used to register a team and its agent endpoint.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct RegisterRequest {
    /// Display name for the team, unique across the roster.
    #[validate(length(min = 1, max = 64, message = "team name must be 1 to 64 characters"))]
    pub team_name: String,
    /// HTTP endpoint implementing the move protocol.
    #[validate(url(message = "api endpoint must be a valid URL"))]
    pub api_endpoint: String,
}

/// Generic acknowledgement returned by the mutating admin routes.
#[derive(Debug, Serialize, ToSchema)]
pub struct ActionResponse {
    pub success: bool,
    pub message: String,
}

impl ActionResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

/// Championship progress as reported by the status route and the dashboard.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StatusResponse {
    /// Lifecycle phase (`waiting`, `in_progress`, or `finished`).
    pub status: Phase,
    pub team_count: usize,
    /// One-based index of the round currently running; 0 before the start.
    pub current_round: usize,
    pub total_rounds: usize,
}

/// Registered team as exposed on the admin surface.
#[derive(Debug, Serialize, ToSchema)]
pub struct TeamView {
    pub team_id: Uuid,
    pub team_name: String,
    pub api_endpoint: String,
    /// RFC3339 registration timestamp.
    pub registered_at: String,
}

impl From<&Team> for TeamView {
    fn from(team: &Team) -> Self {
        Self {
            team_id: team.id,
            team_name: team.name.clone(),
            api_endpoint: team.endpoint.clone(),
            registered_at: format_system_time(team.registered_at),
        }
    }
}

/// Summary of one match for the schedule and dashboard payloads.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MatchView {
    pub match_id: Uuid,
    pub team_a: String,
    pub team_b: String,
    pub status: MatchStatus,
    /// Winning team name once the match is finished with a margin.
    pub winner: Option<String>,
    pub team_a_points: f64,
    pub team_b_points: f64,
}

impl MatchView {
    /// Project a record onto its display summary, resolving team names
    /// through the roster.
    pub fn from_record(record: &MatchRecord, names: &HashMap<Uuid, String>) -> Self {
        let resolve = |id: Uuid| {
            names
                .get(&id)
                .cloned()
                .unwrap_or_else(|| id.to_string())
        };
        Self {
            match_id: record.id,
            team_a: resolve(record.team_a),
            team_b: resolve(record.team_b),
            status: record.status,
            winner: record.winner().map(|side| resolve(record.team(side))),
            team_a_points: record.points_a,
            team_b_points: record.points_b,
        }
    }
}

/// One round of the published schedule.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RoundView {
    /// One-based round number.
    pub round: usize,
    pub matches: Vec<MatchView>,
    /// Name of the team sitting this round out, if any.
    pub bye: Option<String>,
}

/// Schedule payload: rounds in play order.
#[derive(Debug, Serialize, ToSchema)]
pub struct ScheduleResponse {
    pub rounds: Vec<RoundView>,
}

/// Build the round views from the stored schedule and match records.
pub fn round_views(
    schedule: &Schedule,
    matches: &HashMap<Uuid, MatchRecord>,
    names: &HashMap<Uuid, String>,
) -> Vec<RoundView> {
    schedule
        .rounds
        .iter()
        .map(|round| round_view(round, matches, names))
        .collect()
}

fn round_view(
    round: &Round,
    matches: &HashMap<Uuid, MatchRecord>,
    names: &HashMap<Uuid, String>,
) -> RoundView {
    RoundView {
        round: round.index + 1,
        matches: round
            .pairings
            .iter()
            .filter_map(|pairing| matches.get(&pairing.match_id))
            .map(|record| MatchView::from_record(record, names))
            .collect(),
        bye: round
            .bye
            .and_then(|team_id| names.get(&team_id).cloned()),
    }
}

/// One row of the leaderboard payload, sorted by
/// `(-points, time_used, team_name)` upstream.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LeaderboardRow {
    pub team_id: Uuid,
    pub team_name: String,
    pub points: f64,
    pub won: u32,
    pub drawn: u32,
    pub lost: u32,
    pub time_used_ms: u64,
}

impl From<&LeaderboardEntry> for LeaderboardRow {
    fn from(entry: &LeaderboardEntry) -> Self {
        Self {
            team_id: entry.team_id,
            team_name: entry.team_name.clone(),
            points: entry.points,
            won: entry.won,
            drawn: entry.drawn,
            lost: entry.lost,
            time_used_ms: entry.time_used_ms,
        }
    }
}
