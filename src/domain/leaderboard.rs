use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{
    record::{MatchRecord, MatchStatus, TeamSide},
    team::Team,
};

/// Aggregated standing of one team, recomputed from sealed match records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub team_id: Uuid,
    pub team_name: String,
    /// Sum of game points over all sealed matches.
    pub points: f64,
    /// Match-level tallies; an aborted match counts as a loss for both sides.
    pub won: u32,
    pub drawn: u32,
    pub lost: u32,
    /// Total wall-clock consumed by the team's agent calls, in milliseconds.
    pub time_used_ms: u64,
}

impl LeaderboardEntry {
    fn zero(team: &Team) -> Self {
        Self {
            team_id: team.id,
            team_name: team.name.clone(),
            points: 0.0,
            won: 0,
            drawn: 0,
            lost: 0,
            time_used_ms: 0,
        }
    }
}

/// Derive the leaderboard from the roster and the sealed subset of
/// `matches`, sorted by `(-points, time_used, display_name)`.
pub fn standings(teams: &[Team], matches: &[MatchRecord]) -> Vec<LeaderboardEntry> {
    let mut entries: HashMap<Uuid, LeaderboardEntry> = teams
        .iter()
        .map(|team| (team.id, LeaderboardEntry::zero(team)))
        .collect();

    for record in matches.iter().filter(|record| record.is_sealed()) {
        match record.status {
            MatchStatus::Finished => {
                for (side, points) in [
                    (TeamSide::A, record.points_a),
                    (TeamSide::B, record.points_b),
                ] {
                    let Some(entry) = entries.get_mut(&record.team(side)) else {
                        continue;
                    };
                    entry.points += points;
                    entry.time_used_ms += record
                        .games
                        .iter()
                        .map(|game| match side {
                            TeamSide::A => game.elapsed_a_ms,
                            TeamSide::B => game.elapsed_b_ms,
                        })
                        .sum::<u64>();
                }
                let winner = record.winner();
                for side in [TeamSide::A, TeamSide::B] {
                    let Some(entry) = entries.get_mut(&record.team(side)) else {
                        continue;
                    };
                    match winner {
                        Some(w) if w == side => entry.won += 1,
                        Some(_) => entry.lost += 1,
                        None => entry.drawn += 1,
                    }
                }
            }
            MatchStatus::Aborted => {
                for side in [TeamSide::A, TeamSide::B] {
                    if let Some(entry) = entries.get_mut(&record.team(side)) {
                        entry.lost += 1;
                    }
                }
            }
            MatchStatus::Scheduled | MatchStatus::InProgress => {}
        }
    }

    let mut entries: Vec<LeaderboardEntry> = entries.into_values().collect();
    entries.sort_by(|lhs, rhs| {
        rhs.points
            .total_cmp(&lhs.points)
            .then(lhs.time_used_ms.cmp(&rhs.time_used_ms))
            .then_with(|| lhs.team_name.cmp(&rhs.team_name))
    });
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::record::{GameEndReason, GameOutcome, GameRecord};

    fn team(name: &str) -> Team {
        Team::new(name.to_string(), "http://localhost:9999/move".to_string())
    }

    fn finished_match(
        team_a: &Team,
        team_b: &Team,
        games: Vec<(GameOutcome, u64, u64)>,
    ) -> MatchRecord {
        let mut record = MatchRecord::scheduled(Uuid::new_v4(), 0, team_a.id, team_b.id, 240_000);
        record.status = MatchStatus::InProgress;
        for (index, (outcome, elapsed_a, elapsed_b)) in games.into_iter().enumerate() {
            let mut game = GameRecord::open(index as u8 + 1);
            game.elapsed_a_ms = elapsed_a;
            game.elapsed_b_ms = elapsed_b;
            game.seal(outcome, GameEndReason::ConnectFour);
            record.score_game(outcome);
            record.games.push(game);
        }
        record.status = MatchStatus::Finished;
        record
    }

    #[test]
    fn points_and_time_accumulate_from_sealed_games() {
        let alpha = team("alpha");
        let beta = team("beta");
        let record = finished_match(
            &alpha,
            &beta,
            vec![
                (GameOutcome::Win(TeamSide::A), 1_000, 900),
                (GameOutcome::Win(TeamSide::B), 800, 700),
                (GameOutcome::Draw, 500, 600),
                (GameOutcome::Forfeit(TeamSide::B), 400, 300),
            ],
        );

        let board = standings(&[alpha.clone(), beta.clone()], &[record]);
        assert_eq!(board[0].team_id, alpha.id);
        assert_eq!(board[0].points, 2.5);
        assert_eq!(board[0].time_used_ms, 2_700);
        assert_eq!((board[0].won, board[0].drawn, board[0].lost), (1, 0, 0));
        assert_eq!(board[1].points, 1.5);
        assert_eq!((board[1].won, board[1].drawn, board[1].lost), (0, 0, 1));
    }

    #[test]
    fn unsealed_matches_are_ignored() {
        let alpha = team("alpha");
        let beta = team("beta");
        let mut record = MatchRecord::scheduled(Uuid::new_v4(), 0, alpha.id, beta.id, 240_000);
        record.status = MatchStatus::InProgress;
        record.score_game(GameOutcome::Win(TeamSide::A));

        let board = standings(&[alpha, beta], &[record]);
        assert!(board.iter().all(|entry| entry.points == 0.0));
    }

    #[test]
    fn aborted_match_is_a_loss_for_both_sides() {
        let alpha = team("alpha");
        let beta = team("beta");
        let mut record = MatchRecord::scheduled(Uuid::new_v4(), 0, alpha.id, beta.id, 240_000);
        record.status = MatchStatus::Aborted;

        let board = standings(&[alpha, beta], &[record]);
        for entry in &board {
            assert_eq!(entry.points, 0.0);
            assert_eq!(entry.lost, 1);
        }
    }

    #[test]
    fn sort_is_points_then_time_then_name() {
        let fast = team("mallory");
        let slow = team("alice");
        let third = team("zed");

        let fast_match = finished_match(
            &fast,
            &slow,
            vec![
                (GameOutcome::Win(TeamSide::A), 100, 5_000),
                (GameOutcome::Win(TeamSide::B), 100, 5_000),
                (GameOutcome::Draw, 100, 5_000),
                (GameOutcome::Draw, 100, 5_000),
            ],
        );
        let board = standings(&[fast.clone(), slow.clone(), third.clone()], &[fast_match]);

        // Equal points: the quicker team ranks first despite its later name.
        assert_eq!(board[0].team_id, fast.id);
        assert_eq!(board[1].team_id, slow.id);
        // Zero-point team trails.
        assert_eq!(board[2].team_id, third.id);

        // Names break full ties.
        let idle = standings(&[slow.clone(), third.clone()], &[]);
        assert_eq!(idle[0].team_name, "alice");
        assert_eq!(idle[1].team_name, "zed");
    }
}
