/// Connect-4 board and rules engine.
pub mod board;
/// Leaderboard derivation from sealed match records.
pub mod leaderboard;
/// Game and match records with their scoring rules.
pub mod record;
/// Round-robin schedule generation.
pub mod schedule;
/// Registered team data.
pub mod team;
