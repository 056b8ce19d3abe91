use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::board::{Board, Player};

/// Number of games played in every match.
pub const GAMES_PER_MATCH: usize = 4;

/// Identifies one of the two teams of a match, independently of seating.
///
/// Records and events always speak in terms of sides (and through them team
/// identities), never in terms of seat indices, which rotate between games.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TeamSide {
    A,
    B,
}

impl TeamSide {
    pub fn other(self) -> Self {
        match self {
            TeamSide::A => TeamSide::B,
            TeamSide::B => TeamSide::A,
        }
    }
}

/// Stone color assigned to a team for one game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum StoneColor {
    Red,
    Yellow,
}

impl StoneColor {
    pub fn other(self) -> Self {
        match self {
            StoneColor::Red => StoneColor::Yellow,
            StoneColor::Yellow => StoneColor::Red,
        }
    }
}

/// First mover and color of team A for each of the four games, indexed by
/// `game_index - 1`. Team B always holds the opposite color.
pub const ROTATION: [(TeamSide, StoneColor); GAMES_PER_MATCH] = [
    (TeamSide::A, StoneColor::Red),
    (TeamSide::B, StoneColor::Yellow),
    (TeamSide::A, StoneColor::Yellow),
    (TeamSide::B, StoneColor::Red),
];

/// Why a game reached its terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum GameEndReason {
    /// Four in a row on the board.
    ConnectFour,
    /// Board filled without a winner.
    BoardFull,
    /// The agent did not produce a full response within the turn deadline.
    Timeout,
    /// The agent endpoint could not be reached or answered non-2xx.
    Transport,
    /// The agent response could not be parsed as a move.
    Malformed,
    /// The agent chose a column that is full or out of range.
    IllegalMove,
    /// The team's match bank was already empty when its turn started.
    BankExhausted,
}

/// Terminal outcome of a single game, normalized to team sides.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "result", content = "side", rename_all = "snake_case")]
pub enum GameOutcome {
    /// The given side won on the board.
    Win(TeamSide),
    /// Board full, half a point each.
    Draw,
    /// The given side forfeited; its opponent is credited the full point.
    Forfeit(TeamSide),
}

impl GameOutcome {
    /// Points awarded to (team A, team B). Every game distributes exactly
    /// one point.
    pub fn points(self) -> (f64, f64) {
        match self {
            GameOutcome::Win(TeamSide::A) | GameOutcome::Forfeit(TeamSide::B) => (1.0, 0.0),
            GameOutcome::Win(TeamSide::B) | GameOutcome::Forfeit(TeamSide::A) => (0.0, 1.0),
            GameOutcome::Draw => (0.5, 0.5),
        }
    }

    /// Side credited with the game, if any.
    pub fn winner(self) -> Option<TeamSide> {
        match self {
            GameOutcome::Win(side) => Some(side),
            GameOutcome::Forfeit(side) => Some(side.other()),
            GameOutcome::Draw => None,
        }
    }
}

/// One move as recorded in a game's move log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveEntry {
    /// Side that played the move.
    pub side: TeamSide,
    /// Column the piece was dropped into.
    pub column: u8,
}

/// Sealed or in-flight record of a single game within a match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameRecord {
    /// Position of the game within its match, 1 to 4.
    pub game_index: u8,
    /// Side holding the first move.
    pub first_mover: TeamSide,
    /// Color played by team A; team B holds the opposite color.
    pub color_a: StoneColor,
    /// Ordered move log.
    pub moves: Vec<MoveEntry>,
    /// Terminal outcome, `None` while the game is running.
    pub outcome: Option<GameOutcome>,
    /// Why the game ended, `None` while the game is running.
    pub reason: Option<GameEndReason>,
    /// Wall-clock spent by team A over its turns, in milliseconds.
    pub elapsed_a_ms: u64,
    /// Wall-clock spent by team B over its turns, in milliseconds.
    pub elapsed_b_ms: u64,
}

impl GameRecord {
    /// Open a record for the game at `game_index` with the rotation applied.
    pub fn open(game_index: u8) -> Self {
        let (first_mover, color_a) = ROTATION[usize::from(game_index) - 1];
        Self {
            game_index,
            first_mover,
            color_a,
            moves: Vec::new(),
            outcome: None,
            reason: None,
            elapsed_a_ms: 0,
            elapsed_b_ms: 0,
        }
    }

    /// Seal the record with its terminal outcome.
    pub fn seal(&mut self, outcome: GameOutcome, reason: GameEndReason) {
        self.outcome = Some(outcome);
        self.reason = Some(reason);
    }

    /// Add `elapsed_ms` to the side's time tally.
    pub fn charge(&mut self, side: TeamSide, elapsed_ms: u64) {
        match side {
            TeamSide::A => self.elapsed_a_ms += elapsed_ms,
            TeamSide::B => self.elapsed_b_ms += elapsed_ms,
        }
    }

    /// Seat occupied by the given side in this game; the first mover always
    /// holds seat one.
    pub fn seat_of(&self, side: TeamSide) -> Player {
        if side == self.first_mover {
            Player::One
        } else {
            Player::Two
        }
    }

    /// Side occupying the given seat in this game.
    pub fn side_of(&self, player: Player) -> TeamSide {
        match player {
            Player::One => self.first_mover,
            Player::Two => self.first_mover.other(),
        }
    }

    /// Color held by team B, always the opposite of team A's.
    pub fn color_b(&self) -> StoneColor {
        self.color_a.other()
    }

    /// Rebuild the board position from the move log. Used to seed spectators
    /// joining a game in flight; the log only ever contains applied moves.
    pub fn replay_board(&self) -> Board {
        let mut board = Board::new();
        for entry in &self.moves {
            let _ = board.drop_piece(usize::from(entry.column), self.seat_of(entry.side));
        }
        board
    }
}

/// Lifecycle of a match record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Scheduled,
    InProgress,
    Finished,
    Aborted,
}

/// Persistent record of a four-game match between two teams.
///
/// Exactly one match runner mutates a record at a time; everything else sees
/// snapshots through the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub id: Uuid,
    /// Zero-based round the match belongs to.
    pub round: usize,
    pub team_a: Uuid,
    pub team_b: Uuid,
    pub status: MatchStatus,
    /// Game records in play order; up to four entries.
    pub games: Vec<GameRecord>,
    pub points_a: f64,
    pub points_b: f64,
    /// Remaining match bank of team A, in milliseconds.
    pub bank_a_ms: u64,
    /// Remaining match bank of team B, in milliseconds.
    pub bank_b_ms: u64,
}

impl MatchRecord {
    /// Create a scheduled record with full banks and no games played.
    pub fn scheduled(id: Uuid, round: usize, team_a: Uuid, team_b: Uuid, bank_ms: u64) -> Self {
        Self {
            id,
            round,
            team_a,
            team_b,
            status: MatchStatus::Scheduled,
            games: Vec::new(),
            points_a: 0.0,
            points_b: 0.0,
            bank_a_ms: bank_ms,
            bank_b_ms: bank_ms,
        }
    }

    /// Revert a record to its scheduled state, keeping identity and pairing.
    pub fn reschedule(&mut self, bank_ms: u64) {
        self.status = MatchStatus::Scheduled;
        self.games.clear();
        self.points_a = 0.0;
        self.points_b = 0.0;
        self.bank_a_ms = bank_ms;
        self.bank_b_ms = bank_ms;
    }

    /// Team id sitting on the given side.
    pub fn team(&self, side: TeamSide) -> Uuid {
        match side {
            TeamSide::A => self.team_a,
            TeamSide::B => self.team_b,
        }
    }

    /// Remaining bank for the given side, in milliseconds.
    pub fn bank_ms(&self, side: TeamSide) -> u64 {
        match side {
            TeamSide::A => self.bank_a_ms,
            TeamSide::B => self.bank_b_ms,
        }
    }

    /// Deduct elapsed wall-clock from the side's bank, clamping at zero.
    pub fn drain_bank(&mut self, side: TeamSide, elapsed_ms: u64) {
        let bank = match side {
            TeamSide::A => &mut self.bank_a_ms,
            TeamSide::B => &mut self.bank_b_ms,
        };
        *bank = bank.saturating_sub(elapsed_ms);
    }

    /// Credit a sealed game's points to the match totals.
    pub fn score_game(&mut self, outcome: GameOutcome) {
        let (a, b) = outcome.points();
        self.points_a += a;
        self.points_b += b;
    }

    /// Side with the larger game-point total once the match is finished.
    pub fn winner(&self) -> Option<TeamSide> {
        if self.status != MatchStatus::Finished || self.points_a == self.points_b {
            return None;
        }
        if self.points_a > self.points_b {
            Some(TeamSide::A)
        } else {
            Some(TeamSide::B)
        }
    }

    /// Whether the record can no longer change.
    pub fn is_sealed(&self) -> bool {
        matches!(self.status, MatchStatus::Finished | MatchStatus::Aborted)
    }
}
