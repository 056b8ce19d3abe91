use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of rows on a Connect-4 board (row 0 is the top).
pub const ROWS: usize = 6;
/// Number of columns on a Connect-4 board.
pub const COLS: usize = 7;

/// One of the two seats at the board, in move order.
///
/// Player one always moves first; which *team* sits in which seat is decided
/// by the per-game rotation and tracked outside the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Player {
    One,
    Two,
}

impl Player {
    /// The other seat.
    pub fn opponent(self) -> Self {
        match self {
            Player::One => Player::Two,
            Player::Two => Player::One,
        }
    }

    /// Wire value used by the agent protocol (1 or 2).
    pub fn index(self) -> u8 {
        match self {
            Player::One => 1,
            Player::Two => 2,
        }
    }
}

/// Error returned when a piece cannot be dropped into a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MoveError {
    #[error("column {0} is out of range")]
    OutOfRange(usize),
    #[error("column {0} is full")]
    ColumnFull(usize),
}

/// Terminal verdict for a board position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminal {
    /// Four in a row for the given seat.
    Win(Player),
    /// Board full without a winner.
    Draw,
}

/// The four line directions checked for a win: horizontal, vertical and the
/// two diagonals. Each cell only scans forward so every line is visited once.
const DIRECTIONS: [(i32, i32); 4] = [(0, 1), (1, 0), (1, 1), (-1, 1)];

/// A 6x7 Connect-4 grid.
///
/// Mutation goes exclusively through [`Board::drop_piece`], which preserves
/// the gravity invariant: no empty cell ever sits below an occupied one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Board {
    cells: [[Option<Player>; COLS]; ROWS],
}

impl Board {
    /// Create an empty board.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cell content at the given position, row 0 being the top.
    pub fn get(&self, row: usize, col: usize) -> Option<Player> {
        self.cells[row][col]
    }

    /// Whether a piece can still be dropped into `col`.
    pub fn is_column_open(&self, col: usize) -> bool {
        col < COLS && self.cells[0][col].is_none()
    }

    /// Columns that can still receive a piece, in ascending order.
    pub fn legal_moves(&self) -> impl Iterator<Item = usize> + '_ {
        (0..COLS).filter(|&col| self.is_column_open(col))
    }

    /// Drop a piece into `col` and return the row it landed on.
    pub fn drop_piece(&mut self, col: usize, player: Player) -> Result<usize, MoveError> {
        if col >= COLS {
            return Err(MoveError::OutOfRange(col));
        }
        for row in (0..ROWS).rev() {
            if self.cells[row][col].is_none() {
                self.cells[row][col] = Some(player);
                return Ok(row);
            }
        }
        Err(MoveError::ColumnFull(col))
    }

    /// Terminal verdict for the current position, `None` while the game is
    /// still open. A draw requires a full board and no four-in-a-row.
    pub fn terminal(&self) -> Option<Terminal> {
        for row in 0..ROWS {
            for col in 0..COLS {
                let Some(player) = self.cells[row][col] else {
                    continue;
                };
                for (dr, dc) in DIRECTIONS {
                    let connected = (1..4).all(|step| {
                        let r = row as i32 + dr * step;
                        let c = col as i32 + dc * step;
                        (0..ROWS as i32).contains(&r)
                            && (0..COLS as i32).contains(&c)
                            && self.cells[r as usize][c as usize] == Some(player)
                    });
                    if connected {
                        return Some(Terminal::Win(player));
                    }
                }
            }
        }

        if self.legal_moves().next().is_none() {
            return Some(Terminal::Draw);
        }
        None
    }

    /// Integer grid representation used on the agent wire and in events
    /// (0 empty, 1 player one, 2 player two).
    pub fn grid(&self) -> [[u8; COLS]; ROWS] {
        let mut grid = [[0u8; COLS]; ROWS];
        for (row, cells) in self.cells.iter().enumerate() {
            for (col, cell) in cells.iter().enumerate() {
                grid[row][col] = cell.map(Player::index).unwrap_or(0);
            }
        }
        grid
    }

    /// Gravity check: every occupied cell rests on the floor or on another
    /// piece. Holds by construction; exposed for assertions in tests.
    pub fn is_well_formed(&self) -> bool {
        (0..COLS).all(|col| {
            (0..ROWS - 1).all(|row| {
                self.cells[row][col].is_none() || self.cells[row + 1][col].is_some()
            })
        })
    }
}
