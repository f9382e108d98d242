//! Core domain types for tic-tac-toe.

use crate::{GameError, GameErrorKind};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::instrument;

/// Number of cells on the board.
pub const BOARD_SIZE: usize = 9;

/// Character stored for an empty cell.
pub const EMPTY_CHAR: char = '-';

/// A player's mark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumIter)]
pub enum Sign {
    /// Crosses.
    X,
    /// Noughts.
    O,
}

impl Sign {
    /// Returns the other mark.
    pub fn opponent(self) -> Self {
        match self {
            Sign::X => Sign::O,
            Sign::O => Sign::X,
        }
    }

    /// Character used for this mark in a serialized board.
    pub fn symbol(self) -> char {
        match self {
            Sign::X => 'X',
            Sign::O => 'O',
        }
    }
}

/// A cell on the tic-tac-toe board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Square {
    /// Empty cell.
    #[default]
    Empty,
    /// Cell holding a mark.
    Occupied(Sign),
}

impl Square {
    /// Parses a board character (`-`, `X` or `O`).
    pub fn from_symbol(c: u8) -> Option<Self> {
        match c {
            b'-' => Some(Square::Empty),
            b'X' => Some(Square::Occupied(Sign::X)),
            b'O' => Some(Square::Occupied(Sign::O)),
            _ => None,
        }
    }

    /// Board character for this cell.
    pub fn symbol(self) -> char {
        match self {
            Square::Empty => EMPTY_CHAR,
            Square::Occupied(sign) => sign.symbol(),
        }
    }
}

/// 3x3 board, cells in row-major order (0-8).
///
/// Serialized as a 9-character string over `-`, `X` and `O`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Board {
    squares: [Square; BOARD_SIZE],
}

impl Board {
    /// Creates an empty board.
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets the cell at the given index, `None` when out of bounds.
    pub fn get(&self, pos: usize) -> Option<Square> {
        self.squares.get(pos).copied()
    }

    /// Places a mark on an empty cell.
    ///
    /// # Errors
    ///
    /// Returns [`GameErrorKind::InvalidMove`] if the index is out of bounds
    /// or the cell is already occupied.
    pub fn place(&mut self, pos: usize, sign: Sign) -> Result<(), GameError> {
        match self.squares.get_mut(pos) {
            Some(cell @ Square::Empty) => {
                *cell = Square::Occupied(sign);
                Ok(())
            }
            Some(_) => Err(GameError::new(
                GameErrorKind::InvalidMove,
                format!("cell {} is already occupied", pos),
            )),
            None => Err(GameError::new(
                GameErrorKind::InvalidMove,
                format!("cell {} is out of bounds", pos),
            )),
        }
    }

    /// Checks if a cell is empty.
    pub fn is_empty(&self, pos: usize) -> bool {
        matches!(self.get(pos), Some(Square::Empty))
    }

    /// Returns all cells.
    pub fn squares(&self) -> &[Square; BOARD_SIZE] {
        &self.squares
    }

    /// Indices of all empty cells, ascending.
    pub fn empty_cells(&self) -> impl Iterator<Item = usize> + '_ {
        self.squares
            .iter()
            .enumerate()
            .filter(|(_, s)| **s == Square::Empty)
            .map(|(i, _)| i)
    }

    /// Number of occupied cells.
    pub fn filled(&self) -> usize {
        self.squares.iter().filter(|s| **s != Square::Empty).count()
    }
}

impl FromStr for Board {
    type Err = GameError;

    #[instrument(level = "trace")]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = s.as_bytes();
        if bytes.len() != BOARD_SIZE {
            return Err(GameError::new(
                GameErrorKind::InvalidInput,
                format!("invalid board length {}", bytes.len()),
            ));
        }

        let mut squares = [Square::Empty; BOARD_SIZE];
        for (cell, &c) in squares.iter_mut().zip(bytes) {
            *cell = Square::from_symbol(c).ok_or_else(|| {
                GameError::new(GameErrorKind::InvalidInput, "board contains invalid chars")
            })?;
        }

        Ok(Self { squares })
    }
}

impl std::fmt::Display for Board {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for square in &self.squares {
            write!(f, "{}", square.symbol())?;
        }
        Ok(())
    }
}

impl TryFrom<String> for Board {
    type Error = GameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Board> for String {
    fn from(board: Board) -> Self {
        board.to_string()
    }
}

/// Status of a game. Terminal values never change once set.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
pub enum Status {
    /// Game is ongoing.
    #[serde(rename = "RUNNING")]
    #[strum(serialize = "RUNNING")]
    Running,
    /// X has three in a row.
    #[serde(rename = "X_WON")]
    #[strum(serialize = "X_WON")]
    XWon,
    /// O has three in a row.
    #[serde(rename = "O_WON")]
    #[strum(serialize = "O_WON")]
    OWon,
    /// Board is full with no winner.
    #[serde(rename = "DRAW")]
    #[strum(serialize = "DRAW")]
    Draw,
}

impl Status {
    /// Terminal status for a win by `sign`.
    pub fn won_by(sign: Sign) -> Self {
        match sign {
            Sign::X => Status::XWon,
            Sign::O => Status::OWon,
        }
    }

    /// True for `XWon`, `OWon` and `Draw`.
    pub fn is_terminal(self) -> bool {
        self != Status::Running
    }
}
