//! Game records and the transitions allowed on them.

use crate::rules;
use crate::{Board, GameError, GameErrorKind, GameId, Sign, Square, Status};
use derive_getters::Getters;
use rand::Rng;
use rand::seq::IteratorRandom;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// Who opens a freshly created game, judged from the submitted board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FirstMove {
    /// Empty board: the computer moves first.
    ComputerMove,
    /// Human opened with X.
    X,
    /// Human opened with O.
    O,
    /// Anything else.
    Invalid,
}

/// One game: id, board and status.
///
/// The human's side is decoded from the id once, when the record is built
/// or loaded, and kept as an explicit field.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize, Deserialize)]
#[serde(from = "GameRecord", into = "GameRecord")]
pub struct Game {
    id: GameId,
    #[getter(skip)]
    human: Sign,
    board: Board,
    status: Status,
}

/// Persisted shape: exactly three string fields.
#[derive(Serialize, Deserialize)]
struct GameRecord {
    id: GameId,
    board: Board,
    status: Status,
}

impl From<GameRecord> for Game {
    fn from(record: GameRecord) -> Self {
        Self::from_parts(record.id, record.board, record.status)
    }
}

impl From<Game> for GameRecord {
    fn from(game: Game) -> Self {
        Self {
            id: game.id,
            board: game.board,
            status: game.status,
        }
    }
}

/// Per-cell difference between the stored and the submitted board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CellChange {
    Unchanged,
    /// Empty cell received a mark.
    Placed(Sign),
    /// Occupied cell was cleared or overwritten.
    Altered,
}

impl CellChange {
    fn classify(old: Square, new: Square) -> Self {
        match (old, new) {
            (a, b) if a == b => CellChange::Unchanged,
            (Square::Empty, Square::Occupied(sign)) => CellChange::Placed(sign),
            _ => CellChange::Altered,
        }
    }
}

impl Game {
    /// Creates a running game with a fresh id for a human playing `human`.
    #[instrument(skip(board), fields(board = %board))]
    pub fn new(board: Board, human: Sign) -> Self {
        let game = Self::from_parts(GameId::generate(human), board, Status::Running);
        debug!(id = %game.id, "Game created");
        game
    }

    /// Rebuilds a record from stored parts.
    pub fn from_parts(id: GameId, board: Board, status: Status) -> Self {
        let human = id.human_sign();
        Self {
            id,
            human,
            board,
            status,
        }
    }

    /// Side played by the human.
    pub fn user_sign(&self) -> Sign {
        self.human
    }

    /// Side played by the computer.
    pub fn comp_sign(&self) -> Sign {
        self.human.opponent()
    }

    /// Validates a board submitted by the human and adopts it.
    ///
    /// Exactly one cell may differ from the current board, and it must go
    /// from empty to the human's sign. The current board is left untouched
    /// on any error.
    ///
    /// # Errors
    ///
    /// Returns [`GameErrorKind::InvalidInput`] for a malformed board and
    /// [`GameErrorKind::InvalidMove`] for any other change pattern.
    #[instrument(skip(self), fields(id = %self.id, current = %self.board))]
    pub fn set_new_board(&mut self, submitted: &str) -> Result<(), GameError> {
        let new_board: Board = submitted.parse()?;

        let changes: Vec<(usize, CellChange)> = self
            .board
            .squares()
            .iter()
            .zip(new_board.squares())
            .map(|(&old, &new)| CellChange::classify(old, new))
            .enumerate()
            .filter(|(_, change)| *change != CellChange::Unchanged)
            .collect();

        match changes.as_slice() {
            [] => Err(GameError::new(GameErrorKind::InvalidMove, "no move made")),
            [(_, CellChange::Placed(sign))] if *sign == self.human => {
                self.board = new_board;
                Ok(())
            }
            [(pos, CellChange::Placed(sign))] => Err(GameError::new(
                GameErrorKind::InvalidMove,
                format!("cell {} set to {}, player plays {}", pos, sign, self.human),
            )),
            [(pos, _)] => Err(GameError::new(
                GameErrorKind::InvalidMove,
                format!("occupied cell {} changed", pos),
            )),
            _ => Err(GameError::new(
                GameErrorKind::InvalidMove,
                format!("{} cells changed, expected one", changes.len()),
            )),
        }
    }

    /// Evaluates the board for `sign` and records a terminal status.
    ///
    /// A status that is already terminal is returned as is.
    #[instrument(skip(self), fields(id = %self.id, board = %self.board))]
    pub fn check_win(&mut self, sign: Sign) -> Status {
        if self.status.is_terminal() {
            return self.status;
        }

        if rules::has_line(&self.board, sign) {
            self.status = Status::won_by(sign);
        } else if rules::is_full(&self.board) {
            self.status = Status::Draw;
        }

        debug!(status = %self.status, "Board evaluated");
        self.status
    }

    /// Places the computer's mark on a uniformly random empty cell.
    ///
    /// # Errors
    ///
    /// Returns [`GameErrorKind::Internal`] if the board has no empty cell.
    pub fn make_move(&mut self) -> Result<usize, GameError> {
        self.make_move_with(&mut rand::thread_rng())
    }

    /// [`Game::make_move`] with a caller-supplied random source.
    #[instrument(skip(self, rng), fields(id = %self.id))]
    pub fn make_move_with<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<usize, GameError> {
        let pos = self.board.empty_cells().choose(rng).ok_or_else(|| {
            GameError::new(GameErrorKind::Internal, "no empty cell for computer move")
        })?;
        let sign = self.comp_sign();
        self.board.place(pos, sign)?;
        debug!(pos, %sign, "Computer moved");
        Ok(pos)
    }

    /// Serializes to the stored record format.
    ///
    /// # Errors
    ///
    /// Returns [`GameErrorKind::Internal`] if serialization fails.
    pub fn to_json(&self) -> Result<Vec<u8>, GameError> {
        serde_json::to_vec(self).map_err(|e| {
            GameError::new(
                GameErrorKind::Internal,
                format!("can't serialize game: {}", e),
            )
        })
    }

    /// Parses a stored record.
    ///
    /// # Errors
    ///
    /// Returns [`GameErrorKind::Corrupt`] if `bytes` is not a valid record.
    pub fn from_json(bytes: &[u8]) -> Result<Self, GameError> {
        serde_json::from_slice(bytes).map_err(|e| {
            GameError::new(
                GameErrorKind::Corrupt,
                format!("can't parse game file: {}", e),
            )
        })
    }
}

/// Works out who opens a game from the board sent at creation.
///
/// Only zero or one filled cell is acceptable for a new game.
#[instrument]
pub fn who_moves_first(board: &str) -> FirstMove {
    let Ok(board) = board.parse::<Board>() else {
        return FirstMove::Invalid;
    };

    let mut marks = board.squares().iter().filter_map(|s| match s {
        Square::Occupied(sign) => Some(*sign),
        Square::Empty => None,
    });

    match (marks.next(), marks.next()) {
        (None, _) => FirstMove::ComputerMove,
        (Some(Sign::X), None) => FirstMove::X,
        (Some(Sign::O), None) => FirstMove::O,
        (Some(_), Some(_)) => FirstMove::Invalid,
    }
}

/// Returns X and O in random order.
pub fn gamble_sign() -> (Sign, Sign) {
    gamble_sign_with(&mut rand::thread_rng())
}

/// [`gamble_sign`] with a caller-supplied random source.
pub fn gamble_sign_with<R: Rng + ?Sized>(rng: &mut R) -> (Sign, Sign) {
    if rng.gen_bool(0.5) {
        (Sign::X, Sign::O)
    } else {
        (Sign::O, Sign::X)
    }
}
