//! Error types shared by the engine and the store.

use derive_more::{Display, Error};

/// What went wrong, independent of where.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum GameErrorKind {
    /// Malformed board or game id.
    #[display("invalid input")]
    InvalidInput,
    /// Well-formed board that breaks the rules.
    #[display("invalid move")]
    InvalidMove,
    /// No record stored under the id.
    #[display("not found")]
    NotFound,
    /// Move submitted against a finished game.
    #[display("conflict")]
    Conflict,
    /// Stored record exceeds the size ceiling.
    #[display("too large")]
    TooLarge,
    /// Stored bytes do not parse as a game record.
    #[display("corrupt")]
    Corrupt,
    /// Filesystem failure.
    #[display("io failure")]
    Io,
    /// Store no longer accepts operations.
    #[display("unavailable")]
    Unavailable,
    /// Unexpected condition.
    #[display("internal")]
    Internal,
}

/// Game error with location tracking.
#[derive(Debug, Clone, Display, Error)]
#[display("{}: {} at {}:{}", kind, message, file, line)]
pub struct GameError {
    /// Error category.
    pub kind: GameErrorKind,
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl GameError {
    /// Creates a new error with caller location tracking.
    #[track_caller]
    pub fn new(kind: GameErrorKind, message: impl Into<String>) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            kind,
            message: message.into(),
            line: loc.line(),
            file: loc.file(),
        }
    }
}
