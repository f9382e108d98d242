//! Durable storage for game records.

mod file;

pub use file::{BACKUP_EXT, FileStore, MAX_RECORD_SIZE};

use std::time::Duration;
use tictactoe_game::{Game, GameError, GameId};

/// Keyed storage of game records, safe to share between request workers.
///
/// Ids are validated by construction ([`GameId`]) before any call reaches
/// the backing storage.
pub trait GameStore: Send + Sync + std::fmt::Debug {
    /// Loads and parses the record stored under `id`.
    ///
    /// # Errors
    ///
    /// `NotFound`, `TooLarge`, `Corrupt`, `Io` or `Unavailable`.
    fn get(&self, id: &GameId) -> Result<Game, GameError>;

    /// Loads the stored bytes under `id` without parsing them.
    ///
    /// # Errors
    ///
    /// `NotFound`, `TooLarge`, `Io` or `Unavailable`.
    fn get_raw(&self, id: &GameId) -> Result<Vec<u8>, GameError>;

    /// Parses every record whose key has the id shape.
    ///
    /// # Errors
    ///
    /// The first error met while reading any listed record.
    fn list(&self) -> Result<Vec<Game>, GameError>;

    /// Raw bytes of every record whose key has the id shape.
    ///
    /// # Errors
    ///
    /// The first error met while reading any listed record.
    fn list_raw(&self) -> Result<Vec<Vec<u8>>, GameError>;

    /// Inserts or replaces the record for `game`.
    ///
    /// # Errors
    ///
    /// `Io` if the previous record can't be backed up or the new one can't
    /// be written.
    fn save(&self, game: &Game) -> Result<(), GameError>;

    /// Removes the record under `id`.
    ///
    /// # Errors
    ///
    /// `NotFound` if absent, `Io` if removal fails.
    fn delete(&self, id: &GameId) -> Result<(), GameError>;

    /// Checks whether a record is stored under `id`.
    ///
    /// # Errors
    ///
    /// `Io` or `Unavailable`.
    fn exists(&self, id: &GameId) -> Result<bool, GameError>;

    /// Checks a raw key against the id shape.
    fn is_valid_id(&self, id: &str) -> bool {
        GameId::is_valid(id)
    }

    /// Waits up to `grace` for in-flight operations, then refuses new ones.
    ///
    /// # Errors
    ///
    /// Implementations may report a failure to drain.
    fn shutdown(&self, grace: Duration) -> Result<(), GameError>;
}
