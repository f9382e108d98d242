//! Request flows: create, move, fetch, list, delete.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tictactoe_game::{
    Board, FirstMove, Game, GameError, GameErrorKind, GameId, Sign, Status, gamble_sign,
    who_moves_first,
};
use tracing::{debug, info, instrument};

use crate::GameStore;

/// Per-game mutexes, created on demand and dropped once unused.
///
/// Keeps two moves on the same game from interleaving between load and
/// save, without serializing unrelated games.
#[derive(Debug, Clone, Default)]
pub struct MoveLocks {
    table: Arc<Mutex<HashMap<GameId, Arc<Mutex<()>>>>>,
}

impl MoveLocks {
    /// Creates an empty lock table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `f` while holding the lock for `id`.
    ///
    /// # Errors
    ///
    /// Returns `Internal` if a lock is poisoned, otherwise whatever `f` returns.
    pub fn with_lock<T>(
        &self,
        id: &GameId,
        f: impl FnOnce() -> Result<T, GameError>,
    ) -> Result<T, GameError> {
        let entry = {
            let mut table = self.table.lock().map_err(|_| poisoned())?;
            Arc::clone(table.entry(id.clone()).or_default())
        };

        let result = {
            let _guard = entry.lock().map_err(|_| poisoned())?;
            f()
        };

        // Clones are only handed out under the table lock, so a count of two
        // (table + ours) means nobody else is waiting on this entry.
        if let Ok(mut table) = self.table.lock()
            && Arc::strong_count(&entry) == 2
        {
            table.remove(id);
        }

        result
    }

    #[cfg(test)]
    fn active(&self) -> usize {
        self.table.lock().map(|t| t.len()).unwrap_or_default()
    }
}

fn poisoned() -> GameError {
    GameError::new(GameErrorKind::Internal, "move lock poisoned")
}

/// Applies game rules and persists the results.
#[derive(Debug, Clone)]
pub struct GameService {
    store: Arc<dyn GameStore>,
    locks: MoveLocks,
}

impl GameService {
    /// Creates a service over `store`.
    #[instrument(skip(store))]
    pub fn new(store: Arc<dyn GameStore>) -> Self {
        info!("Creating GameService");
        Self {
            store,
            locks: MoveLocks::new(),
        }
    }

    /// Starts a game from the client's opening board and saves it.
    ///
    /// An empty board hands the first move to the computer and draws the
    /// human's side at random; a board with one mark fixes the human's
    /// side to that mark. The computer replies before the game is saved.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for any other board, or a store error.
    #[instrument(skip(self))]
    pub fn create(&self, board: &str) -> Result<Game, GameError> {
        let human = match who_moves_first(board) {
            FirstMove::ComputerMove => gamble_sign().0,
            FirstMove::X => Sign::X,
            FirstMove::O => Sign::O,
            FirstMove::Invalid => {
                return Err(GameError::new(
                    GameErrorKind::InvalidInput,
                    "invalid first board",
                ));
            }
        };

        let board: Board = board.parse()?;
        let mut game = Game::new(board, human);
        game.make_move()?;
        self.store.save(&game)?;

        info!(id = %game.id(), human = %human, board = %game.board(), "Game started");
        Ok(game)
    }

    /// Applies a human move and the computer's reply, then saves.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for a bad id or board, `NotFound`, `Conflict` for a
    /// finished game, `InvalidMove`, or a store error.
    #[instrument(skip(self))]
    pub fn submit_move(&self, id: &str, board: &str) -> Result<Game, GameError> {
        let id = GameId::parse(id)?;

        self.locks.with_lock(&id, || {
            let mut game = self.store.get(&id)?;

            if game.status().is_terminal() {
                return Err(GameError::new(
                    GameErrorKind::Conflict,
                    format!("game already finished with status {}", game.status()),
                ));
            }

            game.set_new_board(board)?;

            if game.check_win(game.user_sign()) == Status::Running {
                game.make_move()?;
                game.check_win(game.comp_sign());
            }

            self.store.save(&game)?;
            debug!(board = %game.board(), status = %game.status(), "Move applied");
            Ok(game)
        })
    }

    /// Loads a game.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for a bad id, or a store error.
    #[instrument(skip(self))]
    pub fn get(&self, id: &str) -> Result<Game, GameError> {
        self.store.get(&GameId::parse(id)?)
    }

    /// Loads a game's stored bytes.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for a bad id, or a store error.
    #[instrument(skip(self))]
    pub fn get_raw(&self, id: &str) -> Result<Vec<u8>, GameError> {
        self.store.get_raw(&GameId::parse(id)?)
    }

    /// Loads every stored game.
    ///
    /// # Errors
    ///
    /// Any store error.
    #[instrument(skip(self))]
    pub fn list(&self) -> Result<Vec<Game>, GameError> {
        self.store.list()
    }

    /// Stored bytes of every game.
    ///
    /// # Errors
    ///
    /// Any store error.
    #[instrument(skip(self))]
    pub fn list_raw(&self) -> Result<Vec<Vec<u8>>, GameError> {
        self.store.list_raw()
    }

    /// Deletes a game.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for a bad id, `NotFound`, or a store error.
    #[instrument(skip(self))]
    pub fn delete(&self, id: &str) -> Result<(), GameError> {
        let id = GameId::parse(id)?;
        self.locks.with_lock(&id, || self.store.delete(&id))?;
        info!(id = %id, "Game deleted");
        Ok(())
    }

    /// Drains the store.
    ///
    /// # Errors
    ///
    /// Whatever the store reports.
    #[instrument(skip(self))]
    pub fn shutdown(&self, grace: Duration) -> Result<(), GameError> {
        self.store.shutdown(grace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_lock_entry_pruned_after_use() {
        let locks = MoveLocks::new();
        let id = GameId::generate(Sign::X);
        let value = locks.with_lock(&id, || Ok(7)).unwrap();
        assert_eq!(value, 7);
        assert_eq!(locks.active(), 0);
    }

    #[test]
    fn test_lock_serializes_same_id() {
        let locks = MoveLocks::new();
        let id = GameId::generate(Sign::O);
        let counter = Arc::new(Mutex::new(Vec::new()));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let locks = locks.clone();
                let id = id.clone();
                let counter = Arc::clone(&counter);
                thread::spawn(move || {
                    locks
                        .with_lock(&id, || {
                            counter.lock().unwrap().push(("enter", i));
                            thread::sleep(Duration::from_millis(2));
                            counter.lock().unwrap().push(("leave", i));
                            Ok(())
                        })
                        .unwrap();
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let events = counter.lock().unwrap();
        for pair in events.chunks(2) {
            assert_eq!(pair[0].0, "enter");
            assert_eq!(pair[1].0, "leave");
            assert_eq!(pair[0].1, pair[1].1);
        }
        assert_eq!(locks.active(), 0);
    }

    #[test]
    fn test_error_from_closure_propagates() {
        let locks = MoveLocks::new();
        let id = GameId::generate(Sign::X);
        let err = locks
            .with_lock::<()>(&id, || {
                Err(GameError::new(GameErrorKind::InvalidMove, "nope"))
            })
            .unwrap_err();
        assert_eq!(err.kind, GameErrorKind::InvalidMove);
        assert_eq!(locks.active(), 0);
    }
}
