//! File-per-game store.

use std::fs;
use std::io::{self, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard, TryLockError};
use std::time::{Duration, Instant};

use tictactoe_game::{Game, GameError, GameErrorKind, GameId};
use tracing::{debug, info, instrument, warn};

use super::GameStore;

/// Largest record the store will read, in bytes.
pub const MAX_RECORD_SIZE: u64 = 512;

/// Suffix of the copy kept while a record is being replaced.
pub const BACKUP_EXT: &str = ".bak";

const WRITE_CHECK_FILE: &str = ".write-check";
const SHUTDOWN_POLL: Duration = Duration::from_millis(10);

/// Stores each game as `<dir>/<id>` holding the JSON record.
///
/// One reader/writer lock covers the whole directory: reads share it,
/// `save` and `delete` hold it exclusively for their full sequence.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    lock: RwLock<()>,
    closed: AtomicBool,
    disk: Box<dyn Disk>,
}

/// File mutations that can fail halfway: writing a record and removing one.
trait Disk: Send + Sync + std::fmt::Debug {
    fn write_synced(&self, path: &Path, buf: &[u8]) -> io::Result<()>;
    fn remove_file(&self, path: &Path) -> io::Result<()>;
}

#[derive(Debug)]
struct OsDisk;

impl Disk for OsDisk {
    fn write_synced(&self, path: &Path, buf: &[u8]) -> io::Result<()> {
        let mut file = fs::File::create(path)?;
        file.write_all(buf)?;
        file.sync_all()
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }
}

/// State of the primary record before it is replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Primary {
    Absent,
    Intact,
    Damaged,
}

impl FileStore {
    /// Opens a store rooted at `path`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an `Io` error if the directory can't be created or written.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self, GameError> {
        Self::open_with(path.as_ref(), Box::new(OsDisk))
    }

    fn open_with(path: &Path, disk: Box<dyn Disk>) -> Result<Self, GameError> {
        let path = path.to_path_buf();

        fs::create_dir_all(&path).map_err(|e| {
            GameError::new(
                GameErrorKind::Io,
                format!("can't create storage dir {}: {}", path.display(), e),
            )
        })?;

        let marker = path.join(WRITE_CHECK_FILE);
        fs::write(&marker, b"").map_err(|e| {
            GameError::new(
                GameErrorKind::Io,
                format!("can't create test storage file: {}", e),
            )
        })?;
        fs::remove_file(&marker).map_err(|e| {
            GameError::new(
                GameErrorKind::Io,
                format!("can't remove test storage file: {}", e),
            )
        })?;

        info!(path = %path.display(), "Opened game storage");
        Ok(Self {
            path,
            lock: RwLock::new(()),
            closed: AtomicBool::new(false),
            disk,
        })
    }

    fn record_path(&self, id: &GameId) -> PathBuf {
        self.path.join(id.as_str())
    }

    fn backup_path(&self, id: &GameId) -> PathBuf {
        self.path.join(format!("{}{}", id, BACKUP_EXT))
    }

    fn ensure_open(&self) -> Result<(), GameError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(GameError::new(
                GameErrorKind::Unavailable,
                "storage is shut down",
            ));
        }
        Ok(())
    }

    fn read_guard(&self) -> Result<RwLockReadGuard<'_, ()>, GameError> {
        let guard = self
            .lock
            .read()
            .map_err(|_| GameError::new(GameErrorKind::Internal, "storage lock poisoned"))?;
        self.ensure_open()?;
        Ok(guard)
    }

    fn write_guard(&self) -> Result<RwLockWriteGuard<'_, ()>, GameError> {
        let guard = self
            .lock
            .write()
            .map_err(|_| GameError::new(GameErrorKind::Internal, "storage lock poisoned"))?;
        self.ensure_open()?;
        Ok(guard)
    }

    /// Reads a record's bytes, never more than the size ceiling. Caller
    /// holds the lock.
    fn read_record(&self, id: &GameId) -> Result<Vec<u8>, GameError> {
        let file = match fs::File::open(self.record_path(id)) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(GameError::new(
                    GameErrorKind::NotFound,
                    format!("game {} not exists", id),
                ));
            }
            Err(e) => {
                return Err(GameError::new(
                    GameErrorKind::Io,
                    format!("can't open game file: {}", e),
                ));
            }
        };

        let mut content = Vec::new();
        file.take(MAX_RECORD_SIZE + 1)
            .read_to_end(&mut content)
            .map_err(|e| {
                GameError::new(
                    GameErrorKind::Io,
                    format!("can't read file content: {}", e),
                )
            })?;

        if content.len() as u64 > MAX_RECORD_SIZE {
            return Err(GameError::new(
                GameErrorKind::TooLarge,
                format!("game file exceeds {} bytes", MAX_RECORD_SIZE),
            ));
        }
        Ok(content)
    }

    /// Classifies the record about to be replaced. Caller holds the lock.
    fn inspect_primary(&self, id: &GameId) -> Result<Primary, GameError> {
        match self.read_record(id) {
            Ok(content) => match Self::parse_record(id, &content) {
                Ok(_) => Ok(Primary::Intact),
                Err(_) => Ok(Primary::Damaged),
            },
            Err(e) if e.kind == GameErrorKind::NotFound => Ok(Primary::Absent),
            Err(e) if e.kind == GameErrorKind::TooLarge => Ok(Primary::Damaged),
            Err(e) => Err(e),
        }
    }

    /// Parses bytes read for `id`, checking they describe that game.
    fn parse_record(id: &GameId, content: &[u8]) -> Result<Game, GameError> {
        if content.is_empty() {
            return Err(GameError::new(
                GameErrorKind::Corrupt,
                "file content has zero size",
            ));
        }

        let game = Game::from_json(content)?;
        if game.id() != id {
            return Err(GameError::new(
                GameErrorKind::Corrupt,
                format!("game file {} holds game {}", id, game.id()),
            ));
        }
        Ok(game)
    }

    /// Valid ids present in the directory, sorted. Caller holds the lock.
    fn list_ids(&self) -> Result<Vec<GameId>, GameError> {
        let entries = fs::read_dir(&self.path).map_err(|e| {
            GameError::new(
                GameErrorKind::Io,
                format!("can't read storage dir: {}", e),
            )
        })?;

        let mut ids = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| {
                GameError::new(
                    GameErrorKind::Io,
                    format!("can't read storage dir entry: {}", e),
                )
            })?;
            let name = entry.file_name();
            let name = name.to_string_lossy();

            match GameId::parse(&name) {
                Ok(id) if entry.path().is_file() => ids.push(id),
                Ok(_) => warn!(entry = %name, "Non-file entry with game id name in storage"),
                Err(_) => match name.strip_suffix(BACKUP_EXT) {
                    Some(stem) if GameId::is_valid(stem) => {
                        debug!(entry = %name, "Skipping stray backup file");
                    }
                    _ => warn!(
                        entry = %name,
                        "Invalid game id detected in storage. Remove it manually"
                    ),
                },
            }
        }

        ids.sort();
        Ok(ids)
    }
}

impl GameStore for FileStore {
    #[instrument(skip(self, id), fields(id = %id))]
    fn get(&self, id: &GameId) -> Result<Game, GameError> {
        let _guard = self.read_guard()?;
        let content = self.read_record(id)?;
        Self::parse_record(id, &content)
    }

    #[instrument(skip(self, id), fields(id = %id))]
    fn get_raw(&self, id: &GameId) -> Result<Vec<u8>, GameError> {
        let _guard = self.read_guard()?;
        self.read_record(id)
    }

    #[instrument(skip(self))]
    fn list(&self) -> Result<Vec<Game>, GameError> {
        let _guard = self.read_guard()?;
        let games = self
            .list_ids()?
            .iter()
            .map(|id| Self::parse_record(id, &self.read_record(id)?))
            .collect::<Result<Vec<_>, _>>()?;
        debug!(count = games.len(), "Games listed");
        Ok(games)
    }

    #[instrument(skip(self))]
    fn list_raw(&self) -> Result<Vec<Vec<u8>>, GameError> {
        let _guard = self.read_guard()?;
        let records = self
            .list_ids()?
            .iter()
            .map(|id| self.read_record(id))
            .collect::<Result<Vec<_>, _>>()?;
        debug!(count = records.len(), "Raw games listed");
        Ok(records)
    }

    #[instrument(skip(self, game), fields(id = %game.id(), status = %game.status()))]
    fn save(&self, game: &Game) -> Result<(), GameError> {
        let buf = game.to_json()?;

        let _guard = self.write_guard()?;
        let fname = self.record_path(game.id());
        let backup = self.backup_path(game.id());

        // A damaged primary never replaces the backup, which may hold the
        // last good copy.
        match self.inspect_primary(game.id())? {
            Primary::Intact => fs::rename(&fname, &backup).map_err(|e| {
                GameError::new(
                    GameErrorKind::Io,
                    format!("can't create game file backup: {}", e),
                )
            })?,
            Primary::Damaged => warn!("Replacing damaged game file, existing backup kept"),
            Primary::Absent => {}
        }

        self.disk.write_synced(&fname, &buf).map_err(|e| {
            GameError::new(
                GameErrorKind::Io,
                format!("can't write game file: {}", e),
            )
        })?;

        match backup.try_exists() {
            Ok(true) => {
                if let Err(e) = self.disk.remove_file(&backup) {
                    warn!(
                        backup = %backup.display(),
                        error = %e,
                        "Can't remove backup file"
                    );
                }
            }
            Ok(false) => {}
            Err(e) => warn!(
                backup = %backup.display(),
                error = %e,
                "Can't check backup file"
            ),
        }

        debug!(bytes = buf.len(), "Game saved");
        Ok(())
    }

    #[instrument(skip(self, id), fields(id = %id))]
    fn delete(&self, id: &GameId) -> Result<(), GameError> {
        let _guard = self.write_guard()?;

        match self.disk.remove_file(&self.record_path(id)) {
            Ok(()) => {
                debug!("Game deleted");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Err(GameError::new(
                GameErrorKind::NotFound,
                format!("game {} not found", id),
            )),
            Err(e) => Err(GameError::new(
                GameErrorKind::Io,
                format!("can't remove game file: {}", e),
            )),
        }
    }

    #[instrument(skip(self, id), fields(id = %id))]
    fn exists(&self, id: &GameId) -> Result<bool, GameError> {
        let _guard = self.read_guard()?;
        self.record_path(id).try_exists().map_err(|e| {
            GameError::new(
                GameErrorKind::Io,
                format!("error while checking file: {}", e),
            )
        })
    }

    #[instrument(skip(self))]
    fn shutdown(&self, grace: Duration) -> Result<(), GameError> {
        let deadline = Instant::now() + grace;

        loop {
            match self.lock.try_write() {
                Ok(_guard) => {
                    self.closed.store(true, Ordering::SeqCst);
                    info!("Storage drained and closed");
                    return Ok(());
                }
                Err(TryLockError::Poisoned(_)) => {
                    self.closed.store(true, Ordering::SeqCst);
                    warn!("Storage lock poisoned during shutdown");
                    return Ok(());
                }
                Err(TryLockError::WouldBlock) if Instant::now() >= deadline => {
                    self.closed.store(true, Ordering::SeqCst);
                    warn!(?grace, "Storage operations still running after grace period");
                    return Ok(());
                }
                Err(TryLockError::WouldBlock) => std::thread::sleep(SHUTDOWN_POLL),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tictactoe_game::{Board, Sign};

    /// Disk that can fail writes halfway through or refuse removals.
    #[derive(Debug, Default)]
    struct FaultyDisk {
        fail_write: bool,
        fail_remove: bool,
    }

    impl Disk for FaultyDisk {
        fn write_synced(&self, path: &Path, buf: &[u8]) -> io::Result<()> {
            if self.fail_write {
                fs::write(path, &buf[..buf.len() / 2])?;
                return Err(io::Error::other("disk full"));
            }
            OsDisk.write_synced(path, buf)
        }

        fn remove_file(&self, path: &Path) -> io::Result<()> {
            if self.fail_remove {
                return Err(io::Error::new(ErrorKind::PermissionDenied, "read-only"));
            }
            OsDisk.remove_file(path)
        }
    }

    fn faulty_store(path: &Path, disk: FaultyDisk) -> FileStore {
        FileStore::open_with(path, Box::new(disk)).unwrap()
    }

    #[test]
    fn test_backup_path_is_not_an_id() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        let id = GameId::generate(Sign::X);
        let backup = store.backup_path(&id);
        let name = backup.file_name().unwrap().to_string_lossy().into_owned();
        assert!(!GameId::is_valid(&name));
        assert!(name.ends_with(BACKUP_EXT));
    }

    #[test]
    fn test_write_check_file_removed() {
        let dir = tempfile::tempdir().unwrap();
        let _store = FileStore::open(dir.path()).unwrap();
        assert!(!dir.path().join(WRITE_CHECK_FILE).exists());
    }

    #[test]
    fn test_parse_record_checks_id() {
        let game = Game::new(Board::new(), Sign::O);
        let other = GameId::generate(Sign::O);
        let bytes = game.to_json().unwrap();
        let err = FileStore::parse_record(&other, &bytes).unwrap_err();
        assert_eq!(err.kind, GameErrorKind::Corrupt);
        let err = FileStore::parse_record(game.id(), b"").unwrap_err();
        assert_eq!(err.kind, GameErrorKind::Corrupt);
    }

    #[test]
    fn test_failed_write_keeps_backup() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        let mut game = Game::new("X--------".parse().unwrap(), Sign::X);
        store.save(&game).unwrap();
        let good = fs::read(store.record_path(game.id())).unwrap();
        let backup = store.backup_path(game.id());

        game.set_new_board("XX-------").unwrap();
        let faulty = faulty_store(
            dir.path(),
            FaultyDisk {
                fail_write: true,
                ..Default::default()
            },
        );
        let err = faulty.save(&game).unwrap_err();
        assert_eq!(err.kind, GameErrorKind::Io);
        assert_eq!(fs::read(&backup).unwrap(), good);
        assert_eq!(
            store.get(game.id()).unwrap_err().kind,
            GameErrorKind::Corrupt
        );

        // The truncated primary must not be rotated over the good copy.
        faulty.save(&game).unwrap_err();
        assert_eq!(fs::read(&backup).unwrap(), good);

        store.save(&game).unwrap();
        assert_eq!(store.get(game.id()).unwrap(), game);
        assert!(!backup.exists());
    }

    #[test]
    fn test_backup_removal_failure_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let store = faulty_store(
            dir.path(),
            FaultyDisk {
                fail_remove: true,
                ..Default::default()
            },
        );
        let mut game = Game::new("O--------".parse().unwrap(), Sign::O);
        store.save(&game).unwrap();
        let first = game.to_json().unwrap();

        game.set_new_board("OO-------").unwrap();
        store.save(&game).expect("Save failed despite written record");

        assert_eq!(store.get(game.id()).unwrap(), game);
        assert_eq!(fs::read(store.backup_path(game.id())).unwrap(), first);
        assert_eq!(store.list().unwrap(), vec![game]);
    }

    #[test]
    fn test_damaged_primary_without_backup_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        let game = Game::new(Board::new(), Sign::X);
        fs::write(store.record_path(game.id()), b"{\"id\":").unwrap();

        store.save(&game).unwrap();
        assert_eq!(store.get(game.id()).unwrap(), game);
        assert!(!store.backup_path(game.id()).exists());
    }
}
