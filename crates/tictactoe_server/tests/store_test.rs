//! Tests for the file-per-game store.

use std::fs;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tempfile::TempDir;
use tictactoe_game::{Board, Game, GameErrorKind, GameId, Sign, Status};
use tictactoe_server::{BACKUP_EXT, FileStore, GameStore, MAX_RECORD_SIZE};

/// Opens a store in a fresh directory. The `TempDir` must stay in scope.
fn setup_store() -> (TempDir, FileStore) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let store = FileStore::open(dir.path()).expect("Failed to open store");
    (dir, store)
}

fn game_with(board: &str, human: Sign) -> Game {
    Game::new(board.parse().expect("Invalid board"), human)
}

#[test]
fn test_open_creates_missing_dir() {
    let dir = tempfile::tempdir().unwrap();
    let nested = dir.path().join("a").join("b");
    FileStore::open(&nested).expect("Open failed");
    assert!(nested.is_dir());
}

#[test]
fn test_save_then_get() {
    let (_dir, store) = setup_store();
    let game = game_with("X---O----", Sign::X);
    store.save(&game).expect("Save failed");

    let loaded = store.get(game.id()).expect("Get failed");
    assert_eq!(loaded.id(), game.id());
    assert_eq!(loaded.board(), game.board());
    assert_eq!(*loaded.status(), Status::Running);
    assert_eq!(loaded.user_sign(), Sign::X);
}

#[test]
fn test_get_raw_is_stored_json() {
    let (_dir, store) = setup_store();
    let game = game_with("X---O----", Sign::X);
    store.save(&game).unwrap();

    let raw = store.get_raw(game.id()).unwrap();
    assert_eq!(raw, game.to_json().unwrap());
    let text = String::from_utf8(raw).unwrap();
    assert!(text.starts_with(r#"{"id":""#));
    assert!(text.contains(r#""board":"X---O----""#));
    assert!(text.contains(r#""status":"RUNNING""#));
}

#[test]
fn test_overwrite_leaves_no_backup() {
    let (dir, store) = setup_store();
    let mut game = game_with("X---O----", Sign::X);
    store.save(&game).unwrap();

    game.set_new_board("XX--O----").unwrap();
    store.save(&game).unwrap();

    let loaded = store.get(game.id()).unwrap();
    assert_eq!(loaded.board().to_string(), "XX--O----");

    let backups = fs::read_dir(dir.path())
        .unwrap()
        .filter_map(Result::ok)
        .filter(|e| e.file_name().to_string_lossy().ends_with(BACKUP_EXT))
        .count();
    assert_eq!(backups, 0);
}

#[test]
fn test_missing_record() {
    let (_dir, store) = setup_store();
    let id = GameId::generate(Sign::O);

    assert_eq!(store.get(&id).unwrap_err().kind, GameErrorKind::NotFound);
    assert_eq!(store.get_raw(&id).unwrap_err().kind, GameErrorKind::NotFound);
    assert_eq!(store.delete(&id).unwrap_err().kind, GameErrorKind::NotFound);
    assert!(!store.exists(&id).unwrap());
}

#[test]
fn test_delete_removes_record() {
    let (_dir, store) = setup_store();
    let game = game_with("---------", Sign::O);
    store.save(&game).unwrap();
    assert!(store.exists(game.id()).unwrap());

    store.delete(game.id()).expect("Delete failed");
    assert!(!store.exists(game.id()).unwrap());
    assert_eq!(store.get(game.id()).unwrap_err().kind, GameErrorKind::NotFound);
}

#[test]
fn test_oversized_record_rejected() {
    let (dir, store) = setup_store();
    let id = GameId::generate(Sign::X);
    fs::write(dir.path().join(id.as_str()), vec![b' '; MAX_RECORD_SIZE as usize + 1]).unwrap();

    assert_eq!(store.get(&id).unwrap_err().kind, GameErrorKind::TooLarge);
    assert_eq!(store.get_raw(&id).unwrap_err().kind, GameErrorKind::TooLarge);
}

#[test]
fn test_record_at_size_ceiling_is_read() {
    let (dir, store) = setup_store();
    let id = GameId::generate(Sign::X);
    let content = vec![b' '; MAX_RECORD_SIZE as usize];
    fs::write(dir.path().join(id.as_str()), &content).unwrap();
    assert_eq!(store.get_raw(&id).unwrap(), content);

    fs::write(dir.path().join(id.as_str()), vec![b' '; 64 * 1024]).unwrap();
    assert_eq!(store.get_raw(&id).unwrap_err().kind, GameErrorKind::TooLarge);
}

#[test]
fn test_save_replaces_damaged_record() {
    let (dir, store) = setup_store();
    let game = game_with("X---O----", Sign::X);
    fs::write(dir.path().join(game.id().as_str()), b"{\"id\":").unwrap();
    assert_eq!(store.get(game.id()).unwrap_err().kind, GameErrorKind::Corrupt);

    store.save(&game).expect("Save failed");
    assert_eq!(store.get(game.id()).unwrap(), game);
}

#[test]
fn test_corrupt_records() {
    let (dir, store) = setup_store();

    let empty = GameId::generate(Sign::X);
    fs::write(dir.path().join(empty.as_str()), b"").unwrap();
    assert_eq!(store.get(&empty).unwrap_err().kind, GameErrorKind::Corrupt);

    let garbage = GameId::generate(Sign::X);
    fs::write(dir.path().join(garbage.as_str()), b"{not json").unwrap();
    assert_eq!(store.get(&garbage).unwrap_err().kind, GameErrorKind::Corrupt);
    // Raw reads don't parse.
    assert_eq!(store.get_raw(&garbage).unwrap(), b"{not json");

    let bad_board = GameId::generate(Sign::O);
    let record = format!(
        r#"{{"id":"{}","board":"XXXX","status":"RUNNING"}}"#,
        bad_board
    );
    fs::write(dir.path().join(bad_board.as_str()), record).unwrap();
    assert_eq!(store.get(&bad_board).unwrap_err().kind, GameErrorKind::Corrupt);
}

#[test]
fn test_list_skips_foreign_and_backup_files() {
    let (dir, store) = setup_store();
    let first = game_with("X--------", Sign::X);
    let second = game_with("O--------", Sign::O);
    store.save(&first).unwrap();
    store.save(&second).unwrap();

    fs::write(dir.path().join("README"), b"hello").unwrap();
    fs::write(dir.path().join(format!("{}{}", first.id(), BACKUP_EXT)), b"old").unwrap();
    fs::create_dir(dir.path().join("nested")).unwrap();

    let games = store.list().expect("List failed");
    assert_eq!(games.len(), 2);
    let mut expected = vec![first.id().clone(), second.id().clone()];
    expected.sort();
    let ids: Vec<_> = games.iter().map(|g| g.id().clone()).collect();
    assert_eq!(ids, expected);

    assert_eq!(store.list_raw().unwrap().len(), 2);
}

#[test]
fn test_stray_backup_is_never_read() {
    let (dir, store) = setup_store();
    let id = GameId::generate(Sign::X);
    let game = Game::from_parts(id.clone(), Board::new(), Status::Running);
    fs::write(
        dir.path().join(format!("{}{}", id, BACKUP_EXT)),
        game.to_json().unwrap(),
    )
    .unwrap();

    assert_eq!(store.get(&id).unwrap_err().kind, GameErrorKind::NotFound);
    assert!(store.list().unwrap().is_empty());
}

#[test]
fn test_empty_store_lists_nothing() {
    let (_dir, store) = setup_store();
    assert!(store.list().unwrap().is_empty());
    assert!(store.list_raw().unwrap().is_empty());
}

#[test]
fn test_is_valid_id() {
    let (_dir, store) = setup_store();
    assert!(store.is_valid_id("a0000000-0000-0000-0000-000000000000"));
    assert!(!store.is_valid_id("A0000000-0000-0000-0000-000000000000"));
    assert!(!store.is_valid_id("short"));
}

#[test]
fn test_shutdown_refuses_new_operations() {
    let (_dir, store) = setup_store();
    let game = game_with("---------", Sign::X);
    store.save(&game).unwrap();

    store.shutdown(Duration::from_millis(50)).expect("Shutdown failed");

    assert_eq!(store.get(game.id()).unwrap_err().kind, GameErrorKind::Unavailable);
    assert_eq!(store.save(&game).unwrap_err().kind, GameErrorKind::Unavailable);
    assert_eq!(store.list().unwrap_err().kind, GameErrorKind::Unavailable);
    assert_eq!(store.delete(game.id()).unwrap_err().kind, GameErrorKind::Unavailable);
}

#[test]
fn test_concurrent_saves_and_reads() {
    let (_dir, store) = setup_store();
    let store = Arc::new(store);
    let game = game_with("X--------", Sign::X);
    store.save(&game).unwrap();

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let store = Arc::clone(&store);
            let game = game.clone();
            thread::spawn(move || {
                for _ in 0..20 {
                    if i % 2 == 0 {
                        store.save(&game).expect("Save failed");
                    } else {
                        // Readers never observe the window between backup and write.
                        let loaded = store.get(game.id()).expect("Get failed");
                        assert_eq!(loaded.board(), game.board());
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread panicked");
    }
}
