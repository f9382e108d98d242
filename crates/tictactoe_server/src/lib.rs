//! Tic-tac-toe REST service.
//!
//! A human plays against a computer that moves at random. Each game is
//! stored as a small JSON record in its own file; replacing a record goes
//! through a backup copy so a crash never leaves a half-written game.
//!
//! The crate is split into:
//! - the file-backed [`GameStore`] ([`FileStore`]),
//! - the [`GameService`] that applies rules and serializes moves per game,
//! - the axum [`router`] exposing `/api/v1/games`,
//! - [`ServerConfig`] for the `tictactoe_server` binary.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod api;
mod config;
mod service;
mod store;

pub use api::{ApiError, AppState, MAX_REQUEST_BODY, router, status_for};
pub use config::{ConfigError, ServerConfig};
pub use service::{GameService, MoveLocks};
pub use store::{BACKUP_EXT, FileStore, GameStore, MAX_RECORD_SIZE};
