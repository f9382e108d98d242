//! Tic-tac-toe game engine.
//!
//! Pure state and transition logic over a 9-cell board:
//!
//! - **Identity**: [`GameId`] generation and the human/computer side it encodes
//! - **Validation**: [`Game::set_new_board`] accepts exactly one new human mark
//! - **Evaluation**: [`Game::check_win`] records wins and draws
//! - **Opponent**: [`Game::make_move`] plays a uniformly random empty cell
//!
//! The engine knows nothing about persistence beyond the record codec.
//!
//! # Example
//!
//! ```
//! use tictactoe_game::{Game, Sign, Status};
//!
//! let mut game = Game::new("----X----".parse()?, Sign::X);
//! game.make_move()?;
//! assert_eq!(game.check_win(game.comp_sign()), Status::Running);
//! # Ok::<(), tictactoe_game::GameError>(())
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
mod game;
mod id;
pub mod rules;
mod types;

pub use error::{GameError, GameErrorKind};
pub use game::{FirstMove, Game, gamble_sign, gamble_sign_with, who_moves_first};
pub use id::{GameId, ID_LEN, comp_sign, user_sign};
pub use types::{BOARD_SIZE, Board, EMPTY_CHAR, Sign, Square, Status};
