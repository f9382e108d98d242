//! Game identifiers.
//!
//! Ids are UUID-shaped: 36 characters over `[0-9a-f-]`. The first
//! character records which side the human plays (`a` for X, anything
//! else for O, `f` when generated). Stored records carry only the id, so
//! the mapping is read back here and nowhere else.

use crate::{GameError, GameErrorKind, Sign};
use serde::{Deserialize, Serialize};
use tracing::instrument;

/// Length of a game id.
pub const ID_LEN: usize = 36;

const HUMAN_X_PREFIX: char = 'a';
const HUMAN_O_PREFIX: char = 'f';

/// Validated game identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GameId(String);

impl GameId {
    /// Generates a fresh random id whose first character encodes `human`.
    #[instrument]
    pub fn generate(human: Sign) -> Self {
        let prefix = match human {
            Sign::X => HUMAN_X_PREFIX,
            Sign::O => HUMAN_O_PREFIX,
        };
        let uuid = uuid::Uuid::new_v4().to_string();
        let mut id = String::with_capacity(ID_LEN);
        id.push(prefix);
        id.push_str(&uuid[1..]);
        Self(id)
    }

    /// Parses and validates an id.
    ///
    /// # Errors
    ///
    /// Returns [`GameErrorKind::InvalidInput`] if `s` does not have the id shape.
    pub fn parse(s: &str) -> Result<Self, GameError> {
        if Self::is_valid(s) {
            Ok(Self(s.to_string()))
        } else {
            Err(GameError::new(
                GameErrorKind::InvalidInput,
                format!("invalid game id '{}'", s),
            ))
        }
    }

    /// True if `s` is exactly 36 characters from `[0-9a-f-]`.
    pub fn is_valid(s: &str) -> bool {
        s.len() == ID_LEN
            && s
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b) || b == b'-')
    }

    /// Side played by the human in this game.
    pub fn human_sign(&self) -> Sign {
        if self.0.starts_with(HUMAN_X_PREFIX) {
            Sign::X
        } else {
            Sign::O
        }
    }

    /// Side played by the computer in this game.
    pub fn computer_sign(&self) -> Sign {
        self.human_sign().opponent()
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for GameId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for GameId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for GameId {
    type Error = GameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if Self::is_valid(&value) {
            Ok(Self(value))
        } else {
            Err(GameError::new(
                GameErrorKind::InvalidInput,
                format!("invalid game id '{}'", value),
            ))
        }
    }
}

impl From<GameId> for String {
    fn from(id: GameId) -> Self {
        id.0
    }
}

/// Side played by the human in the game with this id.
pub fn user_sign(id: &GameId) -> Sign {
    id.human_sign()
}

/// Side played by the computer in the game with this id.
pub fn comp_sign(id: &GameId) -> Sign {
    id.computer_sign()
}
