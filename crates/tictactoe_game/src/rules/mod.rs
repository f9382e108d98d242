//! Game rules for tic-tac-toe.
//!
//! Pure functions over a [`Board`](crate::Board); the record type applies
//! them and owns the resulting status.

pub mod draw;
pub mod win;

pub use draw::is_full;
pub use win::has_line;
