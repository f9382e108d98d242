//! Win detection.

use crate::{Board, Sign, Square};
use tracing::instrument;

/// The eight winning lines: rows, columns, diagonals.
const LINES: [[usize; 3]; 8] = [
    // Rows
    [0, 1, 2],
    [3, 4, 5],
    [6, 7, 8],
    // Columns
    [0, 3, 6],
    [1, 4, 7],
    [2, 5, 8],
    // Diagonals
    [0, 4, 8],
    [2, 4, 6],
];

/// Checks whether `sign` holds any complete line.
#[instrument(level = "trace", skip(board), fields(board = %board))]
pub fn has_line(board: &Board, sign: Sign) -> bool {
    let target = Some(Square::Occupied(sign));
    LINES
        .iter()
        .any(|line| line.iter().all(|&pos| board.get(pos) == target))
}
