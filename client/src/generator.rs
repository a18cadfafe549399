use rand::Rng;
use tracing::{debug, instrument};

use crate::board::{Board, MIN_SIZE};

/// `max(1, floor(size² × density))`, never more than the cell count.
pub fn mine_count(size: usize, density: f64) -> usize {
    let cells = size * size;
    let wanted = (cells as f64 * density).floor() as usize;
    wanted.max(1).min(cells)
}

/// Places mines by drawing uniform random cells and rejecting duplicates.
/// There is no first-click protection: any layout is possible.
#[instrument(level = "trace", skip(rng))]
pub fn generate<R: Rng + ?Sized>(size: usize, density: f64, rng: &mut R) -> Board {
    debug_assert!(size >= MIN_SIZE, "callers clamp board size");

    let mines = mine_count(size, density);
    let mut mask = vec![false; size * size];
    let mut placed = 0;
    while placed < mines {
        let row = rng.random_range(0..size);
        let col = rng.random_range(0..size);
        let index = row * size + col;
        if !mask[index] {
            mask[index] = true;
            placed += 1;
        }
    }

    debug!("Generated {}x{} board with {} mines", size, size, mines);
    Board::from_mine_mask(size, &mask)
}
