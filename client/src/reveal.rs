use sweeper_common::models::{CellUpdate, Pos};
use tracing::{debug, trace};

use crate::board::{Board, GameOutcome};

/// Cells changed by one reveal, in reveal order, plus the resulting outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevealResult {
    pub changed: Vec<CellUpdate>,
    pub outcome: GameOutcome,
}

impl RevealResult {
    pub(crate) fn unchanged(outcome: GameOutcome) -> Self {
        Self {
            changed: Vec::new(),
            outcome,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.changed.is_empty()
    }
}

fn update(board: &Board, pos: Pos) -> Option<CellUpdate> {
    board.display(pos).map(|value| CellUpdate { pos, value })
}

/// Reveals `pos`, expanding through zero-adjacency cells.
///
/// Covered, unflagged cells are opened depth-first in neighbor scan order,
/// using an explicit stack. Revealed cells are never visited twice, so at most
/// one update per cell is produced. Flagged cells block both the initial
/// reveal and expansion into them.
pub fn reveal(board: &mut Board, pos: Pos) -> RevealResult {
    let Some(cell) = board.cell(pos) else {
        return RevealResult::unchanged(board.outcome());
    };
    if cell.is_revealed() || cell.is_flagged() {
        return RevealResult::unchanged(board.outcome());
    }

    if cell.has_mine() {
        return reveal_single(board, pos);
    }

    let mut changed = Vec::new();
    let mut stack = vec![pos];
    while let Some(next) = stack.pop() {
        if !board.mark_revealed(next) {
            continue;
        }
        changed.extend(update(board, next));

        let opens_neighbors = board
            .cell(next)
            .is_some_and(|cell| cell.adjacent_mines() == 0);
        if opens_neighbors {
            let pending: Vec<Pos> = board
                .neighbors(next)
                .filter(|&neighbor| {
                    board.cell(neighbor).is_some_and(|cell| {
                        !cell.is_revealed() && !cell.is_flagged() && !cell.has_mine()
                    })
                })
                .collect();
            stack.extend(pending.into_iter().rev());
        }
    }

    let outcome = board.outcome();
    debug!("Revealed {} cells from {}, outcome {:?}", changed.len(), pos, outcome);
    RevealResult { changed, outcome }
}

/// Reveals exactly one cell without expansion.
pub fn reveal_single(board: &mut Board, pos: Pos) -> RevealResult {
    let blocked = board
        .cell(pos)
        .is_none_or(|cell| cell.is_revealed() || cell.is_flagged());
    if blocked || !board.mark_revealed(pos) {
        return RevealResult::unchanged(board.outcome());
    }

    let outcome = board.outcome();
    trace!("Revealed single cell {}, outcome {:?}", pos, outcome);
    RevealResult {
        changed: update(board, pos).into_iter().collect(),
        outcome,
    }
}

#[cfg(test)]
mod tests {
    use rand::{Rng, SeedableRng, rngs::StdRng};
    use sweeper_common::models::Cell;

    use super::*;
    use crate::generator::generate;

    fn revealed(board: &Board) -> Vec<Pos> {
        board
            .positions()
            .filter(|&pos| board.cell(pos).unwrap().is_revealed())
            .collect()
    }

    #[test]
    fn corner_reveal_floods_whole_board() {
        let mut board = Board::with_mines(3, &[Pos::new(0, 0)]);

        let result = reveal(&mut board, Pos::new(2, 2));

        let order: Vec<Pos> = result.changed.iter().map(|update| update.pos).collect();
        assert_eq!(
            order,
            vec![
                Pos::new(2, 2),
                Pos::new(1, 1),
                Pos::new(1, 2),
                Pos::new(0, 1),
                Pos::new(0, 2),
                Pos::new(2, 1),
                Pos::new(1, 0),
                Pos::new(2, 0),
            ]
        );
        assert_eq!(result.changed[1].value, Cell::Revealed { adjacent: 1 });
        assert_eq!(result.changed[0].value, Cell::Revealed { adjacent: 0 });
        assert_eq!(result.outcome, GameOutcome::Won);
        assert!(!board.cell(Pos::new(0, 0)).unwrap().is_revealed());
    }

    #[test]
    fn revealing_mine_loses_and_touches_nothing_else() {
        let mut board = Board::with_mines(3, &[Pos::new(0, 0)]);

        let result = reveal(&mut board, Pos::new(0, 0));

        assert_eq!(
            result.changed,
            vec![CellUpdate {
                pos: Pos::new(0, 0),
                value: Cell::Mine
            }]
        );
        assert_eq!(result.outcome, GameOutcome::Lost(Pos::new(0, 0)));
        assert_eq!(revealed(&board), vec![Pos::new(0, 0)]);
    }

    #[test]
    fn digit_cell_does_not_expand() {
        let mut board = Board::with_mines(3, &[Pos::new(0, 0)]);

        let result = reveal(&mut board, Pos::new(1, 1));

        assert_eq!(result.changed.len(), 1);
        assert_eq!(result.changed[0].value, Cell::Revealed { adjacent: 1 });
        assert_eq!(result.outcome, GameOutcome::InProgress);
    }

    #[test]
    fn second_reveal_is_a_no_op() {
        let mut board = Board::with_mines(5, &[Pos::new(0, 0), Pos::new(4, 4)]);

        let first = reveal(&mut board, Pos::new(2, 2));
        let after_first = revealed(&board);
        let second = reveal(&mut board, Pos::new(2, 2));

        assert!(!first.is_empty());
        assert!(second.is_empty());
        assert_eq!(second.outcome, first.outcome);
        assert_eq!(revealed(&board), after_first);
    }

    #[test]
    fn flags_block_reveal_and_expansion() {
        let mut board = Board::with_mines(4, &[Pos::new(0, 0)]);
        board.toggle_flag(Pos::new(3, 3));
        board.toggle_flag(Pos::new(2, 0));

        assert!(reveal(&mut board, Pos::new(3, 3)).is_empty());

        let result = reveal(&mut board, Pos::new(3, 2));

        assert!(result.changed.iter().all(|update| update.pos != Pos::new(3, 3)));
        assert!(result.changed.iter().all(|update| update.pos != Pos::new(2, 0)));
        assert!(!board.cell(Pos::new(3, 3)).unwrap().is_revealed());
        assert_eq!(result.outcome, GameOutcome::InProgress);
    }

    #[test]
    fn out_of_bounds_is_ignored() {
        let mut board = Board::with_mines(3, &[Pos::new(0, 0)]);

        let result = reveal(&mut board, Pos::new(3, 0));

        assert!(result.is_empty());
        assert_eq!(result.outcome, GameOutcome::InProgress);
    }

    #[test]
    fn flood_fill_never_revisits() {
        let mut rng = StdRng::seed_from_u64(2024);
        for _ in 0..50 {
            let size = rng.random_range(3..20);
            let mut board = generate(size, 0.1, &mut rng);
            let pos = Pos::new(rng.random_range(0..size), rng.random_range(0..size));

            let result = reveal(&mut board, pos);

            let mut seen: Vec<Pos> = result.changed.iter().map(|update| update.pos).collect();
            let total = seen.len();
            seen.sort();
            seen.dedup();
            assert_eq!(seen.len(), total);
            assert!(total <= size * size);
        }
    }

    #[test]
    fn revealed_mine_loses_regardless_of_order() {
        let mines = [Pos::new(0, 0)];
        let safe = [Pos::new(2, 2), Pos::new(0, 1), Pos::new(1, 0)];

        let mut forward = Board::with_mines(3, &mines);
        for pos in safe {
            reveal_single(&mut forward, pos);
        }
        reveal_single(&mut forward, Pos::new(0, 0));

        let mut backward = Board::with_mines(3, &mines);
        reveal_single(&mut backward, Pos::new(0, 0));
        for pos in safe.iter().rev() {
            reveal_single(&mut backward, *pos);
        }

        assert_eq!(forward.outcome(), GameOutcome::Lost(Pos::new(0, 0)));
        assert_eq!(backward.outcome(), GameOutcome::Lost(Pos::new(0, 0)));
    }

    #[test]
    fn single_reveal_never_expands() {
        let mut board = Board::with_mines(8, &[Pos::new(7, 7)]);

        let result = reveal_single(&mut board, Pos::new(1, 1));

        assert_eq!(result.changed.len(), 1);
        assert_eq!(revealed(&board), vec![Pos::new(1, 1)]);
        assert_eq!(result.outcome, GameOutcome::InProgress);
    }
}
