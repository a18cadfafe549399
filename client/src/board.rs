use std::collections::BTreeMap;

use sweeper_common::models::{Cell, CellRecord, Pos};

use crate::error::BoardError;

pub const MIN_SIZE: usize = 3;

/// Neighbor scan order: NW, N, NE, W, E, SW, S, SE.
const NEIGHBOR_OFFSETS: [(isize, isize); 8] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameOutcome {
    InProgress,
    Won,
    Lost(Pos),
}

impl GameOutcome {
    pub const fn is_terminal(self) -> bool {
        !matches!(self, GameOutcome::InProgress)
    }

    pub const fn banner(self) -> Option<Banner> {
        match self {
            GameOutcome::InProgress => None,
            GameOutcome::Won => Some(Banner::Win),
            GameOutcome::Lost(_) => Some(Banner::Loss),
        }
    }
}

/// Terminal banner shown over the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Banner {
    Win,
    Loss,
}

impl Banner {
    pub const fn title(self) -> &'static str {
        match self {
            Banner::Win => "YOU WIN! 🎉",
            Banner::Loss => "GAME OVER 💀",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BoardCell {
    has_mine: bool,
    adjacent_mines: u8,
    revealed: bool,
    flagged: bool,
}

impl BoardCell {
    pub fn has_mine(&self) -> bool {
        self.has_mine
    }

    pub fn adjacent_mines(&self) -> u8 {
        self.adjacent_mines
    }

    pub fn is_revealed(&self) -> bool {
        self.revealed
    }

    pub fn is_flagged(&self) -> bool {
        self.flagged
    }

    pub fn display(&self) -> Cell {
        match (self.revealed, self.has_mine, self.flagged) {
            (true, true, _) => Cell::Mine,
            (true, false, _) => Cell::Revealed {
                adjacent: self.adjacent_mines,
            },
            (false, _, true) => Cell::Flagged,
            (false, _, false) => Cell::Hidden,
        }
    }

    pub fn record(&self) -> CellRecord {
        CellRecord {
            has_mine: self.has_mine,
            adjacent_mines: self.adjacent_mines,
            revealed: self.revealed,
        }
    }
}

/// Square minefield. Mine placement and adjacency counts are fixed at
/// construction; `revealed` only ever goes from false to true.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    size: usize,
    cells: Vec<BoardCell>,
    mines: usize,
    revealed_safe: usize,
    tripped: Option<Pos>,
}

impl Board {
    /// Builds a board with mines at the given positions. Positions outside the
    /// grid are ignored.
    pub fn with_mines(size: usize, mines: &[Pos]) -> Self {
        let mut mask = vec![false; size * size];
        for pos in mines {
            if pos.row < size && pos.col < size {
                mask[pos.row * size + pos.col] = true;
            }
        }
        Self::from_mine_mask(size, &mask)
    }

    pub(crate) fn from_mine_mask(size: usize, mask: &[bool]) -> Self {
        let mut board = Self {
            size,
            cells: mask
                .iter()
                .map(|&has_mine| BoardCell {
                    has_mine,
                    ..BoardCell::default()
                })
                .collect(),
            mines: mask.iter().filter(|&&mine| mine).count(),
            revealed_safe: 0,
            tripped: None,
        };

        for row in 0..size {
            for col in 0..size {
                let pos = Pos::new(row, col);
                if board.cells[row * size + col].has_mine {
                    continue;
                }
                let count = board
                    .neighbors(pos)
                    .filter(|&neighbor| board.cells[board.index(neighbor)].has_mine)
                    .count();
                board.cells[row * size + col].adjacent_mines = count as u8;
            }
        }

        board
    }

    /// Rebuilds a board from its flattened document form.
    pub fn from_records(records: &BTreeMap<String, CellRecord>) -> Result<Self, BoardError> {
        let count = records.len();
        let size = (count as f64).sqrt().round() as usize;
        if size == 0 || size * size != count {
            return Err(BoardError::NotSquare(count));
        }

        let mut slots: Vec<Option<CellRecord>> = vec![None; count];
        for (key, record) in records {
            let pos = Pos::from_key(key).ok_or_else(|| BoardError::InvalidKey(key.clone()))?;
            if pos.row >= size || pos.col >= size {
                return Err(BoardError::OutOfBounds {
                    key: key.clone(),
                    size,
                });
            }
            slots[pos.row * size + pos.col] = Some(*record);
        }

        let mut board = Self {
            size,
            cells: Vec::with_capacity(count),
            mines: 0,
            revealed_safe: 0,
            tripped: None,
        };

        for (index, slot) in slots.into_iter().enumerate() {
            let pos = Pos::new(index / size, index % size);
            let record = slot.ok_or_else(|| BoardError::MissingCell(pos.key()))?;
            if record.has_mine {
                board.mines += 1;
                if record.revealed && board.tripped.is_none() {
                    board.tripped = Some(pos);
                }
            } else if record.revealed {
                board.revealed_safe += 1;
            }
            board.cells.push(BoardCell {
                has_mine: record.has_mine,
                adjacent_mines: record.adjacent_mines,
                revealed: record.revealed,
                flagged: false,
            });
        }

        Ok(board)
    }

    /// Flattens the board into `"row_col"` keyed records.
    pub fn to_records(&self) -> BTreeMap<String, CellRecord> {
        self.positions()
            .map(|pos| (pos.key(), self.cells[self.index(pos)].record()))
            .collect()
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn mine_count(&self) -> usize {
        self.mines
    }

    pub fn contains(&self, pos: Pos) -> bool {
        pos.row < self.size && pos.col < self.size
    }

    fn index(&self, pos: Pos) -> usize {
        pos.row * self.size + pos.col
    }

    pub fn cell(&self, pos: Pos) -> Option<&BoardCell> {
        if self.contains(pos) {
            self.cells.get(self.index(pos))
        } else {
            None
        }
    }

    pub fn display(&self, pos: Pos) -> Option<Cell> {
        self.cell(pos).map(BoardCell::display)
    }

    /// Row-major iteration over every position.
    pub fn positions(&self) -> impl Iterator<Item = Pos> + use<> {
        let size = self.size;
        (0..size * size).map(move |index| Pos::new(index / size, index % size))
    }

    /// In-grid 8-neighbors of `pos`, no wraparound.
    pub fn neighbors(&self, pos: Pos) -> impl Iterator<Item = Pos> + use<> {
        let size = self.size;
        NEIGHBOR_OFFSETS.iter().filter_map(move |&(dr, dc)| {
            let row = pos.row.checked_add_signed(dr)?;
            let col = pos.col.checked_add_signed(dc)?;
            (row < size && col < size).then_some(Pos::new(row, col))
        })
    }

    /// Number of mine-free cells not yet revealed.
    pub fn safe_cells_left(&self) -> usize {
        self.cells.len() - self.mines - self.revealed_safe
    }

    pub fn tripped_mine(&self) -> Option<Pos> {
        self.tripped
    }

    /// Outcome implied by the current cell states.
    pub fn outcome(&self) -> GameOutcome {
        if let Some(pos) = self.tripped {
            GameOutcome::Lost(pos)
        } else if self.safe_cells_left() == 0 {
            GameOutcome::Won
        } else {
            GameOutcome::InProgress
        }
    }

    /// Marks a cell revealed. Returns `false` if it already was.
    pub(crate) fn mark_revealed(&mut self, pos: Pos) -> bool {
        let index = self.index(pos);
        let cell = &mut self.cells[index];
        if cell.revealed {
            return false;
        }
        cell.revealed = true;
        cell.flagged = false;
        if cell.has_mine {
            self.tripped.get_or_insert(pos);
        } else {
            self.revealed_safe += 1;
        }
        true
    }

    /// Flips the flag on a covered cell. Returns the new flag state, or `None`
    /// when the cell is revealed or outside the grid.
    pub fn toggle_flag(&mut self, pos: Pos) -> Option<bool> {
        if !self.contains(pos) {
            return None;
        }
        let index = self.index(pos);
        let cell = &mut self.cells[index];
        if cell.revealed {
            return None;
        }
        cell.flagged = !cell.flagged;
        Some(cell.flagged)
    }
}
