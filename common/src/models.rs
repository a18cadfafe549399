use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};

/// What the presentation layer draws for a single cell.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(tag = "state")]
pub enum Cell {
    #[serde(rename = "hidden")]
    Hidden,
    #[serde(rename = "flagged")]
    Flagged,
    #[serde(rename = "revealed")]
    Revealed { adjacent: u8 },
    #[serde(rename = "mine")]
    Mine,
}

impl Cell {
    /// Text drawn on the cell button.
    pub fn label(&self) -> String {
        match self {
            Cell::Hidden | Cell::Revealed { adjacent: 0 } => String::new(),
            Cell::Flagged => "🚩".to_string(),
            Cell::Revealed { adjacent } => adjacent.to_string(),
            Cell::Mine => "💣".to_string(),
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pos {
    pub row: usize,
    pub col: usize,
}

impl Pos {
    pub const fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    /// Composite `"row_col"` key used by the flattened board.
    pub fn key(&self) -> String {
        format!("{}_{}", self.row, self.col)
    }

    pub fn from_key(key: &str) -> Option<Self> {
        let (row, col) = key.split_once('_')?;
        Some(Self {
            row: row.parse().ok()?,
            col: col.parse().ok()?,
        })
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct CellUpdate {
    pub pos: Pos,
    pub value: Cell,
}

/// One cell of the flattened board stored in a game document.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CellRecord {
    pub has_mine: bool,
    pub adjacent_mines: u8,
    pub revealed: bool,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameStatus {
    Active,
    Won,
    Lost,
}

impl GameStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            GameStatus::Active => "ACTIVE",
            GameStatus::Won => "WON",
            GameStatus::Lost => "LOST",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, GameStatus::Won | GameStatus::Lost)
    }
}

/// The `games/{gameId}` document.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GameDocument {
    pub player_turn: String,
    pub status: GameStatus,
    pub board: BTreeMap<String, CellRecord>,
}

impl GameDocument {
    pub const PLAYER_TURN: &'static str = "playerTurn";
    pub const STATUS: &'static str = "status";

    /// Dot path of a cell's `revealed` flag, e.g. `board.1_1.revealed`.
    pub fn revealed_path(pos: Pos) -> String {
        format!("board.{}.revealed", pos.key())
    }
}

/// Leaderboard record produced by a won local game.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Score {
    pub player: String,
    pub time: u64,
    pub difficulty: usize,
}
