use serde::{Deserialize, Serialize};

use crate::{board::MIN_SIZE, error::SessionError, generator::mine_count};

pub const DEFAULT_SIZE: usize = 8;
pub const DEFAULT_DENSITY: f64 = 0.15;
pub const GAMES_COLLECTION: &str = "games";

/// Board shape and mine density for a new game.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub size: usize,
    pub density: f64,
    /// Seeds board generation when set.
    pub seed: Option<u64>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            size: DEFAULT_SIZE,
            density: DEFAULT_DENSITY,
            seed: None,
        }
    }
}

impl GameConfig {
    pub fn new(size: usize, density: f64) -> Self {
        Self {
            size,
            density,
            seed: None,
        }
        .clamped()
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Raises the size to the minimum and replaces densities outside (0, 1).
    pub fn clamped(mut self) -> Self {
        self.size = self.size.max(MIN_SIZE);
        if !(self.density > 0.0 && self.density < 1.0) {
            self.density = DEFAULT_DENSITY;
        }
        self
    }

    pub fn mine_count(&self) -> usize {
        let config = self.clamped();
        mine_count(config.size, config.density)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevealMode {
    /// Marks only the chosen cell, as the shared game always has.
    #[default]
    SingleCell,
    /// Expands zero cells like local play and writes every revealed cell.
    FloodFill,
}

/// Identity and board settings for one participant of an online game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OnlineConfig {
    pub game_id: String,
    /// Both participants; the first one creates the game and moves first.
    pub players: [String; 2],
    pub me: String,
    pub board: GameConfig,
    pub reveal_mode: RevealMode,
    pub collection: String,
}

impl Default for OnlineConfig {
    fn default() -> Self {
        Self {
            game_id: String::new(),
            players: ["player1".to_string(), "player2".to_string()],
            me: "player1".to_string(),
            board: GameConfig::default(),
            reveal_mode: RevealMode::default(),
            collection: GAMES_COLLECTION.to_string(),
        }
    }
}

impl OnlineConfig {
    pub fn new(
        game_id: impl Into<String>,
        players: [String; 2],
        me: impl Into<String>,
    ) -> Self {
        Self {
            game_id: game_id.into(),
            players,
            me: me.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), SessionError> {
        if self.game_id.is_empty() {
            return Err(SessionError::InvalidConfig("game id must not be empty"));
        }
        if self.players[0] == self.players[1] {
            return Err(SessionError::InvalidConfig("players must be distinct"));
        }
        if !self.players.contains(&self.me) {
            return Err(SessionError::InvalidConfig("me must be one of the players"));
        }
        Ok(())
    }

    pub fn is_creator(&self) -> bool {
        self.players[0] == self.me
    }

    pub fn opponent(&self) -> &str {
        if self.players[0] == self.me {
            &self.players[1]
        } else {
            &self.players[0]
        }
    }
}
