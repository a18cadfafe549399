//! Sweeper Client Library
//!
//! The mine-clearing game engine plus the two ways to play it:
//!
//! - [`LocalGameSession`]: a single player against a board held in memory,
//!   with flood-fill reveals, flags and a clock.
//! - [`OnlineGameSession`]: two players taking turns on a board stored in a
//!   shared [`RemoteStore`] document, kept in sync through change
//!   notifications.
//!
//! ## Usage
//!
//! ### Local play
//!
//! ```rust
//! use sweeper_client::{GameConfig, LocalGameSession, Pos};
//!
//! let mut game = LocalGameSession::new_game(&GameConfig::new(8, 0.15).with_seed(7));
//! let result = game.handle_reveal(Pos::new(0, 0));
//! println!("{} cells opened, {}", result.changed.len(), game.status_line());
//! ```
//!
//! ### Online play
//!
//! ```rust,no_run
//! use sweeper_client::{HttpStore, OnlineConfig, OnlineGameSession, Pos};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let store = HttpStore::new("http://localhost:8000")?;
//!     let players = ["alice".to_string(), "bob".to_string()];
//!     let config = OnlineConfig::new("game-1", players, "alice");
//!
//!     let mut session = OnlineGameSession::open(store, config).await?;
//!     while let Some(event) = session.next_event().await {
//!         event?;
//!         if session.is_my_turn() {
//!             session.attempt_reveal(Pos::new(1, 1)).await?;
//!         }
//!         if session.state().is_terminal() {
//!             break;
//!         }
//!     }
//!     Ok(())
//! }
//! ```

mod board;
mod config;
mod error;
mod generator;
mod local;
mod online;
mod reveal;
pub mod store;

pub use board::{Banner, Board, BoardCell, GameOutcome, MIN_SIZE};
pub use config::{
    DEFAULT_DENSITY, DEFAULT_SIZE, GAMES_COLLECTION, GameConfig, OnlineConfig, RevealMode,
};
pub use error::{BoardError, SessionError, StoreError};
pub use generator::{generate, mine_count};
pub use local::{LocalGameSession, SessionState, format_clock};
pub use online::{IgnoreReason, MoveOutcome, OnlineGameSession, OnlineState, SessionEvent};
pub use reveal::{RevealResult, reveal, reveal_single};
pub use store::{HttpStore, MemoryStore, RemoteStore, Subscription};

// Re-export common types for convenience
pub use sweeper_common::{models::*, protocol::*};
