use std::time::Duration;

use rand::{SeedableRng, rngs::StdRng};
use sweeper_common::models::{Cell, CellUpdate, Pos, Score};
use tokio::time::Instant;
use tracing::{debug, info, instrument};

use crate::{
    board::{Banner, Board, GameOutcome},
    config::GameConfig,
    generator::generate,
    reveal::{RevealResult, reveal},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Ready,
    Running,
    Won,
    Lost,
}

impl SessionState {
    pub const fn is_terminal(self) -> bool {
        matches!(self, SessionState::Won | SessionState::Lost)
    }
}

/// Formats whole seconds as `MM:SS`.
pub fn format_clock(seconds: u64) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

/// A single-player game with a timer.
///
/// The clock starts on the first accepted reveal and freezes when the game
/// ends. Reveals after the end are ignored.
#[derive(Debug, Clone)]
pub struct LocalGameSession {
    board: Board,
    state: SessionState,
    outcome: GameOutcome,
    started_at: Option<Instant>,
    finished_after: Option<Duration>,
}

impl LocalGameSession {
    #[instrument(level = "trace")]
    pub fn new_game(config: &GameConfig) -> Self {
        let config = config.clamped();
        let board = match config.seed {
            Some(seed) => generate(config.size, config.density, &mut StdRng::seed_from_u64(seed)),
            None => generate(config.size, config.density, &mut rand::rng()),
        };
        info!(
            "Starting local game: {}x{} with {} mines",
            config.size,
            config.size,
            board.mine_count()
        );
        Self::from_board(board)
    }

    /// Resumes play on `board`. A board that is already won or lost yields a
    /// finished session that ignores further input.
    pub fn from_board(board: Board) -> Self {
        let outcome = board.outcome();
        let state = match outcome {
            GameOutcome::InProgress => SessionState::Ready,
            GameOutcome::Won => SessionState::Won,
            GameOutcome::Lost(_) => SessionState::Lost,
        };
        Self {
            outcome,
            board,
            state,
            started_at: None,
            finished_after: None,
        }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn outcome(&self) -> GameOutcome {
        self.outcome
    }

    pub fn banner(&self) -> Option<Banner> {
        self.outcome.banner()
    }

    pub fn display(&self, pos: Pos) -> Option<Cell> {
        self.board.display(pos)
    }

    pub fn safe_cells_left(&self) -> usize {
        self.board.safe_cells_left()
    }

    #[instrument(level = "trace", skip(self), fields(row = pos.row, col = pos.col))]
    pub fn handle_reveal(&mut self, pos: Pos) -> RevealResult {
        if self.state.is_terminal() {
            debug!("Ignoring reveal on finished game at {}", pos);
            return RevealResult::unchanged(self.outcome);
        }
        if !self.board.contains(pos) {
            debug!("Ignoring reveal outside the board at {}", pos);
            return RevealResult::unchanged(self.outcome);
        }

        let result = reveal(&mut self.board, pos);
        if result.is_empty() {
            return result;
        }

        if self.state == SessionState::Ready {
            self.state = SessionState::Running;
            self.started_at = Some(Instant::now());
        }

        self.outcome = result.outcome;
        match result.outcome {
            GameOutcome::InProgress => {}
            GameOutcome::Won => {
                self.finish(SessionState::Won);
                info!("Local game won in {}s", self.elapsed_seconds());
            }
            GameOutcome::Lost(mine) => {
                self.finish(SessionState::Lost);
                info!("Local game lost on mine at {}", mine);
            }
        }

        result
    }

    /// Flags or unflags a covered cell. Returns the changed cell, if any.
    pub fn toggle_flag(&mut self, pos: Pos) -> Option<CellUpdate> {
        if self.state.is_terminal() {
            return None;
        }
        self.board.toggle_flag(pos)?;
        let value = self.board.display(pos)?;
        Some(CellUpdate { pos, value })
    }

    pub fn elapsed(&self) -> Duration {
        match (self.finished_after, self.started_at) {
            (Some(frozen), _) => frozen,
            (None, Some(started)) => started.elapsed(),
            (None, None) => Duration::ZERO,
        }
    }

    pub fn elapsed_seconds(&self) -> u64 {
        self.elapsed().as_secs()
    }

    /// Clock text with the safe-cell counter, e.g. `01:05 | Left: 12`.
    pub fn status_line(&self) -> String {
        format!(
            "{} | Left: {}",
            format_clock(self.elapsed_seconds()),
            self.safe_cells_left()
        )
    }

    /// Leaderboard entry for a won game.
    pub fn score(&self, player: &str) -> Option<Score> {
        (self.state == SessionState::Won).then(|| Score {
            player: player.to_string(),
            time: self.elapsed_seconds(),
            difficulty: self.board.size(),
        })
    }

    fn finish(&mut self, state: SessionState) {
        self.finished_after = Some(self.elapsed());
        self.state = state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_mine_session() -> LocalGameSession {
        LocalGameSession::from_board(Board::with_mines(3, &[Pos::new(0, 0)]))
    }

    #[test]
    fn new_game_clamps_and_places_mines() {
        let session = LocalGameSession::new_game(&GameConfig::new(2, 0.15).with_seed(5));

        assert_eq!(session.board().size(), 3);
        assert_eq!(session.board().mine_count(), 1);
        assert_eq!(session.state(), SessionState::Ready);
        assert_eq!(session.elapsed_seconds(), 0);
    }

    #[test]
    fn finished_boards_ignore_reveals() {
        let mut board = Board::with_mines(3, &[Pos::new(0, 0)]);
        reveal(&mut board, Pos::new(0, 0));
        let board = Board::from_records(&board.to_records()).unwrap();
        let mut session = LocalGameSession::from_board(board);

        assert_eq!(session.state(), SessionState::Lost);
        assert_eq!(session.banner(), Some(Banner::Loss));

        let result = session.handle_reveal(Pos::new(2, 2));

        assert!(result.is_empty());
        assert_eq!(result.outcome, GameOutcome::Lost(Pos::new(0, 0)));
        assert_eq!(session.display(Pos::new(2, 2)), Some(Cell::Hidden));
        assert_eq!(session.toggle_flag(Pos::new(2, 2)), None);
    }

    #[test]
    fn seeded_games_match() {
        let config = GameConfig::new(9, 0.15).with_seed(11);

        let first = LocalGameSession::new_game(&config);
        let second = LocalGameSession::new_game(&config);

        assert_eq!(first.board(), second.board());
    }

    #[test]
    fn first_reveal_starts_the_game() {
        let mut session = single_mine_session();

        let result = session.handle_reveal(Pos::new(1, 1));

        assert_eq!(result.changed.len(), 1);
        assert_eq!(session.state(), SessionState::Running);
        assert_eq!(session.outcome(), GameOutcome::InProgress);
        assert_eq!(session.safe_cells_left(), 7);
    }

    #[test]
    fn ignored_reveals_do_not_start_the_game() {
        let mut session = single_mine_session();
        session.toggle_flag(Pos::new(1, 1));

        assert!(session.handle_reveal(Pos::new(1, 1)).is_empty());
        assert!(session.handle_reveal(Pos::new(9, 9)).is_empty());
        assert_eq!(session.state(), SessionState::Ready);
    }

    #[test]
    fn flood_win_ends_the_game() {
        let mut session = single_mine_session();

        let result = session.handle_reveal(Pos::new(2, 2));

        assert_eq!(result.changed.len(), 8);
        assert_eq!(session.state(), SessionState::Won);
        assert_eq!(session.banner(), Some(Banner::Win));
        assert_eq!(session.score("ana").map(|score| score.difficulty), Some(3));
    }

    #[test]
    fn reveals_after_loss_are_rejected() {
        let mut session = single_mine_session();

        session.handle_reveal(Pos::new(0, 0));
        let after = session.handle_reveal(Pos::new(2, 2));

        assert_eq!(session.state(), SessionState::Lost);
        assert!(after.is_empty());
        assert_eq!(after.outcome, GameOutcome::Lost(Pos::new(0, 0)));
        assert_eq!(session.display(Pos::new(2, 2)), Some(Cell::Hidden));
        assert_eq!(session.score("ana"), None);
        assert_eq!(session.toggle_flag(Pos::new(2, 2)), None);
    }

    #[test]
    fn flags_toggle_on_covered_cells() {
        let mut session = single_mine_session();

        let flagged = session.toggle_flag(Pos::new(0, 0));
        assert_eq!(
            flagged,
            Some(CellUpdate {
                pos: Pos::new(0, 0),
                value: Cell::Flagged
            })
        );

        session.handle_reveal(Pos::new(1, 1));
        assert_eq!(session.toggle_flag(Pos::new(1, 1)), None);
        assert_eq!(
            session.toggle_flag(Pos::new(0, 0)).map(|update| update.value),
            Some(Cell::Hidden)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn clock_runs_while_playing_and_freezes_at_the_end() {
        let mut session = single_mine_session();

        tokio::time::advance(Duration::from_secs(30)).await;
        assert_eq!(session.elapsed_seconds(), 0);

        session.handle_reveal(Pos::new(1, 1));
        tokio::time::advance(Duration::from_secs(65)).await;
        assert_eq!(session.elapsed_seconds(), 65);
        assert_eq!(session.status_line(), "01:05 | Left: 7");

        session.handle_reveal(Pos::new(2, 2));
        assert_eq!(session.state(), SessionState::Won);
        tokio::time::advance(Duration::from_secs(100)).await;

        assert_eq!(session.elapsed_seconds(), 65);
        assert_eq!(
            session.score("ana"),
            Some(Score {
                player: "ana".to_string(),
                time: 65,
                difficulty: 3
            })
        );
    }

    #[test]
    fn clock_format() {
        assert_eq!(format_clock(0), "00:00");
        assert_eq!(format_clock(59), "00:59");
        assert_eq!(format_clock(3600), "60:00");
    }
}
