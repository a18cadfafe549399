use std::collections::BTreeMap;

use rand::{SeedableRng, rngs::StdRng};
use serde_json::Value;
use sweeper_common::{
    models::{Cell, CellUpdate, GameDocument, GameStatus, Pos},
    protocol::{DocumentKey, Precondition, Snapshot, UpdateRequest},
};
use tracing::{debug, info, instrument, warn};

use crate::{
    board::{Banner, Board, GameOutcome},
    config::{OnlineConfig, RevealMode},
    error::{SessionError, StoreError},
    generator::generate,
    reveal::{reveal, reveal_single},
    store::{RemoteStore, Subscription},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnlineState {
    AwaitingCreation,
    Active,
    Won,
    Lost,
}

impl OnlineState {
    pub const fn is_terminal(self) -> bool {
        matches!(self, OnlineState::Won | OnlineState::Lost)
    }

    pub const fn banner(self) -> Option<Banner> {
        match self {
            OnlineState::Won => Some(Banner::Win),
            OnlineState::Lost => Some(Banner::Loss),
            OnlineState::AwaitingCreation | OnlineState::Active => None,
        }
    }
}

impl From<GameStatus> for OnlineState {
    fn from(status: GameStatus) -> Self {
        match status {
            GameStatus::Active => OnlineState::Active,
            GameStatus::Won => OnlineState::Won,
            GameStatus::Lost => OnlineState::Lost,
        }
    }
}

/// What a processed notification changed, for the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The game document does not exist and another participant creates it.
    AwaitingCreation,
    /// This participant wrote the initial game document.
    Created,
    /// The cached board was replaced by a newer snapshot.
    Updated {
        state: OnlineState,
        my_turn: bool,
    },
    /// An out-of-order snapshot older than the cached one was dropped.
    Stale { version: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    InvalidCoordinate,
    AlreadyRevealed,
    GameOver,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveOutcome {
    /// The move and turn hand-over were written in one update.
    Submitted {
        changed: Vec<CellUpdate>,
        outcome: GameOutcome,
    },
    Ignored(IgnoreReason),
}

/// Read-only view of the last authoritative snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Projection {
    board: Board,
    turn: String,
    status: GameStatus,
}

impl Projection {
    fn parse(document: Value) -> Result<Self, SessionError> {
        let document: GameDocument = serde_json::from_value(document)?;
        Ok(Self {
            board: Board::from_records(&document.board)?,
            turn: document.player_turn,
            status: document.status,
        })
    }
}

/// Local guess shown until the store confirms the move.
#[derive(Debug, Clone)]
struct PendingMove {
    board: Board,
    confirmed_at: Option<u64>,
}

/// One participant's view of a two-player, turn-based game kept in a shared
/// document.
///
/// Notifications replace the cached projection wholesale; nothing is
/// patched in place. Every reveal carries a compare-and-swap on
/// `playerTurn`, so two players can never both move on the same turn.
pub struct OnlineGameSession<S> {
    store: S,
    config: OnlineConfig,
    key: DocumentKey,
    subscription: Subscription,
    projection: Option<Projection>,
    version: u64,
    pending: Option<PendingMove>,
}

impl<S: RemoteStore> OnlineGameSession<S> {
    /// Subscribes to the game document. The first notification is processed
    /// by [`next_event`](Self::next_event).
    #[instrument(level = "trace", skip(store))]
    pub async fn open(store: S, config: OnlineConfig) -> Result<Self, SessionError> {
        config.validate()?;
        let key = DocumentKey::new(config.collection.clone(), config.game_id.clone());
        info!("Joining game {} as {}", key, config.me);

        let subscription = store.subscribe(&key).await?;
        Ok(Self {
            store,
            config,
            key,
            subscription,
            projection: None,
            version: 0,
            pending: None,
        })
    }

    pub fn game_id(&self) -> &str {
        &self.config.game_id
    }

    pub fn me(&self) -> &str {
        &self.config.me
    }

    pub fn state(&self) -> OnlineState {
        self.projection
            .as_ref()
            .map_or(OnlineState::AwaitingCreation, |projection| {
                projection.status.into()
            })
    }

    pub fn banner(&self) -> Option<Banner> {
        self.state().banner()
    }

    pub fn current_player(&self) -> Option<&str> {
        self.projection
            .as_ref()
            .map(|projection| projection.turn.as_str())
    }

    pub fn is_my_turn(&self) -> bool {
        self.current_player() == Some(self.config.me.as_str())
    }

    pub fn turn_indicator(&self) -> String {
        match self.current_player() {
            Some(player) => format!("Turn: {}", player),
            None => "Waiting for game...".to_string(),
        }
    }

    pub fn is_move_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Board as last confirmed by the store.
    pub fn board(&self) -> Option<&Board> {
        self.projection.as_ref().map(|projection| &projection.board)
    }

    /// Displayed cell, including an unconfirmed local move.
    pub fn display(&self, pos: Pos) -> Option<Cell> {
        match &self.pending {
            Some(pending) => pending.board.display(pos),
            None => self.board()?.display(pos),
        }
    }

    /// Waits for the next change notification and applies it. `None` once the
    /// subscription has ended.
    pub async fn next_event(&mut self) -> Option<Result<SessionEvent, SessionError>> {
        let notification = self.subscription.next().await?;
        Some(match notification {
            Ok(snapshot) => self.apply_snapshot(snapshot).await,
            Err(e) => {
                warn!("Listen failed for {}: {}", self.key, e);
                Err(e.into())
            }
        })
    }

    /// Re-reads the document and applies it as the authoritative state.
    pub async fn refresh(&mut self) -> Result<SessionEvent, SessionError> {
        let snapshot = self.store.get(&self.key).await?;
        self.apply_snapshot(snapshot).await
    }

    /// Replaces the cached projection with `snapshot`. Applying the same
    /// snapshot twice leaves the session unchanged.
    #[instrument(level = "trace", skip_all, fields(game_id = %self.key.id, version = snapshot.version))]
    pub async fn apply_snapshot(
        &mut self,
        snapshot: Snapshot,
    ) -> Result<SessionEvent, SessionError> {
        if snapshot.version < self.version {
            debug!(
                "Dropping stale snapshot {} (have {})",
                snapshot.version, self.version
            );
            return Ok(SessionEvent::Stale {
                version: snapshot.version,
            });
        }

        let Some(document) = snapshot.document else {
            self.version = snapshot.version;
            self.projection = None;
            self.pending = None;
            if !self.config.is_creator() {
                debug!("Game {} not created yet, waiting", self.key);
                return Ok(SessionEvent::AwaitingCreation);
            }
            return match self.create_game().await {
                Ok(_) => Ok(SessionEvent::Created),
                Err(SessionError::Remote(StoreError::AlreadyExists)) => {
                    Ok(SessionEvent::AwaitingCreation)
                }
                Err(e) => Err(e),
            };
        };

        let projection = Projection::parse(document)?;
        self.version = snapshot.version;
        if self
            .pending
            .as_ref()
            .is_some_and(|pending| pending.confirmed_at.is_some_and(|at| snapshot.version >= at))
        {
            self.pending = None;
        }

        if !self.config.players.contains(&projection.turn) {
            warn!(
                "Game {} names unknown turn owner {}",
                self.key, projection.turn
            );
        }

        let state = OnlineState::from(projection.status);
        let my_turn = projection.turn == self.config.me;
        self.projection = Some(projection);
        Ok(SessionEvent::Updated { state, my_turn })
    }

    /// Seeds a fresh board and writes the whole document, unless someone
    /// already did. The creator moves first.
    #[instrument(level = "trace", skip_all, fields(game_id = %self.key.id))]
    pub async fn create_game(&mut self) -> Result<u64, SessionError> {
        let config = self.config.board.clamped();
        let board = match config.seed {
            Some(seed) => generate(config.size, config.density, &mut StdRng::seed_from_u64(seed)),
            None => generate(config.size, config.density, &mut rand::rng()),
        };

        let document = GameDocument {
            player_turn: self.config.me.clone(),
            status: GameStatus::Active,
            board: board.to_records(),
        };
        let version = self
            .store
            .create(&self.key, serde_json::to_value(&document)?)
            .await?;
        info!(
            "Created game {}: {}x{} with {} mines",
            self.key,
            config.size,
            config.size,
            board.mine_count()
        );
        Ok(version)
    }

    /// Reveals a cell if it is this participant's turn, handing the turn to
    /// the other player in the same conditional write.
    ///
    /// A failed write leaves the remote game untouched; the caller may retry.
    #[instrument(level = "trace", skip(self), fields(game_id = %self.key.id, player = %self.config.me))]
    pub async fn attempt_reveal(&mut self, pos: Pos) -> Result<MoveOutcome, SessionError> {
        if self.pending.is_some() {
            return Err(SessionError::MovePending);
        }
        if self.projection.is_none() {
            self.refresh().await?;
        }
        let Some(projection) = &self.projection else {
            return Err(SessionError::NotCreated);
        };

        if projection.status.is_terminal() {
            debug!("Ignoring reveal on finished game at {}", pos);
            return Ok(MoveOutcome::Ignored(IgnoreReason::GameOver));
        }
        if projection.turn != self.config.me {
            info!("Rejected reveal at {}: turn belongs to {}", pos, projection.turn);
            return Err(SessionError::NotYourTurn);
        }
        let Some(cell) = projection.board.cell(pos) else {
            debug!("Ignoring reveal outside the board at {}", pos);
            return Ok(MoveOutcome::Ignored(IgnoreReason::InvalidCoordinate));
        };
        if cell.is_revealed() {
            return Ok(MoveOutcome::Ignored(IgnoreReason::AlreadyRevealed));
        }

        let mut board = projection.board.clone();
        let result = match self.config.reveal_mode {
            RevealMode::SingleCell => reveal_single(&mut board, pos),
            RevealMode::FloodFill => reveal(&mut board, pos),
        };
        let request = move_request(
            &result.changed,
            result.outcome,
            &self.config.me,
            self.config.opponent(),
        );

        self.pending = Some(PendingMove {
            board,
            confirmed_at: None,
        });
        match self.store.update(&self.key, request).await {
            Ok(version) => {
                if let Some(pending) = self.pending.as_mut() {
                    pending.confirmed_at = Some(version);
                }
                debug!(
                    "Move at {} written as version {}, {} cells",
                    pos,
                    version,
                    result.changed.len()
                );
                Ok(MoveOutcome::Submitted {
                    changed: result.changed,
                    outcome: result.outcome,
                })
            }
            Err(StoreError::PreconditionFailed) => {
                self.pending = None;
                info!("Turn moved on before the reveal at {} landed", pos);
                Err(SessionError::NotYourTurn)
            }
            Err(e) => {
                self.pending = None;
                warn!("Error moving at {}: {}", pos, e);
                Err(e.into())
            }
        }
    }
}

/// Marks the changed cells revealed and passes the turn, conditional on the
/// mover still holding it.
fn move_request(
    changed: &[CellUpdate],
    outcome: GameOutcome,
    me: &str,
    next: &str,
) -> UpdateRequest {
    let mut fields: BTreeMap<String, Value> = changed
        .iter()
        .map(|update| (GameDocument::revealed_path(update.pos), Value::Bool(true)))
        .collect();
    fields.insert(GameDocument::PLAYER_TURN.to_string(), Value::from(next));

    let status = match outcome {
        GameOutcome::InProgress => None,
        GameOutcome::Won => Some(GameStatus::Won),
        GameOutcome::Lost(_) => Some(GameStatus::Lost),
    };
    if let Some(status) = status {
        fields.insert(GameDocument::STATUS.to_string(), Value::from(status.as_str()));
    }

    UpdateRequest {
        fields,
        precondition: Some(Precondition::FieldEquals {
            path: GameDocument::PLAYER_TURN.to_string(),
            value: Value::from(me),
        }),
    }
}
