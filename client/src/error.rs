use thiserror::Error;

/// Failures talking to a [`RemoteStore`](crate::store::RemoteStore).
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("remote store unavailable: {0}")]
    Unavailable(String),
    #[error("document not found")]
    NotFound,
    #[error("document already exists")]
    AlreadyExists,
    #[error("write precondition failed")]
    PreconditionFailed,
    #[error("write rejected: {0}")]
    Rejected(String),
    #[error("malformed store payload: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("invalid store url: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl From<reqwest::Error> for StoreError {
    fn from(error: reqwest::Error) -> Self {
        StoreError::Unavailable(error.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for StoreError {
    fn from(error: tokio_tungstenite::tungstenite::Error) -> Self {
        StoreError::Unavailable(error.to_string())
    }
}

/// Failures rebuilding a board from its flattened `"row_col"` form.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BoardError {
    #[error("cell key `{0}` is not of the form row_col")]
    InvalidKey(String),
    #[error("{0} cells do not form a square board")]
    NotSquare(usize),
    #[error("cell `{key}` lies outside a {size}x{size} board")]
    OutOfBounds { key: String, size: usize },
    #[error("board is missing cell `{0}`")]
    MissingCell(String),
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("it is not your turn")]
    NotYourTurn,
    #[error("a move is still waiting for confirmation")]
    MovePending,
    #[error("the game has not been created yet")]
    NotCreated,
    #[error("invalid session configuration: {0}")]
    InvalidConfig(&'static str),
    #[error("malformed game document: {0}")]
    MalformedDocument(#[from] serde_json::Error),
    #[error(transparent)]
    Board(#[from] BoardError),
    #[error(transparent)]
    Remote(#[from] StoreError),
}

impl SessionError {
    /// Transient failures the player can retry by repeating the action.
    pub fn is_transient(&self) -> bool {
        matches!(self, SessionError::Remote(StoreError::Unavailable(_)))
    }
}
