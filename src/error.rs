use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("not found")]
    NotFound,

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("unknown registry: {0}")]
    InvalidRegistry(String),

    #[error("unknown clean level: {0}")]
    InvalidLevel(String),

    #[error("unknown stage: {0}")]
    InvalidStage(String),

    #[error("tool invocation failed: {0}")]
    Tool(String),

    #[error("rate limited by {0}")]
    RateLimited(String),
}

impl Error {
    /// Fatal errors abort the whole stage; everything else is logged and the
    /// affected unit of work is skipped.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Database(_) | Self::AlreadyExists(_) | Self::RateLimited(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
