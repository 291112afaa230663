use thiserror::Error;

#[derive(Debug, Error)]
pub enum CalError {
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Blob store error: {0}")]
    Blob(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Coarse failure category, so callers can tell "no such record" apart from
/// "wrong password" and "the backend is unreachable".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Unauthorized,
    Transport,
    InvalidInput,
}

impl CalError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CalError::NotFound(_) => ErrorKind::NotFound,
            CalError::Unauthorized(_) => ErrorKind::Unauthorized,
            CalError::InvalidInput(_) => ErrorKind::InvalidInput,
            CalError::Storage(rusqlite::Error::QueryReturnedNoRows) => ErrorKind::NotFound,
            CalError::Storage(_)
            | CalError::Blob(_)
            | CalError::Io(_)
            | CalError::Serialization(_) => ErrorKind::Transport,
        }
    }
}

pub type Result<T> = std::result::Result<T, CalError>;

/// Swallows an error at a UI boundary: logs it with its kind and yields `None`.
pub trait Absorb<T> {
    fn absorb(self, context: &str) -> Option<T>;
}

impl<T> Absorb<T> for Result<T> {
    fn absorb(self, context: &str) -> Option<T> {
        match self {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::error!(kind = ?e.kind(), error = %e, "{} failed", context);
                None
            }
        }
    }
}
