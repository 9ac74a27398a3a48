use recog_embed::EmbedError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid input: {0}")]
    Validation(String),

    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("degenerate vector: zero norm makes cosine similarity undefined")]
    DegenerateVector,

    #[error("no profile enrolled for {0:?}")]
    NotFound(String),

    #[error("corrupt record for {identifier:?}: {reason}")]
    Corrupt { identifier: String, reason: String },

    #[error("internal error: {0}")]
    Internal(String),

    #[error("storage i/o: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification, for callers that map failures onto status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    DegenerateVector,
    NotFound,
    CorruptData,
    Internal,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation(_) | Error::DimensionMismatch { .. } => ErrorKind::Validation,
            Error::DegenerateVector => ErrorKind::DegenerateVector,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::Corrupt { .. } => ErrorKind::CorruptData,
            Error::Internal(_) | Error::Io(_) => ErrorKind::Internal,
        }
    }

    pub(crate) fn corrupt(identifier: &str, reason: impl ToString) -> Self {
        Error::Corrupt {
            identifier: identifier.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl From<EmbedError> for Error {
    fn from(err: EmbedError) -> Self {
        match err {
            EmbedError::ZeroNorm => Error::DegenerateVector,
            EmbedError::DimensionMismatch { expected, got } => {
                Error::DimensionMismatch { expected, got }
            }
            other => Error::Validation(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
