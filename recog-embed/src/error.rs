use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EmbedError {
    #[error("embedding is empty")]
    Empty,

    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("non-finite value at index {index}")]
    NonFinite { index: usize },

    /// Cosine similarity is undefined when either side has zero length.
    #[error("zero-norm vector")]
    ZeroNorm,
}
