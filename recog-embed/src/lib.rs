pub mod aggregate;
pub mod embedding;
pub mod error;
pub mod similarity;

// Re-export commonly used types
pub use aggregate::centroid;
pub use embedding::Embedding;
pub use error::EmbedError;
pub use similarity::cosine_similarity;
