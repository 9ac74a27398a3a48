pub mod config;
pub mod error;
pub mod identity;
pub mod matcher;
pub mod memory;
pub mod normalize;
pub mod storage;

// Re-export the numeric kernel for convenience
pub use recog_embed::{centroid, cosine_similarity, EmbedError, Embedding};

pub use error::{Error, ErrorKind, Result};
pub use identity::{EnrollResult, IdentityStore};
pub use matcher::{CorruptPolicy, MatchEngine, MatchResult, DEFAULT_THRESHOLD};
pub use memory::MemoryStore;
pub use storage::{FsStore, Profile, RecordStore, SampleSet};
