use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::identity::IdentityStore;
use crate::storage::{Profile, RecordStore};
use crate::{cosine_similarity, Embedding};

pub const DEFAULT_THRESHOLD: f32 = 0.55;

/// What a scan does with a record that fails to load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CorruptPolicy {
    /// Fail the whole match.
    #[default]
    Abort,
    /// Log and keep scanning.
    Skip,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub accepted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Best score seen, rounded to 3 decimals. `-1` when nothing is enrolled.
    pub score: f32,
}

/// Linear nearest-profile search with a fixed acceptance threshold.
///
/// Every call is an independent full scan; nothing is cached between calls.
pub struct MatchEngine<'a, B> {
    store: &'a IdentityStore<B>,
    threshold: f32,
    corrupt_policy: CorruptPolicy,
}

impl<'a, B: RecordStore> MatchEngine<'a, B> {
    pub fn new(store: &'a IdentityStore<B>, threshold: f32) -> Self {
        Self {
            store,
            threshold,
            corrupt_policy: CorruptPolicy::default(),
        }
    }

    pub fn with_corrupt_policy(mut self, policy: CorruptPolicy) -> Self {
        self.corrupt_policy = policy;
        self
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Finds the enrolled profile closest to `query` and applies the threshold.
    ///
    /// Ties keep the candidate enumerated first. Acceptance is decided on the
    /// unrounded score (`score >= threshold`).
    pub fn match_embedding(&self, query: &Embedding) -> Result<MatchResult> {
        query.validate_query()?;

        let mut best: Option<(Profile, f32)> = None;
        for identifier in self.store.list_identities()? {
            let identifier = identifier?;
            let profile = match self.store.load_profile(&identifier) {
                Ok(profile) => profile,
                Err(e @ Error::Corrupt { .. }) if self.corrupt_policy == CorruptPolicy::Skip => {
                    warn!("skipping {identifier}: {e}");
                    continue;
                }
                Err(e) => return Err(e),
            };

            let score = cosine_similarity(query.as_slice(), profile.centroid.as_slice())?;
            debug!("candidate {identifier}: {score:.4}");

            if best.as_ref().map_or(true, |(_, best_score)| score > *best_score) {
                best = Some((profile, score));
            }
        }

        let result = match best {
            Some((profile, score)) if score >= self.threshold => MatchResult {
                accepted: true,
                identifier: Some(profile.identifier),
                display_name: Some(profile.display_name),
                score: round_score(score),
            },
            Some((_, score)) => MatchResult {
                accepted: false,
                identifier: None,
                display_name: None,
                score: round_score(score),
            },
            None => MatchResult {
                accepted: false,
                identifier: None,
                display_name: None,
                score: -1.0,
            },
        };

        debug!(
            "match: accepted={} score={:.3} threshold={:.3}",
            result.accepted, result.score, self.threshold
        );
        Ok(result)
    }
}

/// Rounds to 3 decimals, half away from zero.
fn round_score(score: f32) -> f32 {
    ((score as f64 * 1000.0).round() / 1000.0) as f32
}
