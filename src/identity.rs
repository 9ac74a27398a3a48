use log::info;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::normalize::{check_identifier, slugify};
use crate::storage::{Profile, RecordStore, SampleSet};
use crate::{centroid, Embedding};

type Normalizer = Box<dyn Fn(&str) -> String + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrollResult {
    pub identifier: String,
    pub display_name: String,
    pub sample_count: usize,
}

/// Owns every enrolled identity. All writes go through [`enroll`](Self::enroll).
pub struct IdentityStore<B> {
    backend: B,
    normalizer: Normalizer,
}

impl<B: RecordStore> IdentityStore<B> {
    /// Uses [`slugify`] to derive identifiers from display names.
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            normalizer: Box::new(slugify),
        }
    }

    pub fn with_normalizer<F>(mut self, normalizer: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.normalizer = Box::new(normalizer);
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn identifier_for(&self, display_name: &str) -> String {
        (self.normalizer)(display_name)
    }

    /// Replaces whatever was stored for `display_name`'s identifier with
    /// `samples` and their centroid.
    ///
    /// Names that normalize to the same identifier overwrite each other.
    pub fn enroll(&self, display_name: &str, samples: Vec<Embedding>) -> Result<EnrollResult> {
        if display_name.is_empty() {
            return Err(Error::Validation("display name is empty".to_string()));
        }
        if samples.is_empty() {
            return Err(Error::Validation("no samples given".to_string()));
        }

        let identifier = self.identifier_for(display_name);
        check_identifier(&identifier)?;

        let centroid = centroid(&samples)?;
        centroid.validate_query()?;

        let sample_count = samples.len();
        let profile = Profile {
            identifier: identifier.clone(),
            display_name: display_name.to_string(),
            centroid,
            sample_count,
        };
        let set = SampleSet {
            display_name: display_name.to_string(),
            samples,
        };
        self.backend.publish(&profile, &set)?;

        info!(
            "enrolled {identifier} ({display_name:?}) with {sample_count} sample(s), dim {}",
            profile.centroid.dim()
        );
        Ok(EnrollResult {
            identifier,
            display_name: profile.display_name,
            sample_count,
        })
    }

    pub fn list_identities(&self) -> Result<Box<dyn Iterator<Item = Result<String>> + '_>> {
        self.backend.identifiers()
    }

    pub fn load_profile(&self, identifier: &str) -> Result<Profile> {
        self.backend.load_profile(identifier)
    }

    pub fn load_samples(&self, identifier: &str) -> Result<SampleSet> {
        self.backend.load_samples(identifier)
    }

    /// Loads every enumerated profile, stopping at the first failure.
    pub fn profiles(&self) -> Result<Vec<Profile>> {
        self.list_identities()?
            .map(|id| id.and_then(|id| self.load_profile(&id)))
            .collect()
    }
}
