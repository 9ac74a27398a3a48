//! In-memory record store for testing and embedding.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::{Error, Result};
use crate::storage::{Profile, RecordStore, SampleSet};

/// A [`RecordStore`] kept entirely in memory.
///
/// Enumeration follows the order identifiers were first enrolled in.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    order: Vec<String>,
    records: HashMap<String, (Profile, SampleSet)>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.inner.read().map_err(poisoned)?.order.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

fn poisoned<T>(e: std::sync::PoisonError<T>) -> Error {
    Error::Internal(e.to_string())
}

impl RecordStore for MemoryStore {
    fn publish(&self, profile: &Profile, samples: &SampleSet) -> Result<()> {
        let mut inner = self.inner.write().map_err(poisoned)?;
        let previous = inner.records.insert(
            profile.identifier.clone(),
            (profile.clone(), samples.clone()),
        );
        if previous.is_none() {
            inner.order.push(profile.identifier.clone());
        }
        Ok(())
    }

    fn identifiers(&self) -> Result<Box<dyn Iterator<Item = Result<String>> + '_>> {
        let order = self.inner.read().map_err(poisoned)?.order.clone();
        Ok(Box::new(order.into_iter().map(Ok)))
    }

    fn load_profile(&self, identifier: &str) -> Result<Profile> {
        let inner = self.inner.read().map_err(poisoned)?;
        inner
            .records
            .get(identifier)
            .map(|(profile, _)| profile.clone())
            .ok_or_else(|| Error::NotFound(identifier.to_string()))
    }

    fn load_samples(&self, identifier: &str) -> Result<SampleSet> {
        let inner = self.inner.read().map_err(poisoned)?;
        inner
            .records
            .get(identifier)
            .map(|(_, samples)| samples.clone())
            .ok_or_else(|| Error::NotFound(identifier.to_string()))
    }
}
