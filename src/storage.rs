use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{ErrorKind as IoErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::normalize::check_identifier;
use crate::Embedding;

const PROFILE_FILE: &str = "profile.json";

/// Aggregated representation of one enrolled identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub identifier: String,
    pub display_name: String,
    pub centroid: Embedding,
    pub sample_count: usize,
}

impl Profile {
    /// Checks a profile read back from storage under `identifier`.
    pub fn check(&self, identifier: &str) -> Result<()> {
        if self.identifier != identifier {
            return Err(Error::corrupt(
                identifier,
                format!("profile names identifier {:?}", self.identifier),
            ));
        }
        if self.sample_count == 0 {
            return Err(Error::corrupt(identifier, "profile has no samples"));
        }
        self.centroid
            .validate_query()
            .map_err(|e| Error::corrupt(identifier, format!("centroid: {e}")))
    }
}

/// The raw samples submitted by the most recent enrollment of an identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleSet {
    pub display_name: String,
    pub samples: Vec<Embedding>,
}

/// Durable keyed storage behind [`IdentityStore`](crate::IdentityStore).
///
/// `publish` replaces everything stored under the profile's identifier in
/// one step: a reader sees either the previous record or the new one.
pub trait RecordStore: Send + Sync {
    fn publish(&self, profile: &Profile, samples: &SampleSet) -> Result<()>;

    /// Identifiers that currently have a profile. Order is whatever the
    /// backend enumerates in; calling again starts a fresh enumeration.
    fn identifiers(&self) -> Result<Box<dyn Iterator<Item = Result<String>> + '_>>;

    fn load_profile(&self, identifier: &str) -> Result<Profile>;

    fn load_samples(&self, identifier: &str) -> Result<SampleSet>;
}

/// What `profile.json` holds on disk: the profile plus the name of the
/// samples file it was published together with.
#[derive(Debug, Serialize, Deserialize)]
struct ProfileFile {
    #[serde(flatten)]
    profile: Profile,
    samples: String,
}

/// One directory per identifier under `root`.
///
/// ```text
/// <root>/<identifier>/profile.json
/// <root>/<identifier>/samples-<uuid>.bin
/// ```
///
/// `profile.json` is replaced by rename and is the commit point of a publish.
pub struct FsStore {
    root: PathBuf,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn user_store_path(&self, identifier: &str) -> Result<PathBuf> {
        check_identifier(identifier)?;
        Ok(self.root.join(identifier))
    }

    fn lock_for(&self, identifier: &str) -> Result<Arc<Mutex<()>>> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|e| Error::Internal(e.to_string()))?;
        Ok(locks
            .entry(identifier.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone())
    }

    fn read_profile_file(&self, identifier: &str) -> Result<ProfileFile> {
        let file = self.user_store_path(identifier)?.join(PROFILE_FILE);
        let raw = match fs::read_to_string(&file) {
            Ok(raw) => raw,
            Err(e) if e.kind() == IoErrorKind::NotFound => {
                return Err(Error::NotFound(identifier.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        let parsed: ProfileFile =
            serde_json::from_str(&raw).map_err(|e| Error::corrupt(identifier, e))?;
        parsed.profile.check(identifier)?;
        Ok(parsed)
    }
}

fn write_synced(path: &Path, data: &[u8]) -> Result<()> {
    let mut file = File::create(path)?;
    file.write_all(data)?;
    file.sync_all()?;
    Ok(())
}

impl RecordStore for FsStore {
    fn publish(&self, profile: &Profile, samples: &SampleSet) -> Result<()> {
        let identifier = profile.identifier.as_str();
        let dir = self.user_store_path(identifier)?;

        let lock = self.lock_for(identifier)?;
        let _guard = lock.lock().map_err(|e| Error::Internal(e.to_string()))?;

        fs::create_dir_all(&dir)?;
        let previous = match self.read_profile_file(identifier) {
            Ok(file) => Some(file.samples),
            Err(Error::NotFound(_)) => None,
            Err(e) => {
                warn!("replacing unreadable profile for {identifier}: {e}");
                None
            }
        };

        let version = Uuid::new_v4();
        let samples_name = format!("samples-{version}.bin");
        let samples_path = dir.join(&samples_name);
        let tmp_path = dir.join(format!("{PROFILE_FILE}.{version}.tmp"));

        let written = (|| -> Result<()> {
            let data =
                postcard::to_allocvec(samples).map_err(|e| Error::Internal(e.to_string()))?;
            write_synced(&samples_path, &data)?;

            let record = ProfileFile {
                profile: profile.clone(),
                samples: samples_name.clone(),
            };
            let json = serde_json::to_vec_pretty(&record)
                .map_err(|e| Error::Internal(e.to_string()))?;
            write_synced(&tmp_path, &json)?;

            fs::rename(&tmp_path, dir.join(PROFILE_FILE))?;
            Ok(())
        })();

        if let Err(e) = written {
            let _ = fs::remove_file(&tmp_path);
            let _ = fs::remove_file(&samples_path);
            return Err(e);
        }

        if let Ok(d) = File::open(&dir) {
            let _ = d.sync_all();
        }

        if let Some(old) = previous.filter(|old| *old != samples_name) {
            if let Err(e) = fs::remove_file(dir.join(&old)) {
                warn!("failed to remove stale samples {old} for {identifier}: {e}");
            }
        }

        debug!("published {identifier} ({samples_name})");
        Ok(())
    }

    fn identifiers(&self) -> Result<Box<dyn Iterator<Item = Result<String>> + '_>> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == IoErrorKind::NotFound => {
                return Ok(Box::new(std::iter::empty::<Result<String>>()))
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Box::new(entries.filter_map(|entry| -> Option<Result<String>> {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => return Some(Err(e.into())),
            };
            if !entry.path().join(PROFILE_FILE).is_file() {
                return None;
            }
            match entry.file_name().into_string() {
                Ok(name) => Some(Ok(name)),
                Err(name) => {
                    warn!("skipping non-UTF-8 identity directory {name:?}");
                    None
                }
            }
        })))
    }

    fn load_profile(&self, identifier: &str) -> Result<Profile> {
        Ok(self.read_profile_file(identifier)?.profile)
    }

    fn load_samples(&self, identifier: &str) -> Result<SampleSet> {
        let dir = self.user_store_path(identifier)?;
        let mut file = self.read_profile_file(identifier)?;

        // A concurrent publish may delete the samples file between reading
        // the profile and opening it; the fresh profile then names a new one.
        let data = loop {
            match fs::read(dir.join(&file.samples)) {
                Ok(data) => break data,
                Err(e) if e.kind() == IoErrorKind::NotFound => {
                    let fresh = self.read_profile_file(identifier)?;
                    if fresh.samples == file.samples {
                        return Err(Error::corrupt(
                            identifier,
                            format!("missing samples file {}", file.samples),
                        ));
                    }
                    file = fresh;
                }
                Err(e) => return Err(e.into()),
            }
        };

        let set: SampleSet =
            postcard::from_bytes(&data).map_err(|e| Error::corrupt(identifier, e))?;
        if set.samples.len() != file.profile.sample_count {
            return Err(Error::corrupt(
                identifier,
                format!(
                    "profile counts {} samples, file holds {}",
                    file.profile.sample_count,
                    set.samples.len()
                ),
            ));
        }
        Ok(set)
    }
}
