//! Trail persistence.
//!
//! The engine never needs a store to be reachable. [`FallbackStore`]
//! pairs a remote store with a local one and reports whether it had to
//! fall back, so the host can show an offline indicator instead of an
//! error.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::Utc;
use log::{debug, info, warn};
use serde::Serialize;
use thiserror::Error;

use crate::trail::Trail;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("trail store unreachable: {0}")]
    Unreachable(String),
    #[error("trail store I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("trail store data error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Source and sink of finalized trails.
pub trait TrailStore {
    fn list_trails(&self) -> Result<Vec<Trail>, StoreError>;

    /// Persist a trail and return it as stored (the store may assign an id).
    fn save_trail(&self, trail: Trail) -> Result<Trail, StoreError>;
}

/// Trails kept as a JSON array in a single file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<Vec<Trail>, StoreError> {
        match fs::read(&self.path) {
            Ok(bytes) if bytes.is_empty() => Ok(Vec::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }
}

impl TrailStore for JsonFileStore {
    fn list_trails(&self) -> Result<Vec<Trail>, StoreError> {
        self.read_all()
    }

    fn save_trail(&self, trail: Trail) -> Result<Trail, StoreError> {
        let mut trails = self.read_all()?;
        let stored = trail.with_id(format!("local_{}_{}", Utc::now().timestamp_millis(), trails.len()));
        trails.push(stored.clone());

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_vec(&trails)?;
        // Write then rename so a crash never leaves a truncated file.
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;

        debug!("Saved trail {} locally to {}", stored.id(), self.path.display());
        Ok(stored)
    }
}

/// Whether the last store call reached the remote store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Connectivity {
    Online,
    Offline,
}

/// A store result together with the connectivity it was obtained under.
#[derive(Debug)]
pub struct Stored<T> {
    pub value: T,
    pub connectivity: Connectivity,
}

/// Remote store with a local fallback.
#[derive(Debug)]
pub struct FallbackStore<R, L> {
    remote: R,
    local: L,
}

impl<R: TrailStore, L: TrailStore> FallbackStore<R, L> {
    pub fn new(remote: R, local: L) -> Self {
        Self { remote, local }
    }

    pub fn local(&self) -> &L {
        &self.local
    }

    /// Remote trails followed by local ones; local only when offline.
    ///
    /// An unreadable local store counts as empty while the remote answers.
    /// Fails only when neither store can be listed.
    pub fn list_trails(&self) -> Result<Stored<Vec<Trail>>, StoreError> {
        match self.remote.list_trails() {
            Ok(mut trails) => {
                match self.local.list_trails() {
                    Ok(local) => trails.extend(local),
                    Err(e) => warn!("Local trail store failed, listing remote trails only: {e}"),
                }
                info!("Loaded {} trails", trails.len());
                Ok(Stored {
                    value: trails,
                    connectivity: Connectivity::Online,
                })
            }
            Err(e) => {
                let local = self.local.list_trails()?;
                warn!("Remote trail store failed, using {} local trails: {e}", local.len());
                Ok(Stored {
                    value: local,
                    connectivity: Connectivity::Offline,
                })
            }
        }
    }

    /// Save remotely, or locally if the remote store fails.
    pub fn save_trail(&self, trail: Trail) -> Result<Stored<Trail>, StoreError> {
        match self.remote.save_trail(trail.clone()) {
            Ok(saved) => {
                info!("Trail {:?} saved remotely", saved.name());
                Ok(Stored {
                    value: saved,
                    connectivity: Connectivity::Online,
                })
            }
            Err(e) => {
                warn!("Remote save failed, saving locally: {e}");
                let saved = self.local.save_trail(trail)?;
                Ok(Stored {
                    value: saved,
                    connectivity: Connectivity::Offline,
                })
            }
        }
    }
}
