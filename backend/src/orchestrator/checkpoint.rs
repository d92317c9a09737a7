//! Checkpoint - Save/Load Game State
//!
//! The whole [`GameState`] is serialized as one JSON document together with
//! the RNG state, a hash of the configuration it was produced under and a
//! digest of the state itself.
//!
//! # Critical Invariants
//!
//! - **Config Matching**: a checkpoint only loads under the same config
//! - **Integrity**: the state digest must match on load
//! - **Determinism**: the RNG resumes from the saved state

use crate::error::PersistenceError;
use crate::models::state::GameState;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Current checkpoint format version
pub const CHECKPOINT_VERSION: u32 = 1;

// ============================================================================
// Persistence Contract
// ============================================================================

/// Where serialized state lives between runs
///
/// `load` returns `Ok(None)` when nothing has been saved yet.
pub trait StateStore {
    fn save(&mut self, blob: &str) -> Result<(), PersistenceError>;
    fn load(&self) -> Result<Option<String>, PersistenceError>;
}

/// JSON file on disk
#[derive(Debug, Clone)]
pub struct FileStateStore {
    path: PathBuf,
}

impl FileStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StateStore for FileStateStore {
    /// Writes to a sibling temp file first so a crash never leaves half a
    /// document behind.
    fn save(&mut self, blob: &str) -> Result<(), PersistenceError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, blob)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn load(&self) -> Result<Option<String>, PersistenceError> {
        match fs::read_to_string(&self.path) {
            Ok(blob) => Ok(Some(blob)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory store for tests and embedding
#[derive(Debug, Clone, Default)]
pub struct InMemoryStateStore {
    blob: Option<String>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_blob(blob: impl Into<String>) -> Self {
        Self {
            blob: Some(blob.into()),
        }
    }

    pub fn blob(&self) -> Option<&str> {
        self.blob.as_deref()
    }
}

impl StateStore for InMemoryStateStore {
    fn save(&mut self, blob: &str) -> Result<(), PersistenceError> {
        self.blob = Some(blob.to_string());
        Ok(())
    }

    fn load(&self) -> Result<Option<String>, PersistenceError> {
        Ok(self.blob.clone())
    }
}

// ============================================================================
// Snapshot Structure
// ============================================================================

/// Complete persisted snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateSnapshot {
    pub version: u32,

    /// SHA256 hash of the config the state was produced under
    pub config_hash: String,

    /// RNG state at time of snapshot (CRITICAL for determinism)
    pub rng_state: u64,

    /// SHA256 digest of the canonical `state` document
    pub checksum: String,

    pub state: Value,
}

/// Serialize `state` into a checkpoint document
pub fn encode(
    state: &GameState,
    rng_state: u64,
    config_hash: &str,
) -> Result<String, PersistenceError> {
    let state = canonicalize(serde_json::to_value(state)?);
    let snapshot = StateSnapshot {
        version: CHECKPOINT_VERSION,
        config_hash: config_hash.to_string(),
        rng_state,
        checksum: digest(&state)?,
        state,
    };
    Ok(serde_json::to_string(&snapshot)?)
}

/// Parse and verify a checkpoint document
///
/// Returns the state and the saved RNG state.
pub fn decode(blob: &str, config_hash: &str) -> Result<(GameState, u64), PersistenceError> {
    let snapshot: StateSnapshot = serde_json::from_str(blob)?;
    if snapshot.version != CHECKPOINT_VERSION {
        return Err(PersistenceError::UnsupportedVersion(snapshot.version));
    }
    if snapshot.config_hash != config_hash {
        return Err(PersistenceError::ConfigMismatch);
    }
    let state = canonicalize(snapshot.state);
    if digest(&state)? != snapshot.checksum {
        return Err(PersistenceError::ChecksumMismatch);
    }
    Ok((serde_json::from_value(state)?, snapshot.rng_state))
}

// ============================================================================
// Hashing
// ============================================================================

/// Recursively sort all object keys for a canonical representation
fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<String, Value> =
                map.into_iter().map(|(k, v)| (k, canonicalize(v))).collect();
            Value::Object(sorted.into_iter().collect())
        }
        Value::Array(arr) => Value::Array(arr.into_iter().map(canonicalize).collect()),
        other => other,
    }
}

fn digest(value: &Value) -> Result<String, PersistenceError> {
    let json = serde_json::to_string(value)?;
    let mut hasher = Sha256::new();
    hasher.update(json.as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}

/// Compute deterministic SHA256 hash of a config
///
/// Uses canonical JSON serialization with sorted keys, so field order
/// never changes the hash.
pub fn compute_config_hash<T: Serialize>(config: &T) -> Result<String, PersistenceError> {
    digest(&canonicalize(serde_json::to_value(config)?))
}
