//! Host persistence boundary
//!
//! The core never performs I/O itself. Hosts persist serialized state
//! through a [`StateStore`]; helpers here keep the save-then-tick ordering
//! and turn corrupt documents into fresh defaults.

use crate::core::error::{Result, TallyError};
use crate::state::{PresetManager, SimulationState, StateManager, TickReport};
use ahash::AHashMap;
use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

/// Key under which the preset library is stored
pub const PRESETS_KEY: &str = "presets";

/// Asynchronous key-value storage for serialized state
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Store a document under `key`, replacing any previous one
    async fn save(&self, key: &str, value: &Value) -> Result<()>;

    /// Fetch the document under `key`, if any
    async fn load(&self, key: &str) -> Result<Option<Value>>;

    /// Remove the document under `key`; missing keys are not an error
    async fn delete(&self, key: &str) -> Result<()>;
}

/// One JSON file per key in a directory
pub struct JsonFileStore {
    base_dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(base_dir: impl AsRef<Path>) -> Result<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&base_dir)?;
        Ok(Self { base_dir })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let file: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.base_dir.join(format!("{}.json", file))
    }
}

#[async_trait]
impl StateStore for JsonFileStore {
    async fn save(&self, key: &str, value: &Value) -> Result<()> {
        let path = self.path_for(key);
        let temp_path = path.with_extension("json.tmp");

        let bytes = serde_json::to_vec_pretty(value)?;
        tokio::fs::write(&temp_path, bytes).await?;
        tokio::fs::rename(&temp_path, &path).await?;

        tracing::debug!("Saved {} to {}", key, path.display());
        Ok(())
    }

    async fn load(&self, key: &str) -> Result<Option<Value>> {
        let path = self.path_for(key);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let value = serde_json::from_slice(&bytes)?;
        tracing::debug!("Loaded {} from {}", key, path.display());
        Ok(Some(value))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-process store, for tests and hosts without durable storage
#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: RwLock<AHashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn save(&self, key: &str, value: &Value) -> Result<()> {
        self.documents
            .write()
            .await
            .insert(key.to_string(), value.clone());
        Ok(())
    }

    async fn load(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.documents.read().await.get(key).cloned())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.documents.write().await.remove(key);
        Ok(())
    }
}

/// Persist the active session under its own id
pub async fn save_session(manager: &StateManager, store: &dyn StateStore) -> Result<()> {
    let state = manager.state();
    store.save(state.id(), &state.to_json()).await
}

/// Load a session; a corrupt document is treated as absent
pub async fn load_session(store: &dyn StateStore, key: &str) -> Result<Option<SimulationState>> {
    match store.load(key).await {
        Ok(Some(value)) => Ok(Some(SimulationState::from_json(&value))),
        Ok(None) => Ok(None),
        Err(TallyError::Serde(e)) => {
            tracing::warn!("Session {} is unreadable, ignoring it: {}", key, e);
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Persist the session, then advance the turn
///
/// If saving fails the turn does not advance. A crash after the save but
/// before the tick leaves the stored turn one behind.
pub async fn save_then_tick(
    manager: &mut StateManager,
    store: &dyn StateStore,
) -> Result<TickReport> {
    save_session(manager, store).await?;
    Ok(manager.tick())
}

pub async fn save_presets(presets: &PresetManager, store: &dyn StateStore) -> Result<()> {
    store.save(PRESETS_KEY, &presets.to_json()).await
}

/// Load the stored preset library, or `None` if nothing usable is stored
pub async fn load_presets(store: &dyn StateStore) -> Result<Option<PresetManager>> {
    match store.load(PRESETS_KEY).await {
        Ok(value) => Ok(value.map(|v| PresetManager::from_json(&v))),
        Err(TallyError::Serde(e)) => {
            tracing::warn!("Preset library is unreadable, ignoring it: {}", e);
            Ok(None)
        }
        Err(e) => Err(e),
    }
}
