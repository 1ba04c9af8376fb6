//! Session snapshot persistence.
//!
//! A [`PersistedSnapshot`] is the full recoverable state of an in-flight
//! session: the session itself, the phase machine position, and the
//! check-in state. Snapshots are JSON strings in a last-write-wins
//! key-value store behind [`SnapshotBackend`], so the core stays agnostic
//! about where they live.
//!
//! Recovery never crashes the host: a snapshot that fails to parse is
//! logged, deleted, and reported as absent.

use std::cell::RefCell;
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::checkin::CheckInState;
use crate::error::Result;
use crate::session::Session;
use crate::timer::PhaseState;

/// Everything needed to rebuild an interrupted session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedSnapshot {
    pub session: Session,
    pub phase: PhaseState,
    pub check_in: CheckInState,
    pub persisted_at: DateTime<Utc>,
}

/// Last-write-wins string store. Writes must be durable when they return.
pub trait SnapshotBackend {
    fn write(&self, key: &str, value: &str) -> Result<()>;
    fn read(&self, key: &str) -> Result<Option<String>>;
    fn delete(&self, key: &str) -> Result<()>;
}

/// In-memory backend for tests and headless embedding.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: RefCell<HashMap<String, String>>,
}

impl SnapshotBackend for MemoryBackend {
    fn write(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn read(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.entries.borrow_mut().remove(key);
        Ok(())
    }
}

/// Saves, loads, and clears snapshots over a backend.
pub struct SnapshotStore<'a> {
    backend: &'a dyn SnapshotBackend,
}

impl<'a> SnapshotStore<'a> {
    pub fn new(backend: &'a dyn SnapshotBackend) -> Self {
        Self { backend }
    }

    /// Persist a snapshot under its session's storage key and return the key.
    pub fn save(&self, snapshot: &PersistedSnapshot) -> Result<String> {
        let key = snapshot.session.storage_key();
        let json = serde_json::to_string(snapshot)?;
        self.backend.write(&key, &json)?;
        debug!(key = %key, "snapshot saved");
        Ok(key)
    }

    /// Load a snapshot. An unreadable entry is deleted and reported absent.
    pub fn load(&self, key: &str) -> Result<Option<PersistedSnapshot>> {
        let Some(json) = self.backend.read(key)? else {
            return Ok(None);
        };
        match serde_json::from_str(&json) {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(err) => {
                debug!(key = %key, error = %err, "discarding unreadable snapshot");
                self.backend.delete(key)?;
                Ok(None)
            }
        }
    }

    pub fn clear(&self, key: &str) -> Result<()> {
        self.backend.delete(key)?;
        debug!(key = %key, "snapshot cleared");
        Ok(())
    }
}
