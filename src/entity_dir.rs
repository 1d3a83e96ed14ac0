//! Maps entity identifiers to their storage directories.

use anyhow::{Context, Result};
use std::path::PathBuf;
use walkdir::WalkDir;

use traffic_ledger_core::entity::storage_key;
use traffic_ledger_core::store::EntityHandle;

/// Root of the per-entity directories (`repos/` by default).
#[derive(Debug, Clone)]
pub struct EntityDirectory {
    root: PathBuf,
}

impl EntityDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory for `entity_id`, whether or not it exists yet.
    pub fn path_for(&self, entity_id: &str) -> Result<PathBuf> {
        Ok(self.root.join(storage_key(entity_id)?))
    }

    /// Create the entity's directory if absent. Idempotent.
    pub fn ensure(&self, entity_id: &str) -> Result<EntityHandle> {
        let key = storage_key(entity_id)?;
        let dir = self.root.join(&key);
        let created = !dir.is_dir();
        if created {
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }
        Ok(EntityHandle {
            entity_id: entity_id.to_string(),
            key,
            created,
        })
    }

    /// Storage keys of every entity with a directory, sorted.
    pub fn keys(&self) -> Result<Vec<String>> {
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }
        let mut keys = Vec::new();
        for entry in WalkDir::new(&self.root)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry.with_context(|| format!("listing {}", self.root.display()))?;
            if entry.file_type().is_dir() {
                keys.push(entry.file_name().to_string_lossy().to_string());
            }
        }
        Ok(keys)
    }
}
