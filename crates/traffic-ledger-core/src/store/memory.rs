//! In-memory [`SeriesStore`] implementation for tests.
//!
//! Uses `HashMap` behind `std::sync::RwLock`. Entities are keyed by their
//! storage key, like the file store, so key collisions behave the same.
//! Unlike the file store it re-checks the append-only ordering on every
//! write and fails loudly when a caller breaks it.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use anyhow::{bail, Result};

use crate::entity::storage_key;
use crate::models::{Metric, SeriesPoint};

use super::{EntityHandle, SeriesStore};

/// In-memory series store.
#[derive(Debug, Default)]
pub struct InMemorySeriesStore {
    entities: RwLock<HashSet<String>>,
    series: RwLock<HashMap<(String, Metric), Vec<SeriesPoint>>>,
}

impl InMemorySeriesStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entities with storage.
    pub fn entity_count(&self) -> usize {
        self.entities.read().unwrap().len()
    }

    /// Total number of points across every series.
    pub fn point_count(&self) -> usize {
        self.series.read().unwrap().values().map(Vec::len).sum()
    }
}

impl SeriesStore for InMemorySeriesStore {
    fn ensure_entity(&self, entity_id: &str) -> Result<EntityHandle> {
        let key = storage_key(entity_id)?;
        let created = self.entities.write().unwrap().insert(key.clone());
        Ok(EntityHandle {
            entity_id: entity_id.to_string(),
            key,
            created,
        })
    }

    fn read_series(&self, entity_id: &str, metric: Metric) -> Result<Vec<SeriesPoint>> {
        let key = storage_key(entity_id)?;
        let series = self.series.read().unwrap();
        Ok(series.get(&(key, metric)).cloned().unwrap_or_default())
    }

    fn append_points(
        &self,
        entity_id: &str,
        metric: Metric,
        points: &[SeriesPoint],
    ) -> Result<()> {
        let key = storage_key(entity_id)?;
        if !self.entities.read().unwrap().contains(&key) {
            bail!("no storage for entity '{}'", entity_id);
        }
        let mut series = self.series.write().unwrap();
        let stored = series.entry((key, metric)).or_default();
        for p in points {
            if let Some(last) = stored.last() {
                if p.date <= last.date {
                    bail!(
                        "append-only violation on {}/{}: {} after {}",
                        entity_id,
                        metric,
                        p.date,
                        last.date
                    );
                }
            }
            stored.push(*p);
        }
        Ok(())
    }
}
