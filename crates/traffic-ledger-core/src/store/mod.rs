//! Storage abstraction for per-entity series.
//!
//! The [`SeriesStore`] trait is the only way the merge and orchestration
//! code touches persistent state, so the same pipeline runs against the
//! CSV-file store in the binary crate and the [`memory::InMemorySeriesStore`]
//! used in tests.
//!
//! Implementations must be `Send + Sync`.

pub mod memory;

use anyhow::Result;

use crate::models::{Metric, SeriesPoint};

/// Result of [`SeriesStore::ensure_entity`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityHandle {
    /// The external identifier as it appears in snapshots.
    pub entity_id: String,
    /// Filesystem-safe name derived by [`crate::entity::storage_key`].
    pub key: String,
    /// `true` when this call created the entity's storage.
    pub created: bool,
}

/// Append-only, per-entity, per-metric series storage.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`ensure_entity`](SeriesStore::ensure_entity) | Create an entity's storage on first sight |
/// | [`read_series`](SeriesStore::read_series) | All points of one series, oldest first |
/// | [`append_points`](SeriesStore::append_points) | Append points after the last recorded one |
///
/// Stores never rewrite or delete points. Callers go through
/// [`crate::series`], which guarantees that every point passed to
/// `append_points` is dated strictly after the series' last point.
pub trait SeriesStore: Send + Sync {
    /// Create storage for `entity_id` if absent. Idempotent.
    fn ensure_entity(&self, entity_id: &str) -> Result<EntityHandle>;

    /// Read one series. A series that was never written is empty.
    fn read_series(&self, entity_id: &str, metric: Metric) -> Result<Vec<SeriesPoint>>;

    /// Append points to one series, creating it if needed.
    fn append_points(&self, entity_id: &str, metric: Metric, points: &[SeriesPoint])
        -> Result<()>;

    /// Last recorded point of a series, if any.
    fn last_point(&self, entity_id: &str, metric: Metric) -> Result<Option<SeriesPoint>> {
        Ok(self.read_series(entity_id, metric)?.last().copied())
    }
}
