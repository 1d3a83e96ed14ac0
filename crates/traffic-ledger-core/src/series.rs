//! Merging snapshot values into per-entity series.
//!
//! Two entry points, one per metric shape:
//!
//! - [`append_point`] records a scalar value for the snapshot date.
//! - [`merge_daily`] folds a trailing-window breakdown into a daily series,
//!   appending only dates the series has never seen.
//!
//! Both are safe to repeat for the same snapshot: a rerun after a crash
//! leaves the series exactly as a single run would have.

use anyhow::Result;
use chrono::NaiveDate;
use std::collections::HashSet;

use crate::error::IngestError;
use crate::models::{DailyCounts, DailyMetric, Metric, ScalarMetric, SeriesPoint};
use crate::store::SeriesStore;

/// What [`append_point`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    Appended,
    /// The series already ends at this date (a retried snapshot).
    AlreadyRecorded,
}

/// What [`merge_daily`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Dates newly written.
    pub appended: usize,
    /// Dates already present; their stored values were kept.
    pub existing: usize,
    /// Unseen dates older than the series' last point, not written.
    pub stale: usize,
}

/// Record the value of a scalar metric on `date`.
///
/// The orchestrator calls this at most once per (entity, metric, date) in a
/// clean run. If the series already ends at `date` the call is a no-op;
/// if it ends after `date` the call fails with [`IngestError::OutOfOrder`].
pub fn append_point(
    store: &dyn SeriesStore,
    entity_id: &str,
    metric: ScalarMetric,
    date: NaiveDate,
    value: i64,
) -> Result<AppendOutcome> {
    let metric = Metric::Scalar(metric);
    if let Some(last) = store.last_point(entity_id, metric)? {
        if last.date == date {
            log::debug!("{}/{} already has {}, skipping", entity_id, metric, date);
            return Ok(AppendOutcome::AlreadyRecorded);
        }
        if last.date > date {
            return Err(IngestError::OutOfOrder {
                entity: entity_id.to_string(),
                metric: metric.name().to_string(),
                last: last.date,
                date,
            }
            .into());
        }
    }
    store.append_points(entity_id, metric, &[SeriesPoint::new(date, value)])?;
    Ok(AppendOutcome::Appended)
}

/// Merge a date→count window into a daily series.
///
/// Reads the dates already recorded and appends, in ascending order, every
/// `(date, count)` whose date is absent. Recorded values are never
/// replaced, even when `counts` reports a different number for that date.
/// Absent dates older than the last recorded point are skipped so the
/// series stays strictly increasing.
pub fn merge_daily(
    store: &dyn SeriesStore,
    entity_id: &str,
    metric: DailyMetric,
    counts: &DailyCounts,
) -> Result<MergeOutcome> {
    let metric = Metric::Daily(metric);
    let existing = store.read_series(entity_id, metric)?;
    let recorded: HashSet<NaiveDate> = existing.iter().map(|p| p.date).collect();
    let last = existing.last().map(|p| p.date);

    let mut outcome = MergeOutcome::default();
    let mut fresh = Vec::new();
    // BTreeMap iteration is already ascending by date.
    for (&date, &value) in counts {
        if recorded.contains(&date) {
            outcome.existing += 1;
        } else if last.is_some_and(|last| date < last) {
            outcome.stale += 1;
        } else {
            fresh.push(SeriesPoint::new(date, value));
        }
    }

    if outcome.stale > 0 {
        log::warn!(
            "{}/{}: {} unseen dates predate the last recorded point, skipped",
            entity_id,
            metric,
            outcome.stale
        );
    }

    if !fresh.is_empty() {
        store.append_points(entity_id, metric, &fresh)?;
    }
    outcome.appended = fresh.len();
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::InMemorySeriesStore;

    const ENTITY: &str = "octo/widget";

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2021, 1, d).unwrap()
    }

    fn window(entries: &[(u32, i64)]) -> DailyCounts {
        entries.iter().map(|&(d, v)| (day(d), v)).collect()
    }

    fn store() -> InMemorySeriesStore {
        let store = InMemorySeriesStore::new();
        store.ensure_entity(ENTITY).unwrap();
        store
    }

    fn values(store: &InMemorySeriesStore, metric: DailyMetric) -> Vec<(NaiveDate, i64)> {
        store
            .read_series(ENTITY, Metric::Daily(metric))
            .unwrap()
            .into_iter()
            .map(|p| (p.date, p.value))
            .collect()
    }

    #[test]
    fn test_append_point_creates_and_appends() {
        let store = store();
        let outcome = append_point(&store, ENTITY, ScalarMetric::Stars, day(1), 10).unwrap();
        assert_eq!(outcome, AppendOutcome::Appended);
        append_point(&store, ENTITY, ScalarMetric::Stars, day(2), 12).unwrap();
        let series = store
            .read_series(ENTITY, Metric::Scalar(ScalarMetric::Stars))
            .unwrap();
        assert_eq!(
            series,
            vec![SeriesPoint::new(day(1), 10), SeriesPoint::new(day(2), 12)]
        );
    }

    #[test]
    fn test_append_point_retry_is_noop() {
        let store = store();
        append_point(&store, ENTITY, ScalarMetric::Forks, day(3), 4).unwrap();
        let outcome = append_point(&store, ENTITY, ScalarMetric::Forks, day(3), 99).unwrap();
        assert_eq!(outcome, AppendOutcome::AlreadyRecorded);
        let series = store
            .read_series(ENTITY, Metric::Scalar(ScalarMetric::Forks))
            .unwrap();
        assert_eq!(series, vec![SeriesPoint::new(day(3), 4)]);
    }

    #[test]
    fn test_append_point_rejects_older_date() {
        let store = store();
        append_point(&store, ENTITY, ScalarMetric::Stars, day(5), 1).unwrap();
        let err = append_point(&store, ENTITY, ScalarMetric::Stars, day(4), 1).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<IngestError>(),
            Some(IngestError::OutOfOrder { .. })
        ));
    }

    #[test]
    fn test_merge_daily_into_empty_series() {
        let store = store();
        let outcome = merge_daily(
            &store,
            ENTITY,
            DailyMetric::ViewsDaily,
            &window(&[(3, 7), (1, 2), (2, 0)]),
        )
        .unwrap();
        assert_eq!(outcome.appended, 3);
        assert_eq!(
            values(&store, DailyMetric::ViewsDaily),
            vec![(day(1), 2), (day(2), 0), (day(3), 7)]
        );
    }

    #[test]
    fn test_merge_daily_first_write_wins() {
        let store = store();
        merge_daily(&store, ENTITY, DailyMetric::ClonesDaily, &window(&[(1, 5), (2, 6)])).unwrap();
        let outcome = merge_daily(
            &store,
            ENTITY,
            DailyMetric::ClonesDaily,
            &window(&[(2, 60), (3, 7)]),
        )
        .unwrap();
        assert_eq!(
            outcome,
            MergeOutcome {
                appended: 1,
                existing: 1,
                stale: 0
            }
        );
        assert_eq!(
            values(&store, DailyMetric::ClonesDaily),
            vec![(day(1), 5), (day(2), 6), (day(3), 7)]
        );
    }

    #[test]
    fn test_merge_daily_overlapping_windows_match_single_union() {
        let m1 = window(&[(1, 1), (2, 2), (3, 3), (4, 4)]);
        let m2 = window(&[(3, 30), (4, 40), (5, 5), (6, 6)]);

        let twice = store();
        merge_daily(&twice, ENTITY, DailyMetric::ViewsUniquesDaily, &m1).unwrap();
        merge_daily(&twice, ENTITY, DailyMetric::ViewsUniquesDaily, &m2).unwrap();

        let mut union = m1.clone();
        for (d, v) in &m2 {
            union.entry(*d).or_insert(*v);
        }
        let once = store();
        merge_daily(&once, ENTITY, DailyMetric::ViewsUniquesDaily, &union).unwrap();

        assert_eq!(
            values(&twice, DailyMetric::ViewsUniquesDaily),
            values(&once, DailyMetric::ViewsUniquesDaily)
        );
    }

    #[test]
    fn test_merge_daily_repeat_is_idempotent() {
        let store = store();
        let m = window(&[(10, 1), (11, 2), (12, 3)]);
        merge_daily(&store, ENTITY, DailyMetric::ClonesUniquesDaily, &m).unwrap();
        let before = values(&store, DailyMetric::ClonesUniquesDaily);
        let outcome = merge_daily(&store, ENTITY, DailyMetric::ClonesUniquesDaily, &m).unwrap();
        assert_eq!(outcome.appended, 0);
        assert_eq!(outcome.existing, 3);
        assert_eq!(values(&store, DailyMetric::ClonesUniquesDaily), before);
    }

    #[test]
    fn test_merge_daily_skips_stale_gap_dates() {
        let store = store();
        merge_daily(&store, ENTITY, DailyMetric::ViewsDaily, &window(&[(1, 1), (5, 5)])).unwrap();
        let outcome = merge_daily(
            &store,
            ENTITY,
            DailyMetric::ViewsDaily,
            &window(&[(3, 3), (5, 50), (6, 6)]),
        )
        .unwrap();
        assert_eq!(
            outcome,
            MergeOutcome {
                appended: 1,
                existing: 1,
                stale: 1
            }
        );
        assert_eq!(
            values(&store, DailyMetric::ViewsDaily),
            vec![(day(1), 1), (day(5), 5), (day(6), 6)]
        );
    }

    #[test]
    fn test_no_duplicate_dates_after_many_merges() {
        let store = store();
        for start in 1..10 {
            let m: DailyCounts = (start..start + 5).map(|d| (day(d), d as i64)).collect();
            merge_daily(&store, ENTITY, DailyMetric::ClonesDaily, &m).unwrap();
        }
        let dates: Vec<NaiveDate> = values(&store, DailyMetric::ClonesDaily)
            .into_iter()
            .map(|(d, _)| d)
            .collect();
        let unique: HashSet<_> = dates.iter().collect();
        assert_eq!(unique.len(), dates.len());
        assert!(dates.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(dates.len(), 13);
    }

    #[test]
    fn test_empty_window_writes_nothing() {
        let store = store();
        let outcome =
            merge_daily(&store, ENTITY, DailyMetric::ViewsDaily, &DailyCounts::new()).unwrap();
        assert_eq!(outcome, MergeOutcome::default());
        assert_eq!(store.point_count(), 0);
    }
}
