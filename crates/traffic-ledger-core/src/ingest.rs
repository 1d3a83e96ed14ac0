//! Snapshot ingestion orchestration.
//!
//! For each pending snapshot date, oldest first:
//!
//! 1. load the snapshot,
//! 2. ensure storage for every entity,
//! 3. append scalar metrics,
//! 4. merge daily-bucketed metrics,
//! 5. diff against the immediately preceding processed snapshot,
//! 6. persist the diff report, which marks the date processed.
//!
//! Steps 2–4 are safe to repeat, so a run that dies before step 6 is
//! resumed by simply running again: the date is still pending because its
//! report does not exist.

use std::collections::BTreeSet;

use anyhow::{Context, Result};
use chrono::NaiveDate;

use crate::diff::build_report;
use crate::error::IngestError;
use crate::models::{DailyMetric, DiffReport, ScalarMetric, Snapshot};
use crate::series::{append_point, merge_daily, AppendOutcome};
use crate::store::SeriesStore;

/// Loads raw snapshots by date.
pub trait SnapshotSource {
    fn load(&self, date: NaiveDate) -> Result<Snapshot>;

    /// Whether raw data for `date` is still available.
    fn contains(&self, date: NaiveDate) -> bool;

    /// Load an already-processed snapshot to diff against.
    ///
    /// Only entity ids and scalar values of the result are used, so a
    /// source may skip checks that matter only for merging.
    fn load_previous(&self, date: NaiveDate) -> Result<Snapshot> {
        self.load(date)
    }
}

/// Persists diff reports. A written report marks its date processed.
pub trait ReportSink {
    /// Write the report for `date` all-or-nothing.
    fn write_report(&self, date: NaiveDate, report: &DiffReport) -> Result<()>;
}

/// Phase of a snapshot's ingestion, reported as it happens.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IngestEvent {
    /// Snapshot `n` of `total` is being loaded.
    Loading { date: NaiveDate, n: usize, total: usize },
    /// Series for all entities of the snapshot are up to date.
    Merged {
        date: NaiveDate,
        entities: usize,
        points: usize,
    },
    /// The diff report was written; the snapshot is processed.
    Reported { date: NaiveDate },
}

/// Receives [`IngestEvent`]s from the orchestrator.
pub trait ProgressReporter {
    fn report(&self, event: IngestEvent);
}

/// Reporter that discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&self, _event: IngestEvent) {}
}

/// Dates whose diff report exists, in chronological order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessedIndex {
    dates: BTreeSet<NaiveDate>,
}

impl ProcessedIndex {
    pub fn new(dates: impl IntoIterator<Item = NaiveDate>) -> Self {
        Self {
            dates: dates.into_iter().collect(),
        }
    }

    pub fn last(&self) -> Option<NaiveDate> {
        self.dates.last().copied()
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.dates.contains(&date)
    }

    pub fn mark(&mut self, date: NaiveDate) {
        self.dates.insert(date);
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.dates.iter().copied()
    }
}

/// Which available snapshots to ingest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingPlan {
    /// Dates after the last processed one, oldest first.
    pub pending: Vec<NaiveDate>,
    /// Unprocessed dates older than the last processed one. Merging them
    /// would break series ordering, so they are never ingested.
    pub skipped: Vec<NaiveDate>,
}

/// Split the available snapshot dates into pending and skipped.
pub fn plan_pending(available: &[NaiveDate], processed: &ProcessedIndex) -> PendingPlan {
    let mut sorted = available.to_vec();
    sorted.sort_unstable();
    sorted.dedup();

    let mut plan = PendingPlan::default();
    let last = processed.last();
    for date in sorted {
        if processed.contains(date) {
            continue;
        }
        match last {
            Some(last) if date < last => plan.skipped.push(date),
            _ => plan.pending.push(date),
        }
    }
    plan
}

/// Counters for one ingested snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotOutcome {
    pub entities: usize,
    pub entities_created: usize,
    pub scalar_points: usize,
    pub scalar_already_recorded: usize,
    pub daily_points: usize,
    pub daily_existing: usize,
    pub daily_stale: usize,
    pub report: DiffReport,
}

/// Totals for a whole run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestSummary {
    pub processed: Vec<NaiveDate>,
    pub entities_created: usize,
    pub scalar_points: usize,
    pub scalar_already_recorded: usize,
    pub daily_points: usize,
    pub daily_existing: usize,
    /// Unseen daily dates dropped because they predate the series tail.
    pub daily_stale: usize,
    pub reports: Vec<(NaiveDate, DiffReport)>,
}

/// Run steps 2–5 for one snapshot: merge it into the store and compute its
/// diff against `previous`.
pub fn ingest_snapshot(
    store: &dyn SeriesStore,
    snapshot: &Snapshot,
    previous: Option<&Snapshot>,
) -> Result<SnapshotOutcome> {
    let date = snapshot.date();
    let mut outcome = SnapshotOutcome {
        entities: snapshot.len(),
        ..Default::default()
    };

    for entity in snapshot.entities() {
        let handle = store
            .ensure_entity(entity)
            .with_context(|| format!("creating storage for {}", entity))?;
        if handle.created {
            log::debug!("tracking new entity {} as {}", entity, handle.key);
            outcome.entities_created += 1;
        }
    }

    for row in snapshot.rows() {
        for metric in ScalarMetric::ALL {
            let appended = append_point(store, &row.entity, metric, date, row.scalar(metric))
                .with_context(|| format!("appending {} for {}", metric.name(), row.entity))?;
            match appended {
                AppendOutcome::Appended => outcome.scalar_points += 1,
                AppendOutcome::AlreadyRecorded => outcome.scalar_already_recorded += 1,
            }
        }
    }

    for row in snapshot.rows() {
        for metric in DailyMetric::ALL {
            let merged = merge_daily(store, &row.entity, metric, row.daily(metric))
                .with_context(|| format!("merging {} for {}", metric.name(), row.entity))?;
            outcome.daily_points += merged.appended;
            outcome.daily_existing += merged.existing;
            outcome.daily_stale += merged.stale;
        }
    }

    outcome.report = build_report(snapshot, previous);
    Ok(outcome)
}

/// Drives ingestion of pending snapshots against pluggable collaborators.
pub struct Ingestor<'a> {
    source: &'a dyn SnapshotSource,
    store: &'a dyn SeriesStore,
    reports: &'a dyn ReportSink,
    progress: &'a dyn ProgressReporter,
}

impl<'a> Ingestor<'a> {
    pub fn new(
        source: &'a dyn SnapshotSource,
        store: &'a dyn SeriesStore,
        reports: &'a dyn ReportSink,
    ) -> Self {
        Self {
            source,
            store,
            reports,
            progress: &NoProgress,
        }
    }

    pub fn with_progress(mut self, progress: &'a dyn ProgressReporter) -> Self {
        self.progress = progress;
        self
    }

    /// Ingest `pending` in chronological order, updating `processed` as each
    /// report lands. Stops at the first failure; everything before it stays
    /// processed.
    pub fn run(
        &self,
        pending: &[NaiveDate],
        processed: &mut ProcessedIndex,
    ) -> Result<IngestSummary> {
        let mut ordered = pending.to_vec();
        ordered.sort_unstable();
        ordered.dedup();

        let mut summary = IngestSummary::default();
        if ordered.is_empty() {
            return Ok(summary);
        }

        let mut previous = match processed.last() {
            Some(last) => {
                if let Some(first) = ordered.first() {
                    if *first <= last {
                        return Err(IngestError::StaleSnapshot {
                            last,
                            date: *first,
                        }
                        .into());
                    }
                }
                if !self.source.contains(last) {
                    return Err(IngestError::MissingPrevious(last).into());
                }
                let snapshot = self
                    .source
                    .load_previous(last)
                    .with_context(|| format!("loading previous snapshot {}", last))?;
                Some(check_date(last, snapshot)?)
            }
            None => None,
        };

        let total = ordered.len();
        for (i, &date) in ordered.iter().enumerate() {
            self.progress.report(IngestEvent::Loading {
                date,
                n: i + 1,
                total,
            });
            let snapshot = self.load(date)?;

            let outcome = ingest_snapshot(self.store, &snapshot, previous.as_ref())
                .with_context(|| format!("ingesting snapshot {}", date))?;
            self.progress.report(IngestEvent::Merged {
                date,
                entities: outcome.entities,
                points: outcome.scalar_points + outcome.daily_points,
            });

            self.reports
                .write_report(date, &outcome.report)
                .with_context(|| format!("writing diff report for {}", date))?;
            processed.mark(date);
            self.progress.report(IngestEvent::Reported { date });

            log::info!(
                "ingested {}: {} entities ({} new), {} scalar and {} daily points, {} stale daily dates",
                date,
                outcome.entities,
                outcome.entities_created,
                outcome.scalar_points,
                outcome.daily_points,
                outcome.daily_stale
            );

            summary.processed.push(date);
            summary.entities_created += outcome.entities_created;
            summary.scalar_points += outcome.scalar_points;
            summary.scalar_already_recorded += outcome.scalar_already_recorded;
            summary.daily_points += outcome.daily_points;
            summary.daily_existing += outcome.daily_existing;
            summary.daily_stale += outcome.daily_stale;
            summary.reports.push((date, outcome.report));
            previous = Some(snapshot);
        }

        Ok(summary)
    }

    fn load(&self, date: NaiveDate) -> Result<Snapshot> {
        let snapshot = self
            .source
            .load(date)
            .with_context(|| format!("loading snapshot {}", date))?;
        check_date(date, snapshot)
    }
}

fn check_date(requested: NaiveDate, snapshot: Snapshot) -> Result<Snapshot> {
    if snapshot.date() != requested {
        return Err(IngestError::DateMismatch {
            requested,
            found: snapshot.date(),
        }
        .into());
    }
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2022, 2, d).unwrap()
    }

    #[test]
    fn test_plan_with_nothing_processed() {
        let plan = plan_pending(&[day(3), day(1), day(2)], &ProcessedIndex::default());
        assert_eq!(plan.pending, vec![day(1), day(2), day(3)]);
        assert!(plan.skipped.is_empty());
    }

    #[test]
    fn test_plan_resumes_after_last_processed() {
        let processed = ProcessedIndex::new([day(1), day(2)]);
        let plan = plan_pending(&[day(1), day(2), day(3), day(4)], &processed);
        assert_eq!(plan.pending, vec![day(3), day(4)]);
    }

    #[test]
    fn test_plan_skips_backfilled_dates() {
        let processed = ProcessedIndex::new([day(1), day(5)]);
        let plan = plan_pending(&[day(1), day(3), day(5), day(6)], &processed);
        assert_eq!(plan.pending, vec![day(6)]);
        assert_eq!(plan.skipped, vec![day(3)]);
    }

    #[test]
    fn test_plan_all_processed_is_empty() {
        let processed = ProcessedIndex::new([day(1)]);
        let plan = plan_pending(&[day(1)], &processed);
        assert_eq!(plan, PendingPlan::default());
    }

    #[test]
    fn test_processed_index_mark_and_last() {
        let mut index = ProcessedIndex::default();
        assert!(index.is_empty());
        index.mark(day(4));
        index.mark(day(2));
        assert_eq!(index.last(), Some(day(4)));
        assert_eq!(index.iter().collect::<Vec<_>>(), vec![day(2), day(4)]);
    }
}
