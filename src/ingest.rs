//! `traffic ingest`: wire the filesystem stores into the orchestrator.
//!
//! Snapshots are listed and planned before anything is written, so a run
//! with no input leaves the storage root untouched. Once the run lock is
//! held the plan is rebuilt, so an invocation that waited on another run
//! sees that run's reports and has nothing left to do.

use anyhow::Result;

use traffic_ledger_core::ingest::{plan_pending, Ingestor, PendingPlan, ProcessedIndex, ProgressReporter};

use crate::config::{Config, StorageConfig};
use crate::reports::FsReportStore;
use crate::run_lock;
use crate::series_fs::FsSeriesStore;
use crate::snapshot_loader::{list_snapshot_dates, FsSnapshotSource};

fn plan_run(storage: &StorageConfig, reports: &FsReportStore) -> Result<(ProcessedIndex, PendingPlan)> {
    let available = list_snapshot_dates(&storage.raw_dir())?;
    let processed = reports.processed_index()?;
    let plan = plan_pending(&available, &processed);
    Ok((processed, plan))
}

pub fn run_ingest(config: &Config, dry_run: bool, progress: &dyn ProgressReporter) -> Result<()> {
    let storage = &config.storage;
    let reports = FsReportStore::new(storage.reports_dir());
    let (mut processed, mut plan) = plan_run(storage, &reports)?;

    for date in &plan.skipped {
        log::warn!(
            "snapshot {} predates the last processed snapshot and will not be ingested",
            date
        );
    }

    if plan.pending.is_empty() {
        println!("nothing to ingest");
        return Ok(());
    }

    if dry_run {
        println!("Pending snapshots ({}):", plan.pending.len());
        for date in &plan.pending {
            println!("  {}", date);
        }
        if !plan.skipped.is_empty() {
            println!("Skipped (older than last processed): {}", plan.skipped.len());
        }
        return Ok(());
    }

    let _lock = if config.ingest.lock {
        let guard = run_lock::acquire_or_wait(&storage.lock_path())?;
        (processed, plan) = plan_run(storage, &reports)?;
        if plan.pending.is_empty() {
            println!("nothing to ingest");
            return Ok(());
        }
        Some(guard)
    } else {
        None
    };

    let source = FsSnapshotSource::new(storage.raw_dir(), config.ingest.window_days);
    let store = FsSeriesStore::new(storage.series_dir());
    let summary = Ingestor::new(&source, &store, &reports)
        .with_progress(progress)
        .run(&plan.pending, &mut processed)?;

    for (date, report) in &summary.reports {
        println!(
            "{}  +{} -{} repos, {} star changes, {} fork changes",
            date,
            report.began_tracking.len(),
            report.ended_tracking.len(),
            report.stars_change.len(),
            report.forks_change.len()
        );
    }
    println!(
        "Ingested {} snapshot(s): {} new repos, {} scalar points, {} daily points",
        summary.processed.len(),
        summary.entities_created,
        summary.scalar_points,
        summary.daily_points
    );
    if summary.daily_stale > 0 {
        println!(
            "Skipped {} stale daily date(s) older than the last recorded point",
            summary.daily_stale
        );
    }
    println!("ok");
    Ok(())
}
