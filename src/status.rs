//! Storage overview.
//!
//! Summarizes what has been ingested: raw snapshot counts, processed and
//! pending dates, and how many repos are tracked. Used by `traffic status`
//! to check that scheduled ingests are keeping up.

use anyhow::Result;
use chrono::NaiveDate;

use traffic_ledger_core::ingest::plan_pending;
use traffic_ledger_core::IngestError;

use crate::config::Config;
use crate::entity_dir::EntityDirectory;
use crate::progress::format_number;
use crate::reports::FsReportStore;
use crate::snapshot_loader::list_snapshot_dates;

/// Run the status command: inspect storage and print a summary.
pub fn run_status(config: &Config) -> Result<()> {
    let storage = &config.storage;

    let available = match list_snapshot_dates(&storage.raw_dir()) {
        Ok(dates) => dates,
        Err(e) if matches!(e.downcast_ref::<IngestError>(), Some(IngestError::NoSnapshots(_))) => {
            Vec::new()
        }
        Err(e) => return Err(e),
    };
    let processed = FsReportStore::new(storage.reports_dir()).processed_index()?;
    let plan = plan_pending(&available, &processed);
    let tracked = EntityDirectory::new(storage.series_dir()).keys()?.len();

    println!("Traffic Ledger Status");
    println!("=====================");
    println!();
    println!("  Raw snapshots:  {}", storage.raw_dir().display());
    println!("  Series:         {}", storage.series_dir().display());
    println!("  Reports:        {}", storage.reports_dir().display());
    println!();
    println!("  Snapshots:      {}", format_number(available.len() as u64));
    println!("  Processed:      {}", format_number(processed.len() as u64));
    println!("  Pending:        {}", format_number(plan.pending.len() as u64));
    println!("  Skipped:        {}", format_number(plan.skipped.len() as u64));
    println!("  Tracked repos:  {}", format_number(tracked as u64));

    let today = chrono::Local::now().date_naive();
    if let Some(last) = processed.last() {
        println!("  Last processed: {} ({})", last, format_age(last, today));
    }
    if let Some(next) = plan.pending.first() {
        println!("  Next pending:   {}", next);
    }

    if !plan.skipped.is_empty() {
        println!();
        println!("  Skipped snapshots (older than the last processed one):");
        for date in &plan.skipped {
            println!("    {}", date);
        }
    }

    println!();
    Ok(())
}

/// Format a date relative to `today` (e.g. "3 days ago").
fn format_age(date: NaiveDate, today: NaiveDate) -> String {
    let days = (today - date).num_days();
    match days {
        d if d < 0 => "in the future".to_string(),
        0 => "today".to_string(),
        1 => "yesterday".to_string(),
        d => format!("{} days ago", d),
    }
}
