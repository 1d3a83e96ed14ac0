//! Read-only views of ingested data.
//!
//! `traffic report` shows a persisted diff report (what a notifier would
//! send) and `traffic series` prints one merged series (what a chart would
//! plot). Neither touches raw snapshots.

use anyhow::{bail, Result};
use chrono::NaiveDate;
use serde::Serialize;

use traffic_ledger_core::models::{DiffReport, Metric, SeriesPoint};
use traffic_ledger_core::store::SeriesStore;

use crate::config::Config;
use crate::reports::FsReportStore;
use crate::series_fs::FsSeriesStore;
use crate::snapshot_loader::DATE_FORMAT;

/// A report together with the date it belongs to.
#[derive(Debug, Clone, Serialize)]
pub struct ReportResponse {
    pub date: NaiveDate,
    #[serde(flatten)]
    pub report: DiffReport,
}

#[derive(Debug, Clone, Serialize)]
pub struct SeriesResponse {
    pub entity: String,
    pub metric: String,
    pub points: Vec<SeriesPoint>,
}

/// Load the report for `date`, or the latest one.
pub fn get_report(config: &Config, date: Option<&str>) -> Result<ReportResponse> {
    let reports = FsReportStore::new(config.storage.reports_dir());
    match date {
        Some(raw) => {
            let date = NaiveDate::parse_from_str(raw, DATE_FORMAT)
                .map_err(|_| anyhow::anyhow!("Invalid date '{}', expected YYYY-MM-DD", raw))?;
            Ok(ReportResponse {
                date,
                report: reports.read(date)?,
            })
        }
        None => match reports.latest()? {
            Some((date, report)) => Ok(ReportResponse { date, report }),
            None => bail!("no reports yet; run `traffic ingest` first"),
        },
    }
}

pub fn get_series(config: &Config, entity: &str, metric: &str) -> Result<SeriesResponse> {
    let metric: Metric = metric.parse()?;
    let store = FsSeriesStore::new(config.storage.series_dir());
    if !store.entities().path_for(entity)?.is_dir() {
        bail!("repo not tracked: {}", entity);
    }
    Ok(SeriesResponse {
        entity: entity.to_string(),
        metric: metric.name().to_string(),
        points: store.read_series(entity, metric)?,
    })
}

pub fn run_report(config: &Config, date: Option<&str>, json: bool) -> Result<()> {
    let resp = get_report(config, date)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&resp)?);
        return Ok(());
    }

    println!("--- Report {} ---", resp.date);
    let report = &resp.report;
    if report.is_quiet() {
        println!("no changes");
        return Ok(());
    }
    print_names("Began tracking", &report.began_tracking);
    print_names("Ended tracking", &report.ended_tracking);
    print_deltas("Stars", &report.stars_change);
    print_deltas("Forks", &report.forks_change);
    Ok(())
}

pub fn run_series(config: &Config, entity: &str, metric: &str, json: bool) -> Result<()> {
    let resp = get_series(config, entity, metric)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&resp)?);
        return Ok(());
    }

    println!("--- {} {} ({} points) ---", resp.entity, resp.metric, resp.points.len());
    for p in &resp.points {
        println!("{}  {:>8}", p.date, p.value);
    }
    Ok(())
}

fn print_names(title: &str, names: &[String]) {
    if names.is_empty() {
        return;
    }
    println!("{} ({}):", title, names.len());
    for name in names {
        println!("  {}", name);
    }
}

fn print_deltas(title: &str, deltas: &[(String, i64)]) {
    if deltas.is_empty() {
        return;
    }
    println!("{} ({}):", title, deltas.len());
    for (name, delta) in deltas {
        println!("  {:<40} {:+}", name, delta);
    }
}
