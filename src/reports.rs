//! Diff report storage.
//!
//! A report for date `D` lives at `<reports_dir>/D/D.json`. The file's
//! existence is what marks `D` processed, so it is written through a
//! temporary file in the same directory and renamed into place.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::io::Write;
use std::path::PathBuf;
use tempfile::NamedTempFile;
use walkdir::WalkDir;

use traffic_ledger_core::ingest::{ProcessedIndex, ReportSink};
use traffic_ledger_core::models::DiffReport;

use crate::snapshot_loader::DATE_FORMAT;

#[derive(Debug, Clone)]
pub struct FsReportStore {
    dir: PathBuf,
}

impl FsReportStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn report_path(&self, date: NaiveDate) -> PathBuf {
        let day = date.format(DATE_FORMAT).to_string();
        self.dir.join(&day).join(format!("{}.json", day))
    }

    /// Dates with a complete report on disk.
    ///
    /// Date directories without their JSON file are left over from an
    /// interrupted write and do not count.
    pub fn processed_index(&self) -> Result<ProcessedIndex> {
        if !self.dir.is_dir() {
            return Ok(ProcessedIndex::default());
        }
        let mut dates = Vec::new();
        for entry in WalkDir::new(&self.dir).min_depth(1).max_depth(1) {
            let entry = entry.with_context(|| format!("listing {}", self.dir.display()))?;
            if !entry.file_type().is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy();
            let Ok(date) = NaiveDate::parse_from_str(&name, DATE_FORMAT) else {
                log::debug!("ignoring {} in reports dir", name);
                continue;
            };
            if self.report_path(date).is_file() {
                dates.push(date);
            } else {
                log::warn!("report directory {} has no report; treating as pending", name);
            }
        }
        Ok(ProcessedIndex::new(dates))
    }

    pub fn read(&self, date: NaiveDate) -> Result<DiffReport> {
        let path = self.report_path(date);
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("No report for {} ({})", date, path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse report {}", path.display()))
    }

    /// Most recent report, if any.
    pub fn latest(&self) -> Result<Option<(NaiveDate, DiffReport)>> {
        match self.processed_index()?.last() {
            Some(date) => Ok(Some((date, self.read(date)?))),
            None => Ok(None),
        }
    }
}

impl ReportSink for FsReportStore {
    fn write_report(&self, date: NaiveDate, report: &DiffReport) -> Result<()> {
        let path = self.report_path(date);
        let dir = path
            .parent()
            .context("report path has no parent directory")?;
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;

        let json = serde_json::to_string_pretty(report)?;
        let mut tmp = NamedTempFile::new_in(dir)
            .with_context(|| format!("Failed to create temp file in {}", dir.display()))?;
        tmp.write_all(json.as_bytes())?;
        tmp.write_all(b"\n")?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path)
            .with_context(|| format!("Failed to write {}", path.display()))?;

        log::debug!("wrote report {}", path.display());
        Ok(())
    }
}
