//! CSV-file [`SeriesStore`].
//!
//! Each series is `<series_dir>/<storage-key>/<metric>.csv` with a
//! `date,<metric>` header followed by one `YYYY-MM-DD,<value>` row per
//! point. Files are only ever appended to.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::PathBuf;

use traffic_ledger_core::models::{Metric, SeriesPoint};
use traffic_ledger_core::store::{EntityHandle, SeriesStore};
use traffic_ledger_core::IngestError;

use crate::entity_dir::EntityDirectory;
use crate::snapshot_loader::DATE_FORMAT;

#[derive(Debug, Clone)]
pub struct FsSeriesStore {
    entities: EntityDirectory,
}

impl FsSeriesStore {
    pub fn new(series_dir: impl Into<PathBuf>) -> Self {
        Self {
            entities: EntityDirectory::new(series_dir),
        }
    }

    pub fn entities(&self) -> &EntityDirectory {
        &self.entities
    }

    /// Path of one series file.
    pub fn series_path(&self, entity_id: &str, metric: Metric) -> Result<PathBuf> {
        Ok(self
            .entities
            .path_for(entity_id)?
            .join(format!("{}.csv", metric.name())))
    }
}

fn corrupt(entity_id: &str, metric: Metric, reason: String) -> anyhow::Error {
    IngestError::CorruptSeries {
        entity: entity_id.to_string(),
        metric: metric.name().to_string(),
        reason,
    }
    .into()
}

impl SeriesStore for FsSeriesStore {
    fn ensure_entity(&self, entity_id: &str) -> Result<EntityHandle> {
        self.entities.ensure(entity_id)
    }

    fn read_series(&self, entity_id: &str, metric: Metric) -> Result<Vec<SeriesPoint>> {
        let path = self.series_path(entity_id, metric)?;
        if !path.exists() {
            return Ok(Vec::new());
        }

        let mut reader = csv::Reader::from_path(&path)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        let headers = reader
            .headers()
            .with_context(|| format!("Failed to read {}", path.display()))?;
        if headers.len() != 2 || &headers[0] != "date" || &headers[1] != metric.name() {
            return Err(corrupt(
                entity_id,
                metric,
                format!("unexpected header '{}'", headers.iter().collect::<Vec<_>>().join(",")),
            ));
        }

        let mut points: Vec<SeriesPoint> = Vec::new();
        for (i, record) in reader.records().enumerate() {
            let record = record.with_context(|| format!("Failed to read {}", path.display()))?;
            let line = i + 2;
            let date = record
                .get(0)
                .and_then(|d| NaiveDate::parse_from_str(d, DATE_FORMAT).ok())
                .ok_or_else(|| corrupt(entity_id, metric, format!("bad date on line {}", line)))?;
            let value = record
                .get(1)
                .and_then(|v| v.parse::<i64>().ok())
                .ok_or_else(|| corrupt(entity_id, metric, format!("bad value on line {}", line)))?;
            if let Some(prev) = points.last() {
                if date <= prev.date {
                    return Err(corrupt(
                        entity_id,
                        metric,
                        format!("{} on line {} does not follow {}", date, line, prev.date),
                    ));
                }
            }
            points.push(SeriesPoint::new(date, value));
        }
        Ok(points)
    }

    fn append_points(
        &self,
        entity_id: &str,
        metric: Metric,
        points: &[SeriesPoint],
    ) -> Result<()> {
        if points.is_empty() {
            return Ok(());
        }
        let path = self.series_path(entity_id, metric)?;
        let mut file = OpenOptions::new()
            .read(true)
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open {} for append", path.display()))?;
        let len = file
            .metadata()
            .with_context(|| format!("Failed to stat {}", path.display()))?
            .len();
        let is_new = len == 0;

        // A row cut short by an interrupted write must not fuse with ours.
        if !is_new {
            let mut last = [0u8; 1];
            file.seek(SeekFrom::End(-1))?;
            file.read_exact(&mut last)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            if last[0] != b'\n' {
                log::warn!("{} does not end with a newline; terminating last row", path.display());
                file.write_all(b"\n")
                    .with_context(|| format!("Failed to write {}", path.display()))?;
            }
        }

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        if is_new {
            writer.write_record(["date", metric.name()])?;
        }
        for p in points {
            writer.write_record([p.date.format(DATE_FORMAT).to_string(), p.value.to_string()])?;
        }
        writer
            .flush()
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }
}
