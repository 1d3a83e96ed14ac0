//! Raw snapshot discovery and parsing.
//!
//! Raw snapshots live in one directory as `YYYY-MM-DD.csv`, one row per
//! repository. Scalar columns are plain integers; daily columns hold a
//! `{'YYYY-MM-DD': n, ...}` mapping that is parsed here into a typed
//! [`DailyCounts`] so malformed data fails before anything is written.

use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate};
use csv::StringRecord;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use traffic_ledger_core::ingest::SnapshotSource;
use traffic_ledger_core::models::{DailyCounts, DailyMetric, ScalarMetric, Snapshot, SnapshotRow};
use traffic_ledger_core::IngestError;

pub const ENTITY_COLUMN: &str = "repo";
const REFERRERS_COLUMN: &str = "referrers_top_10";
const CONTENT_COLUMN: &str = "content_top_10";
pub(crate) const DATE_FORMAT: &str = "%Y-%m-%d";

/// Path of the raw snapshot for `date`.
pub fn snapshot_path(raw_dir: &Path, date: NaiveDate) -> PathBuf {
    raw_dir.join(format!("{}.csv", date.format(DATE_FORMAT)))
}

/// All snapshot dates found in `raw_dir`, oldest first.
///
/// Fails if the directory is missing or holds no snapshots: the collector
/// has to run before anything can be ingested.
pub fn list_snapshot_dates(raw_dir: &Path) -> Result<Vec<NaiveDate>> {
    if !raw_dir.is_dir() {
        return Err(IngestError::NoSnapshots(raw_dir.display().to_string()).into());
    }

    let mut dates = Vec::new();
    let walker = WalkDir::new(raw_dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name();
    for entry in walker {
        let entry = entry.with_context(|| format!("listing {}", raw_dir.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        match date_from_file_name(entry.path(), "csv") {
            Some(date) => dates.push(date),
            None => log::debug!("ignoring non-snapshot file {}", entry.path().display()),
        }
    }

    if dates.is_empty() {
        return Err(IngestError::NoSnapshots(raw_dir.display().to_string()).into());
    }
    dates.sort_unstable();
    Ok(dates)
}

/// Parse `YYYY-MM-DD.<ext>` into a date.
pub fn date_from_file_name(path: &Path, ext: &str) -> Option<NaiveDate> {
    if path.extension()?.to_str()? != ext {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    NaiveDate::parse_from_str(stem, DATE_FORMAT).ok()
}

/// Parse a textual `{date: count}` mapping.
///
/// Accepts single- or double-quoted ISO date keys and non-negative integer
/// counts. `{}` is an empty mapping.
pub fn parse_daily_counts(text: &str) -> std::result::Result<DailyCounts, String> {
    let inner = text
        .trim()
        .strip_prefix('{')
        .and_then(|s| s.strip_suffix('}'))
        .ok_or_else(|| "expected a {date: count} mapping".to_string())?;

    let mut counts = DailyCounts::new();
    for entry in inner.split(',') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        let (key, value) = entry
            .split_once(':')
            .ok_or_else(|| format!("entry '{}' has no ':'", entry))?;
        let key = unquote(key.trim()).ok_or_else(|| format!("key {} is not quoted", key.trim()))?;
        let date = NaiveDate::parse_from_str(key, DATE_FORMAT)
            .map_err(|_| format!("'{}' is not a YYYY-MM-DD date", key))?;
        let value: i64 = value
            .trim()
            .parse()
            .map_err(|_| format!("count '{}' for {} is not an integer", value.trim(), key))?;
        if value < 0 {
            return Err(format!("count {} for {} is negative", value, key));
        }
        if counts.insert(date, value).is_some() {
            return Err(format!("date {} appears twice", key));
        }
    }
    Ok(counts)
}

fn unquote(s: &str) -> Option<&str> {
    ['\'', '"']
        .iter()
        .find_map(|&q| s.strip_prefix(q).and_then(|rest| rest.strip_suffix(q)))
}

/// Reads raw snapshots from a directory of CSV files.
#[derive(Debug, Clone)]
pub struct FsSnapshotSource {
    raw_dir: PathBuf,
    window_days: u32,
}

impl FsSnapshotSource {
    pub fn new(raw_dir: impl Into<PathBuf>, window_days: u32) -> Self {
        Self {
            raw_dir: raw_dir.into(),
            window_days,
        }
    }

    pub fn raw_dir(&self) -> &Path {
        &self.raw_dir
    }

    /// Read and validate the snapshot for `date`.
    pub fn read(&self, date: NaiveDate) -> Result<Snapshot> {
        self.read_with(date, true)
    }

    /// Like [`read`](Self::read), but without checking daily dates against
    /// `window_days`. Used for snapshots that were merged under an earlier
    /// configuration.
    pub fn read_unwindowed(&self, date: NaiveDate) -> Result<Snapshot> {
        self.read_with(date, false)
    }

    fn read_with(&self, date: NaiveDate, check_window: bool) -> Result<Snapshot> {
        let path = snapshot_path(&self.raw_dir, date);
        let mut reader = csv::Reader::from_path(&path)
            .with_context(|| format!("Failed to open snapshot {}", path.display()))?;
        let headers = reader
            .headers()
            .with_context(|| format!("Failed to read header of {}", path.display()))?
            .clone();
        let columns = Columns::locate(&headers, date)?;

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.with_context(|| format!("Failed to read {}", path.display()))?;
            rows.push(self.parse_row(&record, &columns, date, check_window)?);
        }
        Snapshot::new(date, rows)
    }

    fn parse_row(
        &self,
        record: &StringRecord,
        columns: &Columns,
        date: NaiveDate,
        check_window: bool,
    ) -> Result<SnapshotRow> {
        let field = |idx: usize| record.get(idx).unwrap_or("").trim();

        let entity = field(columns.entity);
        if entity.is_empty() {
            return Err(IngestError::MalformedValue {
                date,
                entity: String::new(),
                column: ENTITY_COLUMN.to_string(),
                value: String::new(),
            }
            .into());
        }
        let mut row = SnapshotRow::new(entity);

        for (metric, idx) in &columns.scalars {
            let raw = field(*idx);
            let value = raw
                .parse::<i64>()
                .ok()
                .filter(|v| *v >= 0)
                .ok_or_else(|| IngestError::MalformedValue {
                    date,
                    entity: entity.to_string(),
                    column: metric.name().to_string(),
                    value: raw.to_string(),
                })?;
            *row.scalar_mut(*metric) = value;
        }

        // The window holds `window_days` dates ending at the snapshot date.
        let oldest = date
            .checked_sub_signed(Duration::days(
                i64::from(self.window_days.saturating_sub(1)),
            ))
            .unwrap_or(NaiveDate::MIN);
        for (metric, idx) in &columns.daily {
            let malformed = |reason: String| IngestError::MalformedDaily {
                date,
                entity: entity.to_string(),
                column: metric.name().to_string(),
                reason,
            };
            let counts = parse_daily_counts(field(*idx)).map_err(malformed)?;
            if let Some((&first, _)) = counts.first_key_value() {
                if check_window && first < oldest {
                    return Err(malformed(format!(
                        "{} is outside the {}-day window ending {}",
                        first, self.window_days, date
                    ))
                    .into());
                }
            }
            if let Some((&last, _)) = counts.last_key_value() {
                if last > date {
                    return Err(malformed(format!("{} is after the snapshot date", last)).into());
                }
            }
            *row.daily_mut(*metric) = counts;
        }

        row.referrers_top_10 = columns.referrers.map(|i| field(i).to_string());
        row.content_top_10 = columns.content.map(|i| field(i).to_string());
        Ok(row)
    }
}

impl SnapshotSource for FsSnapshotSource {
    fn load(&self, date: NaiveDate) -> Result<Snapshot> {
        self.read(date)
    }

    fn load_previous(&self, date: NaiveDate) -> Result<Snapshot> {
        self.read_unwindowed(date)
    }

    fn contains(&self, date: NaiveDate) -> bool {
        snapshot_path(&self.raw_dir, date).is_file()
    }
}

/// Header positions of every column the loader reads.
struct Columns {
    entity: usize,
    scalars: Vec<(ScalarMetric, usize)>,
    daily: Vec<(DailyMetric, usize)>,
    referrers: Option<usize>,
    content: Option<usize>,
}

impl Columns {
    fn locate(headers: &StringRecord, date: NaiveDate) -> Result<Self> {
        let find = |name: &str| headers.iter().position(|h| h.trim() == name);
        let require = |name: &str| {
            find(name).ok_or_else(|| IngestError::MissingColumn {
                date,
                column: name.to_string(),
            })
        };

        let entity = require(ENTITY_COLUMN)?;
        let scalars = ScalarMetric::ALL
            .into_iter()
            .map(|m| require(m.name()).map(|idx| (m, idx)))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let daily = DailyMetric::ALL
            .into_iter()
            .map(|m| require(m.name()).map(|idx| (m, idx)))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(Self {
            entity,
            scalars,
            daily,
            referrers: find(REFERRERS_COLUMN),
            content: find(CONTENT_COLUMN),
        })
    }
}
