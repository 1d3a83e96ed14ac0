//! Core data types shared by the loader, the series store, the diff engine
//! and the orchestrator.
//!
//! A [`Snapshot`] is one dated capture of every tracked repository. Its rows
//! carry two kinds of metrics: scalar values that contribute exactly one
//! point per snapshot date, and daily breakdowns that cover a trailing
//! window and overlap from one snapshot to the next.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

use anyhow::Result;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::IngestError;

/// Per-day counts over a snapshot's trailing window, ordered by date.
pub type DailyCounts = BTreeMap<NaiveDate, i64>;

/// Metrics that contribute one point per snapshot date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ScalarMetric {
    Stars,
    Forks,
    Clones2Weeks,
    ClonesUniques2Weeks,
    Views2Weeks,
    ViewsUniques2Weeks,
}

impl ScalarMetric {
    pub const ALL: [ScalarMetric; 6] = [
        ScalarMetric::Stars,
        ScalarMetric::Forks,
        ScalarMetric::Clones2Weeks,
        ScalarMetric::ClonesUniques2Weeks,
        ScalarMetric::Views2Weeks,
        ScalarMetric::ViewsUniques2Weeks,
    ];

    /// Column name in raw snapshots, also the series file stem.
    pub fn name(self) -> &'static str {
        match self {
            ScalarMetric::Stars => "stars",
            ScalarMetric::Forks => "forks",
            ScalarMetric::Clones2Weeks => "clones_2weeks",
            ScalarMetric::ClonesUniques2Weeks => "clones_uniques_2weeks",
            ScalarMetric::Views2Weeks => "views_2weeks",
            ScalarMetric::ViewsUniques2Weeks => "views_uniques_2weeks",
        }
    }
}

/// Metrics reported as a per-day breakdown across the trailing window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DailyMetric {
    ClonesDaily,
    ClonesUniquesDaily,
    ViewsDaily,
    ViewsUniquesDaily,
}

impl DailyMetric {
    pub const ALL: [DailyMetric; 4] = [
        DailyMetric::ClonesDaily,
        DailyMetric::ClonesUniquesDaily,
        DailyMetric::ViewsDaily,
        DailyMetric::ViewsUniquesDaily,
    ];

    pub fn name(self) -> &'static str {
        match self {
            DailyMetric::ClonesDaily => "clones_daily",
            DailyMetric::ClonesUniquesDaily => "clones_uniques_daily",
            DailyMetric::ViewsDaily => "views_daily",
            DailyMetric::ViewsUniquesDaily => "views_uniques_daily",
        }
    }
}

/// Any metric that owns a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Metric {
    Scalar(ScalarMetric),
    Daily(DailyMetric),
}

impl Metric {
    /// All ten series-backed metrics, scalars first.
    pub fn all() -> impl Iterator<Item = Metric> {
        ScalarMetric::ALL
            .into_iter()
            .map(Metric::Scalar)
            .chain(DailyMetric::ALL.into_iter().map(Metric::Daily))
    }

    pub fn name(self) -> &'static str {
        match self {
            Metric::Scalar(m) => m.name(),
            Metric::Daily(m) => m.name(),
        }
    }
}

impl From<ScalarMetric> for Metric {
    fn from(m: ScalarMetric) -> Self {
        Metric::Scalar(m)
    }
}

impl From<DailyMetric> for Metric {
    fn from(m: DailyMetric) -> Self {
        Metric::Daily(m)
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Metric {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Metric::all().find(|m| m.name() == s).ok_or_else(|| {
            let known: Vec<&str> = Metric::all().map(Metric::name).collect();
            anyhow::anyhow!("Unknown metric: '{}'. Available: {}", s, known.join(", "))
        })
    }
}

/// One entity's values in a snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SnapshotRow {
    pub entity: String,
    pub stars: i64,
    pub forks: i64,
    pub clones_2weeks: i64,
    pub clones_uniques_2weeks: i64,
    pub views_2weeks: i64,
    pub views_uniques_2weeks: i64,
    pub clones_daily: DailyCounts,
    pub clones_uniques_daily: DailyCounts,
    pub views_daily: DailyCounts,
    pub views_uniques_daily: DailyCounts,
    /// Opaque top-N collections, carried through untouched.
    pub referrers_top_10: Option<String>,
    pub content_top_10: Option<String>,
}

impl SnapshotRow {
    /// A row with every metric at zero.
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            ..Default::default()
        }
    }

    pub fn scalar(&self, metric: ScalarMetric) -> i64 {
        match metric {
            ScalarMetric::Stars => self.stars,
            ScalarMetric::Forks => self.forks,
            ScalarMetric::Clones2Weeks => self.clones_2weeks,
            ScalarMetric::ClonesUniques2Weeks => self.clones_uniques_2weeks,
            ScalarMetric::Views2Weeks => self.views_2weeks,
            ScalarMetric::ViewsUniques2Weeks => self.views_uniques_2weeks,
        }
    }

    pub fn scalar_mut(&mut self, metric: ScalarMetric) -> &mut i64 {
        match metric {
            ScalarMetric::Stars => &mut self.stars,
            ScalarMetric::Forks => &mut self.forks,
            ScalarMetric::Clones2Weeks => &mut self.clones_2weeks,
            ScalarMetric::ClonesUniques2Weeks => &mut self.clones_uniques_2weeks,
            ScalarMetric::Views2Weeks => &mut self.views_2weeks,
            ScalarMetric::ViewsUniques2Weeks => &mut self.views_uniques_2weeks,
        }
    }

    pub fn daily(&self, metric: DailyMetric) -> &DailyCounts {
        match metric {
            DailyMetric::ClonesDaily => &self.clones_daily,
            DailyMetric::ClonesUniquesDaily => &self.clones_uniques_daily,
            DailyMetric::ViewsDaily => &self.views_daily,
            DailyMetric::ViewsUniquesDaily => &self.views_uniques_daily,
        }
    }

    pub fn daily_mut(&mut self, metric: DailyMetric) -> &mut DailyCounts {
        match metric {
            DailyMetric::ClonesDaily => &mut self.clones_daily,
            DailyMetric::ClonesUniquesDaily => &mut self.clones_uniques_daily,
            DailyMetric::ViewsDaily => &mut self.views_daily,
            DailyMetric::ViewsUniquesDaily => &mut self.views_uniques_daily,
        }
    }
}

/// An immutable, dated capture of all tracked entities.
///
/// Rows keep the order they were read in; the diff engine reports in that
/// order.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    date: NaiveDate,
    rows: Vec<SnapshotRow>,
}

impl Snapshot {
    /// Build a snapshot, rejecting duplicate entity identifiers.
    pub fn new(date: NaiveDate, rows: Vec<SnapshotRow>) -> Result<Self> {
        let mut seen = HashSet::with_capacity(rows.len());
        for row in &rows {
            if !seen.insert(row.entity.as_str()) {
                return Err(IngestError::DuplicateEntity {
                    date,
                    entity: row.entity.clone(),
                }
                .into());
            }
        }
        Ok(Self { date, rows })
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn rows(&self) -> &[SnapshotRow] {
        &self.rows
    }

    pub fn entities(&self) -> impl Iterator<Item = &str> {
        self.rows.iter().map(|r| r.entity.as_str())
    }

    pub fn row(&self, entity: &str) -> Option<&SnapshotRow> {
        self.rows.iter().find(|r| r.entity == entity)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// A single (date, value) entry of a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub date: NaiveDate,
    pub value: i64,
}

impl SeriesPoint {
    pub fn new(date: NaiveDate, value: i64) -> Self {
        Self { date, value }
    }
}

/// Membership changes and star/fork deltas for one snapshot date.
///
/// Delta lists hold `(entity, current - previous)` for entities present in
/// both snapshots whose value changed, in the current snapshot's row order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffReport {
    pub began_tracking: Vec<String>,
    pub ended_tracking: Vec<String>,
    pub stars_change: Vec<(String, i64)>,
    pub forks_change: Vec<(String, i64)>,
}

impl DiffReport {
    pub fn is_quiet(&self) -> bool {
        self.began_tracking.is_empty()
            && self.ended_tracking.is_empty()
            && self.stars_change.is_empty()
            && self.forks_change.is_empty()
    }
}
