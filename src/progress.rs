//! Ingest progress reporting.
//!
//! Reports which snapshot `traffic ingest` is working on and how many are
//! left. Progress is emitted on **stderr** so stdout remains parseable for
//! scripts.

use std::io::Write;
use std::str::FromStr;

use traffic_ledger_core::ingest::{IngestEvent, NoProgress, ProgressReporter};

/// Human-friendly progress on stderr: "ingest 2021-03-02  [3 / 10]  loading".
pub struct StderrProgress;

impl ProgressReporter for StderrProgress {
    fn report(&self, event: IngestEvent) {
        let line = match &event {
            IngestEvent::Loading { date, n, total } => {
                format!(
                    "ingest {}  [{} / {}]  loading\n",
                    date,
                    format_number(*n as u64),
                    format_number(*total as u64)
                )
            }
            IngestEvent::Merged {
                date,
                entities,
                points,
            } => format!(
                "ingest {}  merged {} points across {} repos\n",
                date,
                format_number(*points as u64),
                format_number(*entities as u64)
            ),
            IngestEvent::Reported { date } => format!("ingest {}  report written\n", date),
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl ProgressReporter for JsonProgress {
    fn report(&self, event: IngestEvent) {
        let obj = match &event {
            IngestEvent::Loading { date, n, total } => serde_json::json!({
                "event": "progress",
                "phase": "loading",
                "date": date,
                "n": n,
                "total": total
            }),
            IngestEvent::Merged {
                date,
                entities,
                points,
            } => serde_json::json!({
                "event": "progress",
                "phase": "merged",
                "date": date,
                "entities": entities,
                "points": points
            }),
            IngestEvent::Reported { date } => serde_json::json!({
                "event": "progress",
                "phase": "reported",
                "date": date
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

pub(crate) fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn ProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}

impl FromStr for ProgressMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "off" | "none" => Ok(ProgressMode::Off),
            "human" => Ok(ProgressMode::Human),
            "json" => Ok(ProgressMode::Json),
            other => anyhow::bail!("Unknown progress mode: '{}'. Use off, human or json", other),
        }
    }
}
