//! Error taxonomy for snapshot ingestion.
//!
//! Every variant is fatal for the snapshot being ingested. Errors travel
//! inside [`anyhow::Error`] so callers can add I/O context freely; tests
//! and the CLI recover the kind with `downcast_ref::<IngestError>()`.

use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("no raw snapshots found in {0}; run the metrics collector first")]
    NoSnapshots(String),

    #[error("snapshot {date}: missing column '{column}'")]
    MissingColumn { date: NaiveDate, column: String },

    #[error("snapshot {date}: entity '{entity}' has invalid {column} value '{value}'")]
    MalformedValue {
        date: NaiveDate,
        entity: String,
        column: String,
        value: String,
    },

    #[error("snapshot {date}: entity '{entity}' has malformed {column}: {reason}")]
    MalformedDaily {
        date: NaiveDate,
        entity: String,
        column: String,
        reason: String,
    },

    #[error("snapshot {date}: entity '{entity}' appears more than once")]
    DuplicateEntity { date: NaiveDate, entity: String },

    #[error("entity id '{0}' does not yield a usable storage name")]
    InvalidEntityId(String),

    #[error("series {entity}/{metric} already ends at {last}; refusing to append {date}")]
    OutOfOrder {
        entity: String,
        metric: String,
        last: NaiveDate,
        date: NaiveDate,
    },

    #[error("snapshot {date} is not after the last processed snapshot {last}")]
    StaleSnapshot { last: NaiveDate, date: NaiveDate },

    #[error("series {entity}/{metric} is corrupt: {reason}")]
    CorruptSeries {
        entity: String,
        metric: String,
        reason: String,
    },

    #[error("previous snapshot {0} is recorded as processed but its raw data is missing")]
    MissingPrevious(NaiveDate),

    #[error("requested snapshot {requested} but the source returned {found}")]
    DateMismatch {
        requested: NaiveDate,
        found: NaiveDate,
    },
}
