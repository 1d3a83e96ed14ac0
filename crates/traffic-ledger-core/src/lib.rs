//! # Traffic Ledger Core
//!
//! Storage-agnostic logic for traffic-ledger: the snapshot data model,
//! the series store abstraction, idempotent series merging, the diff
//! engine and the ingestion orchestrator.
//!
//! This crate performs no filesystem I/O. The binary crate supplies
//! CSV/JSON-backed implementations of [`store::SeriesStore`],
//! [`ingest::SnapshotSource`] and [`ingest::ReportSink`]; tests use
//! [`store::memory::InMemorySeriesStore`].

pub mod diff;
pub mod entity;
pub mod error;
pub mod ingest;
pub mod models;
pub mod series;
pub mod store;

pub use error::IngestError;
