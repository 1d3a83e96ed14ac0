//! # Traffic Ledger
//!
//! Append-only history of repository traffic metrics.
//!
//! A metrics collector drops one CSV snapshot per day into `raw/`. Traffic
//! Ledger merges each new snapshot into per-repo time series and writes a
//! diff report listing repos that appeared or disappeared and how their
//! stars and forks moved.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌────────────────┐
//! │ raw/*.csv   │──▶│  Ingestor    │──▶│ repos/<key>/   │
//! │ snapshots   │   │ merge + diff │   │ <metric>.csv   │
//! └─────────────┘   └──────┬───────┘   └────────────────┘
//!                          │
//!                          ▼
//!                  ┌────────────────┐
//!                  │ analytics/<d>/ │
//!                  │   <d>.json     │
//!                  └────────────────┘
//! ```
//!
//! The merge and diff logic lives in `traffic-ledger-core`; this crate
//! provides the filesystem implementations and the `traffic` CLI.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`snapshot_loader`] | Raw snapshot discovery and CSV parsing |
//! | [`entity_dir`] | Per-repo storage directories |
//! | [`series_fs`] | CSV-file series store |
//! | [`reports`] | Diff report persistence and the processed index |
//! | [`run_lock`] | Exclusive lock around ingest runs |
//! | [`progress`] | Ingest progress on stderr |
//! | [`ingest`] | `traffic ingest` |
//! | [`init`] | `traffic init` |
//! | [`status`] | `traffic status` |
//! | [`show`] | `traffic report` and `traffic series` |

pub mod config;
pub mod entity_dir;
pub mod ingest;
pub mod init;
pub mod progress;
pub mod reports;
pub mod run_lock;
pub mod series_fs;
pub mod show;
pub mod snapshot_loader;
pub mod status;
