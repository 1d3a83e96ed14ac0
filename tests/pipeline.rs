use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chrono::NaiveDate;
use tempfile::TempDir;
use walkdir::WalkDir;

use traffic_ledger::config::Config;
use traffic_ledger::reports::FsReportStore;
use traffic_ledger::series_fs::FsSeriesStore;
use traffic_ledger::snapshot_loader::{list_snapshot_dates, FsSnapshotSource};
use traffic_ledger_core::ingest::{plan_pending, Ingestor, ReportSink};
use traffic_ledger_core::models::{DiffReport, ScalarMetric};
use traffic_ledger_core::store::SeriesStore;

const HEADER: &str = "repo,stars,forks,clones_2weeks,clones_uniques_2weeks,views_2weeks,views_uniques_2weeks,clones_daily,clones_uniques_daily,views_daily,views_uniques_daily,referrers_top_10,content_top_10";

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2021, 3, d).unwrap()
}

/// `(repo, stars, forks, views_daily mapping)`
fn write_snapshot(raw: &Path, date: &str, rows: &[(&str, i64, i64, &str)]) {
    let mut body = String::from(HEADER);
    body.push('\n');
    for (repo, stars, forks, views) in rows {
        body.push_str(&format!(
            "{},{},{},0,0,0,0,{{}},{{}},\"{}\",{{}},[],[]\n",
            repo, stars, forks, views
        ));
    }
    fs::create_dir_all(raw).unwrap();
    fs::write(raw.join(format!("{}.csv", date)), body).unwrap();
}

fn seed(root: &Path) {
    let raw = root.join("raw");
    write_snapshot(
        &raw,
        "2021-03-01",
        &[("octo/a", 10, 1, "{'2021-03-01': 4}"), ("octo/b", 3, 0, "{}")],
    );
    write_snapshot(
        &raw,
        "2021-03-02",
        &[
            ("octo/a", 12, 1, "{'2021-03-01': 4, '2021-03-02': 6}"),
            ("octo/c", 0, 0, "{'2021-03-02': 1}"),
        ],
    );
    write_snapshot(
        &raw,
        "2021-03-03",
        &[
            ("octo/a", 12, 2, "{'2021-03-02': 6, '2021-03-03': 2}"),
            ("octo/c", 5, 0, "{}"),
        ],
    );
}

/// Ingest every pending snapshot, at most `limit` of them.
fn ingest(cfg: &Config, limit: usize) -> usize {
    let storage = &cfg.storage;
    let reports = FsReportStore::new(storage.reports_dir());
    let mut processed = reports.processed_index().unwrap();
    let available = list_snapshot_dates(&storage.raw_dir()).unwrap();
    let mut pending = plan_pending(&available, &processed).pending;
    pending.truncate(limit);

    let source = FsSnapshotSource::new(storage.raw_dir(), cfg.ingest.window_days);
    let store = FsSeriesStore::new(storage.series_dir());
    Ingestor::new(&source, &store, &reports)
        .run(&pending, &mut processed)
        .unwrap()
        .processed
        .len()
}

/// Every derived file under `root`, excluding the raw input.
fn derived_state(root: &Path) -> BTreeMap<String, Vec<u8>> {
    WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| !e.path().starts_with(root.join("raw")))
        .map(|e| {
            let rel = e.path().strip_prefix(root).unwrap().display().to_string();
            (rel, fs::read(e.path()).unwrap())
        })
        .collect()
}

#[test]
fn test_ingest_writes_series_and_reports() {
    let tmp = TempDir::new().unwrap();
    seed(tmp.path());
    let cfg = Config::for_root(tmp.path());

    assert_eq!(ingest(&cfg, usize::MAX), 3);

    let stars = fs::read_to_string(tmp.path().join("repos/octo-a/stars.csv")).unwrap();
    assert_eq!(stars, "date,stars\n2021-03-01,10\n2021-03-02,12\n2021-03-03,12\n");
    let views = fs::read_to_string(tmp.path().join("repos/octo-a/views_daily.csv")).unwrap();
    assert_eq!(
        views,
        "date,views_daily\n2021-03-01,4\n2021-03-02,6\n2021-03-03,2\n"
    );

    let report: DiffReport = serde_json::from_str(
        &fs::read_to_string(tmp.path().join("analytics/2021-03-02/2021-03-02.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(report.began_tracking, vec!["octo/c"]);
    assert_eq!(report.ended_tracking, vec!["octo/b"]);
    assert_eq!(report.stars_change, vec![("octo/a".to_string(), 2)]);
}

#[test]
fn test_rerun_changes_nothing() {
    let tmp = TempDir::new().unwrap();
    seed(tmp.path());
    let cfg = Config::for_root(tmp.path());

    ingest(&cfg, usize::MAX);
    let before = derived_state(tmp.path());
    assert_eq!(ingest(&cfg, usize::MAX), 0);
    assert_eq!(before, derived_state(tmp.path()));
}

#[test]
fn test_incremental_runs_match_single_run() {
    let single = TempDir::new().unwrap();
    seed(single.path());
    ingest(&Config::for_root(single.path()), usize::MAX);

    let stepped = TempDir::new().unwrap();
    seed(stepped.path());
    let cfg = Config::for_root(stepped.path());
    assert_eq!(ingest(&cfg, 1), 1);
    assert_eq!(ingest(&cfg, 1), 1);
    assert_eq!(ingest(&cfg, 1), 1);

    assert_eq!(derived_state(single.path()), derived_state(stepped.path()));
}

#[test]
fn test_lost_report_is_regenerated_without_duplicates() {
    let tmp = TempDir::new().unwrap();
    seed(tmp.path());
    let cfg = Config::for_root(tmp.path());
    ingest(&cfg, usize::MAX);
    let before = derived_state(tmp.path());

    // Simulate a crash between merging and writing the last report.
    fs::remove_file(tmp.path().join("analytics/2021-03-03/2021-03-03.json")).unwrap();
    assert_eq!(ingest(&cfg, usize::MAX), 1);
    assert_eq!(before, derived_state(tmp.path()));
}

#[test]
fn test_new_snapshot_after_full_ingest() {
    let tmp = TempDir::new().unwrap();
    seed(tmp.path());
    let cfg = Config::for_root(tmp.path());
    ingest(&cfg, usize::MAX);

    write_snapshot(
        &tmp.path().join("raw"),
        "2021-03-04",
        &[("octo/a", 15, 2, "{'2021-03-04': 9}")],
    );
    assert_eq!(ingest(&cfg, usize::MAX), 1);

    let reports = FsReportStore::new(cfg.storage.reports_dir());
    let (date, report) = reports.latest().unwrap().unwrap();
    assert_eq!(date, day(4));
    assert_eq!(report.ended_tracking, vec!["octo/c"]);
    assert_eq!(report.stars_change, vec![("octo/a".to_string(), 3)]);

    let store = FsSeriesStore::new(cfg.storage.series_dir());
    let stars = store
        .read_series("octo/a", ScalarMetric::Stars.into())
        .unwrap();
    assert_eq!(stars.last().map(|p| (p.date, p.value)), Some((day(4), 15)));
}

#[test]
fn test_narrowed_window_does_not_reject_processed_snapshot() {
    let tmp = TempDir::new().unwrap();
    let raw = tmp.path().join("raw");
    write_snapshot(&raw, "2021-03-01", &[("octo/a", 10, 1, "{'2021-02-20': 4}")]);
    let mut cfg = Config::for_root(tmp.path());
    assert_eq!(ingest(&cfg, usize::MAX), 1);

    // 2021-02-20 falls outside a 7 day window, but 03-01 is only diffed now.
    cfg.ingest.window_days = 7;
    write_snapshot(&raw, "2021-03-02", &[("octo/a", 11, 1, "{'2021-03-02': 5}")]);
    assert_eq!(ingest(&cfg, usize::MAX), 1);

    let reports = FsReportStore::new(cfg.storage.reports_dir());
    let (date, report) = reports.latest().unwrap().unwrap();
    assert_eq!(date, day(2));
    assert_eq!(report.stars_change, vec![("octo/a".to_string(), 1)]);
}

#[test]
fn test_bad_snapshot_leaves_earlier_dates_processed() {
    let tmp = TempDir::new().unwrap();
    seed(tmp.path());
    fs::write(
        tmp.path().join("raw/2021-03-02.csv"),
        format!("{}\nocto/a,lots,1,0,0,0,0,{{}},{{}},{{}},{{}},[],[]\n", HEADER),
    )
    .unwrap();
    let cfg = Config::for_root(tmp.path());

    let storage = &cfg.storage;
    let reports = FsReportStore::new(storage.reports_dir());
    let mut processed = reports.processed_index().unwrap();
    let source = FsSnapshotSource::new(storage.raw_dir(), cfg.ingest.window_days);
    let store = FsSeriesStore::new(storage.series_dir());
    let err = Ingestor::new(&source, &store, &reports)
        .run(&[day(1), day(2), day(3)], &mut processed)
        .unwrap_err();

    assert!(format!("{:#}", err).contains("lots"));
    assert_eq!(processed.iter().collect::<Vec<_>>(), vec![day(1)]);
    assert!(!reports.report_path(day(2)).exists());
    assert!(!reports.report_path(day(3)).exists());
}

#[test]
fn test_report_sink_round_trip_through_processed_index() {
    let tmp = TempDir::new().unwrap();
    let reports = FsReportStore::new(tmp.path());
    reports
        .write_report(day(5), &DiffReport::default())
        .unwrap();
    assert_eq!(reports.processed_index().unwrap().last(), Some(day(5)));
}
