//! Period-over-period comparison of two snapshots.
//!
//! Produces the entities that started or stopped being tracked and the
//! signed change of cumulative metrics for entities present in both.
//! Output follows the row order of the snapshot it is derived from
//! (current for gains and deltas, previous for losses). It is not sorted.

use std::collections::{HashMap, HashSet};

use crate::models::{DiffReport, ScalarMetric, Snapshot};

/// Entities gained and lost between two snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MembershipDiff {
    pub began_tracking: Vec<String>,
    pub ended_tracking: Vec<String>,
}

/// Compare the entity sets of two snapshots.
///
/// Without a previous snapshot every current entity is new and nothing
/// has ended.
pub fn compute_membership(current: &Snapshot, previous: Option<&Snapshot>) -> MembershipDiff {
    let previous = match previous {
        Some(p) => p,
        None => {
            return MembershipDiff {
                began_tracking: current.entities().map(str::to_string).collect(),
                ended_tracking: Vec::new(),
            }
        }
    };

    let current_ids: HashSet<&str> = current.entities().collect();
    let previous_ids: HashSet<&str> = previous.entities().collect();

    MembershipDiff {
        began_tracking: current
            .entities()
            .filter(|e| !previous_ids.contains(e))
            .map(str::to_string)
            .collect(),
        ended_tracking: previous
            .entities()
            .filter(|e| !current_ids.contains(e))
            .map(str::to_string)
            .collect(),
    }
}

/// Signed change of `metric` for entities present in both snapshots.
///
/// Entities whose value did not change are omitted, as are entities
/// present in only one snapshot.
pub fn compute_deltas(
    current: &Snapshot,
    previous: &Snapshot,
    metric: ScalarMetric,
) -> Vec<(String, i64)> {
    let before: HashMap<&str, i64> = previous
        .rows()
        .iter()
        .map(|r| (r.entity.as_str(), r.scalar(metric)))
        .collect();

    current
        .rows()
        .iter()
        .filter_map(|row| {
            let prev = *before.get(row.entity.as_str())?;
            let delta = row.scalar(metric) - prev;
            (delta != 0).then(|| (row.entity.clone(), delta))
        })
        .collect()
}

/// Build the full diff report for `current`.
pub fn build_report(current: &Snapshot, previous: Option<&Snapshot>) -> DiffReport {
    let membership = compute_membership(current, previous);
    let (stars_change, forks_change) = match previous {
        Some(prev) => (
            compute_deltas(current, prev, ScalarMetric::Stars),
            compute_deltas(current, prev, ScalarMetric::Forks),
        ),
        None => (Vec::new(), Vec::new()),
    };
    DiffReport {
        began_tracking: membership.began_tracking,
        ended_tracking: membership.ended_tracking,
        stars_change,
        forks_change,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SnapshotRow;
    use chrono::NaiveDate;

    fn snap(day: u32, rows: &[(&str, i64, i64)]) -> Snapshot {
        let rows = rows
            .iter()
            .map(|&(id, stars, forks)| SnapshotRow {
                stars,
                forks,
                ..SnapshotRow::new(id)
            })
            .collect();
        Snapshot::new(NaiveDate::from_ymd_opt(2021, 6, day).unwrap(), rows).unwrap()
    }

    #[test]
    fn test_first_snapshot_everything_new() {
        let current = snap(1, &[("A", 1, 0), ("B", 2, 0)]);
        let report = build_report(&current, None);
        assert_eq!(report.began_tracking, vec!["A", "B"]);
        assert!(report.ended_tracking.is_empty());
        assert!(report.stars_change.is_empty());
        assert!(report.forks_change.is_empty());
    }

    #[test]
    fn test_membership_change() {
        let previous = snap(1, &[("A", 0, 0), ("B", 0, 0)]);
        let current = snap(2, &[("B", 0, 0), ("C", 0, 0)]);
        let diff = compute_membership(&current, Some(&previous));
        assert_eq!(diff.began_tracking, vec!["C"]);
        assert_eq!(diff.ended_tracking, vec!["A"]);
    }

    #[test]
    fn test_star_delta_and_unchanged_omitted() {
        let previous = snap(1, &[("A", 5, 1), ("B", 10, 2)]);
        let current = snap(2, &[("A", 5, 1), ("B", 13, 2)]);
        let report = build_report(&current, Some(&previous));
        assert_eq!(report.stars_change, vec![("B".to_string(), 3)]);
        assert!(report.forks_change.is_empty());
    }

    #[test]
    fn test_negative_delta() {
        let previous = snap(1, &[("A", 9, 4)]);
        let current = snap(2, &[("A", 7, 1)]);
        let report = build_report(&current, Some(&previous));
        assert_eq!(report.stars_change, vec![("A".to_string(), -2)]);
        assert_eq!(report.forks_change, vec![("A".to_string(), -3)]);
    }

    #[test]
    fn test_deltas_skip_entities_in_one_snapshot_only() {
        let previous = snap(1, &[("gone", 100, 0), ("kept", 1, 0)]);
        let current = snap(2, &[("new", 50, 0), ("kept", 2, 0)]);
        let deltas = compute_deltas(&current, &previous, ScalarMetric::Stars);
        assert_eq!(deltas, vec![("kept".to_string(), 1)]);
    }

    #[test]
    fn test_output_follows_current_row_order() {
        let previous = snap(1, &[("a", 0, 0), ("m", 0, 0), ("z", 0, 0)]);
        let current = snap(2, &[("z", 3, 0), ("a", 1, 0), ("m", 2, 0)]);
        let deltas = compute_deltas(&current, &previous, ScalarMetric::Stars);
        let order: Vec<&str> = deltas.iter().map(|(e, _)| e.as_str()).collect();
        assert_eq!(order, vec!["z", "a", "m"]);
    }

    #[test]
    fn test_identical_snapshots_are_quiet() {
        let previous = snap(1, &[("A", 1, 1)]);
        let current = snap(2, &[("A", 1, 1)]);
        assert!(build_report(&current, Some(&previous)).is_quiet());
    }
}
