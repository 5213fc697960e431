//! Retention pruning
//!
//! Decides which snapshots to delete from three competing constraints:
//!
//! 1. Snapshots older than `days` whole days are candidates for deletion.
//! 2. Age-based deletion never leaves fewer than `min_versions` snapshots;
//!    when it would, the youngest candidates are spared.
//! 3. When `max_versions` is positive and exceeded, the oldest excess
//!    snapshots are deleted regardless of age or `min_versions`.
//!
//! [`plan_prune`] computes the decision without touching the disk;
//! [`prune`] applies it to a [`SnapshotStore`], deleting each snapshot
//! independently so one failure never blocks the others.

use std::collections::BTreeSet;

use chrono::NaiveDateTime;

use crate::error::ColdsnapResult;
use crate::logging::RunLog;
use crate::models::{RetentionPolicy, Snapshot, SnapshotId};
use crate::store::SnapshotStore;

/// The outcome of evaluating a policy against a set of snapshots
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrunePlan {
    /// Deleted because of age (after the minimum-keep adjustment)
    pub by_age: Vec<SnapshotId>,
    /// Deleted because the hard cap was exceeded
    pub by_cap: Vec<SnapshotId>,
    /// Union of both sets, oldest first
    pub delete: Vec<SnapshotId>,
    /// Survivors, oldest first
    pub keep: Vec<SnapshotId>,
    /// Age candidates spared to honor `min_versions`
    pub spared: Vec<SnapshotId>,
}

impl PrunePlan {
    pub fn is_empty(&self) -> bool {
        self.delete.is_empty()
    }
}

/// Evaluate `policy` against `ids` as of `now`
pub fn plan_prune(ids: &[SnapshotId], policy: &RetentionPolicy, now: NaiveDateTime) -> PrunePlan {
    let mut sorted = ids.to_vec();
    sorted.sort();
    sorted.dedup();
    let total = sorted.len();

    let mut age_set: Vec<usize> = (0..total)
        .filter(|&i| sorted[i].age_days(now) > i64::from(policy.days))
        .collect();

    let remaining = total - age_set.len();
    let min_versions = policy.min_versions as usize;
    let mut spared = Vec::new();
    if remaining < min_versions {
        let restore = (min_versions - remaining).min(age_set.len());
        // age_set is ascending, so the youngest members sit at the end
        spared = age_set.split_off(age_set.len() - restore);
    }

    let max_versions = policy.max_versions as usize;
    let cap_set: Vec<usize> = if max_versions > 0 && total > max_versions {
        (0..total - max_versions).collect()
    } else {
        Vec::new()
    };

    let doomed: BTreeSet<usize> = age_set.iter().chain(cap_set.iter()).copied().collect();

    let pick = |indices: &[usize]| indices.iter().map(|&i| sorted[i]).collect::<Vec<_>>();

    PrunePlan {
        by_age: pick(&age_set),
        by_cap: pick(&cap_set),
        delete: doomed.iter().map(|&i| sorted[i]).collect(),
        keep: (0..total)
            .filter(|i| !doomed.contains(i))
            .map(|i| sorted[i])
            .collect(),
        spared: pick(&spared),
    }
}

/// What a prune pass actually did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PruneReport {
    pub deleted: Vec<SnapshotId>,
    /// Snapshots that could not be deleted, with the reason
    pub failed: Vec<(SnapshotId, String)>,
}

/// Apply `policy` to the snapshots in `store`.
///
/// Per-snapshot failures are logged as warnings and collected in the
/// report; only a failure to list the store is returned as an error.
pub fn prune(
    store: &SnapshotStore,
    policy: &RetentionPolicy,
    now: NaiveDateTime,
    log: &mut RunLog,
) -> ColdsnapResult<PruneReport> {
    let snapshots = store.list()?;
    Ok(prune_snapshots(&snapshots, policy, now, log, |snapshot| {
        store.delete(snapshot)
    }))
}

/// Apply `policy` to `snapshots`, removing each doomed one with `delete`
fn prune_snapshots<F>(
    snapshots: &[Snapshot],
    policy: &RetentionPolicy,
    now: NaiveDateTime,
    log: &mut RunLog,
    mut delete: F,
) -> PruneReport
where
    F: FnMut(&Snapshot) -> ColdsnapResult<()>,
{
    let ids: Vec<SnapshotId> = snapshots.iter().map(|s| s.id).collect();
    let plan = plan_prune(&ids, policy, now);

    if policy.has_conflict() {
        log.warn(format!(
            "min_versions ({}) exceeds max_versions ({}); max_versions wins",
            policy.min_versions, policy.max_versions
        ));
    }

    let mut report = PruneReport::default();
    if plan.is_empty() {
        log.info(format!(
            "Nothing to prune ({} snapshot(s) within policy)",
            snapshots.len()
        ));
        return report;
    }

    for snapshot in snapshots.iter().filter(|s| plan.delete.contains(&s.id)) {
        let reason = if plan.by_cap.contains(&snapshot.id) {
            "over max_versions"
        } else {
            "older than retention window"
        };

        match delete(snapshot) {
            Ok(()) => {
                log.info(format!("Deleted snapshot {} ({})", snapshot.id, reason));
                report.deleted.push(snapshot.id);
            }
            Err(err) => {
                log.warn(err.to_string());
                report.failed.push((snapshot.id, err.to_string()));
            }
        }
    }

    report
}
