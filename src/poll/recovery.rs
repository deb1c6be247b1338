//! Startup reconciliation: runs left pending by a crash are cancelled,
//! and their commits scheduled for one retry each.

use anyhow::Result;
use std::collections::HashSet;
use tracing::{debug, info};

use crate::store::{PendingRun, RunStore};

/// Key for the in-memory retry set. `sha` is the short form, matching
/// what run rows store. Each key overrides the up-to-date
/// short-circuit at most once, then is removed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RetryKey {
    pub owner: String,
    pub repo: String,
    pub branch: String,
    pub sha: String,
}

impl RetryKey {
    pub fn new(owner: &str, repo: &str, branch: &str, sha: &str) -> Self {
        Self {
            owner: owner.to_string(),
            repo: repo.to_string(),
            branch: branch.to_string(),
            sha: sha.to_string(),
        }
    }
}

/// What reconciliation will do, computed without touching anything.
#[derive(Debug, Default, PartialEq)]
pub struct RecoveryPlan {
    /// Rows to mark cancelled, one entry per distinct (owner, repo, sha).
    pub cancellations: Vec<PendingRun>,
    /// Commits whose next sighting runs again despite the watermark.
    pub retries: HashSet<RetryKey>,
}

impl RecoveryPlan {
    pub fn is_empty(&self) -> bool {
        self.cancellations.is_empty() && self.retries.is_empty()
    }
}

/// Pure decision: from the pending rows, which cancellations to apply
/// and which retries to schedule.
pub fn recovery_plan(pending: &[PendingRun]) -> RecoveryPlan {
    let mut plan = RecoveryPlan::default();
    let mut seen: HashSet<(String, String, String)> = HashSet::new();

    for run in pending {
        let key = (run.owner.clone(), run.repo.clone(), run.sha.clone());
        if seen.insert(key) {
            plan.cancellations.push(run.clone());
        }
        plan.retries.insert(RetryKey::new(&run.owner, &run.repo, &run.branch, &run.sha));
    }
    plan
}

/// Apply reconciliation against the store and hand the retry set to
/// the poll loop.
pub fn reconcile_pending(store: &RunStore) -> Result<HashSet<RetryKey>> {
    let pending = store.pending_runs()?;
    let plan = recovery_plan(&pending);
    if plan.is_empty() {
        debug!("no pending runs to reconcile");
        return Ok(plan.retries);
    }

    for run in &plan.cancellations {
        let cancelled = store.cancel_pending_run(&run.owner, &run.repo, &run.sha)?;
        info!(
            owner = %run.owner,
            repo = %run.repo,
            branch = %run.branch,
            sha = %run.sha,
            cancelled,
            "cancelled stale pending run"
        );
    }
    info!(retries = plan.retries.len(), "scheduled retries for cancelled runs");
    Ok(plan.retries)
}
