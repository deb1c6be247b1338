//! The poll loop: daily retention gate, branch resolution, commit
//! discovery, serialized execution, per-commit watermark persistence.

use anyhow::Result;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::TargetConfig;
use crate::github::api::CommitRef;
use crate::lifecycle::{RunDeps, execute_run};
use crate::poll::discovery::{DiscoveryPlan, plan_discovery, resolve_backfill};
use crate::poll::progress::ProgressState;
use crate::poll::recovery::{RetryKey, reconcile_pending, recovery_plan};
use crate::store::{ARCHIVE_DAYS, RunStore};
use crate::util::{short_sha, utc_today};

/// Mutable loop state threaded through every cycle: the durable
/// watermark document plus the in-memory retry set.
pub struct PollContext {
    pub progress: ProgressState,
    pub retry: HashSet<RetryKey>,
}

/// Reconcile leftover pending runs, then poll until the process dies.
///
/// In dry-run mode: one read-only cycle. Reconciliation is computed
/// but not applied, nothing executes, nothing persists.
pub async fn run_loop(
    deps: &RunDeps<'_>,
    targets: &[TargetConfig],
    progress: ProgressState,
    poll_interval: u64,
    dry_run: bool,
) -> Result<()> {
    let retry = if dry_run {
        recovery_plan(&deps.store.pending_runs()?).retries
    } else {
        reconcile_pending(deps.store)?
    };
    let mut ctx = PollContext { progress, retry };

    info!(targets = targets.len(), poll_interval, dry_run, "poll loop starting");
    loop {
        run_cycle(deps, targets, &mut ctx, dry_run).await?;
        if dry_run {
            info!("dry-run cycle complete");
            return Ok(());
        }
        tokio::time::sleep(Duration::from_secs(poll_interval)).await;
    }
}

/// One full pass over every target.
pub async fn run_cycle(
    deps: &RunDeps<'_>,
    targets: &[TargetConfig],
    ctx: &mut PollContext,
    dry_run: bool,
) -> Result<()> {
    maybe_archive(deps.store, &mut ctx.progress, dry_run)?;
    for target in targets {
        process_target(deps, target, ctx, dry_run).await?;
    }
    Ok(())
}

/// Once per UTC day, before any target is processed: prune old run
/// history and advance the cursor.
fn maybe_archive(store: &RunStore, progress: &mut ProgressState, dry_run: bool) -> Result<()> {
    if dry_run {
        return Ok(());
    }
    let today = utc_today();
    if progress.archive_date() == Some(today.as_str()) {
        return Ok(());
    }
    let removed = store.delete_runs_older_than(ARCHIVE_DAYS)?;
    progress.set_archive_date(&today);
    progress.save()?;
    info!(removed, days = ARCHIVE_DAYS, "pruned old runs");
    Ok(())
}

async fn process_target(
    deps: &RunDeps<'_>,
    target: &TargetConfig,
    ctx: &mut PollContext,
    dry_run: bool,
) -> Result<()> {
    let owner = target.owner.as_str();
    let repo = target.repo.as_str();

    let heads: Vec<(String, CommitRef)> = if target.wants_all_branches() {
        match deps.host.list_branches(owner, repo).await {
            Ok(branches) => branches
                .into_iter()
                .map(|b| {
                    (
                        b.name,
                        CommitRef {
                            sha: b.head_sha,
                            message: None,
                        },
                    )
                })
                .collect(),
            Err(e) => {
                warn!(owner, repo, error = %e, "branch listing failed; skipping repo this cycle");
                return Ok(());
            }
        }
    } else {
        match deps.host.branch_head(owner, repo, &target.branch).await {
            Ok(Some(head)) => vec![(target.branch.clone(), head)],
            Ok(None) => {
                warn!(owner, repo, branch = %target.branch, "branch has no head; skipping this cycle");
                return Ok(());
            }
            Err(e) => {
                warn!(owner, repo, branch = %target.branch, error = %e, "head resolution failed; skipping this cycle");
                return Ok(());
            }
        }
    };

    for (branch, head) in heads {
        process_branch(deps, target, &branch, &head, ctx, dry_run).await?;
    }
    Ok(())
}

async fn process_branch(
    deps: &RunDeps<'_>,
    target: &TargetConfig,
    branch: &str,
    head: &CommitRef,
    ctx: &mut PollContext,
    dry_run: bool,
) -> Result<()> {
    let owner = target.owner.as_str();
    let repo = target.repo.as_str();

    // A retry entry matches only when the head still is the crashed
    // commit; consuming it here is what makes the override one-shot.
    let retry_key = RetryKey::new(owner, repo, branch, short_sha(&head.sha));
    let retry_requested = ctx.retry.remove(&retry_key);
    if retry_requested {
        info!(owner, repo, branch, sha = short_sha(&head.sha), "retrying head from a cancelled run");
    }

    let last = ctx.progress.watermark(owner, repo, branch).map(str::to_string);

    let to_run = match plan_discovery(last.as_deref(), &head.sha, retry_requested) {
        DiscoveryPlan::UpToDate => Vec::new(),
        DiscoveryPlan::HeadOnly => vec![head.clone()],
        DiscoveryPlan::CompareFrom(base) => {
            let between = match deps
                .host
                .commits_between(owner, repo, &base, &head.sha)
                .await
            {
                Ok(between) => between,
                Err(e) => {
                    warn!(owner, repo, branch, error = %e, "commit comparison failed; skipping this cycle");
                    return Ok(());
                }
            };
            if between.is_empty() {
                warn!(
                    owner,
                    repo,
                    branch,
                    head = short_sha(&head.sha),
                    "nothing between watermark and moved head; falling back to head only"
                );
            }
            resolve_backfill(between, head)
        }
    };

    if to_run.is_empty() {
        // A branch seen for the first time with nothing to run still
        // gets its watermark pinned to the head, marking it as seen.
        if !dry_run && last.is_none() {
            ctx.progress.set_watermark(owner, repo, branch, &head.sha);
            ctx.progress.save()?;
        }
        return Ok(());
    }

    info!(owner, repo, branch, count = to_run.len(), "commits to run");
    for commit in &to_run {
        if dry_run {
            info!(owner, repo, branch, sha = short_sha(&commit.sha), "would run");
            continue;
        }
        execute_run(deps, owner, repo, branch, commit, target.command.as_ref()).await?;
        ctx.progress.set_watermark(owner, repo, branch, &commit.sha);
        ctx.progress.save()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn old_timestamp(days_back: i64) -> String {
        (chrono::Utc::now() - chrono::Duration::days(days_back))
            .format("%Y-%m-%dT%H:%M:%SZ")
            .to_string()
    }

    #[test]
    fn test_archive_prunes_and_advances_cursor() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let store = RunStore::open_in_memory()?;
        let mut progress = ProgressState::load(dir.path().join("state.json"))?;
        store.complete_run("o", "r", "old1", true, "u", &old_timestamp(10), "", "main", "")?;

        maybe_archive(&store, &mut progress, false)?;
        assert!(store.list_runs(10)?.is_empty());
        assert_eq!(progress.archive_date(), Some(utc_today().as_str()));
        Ok(())
    }

    #[test]
    fn test_archive_runs_once_per_day() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let store = RunStore::open_in_memory()?;
        let mut progress = ProgressState::load(dir.path().join("state.json"))?;

        maybe_archive(&store, &mut progress, false)?;
        // Rows arriving after today's sweep survive until tomorrow,
        // even when they look old.
        store.complete_run("o", "r", "old1", true, "u", &old_timestamp(10), "", "main", "")?;
        maybe_archive(&store, &mut progress, false)?;
        assert_eq!(store.list_runs(10)?.len(), 1);
        Ok(())
    }

    #[test]
    fn test_archive_skipped_in_dry_run() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let store = RunStore::open_in_memory()?;
        let mut progress = ProgressState::load(dir.path().join("state.json"))?;
        store.complete_run("o", "r", "old1", true, "u", &old_timestamp(10), "", "main", "")?;

        maybe_archive(&store, &mut progress, true)?;
        assert_eq!(store.list_runs(10)?.len(), 1);
        assert!(progress.archive_date().is_none());
        Ok(())
    }
}
