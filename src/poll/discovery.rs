//! Pure commit-discovery planning: given the watermark, the branch
//! head, and the retry flag, decide what to evaluate before any
//! provider call is made.

use crate::github::api::CommitRef;

/// Decision for one branch in one cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum DiscoveryPlan {
    /// Head already processed; nothing to do.
    UpToDate,
    /// Evaluate exactly the head: new branch, or a consumed retry.
    HeadOnly,
    /// Head moved; list commits after the carried watermark.
    CompareFrom(String),
}

pub fn plan_discovery(last: Option<&str>, head_sha: &str, retry_requested: bool) -> DiscoveryPlan {
    match last {
        None => DiscoveryPlan::HeadOnly,
        Some(last) if last == head_sha => {
            if retry_requested {
                DiscoveryPlan::HeadOnly
            } else {
                DiscoveryPlan::UpToDate
            }
        }
        Some(last) => DiscoveryPlan::CompareFrom(last.to_string()),
    }
}

/// Apply the backfill result. An empty between-list for a branch whose
/// head moved means a force push, an unrelated history, or a degraded
/// provider; the head still runs. A moving branch never goes fully
/// silent.
pub fn resolve_backfill(between: Vec<CommitRef>, head: &CommitRef) -> Vec<CommitRef> {
    if between.is_empty() {
        vec![head.clone()]
    } else {
        between
    }
}
