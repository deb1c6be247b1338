//! One commit, one run: open the check report, record the pending row,
//! execute the job, finalize the report, resolve the row.

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::github::api::{CommitRef, HostApi};
use crate::github::checks::Reporter;
use crate::github::report::format_check_text;
use crate::runner::{CommandSpec, JOB_CONFIG_PATH, JobConfig, JobExecutor, resolve_command};
use crate::store::RunStore;
use crate::util::{first_line, short_sha, utc_timestamp};

/// Collaborators a run needs, threaded explicitly through the poll
/// loop. No globals.
pub struct RunDeps<'a> {
    pub store: &'a RunStore,
    pub host: &'a dyn HostApi,
    pub reporter: &'a dyn Reporter,
    pub executor: &'a dyn JobExecutor,
}

/// Drive one commit through a full run. Returns the check report URL.
///
/// Job faults are captured as a Failure run with the fault text as
/// output. A failure finalizing the report propagates; the row stays
/// Pending and startup reconciliation deals with it after restart.
pub async fn execute_run(
    deps: &RunDeps<'_>,
    owner: &str,
    repo: &str,
    branch: &str,
    commit: &CommitRef,
    command_override: Option<&CommandSpec>,
) -> Result<String> {
    let full_sha = &commit.sha;
    let sha = short_sha(full_sha);

    let message = resolve_message(deps.host, owner, repo, commit).await;
    let repo_config = fetch_job_config(deps.host, owner, repo, full_sha).await;
    let command = resolve_command(command_override, &repo_config);

    // Report first, then the row: a run is visible externally before
    // it exists locally, never the other way around.
    let report = deps
        .reporter
        .open_report(owner, repo, full_sha)
        .await
        .context("Failed to open check report")?;
    deps.store.create_pending_run(
        owner,
        repo,
        sha,
        &report.html_url,
        &utc_timestamp(),
        branch,
        &message,
    )?;

    info!(owner, repo, branch, sha, %command, "run started");

    let (success, output) = match deps
        .executor
        .run(owner, repo, branch, full_sha, &command)
        .await
    {
        Ok(outcome) => (outcome.success(), outcome.output),
        Err(e) => {
            warn!(owner, repo, branch, sha, error = %e, "job fault");
            (false, e.to_string())
        }
    };
    let run_output = if output.trim().is_empty() {
        "(no output)".to_string()
    } else {
        output
    };

    let summary = if success {
        format!("Success. Ran: `{}`", command)
    } else {
        format!("Failed. Ran: `{}`", command)
    };
    let text = format_check_text(&command, &run_output);

    deps.reporter
        .complete_report(owner, repo, report.id, full_sha, success, &summary, &text)
        .await
        .context("Failed to finalize check report")?;

    deps.store.complete_run(
        owner,
        repo,
        sha,
        success,
        &report.html_url,
        &utc_timestamp(),
        &run_output,
        branch,
        &message,
    )?;

    info!(owner, repo, branch, sha, success, "run finished");
    Ok(report.html_url)
}

/// First line of the commit message, fetched lazily when discovery did
/// not carry one. Any provider trouble degrades to an empty message;
/// a missing message never blocks a run.
async fn resolve_message(host: &dyn HostApi, owner: &str, repo: &str, commit: &CommitRef) -> String {
    let message = match &commit.message {
        Some(m) => m.clone(),
        None => match host.commit_message(owner, repo, &commit.sha).await {
            Ok(Some(m)) => m,
            Ok(None) => String::new(),
            Err(e) => {
                warn!(owner, repo, sha = short_sha(&commit.sha), error = %e, "commit message fetch failed");
                String::new()
            }
        },
    };
    first_line(&message).to_string()
}

/// The repository's `.anvil.yml` at the commit being built. Missing
/// file, fetch trouble, and unparseable contents all degrade to the
/// empty configuration.
async fn fetch_job_config(host: &dyn HostApi, owner: &str, repo: &str, sha: &str) -> JobConfig {
    match host.file_contents(owner, repo, sha, JOB_CONFIG_PATH).await {
        Ok(Some(text)) => JobConfig::parse(&text),
        Ok(None) => JobConfig::default(),
        Err(e) => {
            warn!(owner, repo, sha = short_sha(sha), error = %e, "job config fetch failed");
            JobConfig::default()
        }
    }
}
