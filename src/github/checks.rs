use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::github::api::GitHubClient;
use crate::util::tail_chars;

const GITHUB_API_BASE: &str = "https://api.github.com";
const GITHUB_API_VERSION: &str = "2022-11-28";

/// GitHub caps check-run output text; keep the tail, the end of a log
/// is the part that explains a failure.
pub const CHECK_OUTPUT_TEXT_LIMIT: usize = 65535;

/// An open check run: the id to finalize later and the URL stored on
/// the run row.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportHandle {
    pub id: i64,
    pub html_url: String,
}

/// Write-side reporting operations the run lifecycle consumes.
/// Real implementation: `GitHubClient`. Test double: the stub
/// reporters in the integration tests.
#[async_trait]
pub trait Reporter: Send + Sync {
    /// Open an in-progress check run for a commit.
    async fn open_report(
        &self,
        owner: &str,
        repo: &str,
        head_sha: &str,
    ) -> anyhow::Result<ReportHandle>;

    /// Finalize a check run with its conclusion and output.
    async fn complete_report(
        &self,
        owner: &str,
        repo: &str,
        report_id: i64,
        head_sha: &str,
        success: bool,
        summary: &str,
        text: &str,
    ) -> anyhow::Result<()>;
}

#[derive(Debug, Deserialize)]
struct CheckRunResponse {
    id: i64,
    html_url: Option<String>,
}

/// Body for creating an in-progress check run.
fn begin_payload(check_name: &str, head_sha: &str, started_at: &str) -> Value {
    json!({
        "name": check_name,
        "head_sha": head_sha,
        "status": "in_progress",
        "started_at": started_at,
        "output": {
            "title": check_name,
            "summary": "Running...",
            "text": "",
        },
    })
}

/// Body for finalizing a check run. Never re-sends started_at; the
/// create call already set it.
fn completion_payload(
    check_name: &str,
    head_sha: &str,
    success: bool,
    completed_at: &str,
    summary: &str,
    text: &str,
) -> Value {
    let conclusion = if success { "success" } else { "failure" };
    json!({
        "name": check_name,
        "head_sha": head_sha,
        "status": "completed",
        "conclusion": conclusion,
        "completed_at": completed_at,
        "output": {
            "title": check_name,
            "summary": summary,
            "text": tail_chars(text, CHECK_OUTPUT_TEXT_LIMIT),
        },
    })
}

#[async_trait]
impl Reporter for GitHubClient {
    async fn open_report(
        &self,
        owner: &str,
        repo: &str,
        head_sha: &str,
    ) -> anyhow::Result<ReportHandle> {
        let url = format!("{}/repos/{}/{}/check-runs", GITHUB_API_BASE, owner, repo);
        let payload = begin_payload(&self.check_name, head_sha, &crate::util::utc_timestamp());
        let resp: CheckRunResponse = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("User-Agent", "anvil")
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", GITHUB_API_VERSION)
            .json(&payload)
            .send()
            .await
            .context("Failed to send check run create request to GitHub")?
            .error_for_status()
            .context("GitHub check run create returned error status")?
            .json()
            .await
            .context("Failed to parse check run create response from GitHub")?;

        Ok(ReportHandle {
            id: resp.id,
            html_url: resp.html_url.unwrap_or_default(),
        })
    }

    async fn complete_report(
        &self,
        owner: &str,
        repo: &str,
        report_id: i64,
        head_sha: &str,
        success: bool,
        summary: &str,
        text: &str,
    ) -> anyhow::Result<()> {
        let url = format!(
            "{}/repos/{}/{}/check-runs/{}",
            GITHUB_API_BASE, owner, repo, report_id
        );
        let payload = completion_payload(
            &self.check_name,
            head_sha,
            success,
            &crate::util::utc_timestamp(),
            summary,
            text,
        );
        self.http
            .patch(&url)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("User-Agent", "anvil")
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", GITHUB_API_VERSION)
            .json(&payload)
            .send()
            .await
            .context("Failed to send check run update request to GitHub")?
            .error_for_status()
            .context("GitHub check run update returned error status")?;
        Ok(())
    }
}
