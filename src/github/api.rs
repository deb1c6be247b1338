use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const GITHUB_API_BASE: &str = "https://api.github.com";
const GITHUB_API_VERSION: &str = "2022-11-28";

/// Seconds before an API call is abandoned as a transport failure.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// A commit as discovery sees it. `message` is present when the
/// listing endpoint supplied it, and fetched lazily otherwise.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommitRef {
    pub sha: String,
    pub message: Option<String>,
}

/// A branch and its current head.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BranchRef {
    pub name: String,
    pub head_sha: String,
}

/// Read-side host operations the poll loop consumes.
/// Real implementation: `GitHubClient`. Test double: the stub hosts in
/// the integration tests.
#[async_trait]
pub trait HostApi: Send + Sync {
    /// Current head of a branch, or None when the branch is empty,
    /// missing, or the host answered with an error status.
    async fn branch_head(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
    ) -> anyhow::Result<Option<CommitRef>>;

    /// Every branch of the repository.
    async fn list_branches(&self, owner: &str, repo: &str) -> anyhow::Result<Vec<BranchRef>>;

    /// Commits strictly after `base` up to and including `head`,
    /// oldest first. Unrelated histories and force-pushed-away bases
    /// come back as an empty list, not an error.
    async fn commits_between(
        &self,
        owner: &str,
        repo: &str,
        base: &str,
        head: &str,
    ) -> anyhow::Result<Vec<CommitRef>>;

    /// Full commit message for a sha, or None when the host answered
    /// with an error status.
    async fn commit_message(
        &self,
        owner: &str,
        repo: &str,
        sha: &str,
    ) -> anyhow::Result<Option<String>>;

    /// Raw contents of a file at a ref, or None when the file does not
    /// exist at that ref.
    async fn file_contents(
        &self,
        owner: &str,
        repo: &str,
        git_ref: &str,
        path: &str,
    ) -> anyhow::Result<Option<String>>;
}

/// Known GitHub token prefixes.
/// See: https://github.blog/2021-04-05-behind-githubs-new-authentication-token-formats/
const GITHUB_TOKEN_PREFIXES: &[&str] = &[
    "ghp_",        // Personal access tokens (classic)
    "github_pat_", // Fine-grained personal access tokens
    "gho_",        // OAuth access tokens
    "ghu_",        // GitHub App user-to-server tokens
    "ghs_",        // GitHub App server-to-server tokens
    "ghr_",        // GitHub App refresh tokens
];

/// Format check only: the token has a recognized prefix. Says nothing
/// about whether it is active or scoped correctly.
pub fn is_plausible_token(token: &str) -> bool {
    if token.is_empty() {
        return false;
    }
    GITHUB_TOKEN_PREFIXES
        .iter()
        .any(|prefix| token.starts_with(prefix))
}

/// Authenticated GitHub v3 client. One HTTP client, one token, shared
/// by the read side (`HostApi`) and the check-run side (`Reporter`).
pub struct GitHubClient {
    pub(crate) http: reqwest::Client,
    pub(crate) token: String,
    pub(crate) check_name: String,
}

impl GitHubClient {
    pub fn new(token: String, check_name: String) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            http,
            token,
            check_name,
        })
    }
}

#[derive(Debug, Deserialize)]
struct CommitItem {
    sha: String,
    commit: CommitDetail,
}

#[derive(Debug, Deserialize)]
struct CommitDetail {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct BranchItem {
    name: String,
    commit: BranchHead,
}

#[derive(Debug, Deserialize)]
struct BranchHead {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct CompareResponse {
    #[serde(default)]
    commits: Vec<CommitItem>,
}

#[async_trait]
impl HostApi for GitHubClient {
    async fn branch_head(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
    ) -> anyhow::Result<Option<CommitRef>> {
        let url = format!("{}/repos/{}/{}/commits", GITHUB_API_BASE, owner, repo);
        let resp = self
            .http
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("User-Agent", "anvil")
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", GITHUB_API_VERSION)
            .query(&[("sha", branch), ("per_page", "1")])
            .send()
            .await
            .context("Failed to send branch head request to GitHub")?;

        if !resp.status().is_success() {
            tracing::warn!(owner, repo, branch, status = %resp.status(), "branch head lookup failed");
            return Ok(None);
        }

        let commits: Vec<CommitItem> = resp
            .json()
            .await
            .context("Failed to parse branch head response from GitHub")?;
        Ok(commits.into_iter().next().map(|c| CommitRef {
            sha: c.sha,
            message: Some(c.commit.message),
        }))
    }

    async fn list_branches(&self, owner: &str, repo: &str) -> anyhow::Result<Vec<BranchRef>> {
        let url = format!("{}/repos/{}/{}/branches", GITHUB_API_BASE, owner, repo);
        let mut all_branches = Vec::new();
        let mut page = 1u32;

        loop {
            let resp: Vec<BranchItem> = self
                .http
                .get(&url)
                .header("Authorization", format!("Bearer {}", self.token))
                .header("User-Agent", "anvil")
                .header("Accept", "application/vnd.github+json")
                .header("X-GitHub-Api-Version", GITHUB_API_VERSION)
                .query(&[("per_page", "100"), ("page", &page.to_string())])
                .send()
                .await
                .context("Failed to send branches request to GitHub")?
                .error_for_status()
                .context("GitHub branches API returned error status")?
                .json()
                .await
                .context("Failed to parse branches response from GitHub")?;

            let count = resp.len();
            all_branches.extend(resp.into_iter().map(|b| BranchRef {
                name: b.name,
                head_sha: b.commit.sha,
            }));

            if count < 100 {
                break; // Last page
            }
            page += 1;
        }

        Ok(all_branches)
    }

    async fn commits_between(
        &self,
        owner: &str,
        repo: &str,
        base: &str,
        head: &str,
    ) -> anyhow::Result<Vec<CommitRef>> {
        let url = format!(
            "{}/repos/{}/{}/compare/{}...{}",
            GITHUB_API_BASE, owner, repo, base, head
        );
        let resp = self
            .http
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("User-Agent", "anvil")
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", GITHUB_API_VERSION)
            .send()
            .await
            .context("Failed to send compare request to GitHub")?;

        // Force pushes and unrelated histories surface as 404 here;
        // discovery treats that as "nothing between" and falls back.
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }

        let compare: CompareResponse = resp
            .error_for_status()
            .context("GitHub compare API returned error status")?
            .json()
            .await
            .context("Failed to parse compare response from GitHub")?;
        Ok(compare
            .commits
            .into_iter()
            .map(|c| CommitRef {
                sha: c.sha,
                message: Some(c.commit.message),
            })
            .collect())
    }

    async fn commit_message(
        &self,
        owner: &str,
        repo: &str,
        sha: &str,
    ) -> anyhow::Result<Option<String>> {
        let url = format!("{}/repos/{}/{}/commits/{}", GITHUB_API_BASE, owner, repo, sha);
        let resp = self
            .http
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("User-Agent", "anvil")
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", GITHUB_API_VERSION)
            .send()
            .await
            .context("Failed to send commit request to GitHub")?;

        if !resp.status().is_success() {
            tracing::warn!(owner, repo, sha, status = %resp.status(), "commit lookup failed");
            return Ok(None);
        }

        let commit: CommitItem = resp
            .json()
            .await
            .context("Failed to parse commit response from GitHub")?;
        Ok(Some(commit.commit.message))
    }

    async fn file_contents(
        &self,
        owner: &str,
        repo: &str,
        git_ref: &str,
        path: &str,
    ) -> anyhow::Result<Option<String>> {
        let url = format!(
            "{}/repos/{}/{}/contents/{}",
            GITHUB_API_BASE, owner, repo, path
        );
        let resp = self
            .http
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("User-Agent", "anvil")
            .header("Accept", "application/vnd.github.raw+json")
            .header("X-GitHub-Api-Version", GITHUB_API_VERSION)
            .query(&[("ref", git_ref)])
            .send()
            .await
            .context("Failed to send contents request to GitHub")?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let text = resp
            .error_for_status()
            .context("GitHub contents API returned error status")?
            .text()
            .await
            .context("Failed to read contents response from GitHub")?;
        Ok(Some(text))
    }
}
