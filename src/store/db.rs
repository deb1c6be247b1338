use anyhow::{Context, Result};
use rusqlite::{Connection, params};
use std::path::Path;

use crate::store::models::{
    MAX_COMMIT_MESSAGE_LEN, MAX_OUTPUT_LEN, PendingRun, Run, RunState,
};
use crate::util::truncate_chars;

/// Runs older than this many days are pruned by the daily sweep.
pub const ARCHIVE_DAYS: i64 = 7;

/// Default row cap for history listings.
pub const DEFAULT_LIST_LIMIT: usize = 200;

/// Durable run history, one SQLite database file.
///
/// All access happens on the orchestrator's single logical thread, so
/// the store is a plain synchronous connection wrapper.
pub struct RunStore {
    conn: Connection,
}

impl RunStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path.as_ref()).with_context(|| {
            format!("Failed to open run database at {}", path.as_ref().display())
        })?;
        let store = Self { conn };
        store.init()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        let store = Self { conn };
        store.init()?;
        Ok(store)
    }

    fn init(&self) -> Result<()> {
        self.conn
            .execute_batch("PRAGMA foreign_keys = ON;")
            .context("Failed to enable foreign keys")?;
        self.run_migrations()
    }

    fn run_migrations(&self) -> Result<()> {
        self.conn
            .execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS runs (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    owner TEXT NOT NULL,
                    repo TEXT NOT NULL,
                    sha TEXT NOT NULL,
                    success INTEGER NOT NULL,
                    html_url TEXT NOT NULL,
                    at TEXT NOT NULL,
                    output TEXT NOT NULL DEFAULT ''
                );
                "#,
            )
            .context("Failed to create runs table")?;

        // Additive columns for databases created by earlier schemas.
        self.add_column_if_missing("ALTER TABLE runs ADD COLUMN output TEXT NOT NULL DEFAULT ''")?;
        self.add_column_if_missing("ALTER TABLE runs ADD COLUMN branch TEXT DEFAULT ''")?;
        self.add_column_if_missing("ALTER TABLE runs ADD COLUMN commit_message TEXT DEFAULT ''")?;
        self.add_column_if_missing("ALTER TABLE runs ADD COLUMN started_at TEXT DEFAULT ''")?;

        Ok(())
    }

    fn add_column_if_missing(&self, ddl: &str) -> Result<()> {
        match self.conn.execute(ddl, []) {
            Ok(_) => Ok(()),
            Err(e) if e.to_string().contains("duplicate column") => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Migration failed: {}", ddl)),
        }
    }

    // ── Recording ───────────────────────────────────────────────────

    /// Insert a pending row for a run that has just been reported as
    /// in progress. Returns the row id.
    pub fn create_pending_run(
        &self,
        owner: &str,
        repo: &str,
        sha: &str,
        html_url: &str,
        at: &str,
        branch: &str,
        commit_message: &str,
    ) -> Result<i64> {
        self.conn
            .execute(
                "INSERT INTO runs (owner, repo, sha, success, html_url, at, output, branch, commit_message, started_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, '', ?7, ?8, ?6)",
                params![
                    owner,
                    repo,
                    sha,
                    RunState::Pending.code(),
                    html_url,
                    at,
                    branch,
                    truncate_chars(commit_message, MAX_COMMIT_MESSAGE_LEN),
                ],
            )
            .context("Failed to insert pending run")?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Resolve a run to success or failure.
    ///
    /// If a pending row exists for (owner, repo, sha), the MOST RECENT
    /// one is updated in place and keeps its started_at. Otherwise a
    /// fresh completed row is inserted. Never creates a second row when
    /// a pending match exists.
    pub fn complete_run(
        &self,
        owner: &str,
        repo: &str,
        sha: &str,
        success: bool,
        html_url: &str,
        at: &str,
        output: &str,
        branch: &str,
        commit_message: &str,
    ) -> Result<()> {
        let state = if success {
            RunState::Success
        } else {
            RunState::Failure
        };
        let output = truncate_chars(output, MAX_OUTPUT_LEN);
        let commit_message = truncate_chars(commit_message, MAX_COMMIT_MESSAGE_LEN);

        let pending_id: Option<i64> = self
            .conn
            .query_row(
                "SELECT id FROM runs
                 WHERE owner = ?1 AND repo = ?2 AND sha = ?3 AND success = ?4
                 ORDER BY id DESC LIMIT 1",
                params![owner, repo, sha, RunState::Pending.code()],
                |row| row.get(0),
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(other),
            })
            .context("Failed to look up pending run")?;

        match pending_id {
            Some(id) => {
                self.conn
                    .execute(
                        "UPDATE runs
                         SET success = ?1, html_url = ?2, at = ?3, output = ?4,
                             branch = ?5, commit_message = ?6
                         WHERE id = ?7",
                        params![state.code(), html_url, at, output, branch, commit_message, id],
                    )
                    .context("Failed to resolve pending run")?;
            }
            None => {
                self.conn
                    .execute(
                        "INSERT INTO runs (owner, repo, sha, success, html_url, at, output, branch, commit_message, started_at)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?6)",
                        params![owner, repo, sha, state.code(), html_url, at, output, branch, commit_message],
                    )
                    .context("Failed to insert completed run")?;
            }
        }
        Ok(())
    }

    /// Mark every pending row for (owner, repo, sha) cancelled.
    /// Returns the number of rows changed.
    pub fn cancel_pending_run(&self, owner: &str, repo: &str, sha: &str) -> Result<usize> {
        self.conn
            .execute(
                "UPDATE runs SET success = ?1
                 WHERE owner = ?2 AND repo = ?3 AND sha = ?4 AND success = ?5",
                params![
                    RunState::Cancelled.code(),
                    owner,
                    repo,
                    sha,
                    RunState::Pending.code()
                ],
            )
            .context("Failed to cancel pending run")
    }

    // ── Queries ─────────────────────────────────────────────────────

    /// All pending rows, oldest first. Startup reconciliation input.
    pub fn pending_runs(&self) -> Result<Vec<PendingRun>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT owner, repo, sha, COALESCE(branch, '')
                 FROM runs WHERE success = ?1 ORDER BY id",
            )
            .context("Failed to prepare pending runs query")?;
        let rows = stmt
            .query_map(params![RunState::Pending.code()], |row| {
                Ok(PendingRun {
                    owner: row.get(0)?,
                    repo: row.get(1)?,
                    sha: row.get(2)?,
                    branch: row.get(3)?,
                })
            })
            .context("Failed to query pending runs")?;

        let mut pending = Vec::new();
        for row in rows {
            pending.push(row?);
        }
        Ok(pending)
    }

    /// Recent run history, newest first.
    pub fn list_runs(&self, limit: usize) -> Result<Vec<Run>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, owner, repo, sha, success, html_url, at,
                        COALESCE(output, ''), COALESCE(branch, ''),
                        COALESCE(commit_message, ''), COALESCE(started_at, '')
                 FROM runs ORDER BY id DESC LIMIT ?1",
            )
            .context("Failed to prepare runs query")?;
        let rows = stmt
            .query_map(params![limit as i64], |row| {
                Ok(RunRow {
                    id: row.get(0)?,
                    owner: row.get(1)?,
                    repo: row.get(2)?,
                    sha: row.get(3)?,
                    success: row.get(4)?,
                    html_url: row.get(5)?,
                    at: row.get(6)?,
                    output: row.get(7)?,
                    branch: row.get(8)?,
                    commit_message: row.get(9)?,
                    started_at: row.get(10)?,
                })
            })
            .context("Failed to query runs")?;

        let mut runs = Vec::new();
        for row in rows {
            runs.push(row?.into_run()?);
        }
        Ok(runs)
    }

    // ── Retention ───────────────────────────────────────────────────

    /// Delete rows whose `at` precedes the cutoff, `days` back from
    /// now. String comparison is correct for the fixed timestamp
    /// format. Returns the number of rows removed.
    pub fn delete_runs_older_than(&self, days: i64) -> Result<usize> {
        let cutoff = (chrono::Utc::now() - chrono::Duration::days(days))
            .format("%Y-%m-%dT%H:%M:%SZ")
            .to_string();
        self.conn
            .execute("DELETE FROM runs WHERE at < ?1", params![cutoff])
            .context("Failed to delete old runs")
    }
}

/// Raw row as stored; `success` still an integer code.
struct RunRow {
    id: i64,
    owner: String,
    repo: String,
    sha: String,
    success: i64,
    html_url: String,
    at: String,
    output: String,
    branch: String,
    commit_message: String,
    started_at: String,
}

impl RunRow {
    fn into_run(self) -> Result<Run> {
        let state = RunState::from_code(self.success).map_err(|e| anyhow::anyhow!(e))?;
        Ok(Run {
            id: self.id,
            owner: self.owner,
            repo: self.repo,
            sha: self.sha,
            state,
            html_url: self.html_url,
            at: self.at,
            output: self.output,
            branch: self.branch,
            commit_message: self.commit_message,
            started_at: self.started_at,
        })
    }
}
