//! Typed errors callers match on.
//!
//! - [`JobError`]: faults while preparing or executing a job. Its
//!   `Display` output becomes the recorded failure text for the run.
//! - [`ProgressError`]: the watermark state document could not be read,
//!   parsed, or written. Fatal at startup.
//!
//! Everything else flows through `anyhow` with context strings.

use std::path::PathBuf;
use thiserror::Error;

/// Faults raised while setting up a workspace or executing a job.
///
/// A non-zero exit from the job command itself is NOT a `JobError`;
/// that is a normal failed run. These variants cover the machinery
/// around the command: directories, git, process spawning.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("workspace setup failed at {path}: {source}")]
    WorkspaceSetup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("git clone of {repo} failed: {stderr}")]
    CloneFailed { repo: String, stderr: String },

    #[error("git checkout of {sha} failed: {stderr}")]
    CheckoutFailed { sha: String, stderr: String },

    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// The watermark state document is unusable.
#[derive(Debug, Error)]
pub enum ProgressError {
    #[error("failed to read state file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("state file {path} is not valid JSON: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to write state file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
