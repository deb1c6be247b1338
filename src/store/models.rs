use serde::{Deserialize, Serialize};

/// Most characters of job output kept in a run row. The external check
/// report has its own, much smaller limit.
pub const MAX_OUTPUT_LEN: usize = 1_000_000;

/// Most characters of a commit message kept in a run row.
pub const MAX_COMMIT_MESSAGE_LEN: usize = 2048;

/// Lifecycle state of a run, stored as an integer code in the `success`
/// column: 1 success, 0 failure, -1 pending, -2 cancelled.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Pending,
    Success,
    Failure,
    Cancelled,
}

impl RunState {
    pub fn code(&self) -> i64 {
        match self {
            Self::Success => 1,
            Self::Failure => 0,
            Self::Pending => -1,
            Self::Cancelled => -2,
        }
    }

    pub fn from_code(code: i64) -> Result<Self, String> {
        match code {
            1 => Ok(Self::Success),
            0 => Ok(Self::Failure),
            -1 => Ok(Self::Pending),
            -2 => Ok(Self::Cancelled),
            _ => Err(format!("Invalid run state code: {}", code)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_pending()
    }
}

/// One row of run history. Shas are stored in short (7-char) form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub id: i64,
    pub owner: String,
    pub repo: String,
    pub sha: String,
    pub state: RunState,
    pub html_url: String,
    /// Completion time once resolved; insertion time while pending.
    pub at: String,
    pub output: String,
    pub branch: String,
    pub commit_message: String,
    pub started_at: String,
}

/// The subset of a pending row that startup reconciliation needs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PendingRun {
    pub owner: String,
    pub repo: String,
    pub sha: String,
    pub branch: String,
}
