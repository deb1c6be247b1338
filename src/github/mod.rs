pub mod api;
pub mod checks;
pub mod report;

pub use api::{BranchRef, CommitRef, GitHubClient, HostApi, is_plausible_token};
pub use checks::{CHECK_OUTPUT_TEXT_LIMIT, ReportHandle, Reporter};
