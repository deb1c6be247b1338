pub mod db;
pub mod models;

pub use db::{ARCHIVE_DAYS, DEFAULT_LIST_LIMIT, RunStore};
pub use models::{PendingRun, Run, RunState};
