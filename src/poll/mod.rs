pub mod cycle;
pub mod discovery;
pub mod progress;
pub mod recovery;

pub use cycle::{PollContext, run_cycle, run_loop};
pub use progress::ProgressState;
pub use recovery::{RecoveryPlan, RetryKey, reconcile_pending, recovery_plan};
