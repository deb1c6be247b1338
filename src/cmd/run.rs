//! The polling orchestrator loop — `anvil run`.

use anyhow::Result;
use std::path::PathBuf;

pub async fn cmd_run(config_path: Option<PathBuf>, dry_run: bool) -> Result<()> {
    use anvil::config::Settings;
    use anvil::github::api::GitHubClient;
    use anvil::lifecycle::RunDeps;
    use anvil::poll::{ProgressState, run_loop};
    use anvil::runner::JobRunner;
    use anvil::store::RunStore;

    // Credentials and config are resolved before anything is touched;
    // a missing token dies here, not mid-cycle.
    let settings = Settings::load(config_path, dry_run)?;

    let store = RunStore::open(&settings.paths.db_file)?;
    let progress = ProgressState::load(settings.paths.state_file.clone())?;
    let client = GitHubClient::new(settings.token.clone(), settings.check_name.clone())?;
    let runner = JobRunner::new(settings.token.clone(), settings.paths.workspace_root.clone());

    let deps = RunDeps {
        store: &store,
        host: &client,
        reporter: &client,
        executor: &runner,
    };
    run_loop(
        &deps,
        &settings.config.repos,
        progress,
        settings.config.poll_interval,
        settings.dry_run,
    )
    .await
}
