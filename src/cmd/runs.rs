//! Run history listing — `anvil runs`.

use anyhow::Result;

pub fn cmd_runs(limit: usize) -> Result<()> {
    use anvil::config::Paths;
    use anvil::store::RunStore;

    let paths = Paths::from_env()?;
    if !paths.db_file.exists() {
        println!("No runs recorded yet.");
        return Ok(());
    }

    let store = RunStore::open(&paths.db_file)?;
    let runs = store.list_runs(limit)?;
    if runs.is_empty() {
        println!("No runs recorded yet.");
        return Ok(());
    }

    println!();
    println!("Recent runs (newest first):");
    println!();
    for run in runs {
        println!(
            "{}  {:9}  {}/{}  {}  @ {}  {}",
            run.at,
            run.state.as_str(),
            run.owner,
            run.repo,
            run.branch,
            run.sha,
            run.commit_message
        );
        if !run.html_url.is_empty() {
            println!("{:22}{}", "", run.html_url);
        }
    }
    println!();
    Ok(())
}
