//! Resolved-configuration view — `anvil config`.

use anyhow::Result;
use std::path::PathBuf;

pub fn cmd_config(config_path: Option<PathBuf>) -> Result<()> {
    use anvil::config::{ConfigFile, Paths, resolve_config_path};

    let path = resolve_config_path(config_path);
    let config = ConfigFile::load(&path)?;
    let paths = Paths::from_env()?;

    println!();
    println!("Anvil Configuration");
    println!("===================");
    println!();
    println!("Config file:   {}", path.display());
    println!("Poll interval: {}s", config.poll_interval);
    println!();
    println!("Paths:");
    println!("  data dir:   {}", paths.data_dir.display());
    println!("  state file: {}", paths.state_file.display());
    println!("  database:   {}", paths.db_file.display());
    println!("  workspace:  {}", paths.workspace_root.display());
    println!();

    if config.repos.is_empty() {
        println!("No targets configured.");
    } else {
        println!("Targets:");
        for target in &config.repos {
            let branch = if target.wants_all_branches() {
                "all branches"
            } else {
                target.branch.as_str()
            };
            match &target.command {
                Some(command) => println!(
                    "  {}/{}  [{}]  command: {}",
                    target.owner,
                    target.repo,
                    branch,
                    command.joined()
                ),
                None => println!("  {}/{}  [{}]", target.owner, target.repo, branch),
            }
        }
    }
    println!();
    Ok(())
}
