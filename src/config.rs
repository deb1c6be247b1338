//! Configuration: environment variables pick locations and auth, a
//! YAML file says what to watch.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::github::api::is_plausible_token;
use crate::runner::CommandSpec;

pub const DEFAULT_POLL_INTERVAL: u64 = 60;
pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";
pub const DEFAULT_CHECK_NAME: &str = "anvil";

/// One watched repository.
#[derive(Debug, Clone, Deserialize)]
pub struct TargetConfig {
    pub owner: String,
    pub repo: String,
    #[serde(default = "default_branch")]
    pub branch: String,
    /// Overrides the repository's own `.anvil.yml` command.
    #[serde(default)]
    pub command: Option<CommandSpec>,
    /// `branches: all` watches every branch, same as `branch: "*"`.
    #[serde(default)]
    pub branches: Option<String>,
}

fn default_branch() -> String {
    "main".to_string()
}

impl TargetConfig {
    pub fn wants_all_branches(&self) -> bool {
        self.branch == "*" || self.branches.as_deref() == Some("all")
    }
}

/// The config file: what to watch and how often.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub repos: Vec<TargetConfig>,
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,
}

fn default_poll_interval() -> u64 {
    DEFAULT_POLL_INTERVAL
}

impl ConfigFile {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_yaml::from_str(&text)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }
}

/// CLI flag, then `ANVIL_CONFIG`, then the default.
pub fn resolve_config_path(cli: Option<PathBuf>) -> PathBuf {
    cli.or_else(|| env_path("ANVIL_CONFIG"))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Where durable state lives. Each location is individually
/// overridable; the defaults hang off one data directory.
#[derive(Debug, Clone)]
pub struct Paths {
    pub data_dir: PathBuf,
    pub state_file: PathBuf,
    pub db_file: PathBuf,
    pub workspace_root: PathBuf,
}

impl Paths {
    pub fn resolve(
        data_dir: Option<PathBuf>,
        state_file: Option<PathBuf>,
        db_file: Option<PathBuf>,
        workspace_root: Option<PathBuf>,
    ) -> Result<Self> {
        let data_dir = match data_dir {
            Some(dir) => dir,
            None => dirs::home_dir()
                .context("Could not determine home directory")?
                .join(".anvil"),
        };
        let state_file = state_file.unwrap_or_else(|| data_dir.join("state.json"));
        let db_file = db_file.unwrap_or_else(|| data_dir.join("runs.db"));
        let workspace_root = workspace_root.unwrap_or_else(|| data_dir.join("workspace"));
        Ok(Self {
            data_dir,
            state_file,
            db_file,
            workspace_root,
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::resolve(
            env_path("ANVIL_DATA_DIR"),
            env_path("ANVIL_STATE"),
            env_path("ANVIL_DB"),
            env_path("ANVIL_WORKSPACE"),
        )
    }

    /// Create every directory the orchestrator writes under.
    pub fn ensure_directories(&self) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir)
            .with_context(|| format!("Failed to create data dir {}", self.data_dir.display()))?;
        std::fs::create_dir_all(&self.workspace_root).with_context(|| {
            format!(
                "Failed to create workspace dir {}",
                self.workspace_root.display()
            )
        })?;
        for file in [&self.state_file, &self.db_file] {
            if let Some(parent) = file.parent() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create parent dir for {}", file.display())
                })?;
            }
        }
        Ok(())
    }
}

/// Everything `anvil run` needs, resolved once at startup. Missing
/// credentials fail here, before anything is touched.
pub struct Settings {
    pub config: ConfigFile,
    pub paths: Paths,
    pub token: String,
    pub check_name: String,
    pub dry_run: bool,
}

impl Settings {
    pub fn load(config_path: Option<PathBuf>, dry_run_flag: bool) -> Result<Self> {
        let token = std::env::var("GITHUB_TOKEN")
            .ok()
            .filter(|t| !t.is_empty())
            .context("GITHUB_TOKEN is not set; cannot authenticate against GitHub")?;
        if !is_plausible_token(&token) {
            tracing::warn!("GITHUB_TOKEN does not match any known GitHub token format");
        }

        let config_path = resolve_config_path(config_path);
        let config = ConfigFile::load(&config_path)?;

        let paths = Paths::from_env()?;
        paths.ensure_directories()?;

        let check_name =
            std::env::var("ANVIL_CHECK_NAME").unwrap_or_else(|_| DEFAULT_CHECK_NAME.to_string());
        let dry_run = dry_run_flag || env_flag("ANVIL_DRY_RUN");

        Ok(Self {
            config,
            paths,
            token,
            check_name,
            dry_run,
        })
    }
}

fn env_path(key: &str) -> Option<PathBuf> {
    std::env::var_os(key).map(PathBuf::from)
}

fn env_flag(key: &str) -> bool {
    std::env::var(key).map(|v| is_truthy(&v)).unwrap_or(false)
}

fn is_truthy(value: &str) -> bool {
    matches!(value, "1" | "true" | "yes")
}
