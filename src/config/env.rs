//! Environment overrides

use clap::Args;
use std::path::PathBuf;

pub const DOCKER_COMPOSE: &str = "DOCKER_COMPOSE";
pub const PROJECT_ROOT: &str = "PROJECT_ROOT";
pub const PROJECT_NAME: &str = "PROJECT_NAME";
pub const SETUP_URL: &str = "MAVERICK_SETUP_URL";
pub const LOG: &str = "MAVERICK_LOG";

/// Settings taken from the command line or the environment. Empty values
/// count as unset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Args)]
pub struct Environment {
    /// Compose binary name or path
    #[arg(long, env = DOCKER_COMPOSE, global = true)]
    pub compose: Option<String>,

    /// Project root, instead of searching upwards for maverick.yml
    #[arg(long, env = PROJECT_ROOT, global = true, value_parser = any_path)]
    pub project_root: Option<PathBuf>,

    /// Project name
    #[arg(long, env = PROJECT_NAME, global = true)]
    pub project_name: Option<String>,

    /// Setup repository URL
    #[arg(long, env = SETUP_URL, global = true)]
    pub setup_url: Option<String>,

    /// Tracing filter directives
    #[arg(long, env = LOG, global = true)]
    pub log: Option<String>,
}

/// Like clap's path parser, but an empty value is kept so it can be dropped
/// as unset
fn any_path(value: &str) -> std::result::Result<PathBuf, std::convert::Infallible> {
    Ok(PathBuf::from(value))
}

impl Environment {
    /// Drop values that were set but left empty
    pub fn without_empty(self) -> Self {
        fn keep(value: Option<String>) -> Option<String> {
            value.filter(|v| !v.is_empty())
        }

        Self {
            compose: keep(self.compose),
            project_root: self.project_root.filter(|p| !p.as_os_str().is_empty()),
            project_name: keep(self.project_name),
            setup_url: keep(self.setup_url),
            log: keep(self.log),
        }
    }
}
