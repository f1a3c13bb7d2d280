//! Runtime configuration
//!
//! A [`Config`] is created once per invocation. When no usable project is
//! found it is still created, in an invalid state: commands that need a
//! project then fail with [`MaverickError::NoValidConfig`].

pub mod discovery;
pub mod env;
pub mod project;

pub use discovery::{find_root, CONFIG_FILE};
pub use env::Environment;
pub use project::ProjectConfig;

use crate::compose::driver::DEFAULT_COMPOSE;
use crate::error::{MaverickError, Result};
use crate::project::ProjectType;
use std::path::{Path, PathBuf};

const DEFAULT_PROJECT_NAME: &str = "maverick";

/// A loaded project
#[derive(Debug, Clone, PartialEq)]
pub struct Project {
    /// Directory holding `maverick.yml`
    pub root: PathBuf,
    pub name: String,
    /// Project layer with the probed project type and `.env` flag
    pub config: ProjectConfig,
    /// Layer provided by Maverick underneath the project layer
    pub internal: ProjectConfig,
}

impl Project {
    /// Locate and load the project for `cwd`
    pub async fn discover(cwd: &Path, env: &Environment) -> Result<Self> {
        let root = match env.project_root.as_ref().filter(|root| root.is_dir()) {
            Some(root) => root.clone(),
            None => find_root(cwd).ok_or_else(|| MaverickError::ProjectNotFound(cwd.display().to_string()))?,
        };

        let path = root.join(CONFIG_FILE);
        if !tokio::fs::try_exists(&path).await? {
            return Err(MaverickError::ConfigNotFound(path));
        }
        let content = tokio::fs::read_to_string(&path).await?;
        let config = ProjectConfig::from_yaml(&content)?;

        let dotenv = tokio::fs::try_exists(root.join(".env")).await?;
        let project_type = discovery::detect_project_type(&root);
        Ok(Self::from_config(root, config, project_type, dotenv, env))
    }

    /// Build a project from an already parsed layer
    pub fn from_config(
        root: PathBuf,
        mut config: ProjectConfig,
        project_type: ProjectType,
        dotenv: bool,
        env: &Environment,
    ) -> Self {
        config.project_type = Some(project_type);
        config.dotenv = dotenv;

        let name = env
            .project_name
            .clone()
            .or_else(|| config.name.clone())
            .or_else(|| root.file_name().map(|n| n.to_string_lossy().into_owned()))
            .unwrap_or_else(|| DEFAULT_PROJECT_NAME.to_string());

        Self {
            root,
            name,
            config,
            internal: ProjectConfig::internal(),
        }
    }

    pub fn project_type(&self) -> ProjectType {
        self.config.project_type.unwrap_or_default()
    }
}

/// Invocation-wide configuration
#[derive(Debug)]
pub struct Config {
    pub cwd: PathBuf,
    pub env: Environment,
    project: std::result::Result<Project, String>,
}

impl Config {
    /// Load configuration; a missing or broken project is recorded, not raised
    pub async fn load(cwd: PathBuf, env: Environment) -> Self {
        let project = match Project::discover(&cwd, &env).await {
            Ok(project) => {
                tracing::debug!("Loaded project {} from {}", project.name, project.root.display());
                Ok(project)
            }
            Err(e) => {
                tracing::debug!("No valid configuration: {}", e);
                Err(e.to_string())
            }
        };
        Self { cwd, env, project }
    }

    /// Configuration around an already loaded project
    pub fn with_project(cwd: PathBuf, env: Environment, project: Project) -> Self {
        Self {
            cwd,
            env,
            project: Ok(project),
        }
    }

    pub fn valid(&self) -> bool {
        self.project.is_ok()
    }

    /// Why the configuration is invalid, if it is
    pub fn problem(&self) -> Option<&str> {
        self.project.as_ref().err().map(String::as_str)
    }

    pub fn project(&self) -> Result<&Project> {
        self.project.as_ref().map_err(|_| MaverickError::NoValidConfig)
    }

    /// Compose binary: environment, then `maverick.yml`, then the default
    pub fn compose_binary(&self) -> String {
        self.env
            .compose
            .clone()
            .or_else(|| self.project.as_ref().ok().and_then(|p| p.config.compose.clone()))
            .unwrap_or_else(|| DEFAULT_COMPOSE.to_string())
    }

    /// Setup repository URL: environment, then `maverick.yml`
    pub fn setup_url(&self) -> Option<String> {
        self.env
            .setup_url
            .clone()
            .or_else(|| self.project.as_ref().ok().and_then(|p| p.config.setup.clone()))
    }
}
