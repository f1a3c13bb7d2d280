//! `maverick.yml` project configuration

use crate::compose::config::{Category, ConfigDefaults, Declarations, ServiceDeclaration};
use crate::error::{MaverickError, Result};
use crate::project::{ProjectLanguage, ProjectType};
use serde::{Deserialize, Deserializer, Serialize};

/// Workspace directory used inside containers when none is configured
pub const DEFAULT_WORKSPACE_DIR: &str = "/opt";

/// Builtin infrastructure names, in the order they are assembled
pub const BUILTIN_NAMES: &[&str] = &["minio", "mysql", "ngrok", "postgresql", "redis"];

/// One configuration layer as read from `maverick.yml`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectConfig {
    /// Project name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Declarations::is_empty")]
    pub images: Declarations,
    #[serde(default, skip_serializing_if = "Declarations::is_empty")]
    pub infrastructure: Declarations,
    #[serde(default, skip_serializing_if = "Declarations::is_empty")]
    pub batch: Declarations,
    #[serde(default, skip_serializing_if = "Declarations::is_empty")]
    pub packages: Declarations,
    #[serde(default, skip_serializing_if = "Declarations::is_empty")]
    pub services: Declarations,
    /// Existing networks every unit joins
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub networks: Vec<String>,
    /// Per-unit overrides, applied last
    #[serde(default, skip_serializing_if = "Declarations::is_empty")]
    pub overrides: Declarations,
    /// Defaults for all units and per category
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub defaults: Option<ConfigDefaults>,
    /// Working directory of packages inside their containers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_dir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_type: Option<ProjectType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<ProjectLanguage>,
    /// Compose binary (name on PATH or full path)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compose: Option<String>,
    /// Setup repository URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub setup: Option<String>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub minio: Option<Option<ServiceDeclaration>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub mysql: Option<Option<ServiceDeclaration>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub ngrok: Option<Option<ServiceDeclaration>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub postgresql: Option<Option<ServiceDeclaration>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub redis: Option<Option<ServiceDeclaration>>,
    /// Whether the project root has a `.env`; probed, never read from YAML
    #[serde(skip)]
    pub dotenv: bool,
}

/// A key that is present maps to `Some`, even when its value is null
fn present<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

impl ProjectConfig {
    /// Parse a project layer from YAML
    pub fn from_yaml(content: &str) -> Result<Self> {
        let value: serde_yaml::Value = serde_yaml::from_str(content)?;
        if value.is_null() {
            return Err(MaverickError::InvalidConfig("maverick.yml file was invalid".to_string()));
        }
        Ok(serde_yaml::from_value(value)?)
    }

    /// The layer Maverick itself provides underneath the project layer
    pub fn internal() -> Self {
        Self {
            workspace_dir: Some(DEFAULT_WORKSPACE_DIR.to_string()),
            language: Some(ProjectLanguage::Typescript),
            project_type: Some(ProjectType::Lerna),
            ..Default::default()
        }
    }

    /// Declarations for one category
    pub fn declarations(&self, category: Category) -> &Declarations {
        match category {
            Category::Images => &self.images,
            Category::Infrastructure => &self.infrastructure,
            Category::Batch => &self.batch,
            Category::Packages => &self.packages,
            Category::Services => &self.services,
        }
    }

    /// Builtin toggle: `None` when absent, `Some(None)` when enabled with defaults
    pub fn builtin(&self, name: &str) -> Option<Option<&ServiceDeclaration>> {
        let entry = match name {
            "minio" => &self.minio,
            "mysql" => &self.mysql,
            "ngrok" => &self.ngrok,
            "postgresql" => &self.postgresql,
            "redis" => &self.redis,
            _ => return None,
        };
        entry.as_ref().map(Option::as_ref)
    }
}
