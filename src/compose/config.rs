//! Compose configuration types
//!
//! These types cover both the partial declarations read from `maverick.yml`
//! and the resolved services written to the generated compose file.

use crate::error::{MaverickError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Compose file format version emitted in every generated manifest
pub const COMPOSE_VERSION: &str = "3.7";

/// Field names a functional template may reference
pub const SERVICE_FIELDS: &[&str] = &[
    "build",
    "image",
    "environment",
    "env_file",
    "networks",
    "ports",
    "volumes",
    "stdin_open",
    "tty",
    "command",
    "depends_on",
];

/// Named service declarations for one category
pub type Declarations = BTreeMap<String, ServiceDeclaration>;

/// A service whose computed fields have been filled in
pub type ResolvedService = ServiceDeclaration;

/// Unit categories, in phase order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Images that are only built, never run by default
    Images,
    /// Data stores, tunnels and other backing services
    Infrastructure,
    /// One-shot jobs
    Batch,
    /// Library packages discovered in the monorepo
    Packages,
    /// Runnable services discovered in the monorepo
    Services,
}

impl Category {
    /// Every category in phase order
    pub const ALL: [Category; 5] = [
        Category::Images,
        Category::Infrastructure,
        Category::Batch,
        Category::Packages,
        Category::Services,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Images => "images",
            Category::Infrastructure => "infrastructure",
            Category::Batch => "batch",
            Category::Packages => "packages",
            Category::Services => "services",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = MaverickError;

    fn from_str(s: &str) -> Result<Self> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| MaverickError::InvalidArguments(format!("unknown category: {}", s)))
    }
}

/// Generated compose file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComposeDefinition {
    /// Compose file version
    pub version: String,
    /// Services keyed by safe name
    #[serde(default)]
    pub services: BTreeMap<String, ResolvedService>,
    /// Named volumes
    #[serde(default)]
    pub volumes: BTreeMap<String, VolumeConfig>,
    /// Networks
    #[serde(default)]
    pub networks: BTreeMap<String, NetworkConfig>,
}

impl Default for ComposeDefinition {
    fn default() -> Self {
        Self {
            version: COMPOSE_VERSION.to_string(),
            services: BTreeMap::new(),
            volumes: BTreeMap::new(),
            networks: BTreeMap::new(),
        }
    }
}

/// Service declaration. Every field is optional so the same type serves as a
/// partial layer and as the resolved result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceDeclaration {
    /// Image name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Build configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build: Option<BuildConfig>,
    /// Environment variables as KEY=value strings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<StringList>,
    /// Environment files
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env_file: Option<StringList>,
    /// Networks to connect to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub networks: Option<StringList>,
    /// Port mappings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ports: Option<StringList>,
    /// Volume mounts in short syntax
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volumes: Option<StringList>,
    /// Command to run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<CommandConfig>,
    /// Service dependencies
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depends_on: Option<StringList>,
    /// Stdin open
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stdin_open: Option<Flag>,
    /// TTY
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tty: Option<Flag>,
}

/// A field value, or a field reference such as `{{ ports(db) }}` that has
/// not been resolved yet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Templated<T> {
    Value(T),
    Template(String),
}

/// List field that may hold a field reference
pub type StringList = Templated<Vec<String>>;

/// Boolean field that may hold a field reference
pub type Flag = Templated<bool>;

impl<T> Templated<T> {
    /// The resolved value, `None` while a reference is pending
    pub fn value(&self) -> Option<&T> {
        match self {
            Templated::Value(value) => Some(value),
            Templated::Template(_) => None,
        }
    }
}

impl<T> From<T> for Templated<T> {
    fn from(value: T) -> Self {
        Templated::Value(value)
    }
}

impl StringList {
    /// List from string slices
    pub fn of(items: &[&str]) -> Self {
        Templated::Value(items.iter().map(|i| i.to_string()).collect())
    }

    /// Items of a resolved list; a pending reference has none
    pub fn items(&self) -> &[String] {
        self.value().map(Vec::as_slice).unwrap_or(&[])
    }
}

impl ServiceDeclaration {
    /// Convert into the tagged value form used by the merge engine
    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Rebuild a declaration from a merged value
    pub fn from_value(value: Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| MaverickError::InvalidConfig(e.to_string()))
    }

    /// Image builder
    pub fn with_image(mut self, image: &str) -> Self {
        self.image = Some(image.to_string());
        self
    }

    /// Depends-on builder
    pub fn with_depends_on(mut self, deps: &[&str]) -> Self {
        self.depends_on = Some(StringList::of(deps));
        self
    }

    /// Fields still holding a text where a list or a flag belongs. Only
    /// meaningful once field references have been resolved.
    pub fn unresolved_fields(&self) -> Vec<&'static str> {
        let lists = [
            ("environment", &self.environment),
            ("env_file", &self.env_file),
            ("networks", &self.networks),
            ("ports", &self.ports),
            ("volumes", &self.volumes),
            ("depends_on", &self.depends_on),
        ];
        let flags = [("stdin_open", &self.stdin_open), ("tty", &self.tty)];

        lists
            .into_iter()
            .filter(|(_, field)| matches!(field, Some(Templated::Template(_))))
            .map(|(name, _)| name)
            .chain(
                flags
                    .into_iter()
                    .filter(|(_, field)| matches!(field, Some(Templated::Template(_))))
                    .map(|(name, _)| name),
            )
            .collect()
    }
}

/// Build configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BuildConfig {
    /// Simple context path
    Simple(String),
    /// Full build configuration
    Full(BuildConfigFull),
}

/// Full build configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildConfigFull {
    /// Build context
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    /// Dockerfile path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dockerfile: Option<String>,
    /// Build arguments
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<BTreeMap<String, String>>,
    /// Target stage
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

/// Command configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CommandConfig {
    /// Shell command string
    Shell(String),
    /// Exec form array
    Exec(Vec<String>),
}

/// Network configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Driver
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver: Option<String>,
    /// External network
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external: Option<bool>,
}

/// Volume configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VolumeConfig {
    /// Driver
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver: Option<String>,
    /// External volume
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external: Option<bool>,
}

/// Default layers: one applied to every unit and one per category
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigDefaults {
    #[serde(default)]
    pub all: ServiceDeclaration,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<ServiceDeclaration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub infrastructure: Option<ServiceDeclaration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch: Option<ServiceDeclaration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub packages: Option<ServiceDeclaration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub services: Option<ServiceDeclaration>,
}

impl ConfigDefaults {
    /// Defaults for one category
    pub fn for_category(&self, category: Category) -> Option<&ServiceDeclaration> {
        match category {
            Category::Images => self.images.as_ref(),
            Category::Infrastructure => self.infrastructure.as_ref(),
            Category::Batch => self.batch.as_ref(),
            Category::Packages => self.packages.as_ref(),
            Category::Services => self.services.as_ref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_declaration() {
        let yaml = r#"
image: node:14
command: npm start
ports:
  - "3000:3000"
build:
  context: .
  dockerfile: Dockerfile.dev
"#;
        let decl: ServiceDeclaration = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(decl.image.as_deref(), Some("node:14"));
        assert_eq!(decl.command, Some(CommandConfig::Shell("npm start".to_string())));
        assert!(matches!(decl.build, Some(BuildConfig::Full(_))));
        assert_eq!(decl.ports, Some(StringList::of(&["3000:3000"])));
    }

    #[test]
    fn test_field_reference_in_typed_fields() {
        let yaml = r#"
ports: "{{ ports(db) }}"
tty: "{{ tty(db) }}"
stdin_open: true
"#;
        let decl: ServiceDeclaration = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(decl.ports, Some(Templated::Template("{{ ports(db) }}".to_string())));
        assert_eq!(decl.tty, Some(Templated::Template("{{ tty(db) }}".to_string())));
        assert_eq!(decl.stdin_open, Some(Templated::Value(true)));
        assert_eq!(decl.unresolved_fields(), vec!["ports", "tty"]);

        let value = decl.to_value().unwrap();
        assert_eq!(value["ports"], Value::String("{{ ports(db) }}".to_string()));
        assert_eq!(value["stdin_open"], Value::Bool(true));
    }

    #[test]
    fn test_empty_fields_are_not_serialized() {
        let decl = ServiceDeclaration::default().with_image("redis:3");
        let yaml = serde_yaml::to_string(&decl).unwrap();
        assert_eq!(yaml.trim(), "image: redis:3");
    }

    #[test]
    fn test_category_order() {
        let mut shuffled = vec![Category::Services, Category::Images, Category::Batch];
        shuffled.sort();
        assert_eq!(shuffled, vec![Category::Images, Category::Batch, Category::Services]);
        assert_eq!("infrastructure".parse::<Category>().unwrap(), Category::Infrastructure);
        assert!("overrides".parse::<Category>().is_err());
    }
}
