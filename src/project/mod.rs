//! Monorepo package discovery
//!
//! A [`ProjectParser`] turns the monorepo on disk into a [`ProjectInfo`]:
//! every package with its safe name, language, unit kind and dependency set.

pub mod hash;
pub mod lerna;
pub mod void;

pub use lerna::LernaParser;
pub use void::VoidParser;

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::process::Runner;

/// Source language of a package
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// Compiled to `dist`, shared through a named volume
    Typescript,
    /// Shared by bind-mounting `src`
    Javascript,
}

/// Language of the whole project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectLanguage {
    Typescript,
    Javascript,
    Unknown,
}

impl From<Language> for ProjectLanguage {
    fn from(language: Language) -> Self {
        match language {
            Language::Typescript => ProjectLanguage::Typescript,
            Language::Javascript => ProjectLanguage::Javascript,
        }
    }
}

/// Monorepo tooling used by the project
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectType {
    Lerna,
    Nx,
    #[default]
    Unknown,
}

/// Unit kind of a package, taken from its scripts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageKind {
    /// Has a `maverick:watch` script
    Package,
    /// Has a `maverick:start` script
    Service,
    Unknown,
}

/// Direct and transitive dependencies on other packages of the project
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependencies {
    pub direct: Vec<String>,
    pub indirect: Vec<String>,
}

impl Dependencies {
    /// Direct then indirect names
    pub fn all(&self) -> impl Iterator<Item = &String> {
        self.direct.iter().chain(self.indirect.iter())
    }
}

/// One discovered package
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageInfo {
    /// Name as declared in the package manifest
    pub name: String,
    /// Name usable as a compose service key
    pub safe_name: String,
    /// Path relative to the project root
    pub relative_path: String,
    pub language: Language,
    pub kind: PackageKind,
    pub dependencies: Dependencies,
    /// Hash of the sorted third-party dependency manifest
    pub dependency_hash: u32,
    /// Whether the package has its own `.env`
    pub dotenv: bool,
}

impl PackageInfo {
    /// Create package info with no dependencies
    pub fn new(name: &str, relative_path: &str, language: Language, kind: PackageKind) -> Self {
        Self {
            name: name.to_string(),
            safe_name: safe_name(name),
            relative_path: relative_path.to_string(),
            language,
            kind,
            dependencies: Dependencies::default(),
            dependency_hash: 0,
            dotenv: false,
        }
    }

    /// Set dependencies
    pub fn depends_on(mut self, direct: &[&str], indirect: &[&str]) -> Self {
        self.dependencies = Dependencies {
            direct: direct.iter().map(|d| d.to_string()).collect(),
            indirect: indirect.iter().map(|d| d.to_string()).collect(),
        };
        self
    }
}

/// Parsed project
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectInfo {
    pub root: PathBuf,
    /// Packages keyed by original name
    pub packages: BTreeMap<String, PackageInfo>,
    pub language: ProjectLanguage,
}

impl ProjectInfo {
    /// An empty project
    pub fn empty(root: PathBuf) -> Self {
        Self {
            root,
            packages: BTreeMap::new(),
            language: ProjectLanguage::Unknown,
        }
    }

    /// Build a project from a list of packages
    pub fn from_packages(root: PathBuf, packages: impl IntoIterator<Item = PackageInfo>) -> Self {
        let packages: BTreeMap<String, PackageInfo> =
            packages.into_iter().map(|p| (p.name.clone(), p)).collect();
        let language = project_language(packages.values());
        Self {
            root,
            packages,
            language,
        }
    }
}

/// Packages sharing one language give the project its language, else unknown
pub fn project_language<'a>(packages: impl IntoIterator<Item = &'a PackageInfo>) -> ProjectLanguage {
    let mut language = None;
    for package in packages {
        match language {
            None => language = Some(package.language),
            Some(l) if l != package.language => return ProjectLanguage::Unknown,
            Some(_) => {}
        }
    }
    language.map(ProjectLanguage::from).unwrap_or(ProjectLanguage::Unknown)
}

/// Sanitize a package name for use as a compose key: drop the scope marker
/// and turn the scope separator into an underscore.
pub fn safe_name(name: &str) -> String {
    name.replacen('@', "", 1).replacen('/', "_", 1)
}

/// Source of the package graph
#[async_trait]
pub trait ProjectParser: Send + Sync {
    /// Parse the project. Implementations memoize the result.
    async fn parse(&self) -> Result<ProjectInfo>;
}

/// Pick the parser for a project type. Nx has no parser and is treated like
/// an unknown project.
pub fn parser_for(project_type: ProjectType, root: PathBuf, runner: Arc<Runner>) -> Arc<dyn ProjectParser> {
    match project_type {
        ProjectType::Lerna => Arc::new(LernaParser::new(root, runner)),
        ProjectType::Nx | ProjectType::Unknown => Arc::new(VoidParser::new(root)),
    }
}

/// Parser returning a fixed project
#[cfg(test)]
pub(crate) struct StaticParser(pub ProjectInfo);

#[cfg(test)]
#[async_trait]
impl ProjectParser for StaticParser {
    async fn parse(&self) -> Result<ProjectInfo> {
        Ok(self.0.clone())
    }
}
