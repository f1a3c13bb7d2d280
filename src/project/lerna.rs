//! Lerna project parser
//!
//! Lists packages with `lerna list` and reads each package manifest for its
//! scripts and third-party dependencies.

use super::hash::{dependency_hash, ManifestDependencies};
use super::{safe_name, Dependencies, Language, PackageInfo, PackageKind, ProjectInfo, ProjectParser};
use crate::error::{MaverickError, Result};
use crate::process::Runner;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::OnceCell;

const WATCH_SCRIPT: &str = "maverick:watch";
const START_SCRIPT: &str = "maverick:start";

/// Entry of `lerna list --json`
#[derive(Debug, Clone, Deserialize)]
pub struct LernaEntry {
    pub name: String,
    pub location: PathBuf,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PackageManifest {
    #[serde(default)]
    scripts: BTreeMap<String, String>,
    #[serde(default)]
    dependencies: BTreeMap<String, String>,
    #[serde(default)]
    dev_dependencies: BTreeMap<String, String>,
}

/// Parser backed by the `lerna` CLI
pub struct LernaParser {
    root: PathBuf,
    runner: Arc<Runner>,
    parsed: OnceCell<ProjectInfo>,
}

impl LernaParser {
    pub fn new(root: PathBuf, runner: Arc<Runner>) -> Self {
        Self {
            root,
            runner,
            parsed: OnceCell::new(),
        }
    }

    async fn load(&self) -> Result<ProjectInfo> {
        let listing = self.runner.exec("lerna", &["list", "-a", "--json"], &self.root).await?;
        if !listing.success() {
            tracing::error!("{}", listing.stderr.trim_end());
            return Err(MaverickError::DependencyResolution(
                "error encountered running lerna list".to_string(),
            ));
        }

        let entries: Vec<LernaEntry> = serde_json::from_str(&listing.stdout)?;
        let mut packages = Vec::with_capacity(entries.len());

        for entry in &entries {
            if packages.iter().any(|p: &PackageInfo| p.name == entry.name) {
                return Err(MaverickError::DependencyResolution(format!(
                    "duplicate package name: {}",
                    entry.name
                )));
            }

            let lerna_deps = self.lerna_dependencies(&entry.name).await?;
            packages.push(describe_package(&self.root, entry, &lerna_deps).await?);
        }

        tracing::trace!("Lerna found {} packages", packages.len());
        Ok(ProjectInfo::from_packages(self.root.clone(), packages))
    }

    /// Workspace packages `name` depends on, as reported by lerna
    async fn lerna_dependencies(&self, name: &str) -> Result<Vec<String>> {
        let scope = format!("--scope={}", name);
        let output = self
            .runner
            .exec_checked("lerna", &["list", "--include-filtered-dependencies", &scope], &self.root)
            .await?;

        Ok(output
            .stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }
}

#[async_trait]
impl ProjectParser for LernaParser {
    async fn parse(&self) -> Result<ProjectInfo> {
        self.parsed.get_or_try_init(|| self.load()).await.cloned()
    }
}

/// Build package info from a lerna entry, the lerna dependency listing and
/// the files in the package directory.
pub async fn describe_package(root: &Path, entry: &LernaEntry, lerna_deps: &[String]) -> Result<PackageInfo> {
    let manifest_path = entry.location.join("package.json");
    let raw = tokio::fs::read_to_string(&manifest_path).await.map_err(|e| {
        MaverickError::DependencyResolution(format!("failed to read {}: {}", manifest_path.display(), e))
    })?;
    let manifest: PackageManifest = serde_json::from_str(&raw)?;

    let manifest_deps = ManifestDependencies {
        dependencies: manifest.dependencies,
        dev_dependencies: manifest.dev_dependencies,
    };

    let (direct, indirect): (Vec<String>, Vec<String>) =
        lerna_deps.iter().cloned().partition(|dep| manifest_deps.contains(dep));

    let kind = if manifest.scripts.contains_key(START_SCRIPT) {
        PackageKind::Service
    } else if manifest.scripts.contains_key(WATCH_SCRIPT) {
        PackageKind::Package
    } else {
        PackageKind::Unknown
    };

    let language = if tokio::fs::try_exists(entry.location.join("tsconfig.json")).await? {
        Language::Typescript
    } else {
        Language::Javascript
    };

    Ok(PackageInfo {
        name: entry.name.clone(),
        safe_name: safe_name(&entry.name),
        relative_path: relative_path(root, &entry.location),
        language,
        kind,
        dependencies: Dependencies { direct, indirect },
        dependency_hash: dependency_hash(&manifest_deps),
        dotenv: tokio::fs::try_exists(entry.location.join(".env")).await?,
    })
}

fn relative_path(root: &Path, location: &Path) -> String {
    location
        .strip_prefix(root)
        .unwrap_or(location)
        .to_string_lossy()
        .trim_start_matches('/')
        .to_string()
}
