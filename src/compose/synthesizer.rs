//! Service synthesis
//!
//! Declared units are a merge of their configuration layers. Units built from
//! discovered packages additionally get a run command, env files, mounts for
//! every workspace dependency, depends-on edges and networks.

use super::config::{Category, CommandConfig, ConfigDefaults, Declarations, ServiceDeclaration};
use super::merge::merge_declarations;
use super::template::{render_package, render_str};
use crate::error::Result;
use crate::project::{safe_name, Language, PackageInfo, PackageKind, ProjectInfo};
use serde_json::{Map, Value};
use std::path::Path;

const WATCH_SCRIPT: &str = "maverick:watch";
const START_SCRIPT: &str = "maverick:start";

/// Everything synthesis reads besides the unit itself
#[derive(Debug, Clone, Copy)]
pub struct SynthesisContext<'a> {
    pub project: &'a ProjectInfo,
    pub defaults: &'a ConfigDefaults,
    pub overrides: &'a Declarations,
    /// Network names every discovered unit joins
    pub networks: &'a [String],
    /// Package root inside containers
    pub workspace_dir: &'a str,
    /// Whether the project root has a `.env`
    pub dotenv: bool,
}

/// Synthesize a declared unit. Returns the key it is stored under, or `None`
/// for a package or service that the project does not contain. Overrides are
/// looked up by that key.
pub fn declared(
    name: &str,
    category: Category,
    internal: Option<&ServiceDeclaration>,
    project: Option<&ServiceDeclaration>,
    ctx: &SynthesisContext<'_>,
) -> Result<Option<(String, ServiceDeclaration)>> {
    let key = match ctx.project.packages.get(name) {
        Some(pkg) => pkg.safe_name.clone(),
        None if matches!(category, Category::Packages | Category::Services) => {
            tracing::trace!("Skipping {} {} that was not found in project", category, name);
            return Ok(None);
        }
        None => name.to_string(),
    };

    let service = merge_declarations(&[
        internal,
        project,
        Some(&ctx.defaults.all),
        ctx.defaults.for_category(category),
        ctx.overrides.get(&key),
    ])?;

    tracing::trace!("Built {} entry {} as {}", category, name, key);
    Ok(Some((key, service)))
}

/// Synthesize a unit for a discovered package
pub fn from_package(pkg: &PackageInfo, category: Category, ctx: &SynthesisContext<'_>) -> Result<ServiceDeclaration> {
    let defaults = overlay(&[Some(&ctx.defaults.all), ctx.defaults.for_category(category)])?;
    let override_decl = ctx.overrides.get(&pkg.safe_name);

    let script = if category == Category::Services {
        START_SCRIPT
    } else {
        WATCH_SCRIPT
    };
    let command = CommandConfig::Exec(
        ["npm", "--prefix", pkg.relative_path.as_str(), "run", script]
            .iter()
            .map(|s| s.to_string())
            .collect(),
    );

    let mut env_file = Vec::new();
    if ctx.dotenv {
        env_file.push(".env".to_string());
    }
    if pkg.dotenv {
        env_file.push(join(&pkg.relative_path, ".env"));
    }

    let depends_on: Vec<String> = pkg
        .dependencies
        .all()
        .filter(|dep| **dep != pkg.name)
        .map(|dep| safe_name(dep))
        .collect();

    let volumes: Vec<String> = pkg
        .dependencies
        .all()
        .flat_map(|dep| volume_mounts(dep, *dep == pkg.name, ctx))
        .collect();

    let mut networks = ctx.networks.to_vec();
    if let Some(extra) = override_decl.and_then(|o| o.networks.as_ref()) {
        networks.extend(extra.items().iter().cloned());
    }

    let image = override_decl
        .and_then(|o| o.image.clone())
        .or_else(|| defaults.image.clone())
        .unwrap_or_else(|| format!("{}:{}", pkg.safe_name, pkg.dependency_hash));

    let build = override_decl
        .and_then(|o| o.build.as_ref())
        .or(defaults.build.as_ref());

    let computed = ServiceDeclaration {
        command: Some(command),
        env_file: Some(env_file.into()),
        volumes: Some(volumes.into()),
        depends_on: Some(depends_on.into()),
        networks: Some(networks.into()),
        ..Default::default()
    };

    let mut service = overlay(&[Some(&defaults), Some(&computed), override_decl])?;
    service.image = Some(render_str(&image, pkg));
    service.build = match build {
        Some(build) => Some(serde_json::from_value(render_package(serde_json::to_value(build)?, pkg))?),
        None => None,
    };

    Ok(service)
}

/// Mounts contributed by one dependency of a package
fn volume_mounts(name: &str, is_self: bool, ctx: &SynthesisContext<'_>) -> Vec<String> {
    let Some(dep) = ctx.project.packages.get(name) else {
        return Vec::new();
    };
    let target = Path::new(ctx.workspace_dir).join(&dep.relative_path);
    let data_mount = || format!("{}-data:{}", dep.safe_name, target.join("dist").display());

    if is_self {
        let mut mounts: Vec<String> = ["src", "package.json"]
            .iter()
            .map(|file| {
                format!(
                    "./{}:{}",
                    join(&dep.relative_path, file),
                    target.join(file).display()
                )
            })
            .collect();
        if dep.language == Language::Typescript && dep.kind == PackageKind::Package {
            mounts.push(data_mount());
        }
        return mounts;
    }

    match dep.language {
        Language::Javascript => vec![format!(
            "{}:{}",
            ctx.project.root.join(&dep.relative_path).join("src").display(),
            target.join("src").display()
        )],
        Language::Typescript => vec![data_mount()],
    }
}

/// Shallow overlay: fields set on a later layer replace earlier ones whole
fn overlay(layers: &[Option<&ServiceDeclaration>]) -> Result<ServiceDeclaration> {
    let mut fields = Map::new();
    for layer in layers.iter().flatten() {
        if let Value::Object(map) = layer.to_value()? {
            fields.extend(map);
        }
    }
    ServiceDeclaration::from_value(Value::Object(fields))
}

fn join(base: &str, file: &str) -> String {
    Path::new(base).join(file).to_string_lossy().into_owned()
}
