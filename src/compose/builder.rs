//! Topology assembly
//!
//! Services are assembled in a fixed order, later groups replacing earlier
//! ones on a shared key: images, builtins, infrastructure, batch, declared
//! packages, declared services, then units synthesized for every discovered
//! package nobody declared.

use super::builtins::builtin_declaration;
use super::config::{
    Category, ComposeDefinition, ConfigDefaults, Declarations, NetworkConfig, ServiceDeclaration, VolumeConfig,
};
use super::merge::{merge_declarations, resolve_defaults};
use super::synthesizer::{self, SynthesisContext};
use super::template::resolve_services;
use crate::config::project::{ProjectConfig, BUILTIN_NAMES, DEFAULT_WORKSPACE_DIR};
use crate::error::{MaverickError, Result};
use crate::project::{PackageKind, ProjectInfo, ProjectParser};
use serde_json::Map;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Unit names per category, in phase order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryLists(BTreeMap<Category, Vec<String>>);

impl CategoryLists {
    /// Units of one category
    pub fn get(&self, category: Category) -> &[String] {
        self.0.get(&category).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Append names to a category, skipping ones it already has
    pub fn extend<'a>(&mut self, category: Category, names: impl IntoIterator<Item = &'a String>) {
        let list = self.0.entry(category).or_default();
        for name in names {
            if !list.contains(name) {
                list.push(name.clone());
            }
        }
    }

    /// First category listing a unit
    pub fn category_of(&self, name: &str) -> Option<Category> {
        Category::ALL
            .into_iter()
            .find(|c| self.get(*c).iter().any(|n| n == name))
    }
}

/// Units synthesized for undeclared packages
#[derive(Debug, Default)]
pub struct DynamicEntries {
    pub packages: Declarations,
    pub services: Declarations,
}

/// Builds the compose definition from configuration and the package graph
pub struct ComposeBuilder {
    project: ProjectConfig,
    internal: ProjectConfig,
    parser: Arc<dyn ProjectParser>,
    definition: Option<ComposeDefinition>,
    categories: CategoryLists,
}

impl ComposeBuilder {
    pub fn new(project: ProjectConfig, internal: ProjectConfig, parser: Arc<dyn ProjectParser>) -> Self {
        Self {
            project,
            internal,
            parser,
            definition: None,
            categories: CategoryLists::default(),
        }
    }

    /// The assembled definition, built on first access
    pub async fn definition(&mut self) -> Result<&ComposeDefinition> {
        let definition = match self.definition.take() {
            Some(definition) => definition,
            None => {
                let (definition, categories) = self.build().await?;
                self.categories = categories;
                definition
            }
        };
        Ok(&*self.definition.insert(definition))
    }

    /// Category lists of the assembled definition
    pub async fn categories(&mut self) -> Result<&CategoryLists> {
        self.definition().await?;
        Ok(&self.categories)
    }

    fn workspace_dir(&self) -> &str {
        self.project
            .workspace_dir
            .as_deref()
            .or(self.internal.workspace_dir.as_deref())
            .unwrap_or(DEFAULT_WORKSPACE_DIR)
    }

    fn networks(&self) -> BTreeMap<String, NetworkConfig> {
        self.internal
            .networks
            .iter()
            .chain(self.project.networks.iter())
            .map(|name| (name.clone(), NetworkConfig::default()))
            .collect()
    }

    async fn build(&self) -> Result<(ComposeDefinition, CategoryLists)> {
        let info = self.parser.parse().await?;
        tracing::trace!("Project has {} packages", info.packages.len());

        let defaults = resolve_defaults(self.internal.defaults.as_ref(), self.project.defaults.as_ref())?;
        let networks = self.networks();
        let network_names: Vec<String> = networks.keys().cloned().collect();
        let overrides = self.overrides(&info)?;

        let ctx = SynthesisContext {
            project: &info,
            defaults: &defaults,
            overrides: &overrides,
            networks: &network_names,
            workspace_dir: self.workspace_dir(),
            dotenv: self.project.dotenv,
        };

        let builtins = self.builtins(&defaults)?;
        let images = self.declared(Category::Images, &ctx)?;
        let infrastructure = self.declared(Category::Infrastructure, &ctx)?;
        let batch = self.declared(Category::Batch, &ctx)?;
        let packages = self.declared(Category::Packages, &ctx)?;
        let services = self.declared(Category::Services, &ctx)?;

        let mut assembled = Declarations::new();
        for group in [&images, &builtins, &infrastructure, &batch, &packages, &services] {
            assembled.extend(group.iter().map(|(k, v)| (k.clone(), v.clone())));
        }

        let existing: BTreeSet<String> = assembled.keys().cloned().collect();
        let dynamic = dynamic_entries(&info, &ctx, &existing)?;
        assembled.extend(dynamic.packages.iter().map(|(k, v)| (k.clone(), v.clone())));
        assembled.extend(dynamic.services.iter().map(|(k, v)| (k.clone(), v.clone())));

        let volumes: BTreeMap<String, VolumeConfig> = [&packages, &services, &builtins, &dynamic.packages, &dynamic.services]
            .into_iter()
            .flat_map(|group| group.keys())
            .map(|name| (format!("{}-data", name), VolumeConfig::default()))
            .collect();

        let mut categories = CategoryLists::default();
        categories.extend(Category::Images, images.keys());
        categories.extend(Category::Infrastructure, builtins.keys().chain(infrastructure.keys()));
        categories.extend(Category::Batch, batch.keys());
        categories.extend(Category::Packages, packages.keys().chain(dynamic.packages.keys()));
        categories.extend(Category::Services, services.keys().chain(dynamic.services.keys()));

        let definition = ComposeDefinition {
            services: resolve_templates(assembled)?,
            volumes,
            networks,
            ..Default::default()
        };

        tracing::debug!(
            "Assembled {} services, {} volumes, {} networks",
            definition.services.len(),
            definition.volumes.len(),
            definition.networks.len()
        );
        Ok((definition, categories))
    }

    /// Override layers keyed the way their units are
    fn overrides(&self, info: &ProjectInfo) -> Result<Declarations> {
        let mut overrides = Declarations::new();
        for name in union_keys(&self.project.overrides, &self.internal.overrides) {
            let key = info
                .packages
                .get(name)
                .map(|pkg| pkg.safe_name.clone())
                .unwrap_or_else(|| name.clone());
            if overrides.contains_key(&key) {
                return Err(MaverickError::DuplicateName(key));
            }
            let merged = merge_declarations(&[self.internal.overrides.get(name), self.project.overrides.get(name)])?;
            overrides.insert(key, merged);
        }
        Ok(overrides)
    }

    fn builtins(&self, defaults: &ConfigDefaults) -> Result<Declarations> {
        let mut builtins = Declarations::new();
        for name in BUILTIN_NAMES {
            if let Some(service) = builtin_declaration(name, self.project.builtin(name), defaults)? {
                builtins.insert(name.to_string(), service);
            }
        }
        Ok(builtins)
    }

    fn declared(&self, category: Category, ctx: &SynthesisContext<'_>) -> Result<Declarations> {
        let project = self.project.declarations(category);
        let internal = self.internal.declarations(category);

        let mut out = Declarations::new();
        for name in union_keys(project, internal) {
            let Some((key, service)) =
                synthesizer::declared(name, category, internal.get(name), project.get(name), ctx)?
            else {
                continue;
            };
            if out.contains_key(&key) {
                return Err(MaverickError::DuplicateName(key));
            }
            out.insert(key, service);
        }
        Ok(out)
    }
}

/// Synthesize units for discovered packages whose name or safe name is not
/// already taken. Packages of unknown kind are dropped.
pub fn dynamic_entries(
    info: &ProjectInfo,
    ctx: &SynthesisContext<'_>,
    existing: &BTreeSet<String>,
) -> Result<DynamicEntries> {
    let mut entries = DynamicEntries::default();
    let mut seen = BTreeSet::new();

    for pkg in info.packages.values() {
        if existing.contains(&pkg.name) || existing.contains(&pkg.safe_name) {
            continue;
        }

        let (category, target) = match pkg.kind {
            PackageKind::Package => (Category::Packages, &mut entries.packages),
            PackageKind::Service => (Category::Services, &mut entries.services),
            PackageKind::Unknown => {
                tracing::trace!("Dropping {} without a maverick script", pkg.name);
                continue;
            }
        };

        if !seen.insert(pkg.safe_name.clone()) {
            return Err(MaverickError::DuplicateName(pkg.safe_name.clone()));
        }
        target.insert(pkg.safe_name.clone(), synthesizer::from_package(pkg, category, ctx)?);
    }

    Ok(entries)
}

/// Names from the first map, then names only the second has
fn union_keys<'a>(first: &'a Declarations, second: &'a Declarations) -> Vec<&'a String> {
    first
        .keys()
        .chain(second.keys().filter(|k| !first.contains_key(*k)))
        .collect()
}

fn resolve_templates(services: Declarations) -> Result<BTreeMap<String, ServiceDeclaration>> {
    let mut values = Map::new();
    for (name, service) in services {
        values.insert(name, service.to_value()?);
    }

    resolve_services(&mut values)?;

    let mut resolved = BTreeMap::new();
    for (name, value) in values {
        let service = ServiceDeclaration::from_value(value)?;
        let unresolved = service.unresolved_fields();
        if !unresolved.is_empty() {
            return Err(MaverickError::InvalidConfig(format!(
                "{} of {} must resolve to a list or a boolean",
                unresolved.join(", "),
                name
            )));
        }
        resolved.insert(name, service);
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::config::{Flag, StringList};
    use crate::project::{Language, PackageInfo, StaticParser, VoidParser};
    use std::path::PathBuf;

    fn builder(yaml: &str, packages: Vec<PackageInfo>) -> ComposeBuilder {
        let project = ProjectConfig::from_yaml(yaml).unwrap();
        let info = ProjectInfo::from_packages(PathBuf::from("/repo"), packages);
        ComposeBuilder::new(project, ProjectConfig::internal(), Arc::new(StaticParser(info)))
    }

    #[tokio::test]
    async fn test_declared_service_and_builtin() {
        let web = PackageInfo::new("web", "services/web", Language::Javascript, PackageKind::Service);
        let mut builder = builder(
            r#"
services:
  web:
    image: node:14
mysql:
"#,
            vec![web],
        );

        let definition = builder.definition().await.unwrap().clone();
        let web = &definition.services["web"];
        assert_eq!(web.image.as_deref(), Some("node:14"));
        assert_eq!(web.depends_on, None);

        let mysql = &definition.services["mysql"];
        assert_eq!(mysql.image.as_deref(), Some("mysql:5.7"));
        assert_eq!(mysql.ports, Some(StringList::of(&["3306:3306"])));
        assert_eq!(mysql.volumes, Some(StringList::of(&["mysql-data:/var/lib/mysql"])));

        assert!(definition.volumes.contains_key("mysql-data"));
        assert!(definition.volumes.contains_key("web-data"));

        let categories = builder.categories().await.unwrap();
        assert_eq!(categories.get(Category::Infrastructure), ["mysql".to_string()]);
        assert_eq!(categories.get(Category::Services), ["web".to_string()]);
        assert_eq!(categories.category_of("mysql"), Some(Category::Infrastructure));
    }

    #[tokio::test]
    async fn test_field_references_to_lists_and_flags() {
        let mut builder = builder(
            r#"
infrastructure:
  db:
    image: postgres
    ports:
      - "5432:5432"
    tty: true
  proxy:
    image: "{{ image(db) }}"
    ports: "{{ ports(db) }}"
    tty: "{{ tty(db) }}"
  sidecar:
    ports:
      - "8080:80"
      - "{{ ports(db) }}"
"#,
            Vec::new(),
        );

        let definition = builder.definition().await.unwrap().clone();
        let proxy = &definition.services["proxy"];
        assert_eq!(proxy.image.as_deref(), Some("postgres"));
        assert_eq!(proxy.ports, Some(StringList::of(&["5432:5432"])));
        assert_eq!(proxy.tty, Some(Flag::Value(true)));
        assert_eq!(
            definition.services["sidecar"].ports,
            Some(StringList::of(&["8080:80", "5432:5432"]))
        );

        let yaml = serde_yaml::to_string(&definition).unwrap();
        assert!(!yaml.contains("{{"));
    }

    #[tokio::test]
    async fn test_reference_of_the_wrong_type_is_rejected() {
        let mut builder = builder(
            r#"
infrastructure:
  db:
    image: postgres
  proxy:
    ports: "{{ image(db) }}"
"#,
            Vec::new(),
        );

        assert!(matches!(
            builder.definition().await,
            Err(MaverickError::InvalidConfig(msg)) if msg.contains("ports of proxy")
        ));
    }

    #[tokio::test]
    async fn test_dynamic_entries_fill_undeclared_packages() {
        let models = PackageInfo::new("@acme/models", "packages/models", Language::Typescript, PackageKind::Package);
        let api = PackageInfo::new("@acme/api", "services/api", Language::Typescript, PackageKind::Service)
            .depends_on(&["@acme/models"], &[]);
        let scripts = PackageInfo::new("scripts", "tools/scripts", Language::Javascript, PackageKind::Unknown);

        let mut builder = builder("networks: [shared]\n", vec![models, api, scripts]);
        let definition = builder.definition().await.unwrap().clone();

        assert_eq!(
            definition.services.keys().collect::<Vec<_>>(),
            vec!["acme_api", "acme_models"]
        );
        assert_eq!(
            definition.services["acme_api"].depends_on,
            Some(StringList::of(&["acme_models"]))
        );
        assert_eq!(
            definition.services["acme_api"].networks,
            Some(StringList::of(&["shared"]))
        );
        assert!(definition.networks.contains_key("shared"));

        let categories = builder.categories().await.unwrap();
        assert_eq!(categories.get(Category::Packages), ["acme_models".to_string()]);
        assert_eq!(categories.get(Category::Services), ["acme_api".to_string()]);
        assert_eq!(categories.category_of("scripts"), None);
    }

    #[tokio::test]
    async fn test_assembly_is_idempotent() {
        let yaml = r#"
images:
  base:
    build: ./docker/base
infrastructure:
  queue:
    image: "{{ image(redis) }}"
redis:
batch:
  seed:
    image: seed
    depends_on: [queue]
"#;
        let api = PackageInfo::new("@acme/api", "services/api", Language::Javascript, PackageKind::Service);

        let first = builder(yaml, vec![api.clone()]).definition().await.unwrap().clone();
        let second = builder(yaml, vec![api]).definition().await.unwrap().clone();

        assert_eq!(
            serde_yaml::to_string(&first).unwrap(),
            serde_yaml::to_string(&second).unwrap()
        );
        assert_eq!(first.services["queue"].image.as_deref(), Some("redis:3"));
    }

    #[tokio::test]
    async fn test_definition_is_memoized() {
        let mut builder = builder("mysql:\n", Vec::new());
        let first = builder.definition().await.unwrap().clone();
        let second = builder.definition().await.unwrap().clone();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_declared_safe_name_collision() {
        let scoped = PackageInfo::new("@acme/api", "services/api", Language::Javascript, PackageKind::Service);
        let plain = PackageInfo::new("acme/api", "legacy/api", Language::Javascript, PackageKind::Service);
        let mut builder = builder(
            r#"
services:
  "@acme/api": {}
  "acme/api": {}
"#,
            vec![scoped, plain],
        );

        assert!(matches!(
            builder.definition().await,
            Err(MaverickError::DuplicateName(name)) if name == "acme_api"
        ));
    }

    #[tokio::test]
    async fn test_discovered_safe_name_collision() {
        let scoped = PackageInfo::new("@acme/api", "services/api", Language::Javascript, PackageKind::Service);
        let plain = PackageInfo::new("acme/api", "legacy/api", Language::Javascript, PackageKind::Service);
        let mut builder = builder("name: shop\n", vec![scoped, plain]);

        assert!(matches!(
            builder.definition().await,
            Err(MaverickError::DuplicateName(_))
        ));
    }

    #[tokio::test]
    async fn test_undeclared_project_has_no_services() {
        let project = ProjectConfig::from_yaml("services:\n  web:\n    image: node:14\n").unwrap();
        let mut builder = ComposeBuilder::new(
            project,
            ProjectConfig::internal(),
            Arc::new(VoidParser::new(PathBuf::from("/repo"))),
        );
        let definition = builder.definition().await.unwrap();
        assert!(definition.services.is_empty());
        assert_eq!(definition.version, "3.7");
    }
}
