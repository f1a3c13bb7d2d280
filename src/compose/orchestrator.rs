//! Compose orchestrator
//!
//! Every lifecycle operation makes sure the manifest is rendered, runs its
//! batches through the runtime driver and then persists the manifest.

use super::builder::ComposeBuilder;
use super::config::Category;
use super::driver::RuntimeDriver;
use super::generator::ManifestGenerator;
use super::phase::{plan, Phase, PhaseOptions};
use crate::error::Result;
use crate::project::safe_name;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Pause between batches so the runtime can settle
pub const SETTLE_DELAY: Duration = Duration::from_secs(1);

/// A unit as shown by `list`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitSummary {
    pub name: String,
    /// `None` for units no phase acts on
    pub category: Option<Category>,
    pub image: Option<String>,
}

/// Compose orchestrator
pub struct ComposeOrchestrator {
    builder: ComposeBuilder,
    generator: ManifestGenerator,
    driver: Arc<dyn RuntimeDriver>,
    settle: Duration,
}

impl ComposeOrchestrator {
    /// Create a new orchestrator
    pub fn new(builder: ComposeBuilder, generator: ManifestGenerator, driver: Arc<dyn RuntimeDriver>) -> Self {
        Self {
            builder,
            generator,
            driver,
            settle: SETTLE_DELAY,
        }
    }

    /// Change the pause between batches
    pub fn with_settle_delay(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    /// Start units in phase order. Targets bring their dependency closure.
    pub async fn up(&mut self, targets: &[String]) -> Result<()> {
        self.ensure_manifest().await?;

        let phase = self.phase(&PhaseOptions::default(), targets, true).await?;
        log_phases("Spinning up Maverick", phase.len());

        let commands = with_prefix(&["up", "-d", "--no-recreate"], phase);
        self.run(commands, self.settle).await?;

        self.persist_manifest().await.map(|_| ())
    }

    /// Tear everything down, or stop the targets and their closure
    pub async fn down(&mut self, targets: &[String]) -> Result<()> {
        self.ensure_manifest().await?;

        let commands = if targets.is_empty() {
            vec![vec!["down".to_string()]]
        } else {
            let phase = self.phase(&PhaseOptions::default(), targets, true).await?;
            with_prefix(&["stop"], phase)
        };
        log_phases("Spinning down Maverick", commands.len());

        self.run(commands, Duration::ZERO).await?;
        self.persist_manifest().await.map(|_| ())
    }

    /// Restart exactly the targets, or everything
    pub async fn restart(&mut self, targets: &[String]) -> Result<()> {
        self.ensure_manifest().await?;

        let phase = self.phase(&PhaseOptions::default(), targets, false).await?;
        log_phases("Restarting with Maverick", phase.len());

        self.run(with_prefix(&["restart"], phase), self.settle).await?;
        self.persist_manifest().await.map(|_| ())
    }

    /// Down then up
    pub async fn reload(&mut self, targets: &[String]) -> Result<()> {
        self.down(targets).await?;
        self.up(targets).await
    }

    /// Build exactly the targets, or every unit including image-only ones
    pub async fn build(&mut self, targets: &[String]) -> Result<()> {
        self.ensure_manifest().await?;

        let phase = self.phase(&PhaseOptions::with_images(), targets, false).await?;
        log_phases("Building with Maverick", phase.len());

        self.run(with_prefix(&["build"], phase), self.settle).await?;
        self.persist_manifest().await.map(|_| ())
    }

    /// Show runtime status
    pub async fn ps(&mut self) -> Result<()> {
        self.ensure_manifest().await?;
        self.run(vec![vec!["ps".to_string()]], Duration::ZERO).await?;
        self.persist_manifest().await.map(|_| ())
    }

    /// Write the manifest without touching the runtime
    pub async fn generate(&mut self) -> Result<PathBuf> {
        self.ensure_manifest().await?;
        self.persist_manifest().await
    }

    /// Units whose name contains `filter`, with their category
    pub async fn list(&mut self, filter: Option<&str>) -> Result<Vec<UnitSummary>> {
        let definition = self.builder.definition().await?.clone();
        let categories = self.builder.categories().await?;

        Ok(definition
            .services
            .iter()
            .filter(|(name, _)| filter.map_or(true, |f| name.contains(f)))
            .map(|(name, service)| UnitSummary {
                name: name.clone(),
                category: categories.category_of(name),
                image: service.image.clone(),
            })
            .collect())
    }

    async fn ensure_manifest(&mut self) -> Result<()> {
        let definition = self.builder.definition().await?;
        self.generator.buffer(definition)?;
        Ok(())
    }

    async fn persist_manifest(&mut self) -> Result<PathBuf> {
        let definition = self.builder.definition().await?;
        self.generator.write(definition).await
    }

    async fn phase(&mut self, options: &PhaseOptions, targets: &[String], with_dependencies: bool) -> Result<Phase> {
        let targets: Vec<String> = targets.iter().map(|t| safe_name(t)).collect();

        let definition = self.builder.definition().await?.clone();
        for target in &targets {
            if !definition.services.contains_key(target) {
                tracing::warn!("Unknown unit {} will be ignored", target);
            }
        }

        let categories = self.builder.categories().await?;
        Ok(plan(categories, &definition.services, options, &targets, with_dependencies))
    }

    /// One driver call per command, fail fast, pausing between calls
    async fn run(&mut self, commands: Vec<Vec<String>>, settle: Duration) -> Result<()> {
        let definition = self.builder.definition().await?;
        let manifest = self.generator.buffer(definition)?.to_vec();

        for (i, args) in commands.iter().enumerate() {
            if i > 0 && !settle.is_zero() {
                tokio::time::sleep(settle).await;
            }
            self.driver.invoke(args, &manifest).await?;
        }
        Ok(())
    }
}

fn with_prefix(prefix: &[&str], phase: Phase) -> Vec<Vec<String>> {
    phase
        .into_iter()
        .map(|batch| prefix.iter().map(|p| p.to_string()).chain(batch).collect())
        .collect()
}

fn log_phases(intro: &str, count: usize) {
    let plural = if count == 1 { "" } else { "s" };
    tracing::info!("{} in {} phase{}", intro, count, plural);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::project::ProjectConfig;
    use crate::error::MaverickError;
    use crate::project::{Language, PackageInfo, PackageKind, ProjectInfo, StaticParser};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::{tempdir, TempDir};

    /// Records every call, failing the `fail_at`-th one
    #[derive(Default)]
    struct RecordingDriver {
        calls: Mutex<Vec<Vec<String>>>,
        manifests: Mutex<Vec<String>>,
        fail_at: Option<usize>,
    }

    impl RecordingDriver {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().iter().map(|c| c.join(" ")).collect()
        }
    }

    #[async_trait]
    impl RuntimeDriver for RecordingDriver {
        async fn invoke(&self, args: &[String], manifest: &[u8]) -> Result<()> {
            let mut calls = self.calls.lock().unwrap();
            calls.push(args.to_vec());
            self.manifests
                .lock()
                .unwrap()
                .push(String::from_utf8_lossy(manifest).into_owned());
            if self.fail_at == Some(calls.len() - 1) {
                return Err(MaverickError::CommandFailed {
                    command: args.join(" "),
                    code: Some(1),
                });
            }
            Ok(())
        }
    }

    const CONFIG: &str = r#"
images:
  base:
    build: ./docker/base
mysql:
"#;

    fn orchestrator(driver: Arc<RecordingDriver>) -> (ComposeOrchestrator, TempDir) {
        let models = PackageInfo::new("@acme/models", "packages/models", Language::Typescript, PackageKind::Package);
        let api = PackageInfo::new("@acme/api", "services/api", Language::Typescript, PackageKind::Service)
            .depends_on(&["@acme/models"], &[]);
        let web = PackageInfo::new("@acme/web", "services/web", Language::Typescript, PackageKind::Service);
        let info = ProjectInfo::from_packages(PathBuf::from("/repo"), [models, api, web]);

        let builder = ComposeBuilder::new(
            ProjectConfig::from_yaml(CONFIG).unwrap(),
            ProjectConfig::internal(),
            Arc::new(StaticParser(info)),
        );
        let temp = tempdir().unwrap();
        let generator = ManifestGenerator::new(temp.path().to_path_buf());
        let orchestrator = ComposeOrchestrator::new(builder, generator, driver).with_settle_delay(Duration::ZERO);
        (orchestrator, temp)
    }

    fn targets(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_up_runs_categories_in_order() {
        let driver = Arc::new(RecordingDriver::default());
        let (mut orchestrator, temp) = orchestrator(driver.clone());

        orchestrator.up(&[]).await.unwrap();

        assert_eq!(
            driver.calls(),
            vec![
                "up -d --no-recreate mysql",
                "up -d --no-recreate acme_models",
                "up -d --no-recreate acme_api acme_web",
            ]
        );
        assert!(temp.path().join("docker-compose.yml").exists());
        assert!(driver.manifests.lock().unwrap()[0].contains("mysql:5.7"));
    }

    #[tokio::test]
    async fn test_up_with_target_includes_dependencies() {
        let driver = Arc::new(RecordingDriver::default());
        let (mut orchestrator, _temp) = orchestrator(driver.clone());

        orchestrator.up(&targets(&["@acme/api"])).await.unwrap();

        assert_eq!(
            driver.calls(),
            vec!["up -d --no-recreate acme_models", "up -d --no-recreate acme_api"]
        );
    }

    #[tokio::test]
    async fn test_down() {
        let driver = Arc::new(RecordingDriver::default());
        let (mut orchestrator, _temp) = orchestrator(driver.clone());

        orchestrator.down(&[]).await.unwrap();
        orchestrator.down(&targets(&["acme_models"])).await.unwrap();

        assert_eq!(
            driver.calls(),
            vec!["down", "stop acme_models", "stop acme_api"]
        );
    }

    #[tokio::test]
    async fn test_restart_and_build_act_on_exact_targets() {
        let driver = Arc::new(RecordingDriver::default());
        let (mut orchestrator, _temp) = orchestrator(driver.clone());

        orchestrator.restart(&targets(&["acme_api"])).await.unwrap();
        orchestrator.build(&[]).await.unwrap();

        assert_eq!(
            driver.calls(),
            vec![
                "restart acme_api",
                "build base",
                "build mysql",
                "build acme_models",
                "build acme_api acme_web",
            ]
        );
    }

    #[tokio::test]
    async fn test_reload() {
        let driver = Arc::new(RecordingDriver::default());
        let (mut orchestrator, _temp) = orchestrator(driver.clone());

        orchestrator.reload(&targets(&["acme_web"])).await.unwrap();

        assert_eq!(
            driver.calls(),
            vec!["stop acme_web", "up -d --no-recreate acme_web"]
        );
    }

    #[tokio::test]
    async fn test_failure_aborts_remaining_batches() {
        let driver = Arc::new(RecordingDriver {
            fail_at: Some(1),
            ..Default::default()
        });
        let (mut orchestrator, temp) = orchestrator(driver.clone());

        let result = orchestrator.up(&[]).await;
        assert!(matches!(result, Err(MaverickError::CommandFailed { .. })));
        assert_eq!(driver.calls().len(), 2);
        assert!(!temp.path().join("docker-compose.yml").exists());
    }

    #[tokio::test]
    async fn test_ps_and_generate() {
        let driver = Arc::new(RecordingDriver::default());
        let (mut orchestrator, temp) = orchestrator(driver.clone());

        orchestrator.ps().await.unwrap();
        let path = orchestrator.generate().await.unwrap();

        assert_eq!(driver.calls(), vec!["ps"]);
        assert_eq!(path, temp.path().join("docker-compose.yml"));
        let written = std::fs::read_to_string(path).unwrap();
        assert_eq!(written, driver.manifests.lock().unwrap()[0]);
    }

    #[tokio::test]
    async fn test_list() {
        let driver = Arc::new(RecordingDriver::default());
        let (mut orchestrator, _temp) = orchestrator(driver);

        let units = orchestrator.list(None).await.unwrap();
        assert_eq!(units.len(), 5);

        let acme = orchestrator.list(Some("acme_a")).await.unwrap();
        assert_eq!(
            acme,
            vec![UnitSummary {
                name: "acme_api".to_string(),
                category: Some(Category::Services),
                image: Some("acme_api:0".to_string()),
            }]
        );

        let base = orchestrator.list(Some("base")).await.unwrap();
        assert_eq!(base[0].category, Some(Category::Images));
    }
}
