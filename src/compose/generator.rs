//! Manifest rendering and persistence

use super::config::ComposeDefinition;
use crate::error::Result;
use std::path::{Path, PathBuf};

/// File name of the persisted manifest
pub const MANIFEST_FILE: &str = "docker-compose.yml";

const RAMFS: &str = "/dev/shm";
const APP_DIR: &str = "maverick";

/// Render a definition as compose YAML
pub fn render(definition: &ComposeDefinition) -> Result<String> {
    Ok(serde_yaml::to_string(definition)?)
}

/// Directory the manifest of `project` is written to: memory backed when
/// available, else the user cache, else the system temp dir.
pub fn manifest_dir(project: &str) -> PathBuf {
    let base = if Path::new(RAMFS).is_dir() {
        PathBuf::from(RAMFS)
    } else {
        dirs::cache_dir().unwrap_or_else(std::env::temp_dir)
    };
    base.join(APP_DIR).join(project)
}

/// Renders the manifest once and writes it next to the other runtime state
#[derive(Debug)]
pub struct ManifestGenerator {
    dir: PathBuf,
    buffer: Option<Vec<u8>>,
}

impl ManifestGenerator {
    /// Generator writing into `dir`
    pub fn new(dir: PathBuf) -> Self {
        Self { dir, buffer: None }
    }

    /// Generator writing into the default directory of a project
    pub fn for_project(project: &str) -> Self {
        Self::new(manifest_dir(project))
    }

    /// Path the manifest is written to
    pub fn path(&self) -> PathBuf {
        self.dir.join(MANIFEST_FILE)
    }

    /// Manifest bytes, rendered on first call
    pub fn buffer(&mut self, definition: &ComposeDefinition) -> Result<&[u8]> {
        let buffer = match self.buffer.take() {
            Some(buffer) => buffer,
            None => {
                let yaml = render(definition)?;
                tracing::trace!("Generated compose manifest:\n{}", yaml);
                yaml.into_bytes()
            }
        };
        Ok(self.buffer.insert(buffer).as_slice())
    }

    /// Write the manifest to disk
    pub async fn write(&mut self, definition: &ComposeDefinition) -> Result<PathBuf> {
        let path = self.path();
        tokio::fs::create_dir_all(&self.dir).await?;
        let buffer = self.buffer(definition)?;
        tokio::fs::write(&path, buffer).await?;
        tracing::debug!("Wrote {}", path.display());
        Ok(path)
    }
}
