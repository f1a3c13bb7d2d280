//! `maverick init`

use super::template::starter_config;
use crate::config::CONFIG_FILE;
use crate::error::{MaverickError, Result};
use std::path::{Path, PathBuf};

/// Write a starter `maverick.yml` into `dir`. An existing file is kept.
pub async fn init(dir: &Path, name: Option<&str>) -> Result<PathBuf> {
    let path = dir.join(CONFIG_FILE);
    if tokio::fs::try_exists(&path).await? {
        return Err(MaverickError::ConfigExists(path));
    }

    let name = name
        .map(str::to_string)
        .or_else(|| dir.file_name().map(|n| n.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "my-project".to_string());

    tokio::fs::write(&path, starter_config(&name)).await?;
    tracing::info!("Wrote {}", path.display());
    Ok(path)
}
