//! `maverick setup`: clone the project's setup repository next to it

use crate::error::{MaverickError, Result};
use crate::process::Runner;
use std::path::{Path, PathBuf};

const SUPPORTED_PLATFORMS: &[&str] = &["linux", "macos", "windows"];

/// Fail on operating systems setup has no commands for
pub fn check_platform(os: &str) -> Result<()> {
    if SUPPORTED_PLATFORMS.contains(&os) {
        Ok(())
    } else {
        Err(MaverickError::UnsupportedPlatform(os.to_string()))
    }
}

/// Directory name `git clone` creates for `url`
pub fn repository_dir(url: &str) -> Result<String> {
    let name = url
        .trim_end_matches('/')
        .rsplit(['/', ':'])
        .next()
        .unwrap_or_default()
        .trim_end_matches(".git");

    if name.is_empty() {
        return Err(MaverickError::Setup(format!("cannot derive a directory from {}", url)));
    }
    Ok(name.to_string())
}

/// Clone `url` into the parent of `root`. Refuses when the clone target exists.
pub async fn setup(root: &Path, url: &str, runner: &Runner) -> Result<PathBuf> {
    check_platform(std::env::consts::OS)?;

    let parent = root
        .parent()
        .ok_or_else(|| MaverickError::Setup(format!("{} has no parent directory", root.display())))?;
    let target = parent.join(repository_dir(url)?);
    if tokio::fs::try_exists(&target).await? {
        return Err(MaverickError::Setup(format!("{} already exists", target.display())));
    }

    tracing::info!("Cloning {} into {}", url, target.display());
    runner.exec_checked("git", &["clone", url], parent).await?;
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_repository_dir() {
        assert_eq!(repository_dir("https://example.com/team/setup.git").unwrap(), "setup");
        assert_eq!(repository_dir("git@example.com:team/setup.git").unwrap(), "setup");
        assert_eq!(repository_dir("https://example.com/team/setup/").unwrap(), "setup");
        assert!(repository_dir("").is_err());
    }

    #[test]
    fn test_platforms() {
        assert!(check_platform("linux").is_ok());
        assert!(check_platform("macos").is_ok());
        assert!(matches!(
            check_platform("freebsd"),
            Err(MaverickError::UnsupportedPlatform(_))
        ));
    }

    #[tokio::test]
    async fn test_existing_target_is_refused() {
        let temp = tempdir().unwrap();
        let root = temp.path().join("shop");
        std::fs::create_dir_all(&root).unwrap();
        std::fs::create_dir_all(temp.path().join("setup")).unwrap();

        let result = setup(&root, "https://example.com/team/setup.git", &Runner::new()).await;
        assert!(matches!(result, Err(MaverickError::Setup(_))));
    }
}
