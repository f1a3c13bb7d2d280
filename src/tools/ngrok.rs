//! Tunnel credentials

use crate::error::{MaverickError, Result};
use std::path::{Path, PathBuf};

/// Credentials file written at the project root
pub const CREDENTIALS_FILE: &str = ".maverick";

/// Store the tunnel subdomain and auth token for the ngrok builtin
pub async fn write_credentials(root: &Path, subdomain: &str, token: &str) -> Result<PathBuf> {
    if subdomain.is_empty() || token.is_empty() {
        return Err(MaverickError::InvalidArguments(
            "ngrok needs a subdomain and an auth token".to_string(),
        ));
    }

    let path = root.join(CREDENTIALS_FILE);
    let content = format!("NGROK_SUBDOMAIN={}\nNGROK_AUTH={}", subdomain, token);
    tokio::fs::write(&path, content).await?;
    tracing::debug!("Wrote ngrok credentials to {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_write_credentials() {
        let temp = tempdir().unwrap();
        let path = write_credentials(temp.path(), "shop-dev", "s3cr3t").await.unwrap();
        assert_eq!(
            std::fs::read_to_string(path).unwrap(),
            "NGROK_SUBDOMAIN=shop-dev\nNGROK_AUTH=s3cr3t"
        );
    }

    #[tokio::test]
    async fn test_empty_arguments() {
        let temp = tempdir().unwrap();
        let result = write_credentials(temp.path(), "", "token").await;
        assert!(matches!(result, Err(MaverickError::InvalidArguments(_))));
    }
}
