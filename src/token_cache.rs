use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use tokio::fs;
use tracing::debug;

use vault_assume_role_schema::token::AuthToken;

use crate::config::defaults;

#[async_trait]
pub trait TokenCache {
    /// Returns the cached token only if it is well formed and still valid.
    async fn load(&self) -> Option<AuthToken>;

    async fn save(&self, token: &AuthToken) -> anyhow::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileTokenCache {
    path: PathBuf,
    margin: Duration,
}

impl FileTokenCache {
    pub fn new<P: AsRef<Path>>(path: P) -> FileTokenCache {
        FileTokenCache {
            path: path.as_ref().to_path_buf(),
            margin: Duration::minutes(defaults::TOKEN_EXPIRY_MARGIN_MINUTES),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl TokenCache for FileTokenCache {
    async fn load(&self) -> Option<AuthToken> {
        let json = match fs::read_to_string(&self.path).await {
            Ok(json) => json,
            Err(e) => {
                debug!("no cached token at {}: {}", self.path.display(), e);
                return None;
            }
        };

        let token = match serde_json::from_str::<AuthToken>(&json) {
            Ok(token) => token,
            Err(e) => {
                debug!("discarding malformed token cache: {}", e);
                return None;
            }
        };

        if token.is_valid_at(Utc::now(), self.margin) {
            Some(token)
        } else {
            debug!("cached token is expired or about to expire");
            None
        }
    }

    async fn save(&self, token: &AuthToken) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let json = serde_json::to_string(token)?;
        fs::write(&self.path, json)
            .await
            .with_context(|| format!("Failed to write token cache: {}", self.path.display()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600)).await?;
        }

        Ok(())
    }
}

/// Used when there is no home directory to keep a cache in.
pub struct NoTokenCache;

#[async_trait]
impl TokenCache for NoTokenCache {
    async fn load(&self) -> Option<AuthToken> {
        None
    }

    async fn save(&self, _token: &AuthToken) -> anyhow::Result<()> {
        Ok(())
    }
}
