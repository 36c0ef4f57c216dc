use std::env;
use std::path::PathBuf;
use std::time::Duration;

use reqwest::Url;

use crate::http::RequestError;

pub mod defaults {
    pub const MOUNT_PREFIX: &str = "aws/";
    pub const TIMEOUT_SECONDS: u64 = 10;
    pub const FEDERATION_ENDPOINT: &str = "https://signin.aws.amazon.com/federation";
    pub const SESSION_DURATION_SECONDS: u32 = 28800;
    pub const TOKEN_EXPIRY_MARGIN_MINUTES: i64 = 5;
    pub const TOKEN_CACHE_DIR: &str = ".vault-assume-role";
    pub const TOKEN_CACHE_FILE: &str = "token.json";
    pub const MAX_CONCURRENT_CHECKS: usize = 8;
}

/// Settings shared by every stage of the credential pipeline.
#[derive(Debug, Clone)]
pub struct Config {
    pub vault_url: Url,
    pub mount_prefix: String,
    pub timeout: Duration,
    pub federation_endpoint: Url,
    pub session_duration_seconds: u32,
}

impl Config {
    pub fn new(vault_url: Url) -> Result<Config, RequestError> {
        if vault_url.cannot_be_a_base() || !matches!(vault_url.scheme(), "http" | "https") {
            return Err(RequestError::BaseUrl(vault_url.to_string()));
        }

        let federation_endpoint = defaults::FEDERATION_ENDPOINT
            .parse::<Url>()
            .map_err(|_| RequestError::BaseUrl(defaults::FEDERATION_ENDPOINT.to_string()))?;

        Ok(Config {
            vault_url,
            mount_prefix: defaults::MOUNT_PREFIX.to_string(),
            timeout: Duration::from_secs(defaults::TIMEOUT_SECONDS),
            federation_endpoint,
            session_duration_seconds: defaults::SESSION_DURATION_SECONDS,
        })
    }

    pub fn with_mount_prefix<S: Into<String>>(mut self, mount_prefix: S) -> Config {
        self.mount_prefix = mount_prefix.into();
        self
    }

    pub fn with_federation_endpoint(mut self, federation_endpoint: Url) -> Config {
        self.federation_endpoint = federation_endpoint;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Config {
        self.timeout = timeout;
        self
    }

    /// Resolves a `/`-separated path against the vault URL, escaping each segment.
    pub fn vault_endpoint(&self, path: &str) -> Result<Url, RequestError> {
        let segments = path.split('/').filter(|s| !s.is_empty()).collect::<Vec<_>>();
        self.vault_endpoint_segments(&segments)
    }

    /// Like `vault_endpoint`, but each item stays one segment; a `/` inside
    /// one is sent as `%2F`.
    pub fn vault_endpoint_segments(&self, segments: &[&str]) -> Result<Url, RequestError> {
        let mut url = self.vault_url.clone();
        url.set_query(None);
        url.set_fragment(None);
        url.path_segments_mut()
            .map_err(|_| RequestError::BaseUrl(self.vault_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

pub fn token_cache_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| {
        home.join(defaults::TOKEN_CACHE_DIR)
            .join(defaults::TOKEN_CACHE_FILE)
    })
}

/// Respects AWS_SHARED_CREDENTIALS_FILE the same way the AWS CLI does.
pub fn aws_credentials_path() -> Option<PathBuf> {
    if let Ok(path) = env::var("AWS_SHARED_CREDENTIALS_FILE") {
        return Some(PathBuf::from(path));
    }

    dirs::home_dir().map(|home| home.join(".aws").join("credentials"))
}
