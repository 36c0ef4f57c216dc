use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A Vault client token together with its expiration and granted policies.
///
/// This is also the on-disk format of the token cache, so the field names
/// must stay stable.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct AuthToken {
    pub token: String,
    /// Milliseconds since the Unix epoch.
    pub expiration: i64,
    pub policies: Vec<String>,
}

impl AuthToken {
    pub fn new<S: Into<String>>(token: S, expiration: i64, policies: Vec<String>) -> AuthToken {
        AuthToken {
            token: token.into(),
            expiration,
            policies,
        }
    }

    /// Builds a token whose lease starts at `issued_at`.
    pub fn leased_from<S: Into<String>>(
        token: S,
        issued_at: DateTime<Utc>,
        lease_duration_seconds: i64,
        policies: Vec<String>,
    ) -> AuthToken {
        let expiration = issued_at
            .timestamp_millis()
            .saturating_add(lease_duration_seconds.saturating_mul(1000));
        AuthToken::new(token, expiration, policies)
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn policies(&self) -> &[String] {
        &self.policies
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.expiration)
    }

    /// True while the token outlives `now + margin`.
    pub fn is_valid_at(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        self.expiration >= (now + margin).timestamp_millis()
    }

    pub fn minutes_remaining(&self, now: DateTime<Utc>) -> i64 {
        (self.expiration - now.timestamp_millis()) / 60_000
    }
}
