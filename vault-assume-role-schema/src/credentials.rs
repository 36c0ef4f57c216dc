use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// Temporary AWS credentials issued by Vault's AWS secrets engine.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Credentials {
    pub access_key: String,
    pub secret_key: String,
    pub session_token: String,
    pub lease_duration_seconds: i64,
    pub expires_at: DateTime<Utc>,
}

impl Credentials {
    /// `None` when the lease pushes the expiry out of the representable range.
    pub fn issued_at(
        issued_at: DateTime<Utc>,
        access_key: String,
        secret_key: String,
        session_token: String,
        lease_duration_seconds: i64,
    ) -> Option<Credentials> {
        let expires_at =
            issued_at.checked_add_signed(TimeDelta::try_seconds(lease_duration_seconds)?)?;
        Some(Credentials {
            access_key,
            secret_key,
            session_token,
            lease_duration_seconds,
            expires_at,
        })
    }

    pub fn key(&self) -> &str {
        &self.access_key
    }

    pub fn secret(&self) -> &str {
        &self.secret_key
    }

    pub fn token(&self) -> &str {
        &self.session_token
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Expiry as `YYYY-MM-DDTHH:MM:SSZ`; fractional seconds are dropped.
    pub fn expiry(&self) -> String {
        self.expires_at.to_rfc3339_opts(SecondsFormat::Secs, true)
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct AccountCredentials {
    pub account: String,
    pub role: String,
    pub credentials: Credentials,
}

impl AccountCredentials {
    pub fn account(&self) -> &str {
        &self.account
    }

    pub fn role(&self) -> &str {
        &self.role
    }
}
