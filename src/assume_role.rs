use chrono::Utc;
use serde_json::Value;
use tracing::{debug, info};

use vault_assume_role_schema::credentials::{AccountCredentials, Credentials};
use vault_assume_role_schema::token::AuthToken;

use crate::config::Config;
use crate::http::{parse_json, whole_seconds, HttpClient, RequestError};

/// Issues temporary AWS credentials through `aws/<account>/sts/<role>`.
pub struct RoleAssumer {
    config: Config,
    client: HttpClient,
}

impl RoleAssumer {
    pub fn new(config: Config, client: HttpClient) -> RoleAssumer {
        RoleAssumer { config, client }
    }

    pub async fn assume_role(
        &self,
        token: &AuthToken,
        account: &str,
        role: &str,
    ) -> Result<AccountCredentials, RequestError> {
        let url = self
            .config
            .vault_endpoint_segments(&["v1", "aws", account, "sts", role])?;
        debug!("assuming role {} in account {}", role, account);

        let body = self.client.get(url, Some(token.token())).await?;
        let credentials = credentials_from_sts_response(&body)?;
        info!(
            "assumed role {} in account {}, credentials expire at {}",
            role,
            account,
            credentials.expiry()
        );

        Ok(AccountCredentials {
            account: account.to_string(),
            role: role.to_string(),
            credentials,
        })
    }
}

fn credentials_from_sts_response(body: &str) -> Result<Credentials, RequestError> {
    fn field<'a>(value: &'a Value, name: &str, body: &str) -> Result<&'a str, RequestError> {
        value[name].as_str().ok_or_else(|| {
            RequestError::InvalidBody(format!("missing string data.{}: {}", name, body))
        })
    }

    let response = parse_json(body)?;
    let data = &response["data"];

    let access_key = field(data, "access_key", body)?;
    let secret_key = field(data, "secret_key", body)?;
    // Vault calls the session token `security_token`.
    let session_token = field(data, "security_token", body)?;
    let lease_duration = whole_seconds(&response["lease_duration"])
        .ok_or_else(|| RequestError::InvalidBody(format!("missing number lease_duration: {}", body)))?;

    Credentials::issued_at(
        Utc::now(),
        access_key.to_string(),
        secret_key.to_string(),
        session_token.to_string(),
        lease_duration,
    )
    .ok_or_else(|| RequestError::InvalidBody(format!("lease_duration out of range: {}", body)))
}
