use chrono::Utc;
use serde_json::json;
use tracing::info;

use vault_assume_role_schema::token::AuthToken;

use crate::config::Config;
use crate::http::{parse_json, string_list, whole_seconds, HttpClient, RequestError};
use crate::login::LoginCredentials;

#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum AuthError {
    #[error("could not reach vault: {0}")]
    FetchError(String),
    #[error("vault rejected the login: {0}")]
    VaultPostNot200(String),
    #[error("vault returned an unexpected login response: {0}")]
    InvalidBody(String),
}

impl From<RequestError> for AuthError {
    fn from(e: RequestError) -> Self {
        match e {
            RequestError::Status { body, .. } => AuthError::VaultPostNot200(body),
            RequestError::InvalidBody(body) => AuthError::InvalidBody(body),
            e @ (RequestError::Fetch(_) | RequestError::BaseUrl(_)) => {
                AuthError::FetchError(e.to_string())
            }
        }
    }
}

/// Exchanges LDAP credentials for a Vault token.
pub struct Authenticator {
    config: Config,
    client: HttpClient,
}

impl Authenticator {
    pub fn new(config: Config, client: HttpClient) -> Authenticator {
        Authenticator { config, client }
    }

    pub async fn login(&self, credentials: &LoginCredentials) -> Result<AuthToken, AuthError> {
        let url = self.config.vault_endpoint_segments(&[
            "v1",
            "auth",
            "ldap",
            "login",
            credentials.username(),
        ])?;
        let body = self
            .client
            .post_json(url, &json!({ "password": credentials.password() }))
            .await?;

        let token = token_from_login_response(&body)?;
        info!(
            "logged in as {}, token expires in {} minutes",
            credentials.username(),
            token.minutes_remaining(Utc::now())
        );
        Ok(token)
    }
}

fn token_from_login_response(body: &str) -> Result<AuthToken, AuthError> {
    let response = parse_json(body)?;
    let auth = &response["auth"];

    match (
        auth["client_token"].as_str(),
        whole_seconds(&auth["lease_duration"]),
        string_list(&auth["policies"]),
    ) {
        (Some(token), Some(lease_duration), Some(policies)) => Ok(AuthToken::leased_from(
            token,
            Utc::now(),
            lease_duration,
            policies,
        )),
        _ => Err(AuthError::InvalidBody(response.to_string())),
    }
}
