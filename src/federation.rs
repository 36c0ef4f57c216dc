use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::debug;

use vault_assume_role_schema::credentials::Credentials;

use crate::config::Config;
use crate::http::{HttpClient, RequestError};

#[derive(Serialize)]
struct FederatedSession<'a> {
    #[serde(rename = "sessionId")]
    id: &'a str,

    #[serde(rename = "sessionKey")]
    key: &'a str,

    #[serde(rename = "sessionToken")]
    token: &'a str,
}

impl<'a> From<&'a Credentials> for FederatedSession<'a> {
    fn from(credentials: &'a Credentials) -> Self {
        FederatedSession {
            id: credentials.key(),
            key: credentials.secret(),
            token: credentials.token(),
        }
    }
}

/// Single-use token accepted by the federation endpoint's `login` action.
#[derive(Debug, Clone, Eq, PartialEq, Deserialize)]
pub struct SigninToken(String);

impl SigninToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Deserialize)]
struct FederatedResponse {
    #[serde(rename = "SigninToken")]
    signin_token: SigninToken,
}

pub struct FederationClient {
    config: Config,
    client: HttpClient,
}

impl FederationClient {
    pub fn new(config: Config, client: HttpClient) -> FederationClient {
        FederationClient { config, client }
    }

    pub async fn signin_token(&self, credentials: &Credentials) -> Result<SigninToken, RequestError> {
        let session = serde_json::to_string(&FederatedSession::from(credentials))
            .map_err(|e| RequestError::InvalidBody(e.to_string()))?;
        let query = [
            ("Action", "getSigninToken".to_string()),
            (
                "SessionDuration",
                self.config.session_duration_seconds.to_string(),
            ),
            ("SessionType", "json".to_string()),
            ("Session", session),
        ];

        let body = self
            .client
            .get_with_query(self.config.federation_endpoint.clone(), &query)
            .await?;
        let response = serde_json::from_str::<FederatedResponse>(&body)
            .map_err(|_| RequestError::InvalidBody(body.clone()))?;

        debug!("obtained a sign-in token");
        Ok(response.signin_token)
    }

    pub fn signin_url(&self, signin_token: &SigninToken, issuer: &str, region: &str) -> Url {
        let destination = format!("https://{}.console.aws.amazon.com/", region);

        let mut url = self.config.federation_endpoint.clone();
        url.query_pairs_mut()
            .clear()
            .append_pair("Action", "login")
            .append_pair("Issuer", issuer)
            .append_pair("Destination", &destination)
            .append_pair("SigninToken", signin_token.as_str());
        url
    }
}
