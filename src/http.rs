use std::time::Duration;

use reqwest::{RequestBuilder, StatusCode, Url};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("request failed: {0}")]
    Fetch(#[from] reqwest::Error),
    #[error("unexpected status {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("unexpected response body: {0}")]
    InvalidBody(String),
    #[error("{0} cannot be used as a base url")]
    BaseUrl(String),
}

/// The only network primitive of the crate. Every request it sends is bounded
/// by the configured timeout, and any non-2xx status is turned into an error
/// carrying the response body.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
}

impl HttpClient {
    pub fn new(timeout: Duration) -> Result<HttpClient, RequestError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(HttpClient { client })
    }

    pub async fn get(&self, url: Url, token: Option<&str>) -> Result<String, RequestError> {
        let mut request = self.client.get(url);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        self.send(request).await
    }

    /// Vault's `LIST` verb, sent as `GET ?list=true`.
    pub async fn list(&self, url: Url, token: &str) -> Result<String, RequestError> {
        let request = self
            .client
            .get(url)
            .query(&[("list", "true")])
            .bearer_auth(token);
        self.send(request).await
    }

    pub async fn get_with_query(
        &self,
        url: Url,
        query: &[(&str, String)],
    ) -> Result<String, RequestError> {
        self.send(self.client.get(url).query(query)).await
    }

    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        url: Url,
        body: &T,
    ) -> Result<String, RequestError> {
        self.send(self.client.post(url).json(body)).await
    }

    async fn send(&self, request: RequestBuilder) -> Result<String, RequestError> {
        let response = request.send().await?;
        let status = response.status();
        debug!("{} {}", status, response.url().path());

        let body = response.text().await?;
        if status.is_success() {
            Ok(body)
        } else {
            Err(RequestError::Status { status, body })
        }
    }
}

pub fn parse_json(body: &str) -> Result<Value, RequestError> {
    serde_json::from_str(body).map_err(|_| RequestError::InvalidBody(body.to_string()))
}

/// Returns `None` unless `value` is an array made only of strings.
pub fn string_list(value: &Value) -> Option<Vec<String>> {
    value
        .as_array()?
        .iter()
        .map(|v| v.as_str().map(|s| s.to_string()))
        .collect()
}

/// A JSON number as whole seconds. Fractions are truncated; non-finite or
/// out-of-range values give `None`.
pub fn whole_seconds(value: &Value) -> Option<i64> {
    if let Some(seconds) = value.as_i64() {
        return Some(seconds);
    }
    let seconds = value.as_f64()?.trunc();
    if seconds.is_finite() && seconds >= i64::MIN as f64 && seconds < i64::MAX as f64 {
        Some(seconds as i64)
    } else {
        None
    }
}
