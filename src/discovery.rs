use std::collections::BTreeSet;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use vault_assume_role_schema::token::AuthToken;

use crate::config::{defaults, Config};
use crate::http::{parse_json, string_list, HttpClient, RequestError};
use crate::select::SelectItem;

/// Finds the AWS secrets-engine mounts and roles a Vault token may use.
pub struct Discovery {
    config: Config,
    client: HttpClient,
}

/// `aws/prod/` -> `prod`
pub fn account_id(mount: &str) -> Option<&str> {
    let mount = mount.strip_suffix('/').unwrap_or(mount);
    mount.rsplit('/').next().filter(|s| !s.is_empty())
}

impl Discovery {
    pub fn new(config: Config, client: HttpClient) -> Discovery {
        Discovery { config, client }
    }

    /// Mount paths whose name starts with the configured prefix.
    pub async fn candidate_mounts(&self, token: &AuthToken) -> Result<Vec<String>, RequestError> {
        let url = self.config.vault_endpoint("v1/sys/mounts")?;
        let body = self.client.get(url, Some(token.token())).await?;
        let mounts = parse_json(&body)?;
        let mounts = mounts
            .as_object()
            .ok_or_else(|| RequestError::InvalidBody(body.clone()))?;

        Ok(mounts
            .keys()
            .filter(|name| name.starts_with(&self.config.mount_prefix))
            .cloned()
            .collect())
    }

    /// Listing a mount's roles stands in for a capability check: if the token
    /// may list them it is assumed to be allowed to use the mount.
    pub async fn accessible_mounts(&self, token: &AuthToken, mounts: &[String]) -> Vec<String> {
        let permits = Arc::new(Semaphore::new(defaults::MAX_CONCURRENT_CHECKS));
        let mut checks = JoinSet::new();

        for (index, mount) in mounts.iter().enumerate() {
            let url = match self.config.vault_endpoint(&format!("v1/{}roles", mount)) {
                Ok(url) => url,
                Err(e) => {
                    warn!("skipping mount {}: {}", mount, e);
                    continue;
                }
            };
            let client = self.client.clone();
            let token = token.token().to_string();
            let permits = permits.clone();

            checks.spawn(async move {
                let _permit = permits.acquire_owned().await;
                (index, client.list(url, &token).await)
            });
        }

        let mut accessible = vec![false; mounts.len()];
        while let Some(joined) = checks.join_next().await {
            match joined {
                Ok((index, Ok(_))) => accessible[index] = true,
                Ok((index, Err(e))) => debug!("mount {} is not accessible: {}", mounts[index], e),
                Err(e) => warn!("accessibility check did not finish: {}", e),
            }
        }

        mounts
            .iter()
            .zip(accessible)
            .filter_map(|(mount, ok)| ok.then(|| mount.clone()))
            .collect()
    }

    /// Sorted, de-duplicated account identifiers the token can use.
    pub async fn accounts(&self, token: &AuthToken) -> Result<Vec<String>, RequestError> {
        let candidates = self.candidate_mounts(token).await?;
        debug!("candidate mounts: {:?}", candidates);

        let accounts = self
            .accessible_mounts(token, &candidates)
            .await
            .iter()
            .filter_map(|mount| account_id(mount).map(|s| s.to_string()))
            .collect::<BTreeSet<_>>();
        Ok(accounts.into_iter().collect())
    }

    /// Sorted role names of an account.
    pub async fn roles(&self, token: &AuthToken, account: &str) -> Result<Vec<String>, RequestError> {
        let url = self
            .config
            .vault_endpoint_segments(&["v1", "aws", account, "roles"])?;
        let body = self.client.list(url, token.token()).await?;
        let response = parse_json(&body)?;

        let mut roles = string_list(&response["data"]["keys"])
            .ok_or_else(|| RequestError::InvalidBody(body.clone()))?;
        roles.sort();
        Ok(roles)
    }
}

pub async fn choose_account<S: SelectItem>(
    discovery: &Discovery,
    token: &AuthToken,
    selector: &S,
) -> Option<String> {
    let accounts = match discovery.accounts(token).await {
        Ok(accounts) => accounts,
        Err(e) => {
            error!("failed to list accounts: {}", e);
            return None;
        }
    };

    if accounts.is_empty() {
        warn!("no accessible accounts found");
        return None;
    }

    match selector.select_item("account", &accounts) {
        Ok(account) => account,
        Err(e) => {
            error!("failed to select an account: {}", e);
            None
        }
    }
}

pub async fn choose_role<S: SelectItem>(
    discovery: &Discovery,
    token: &AuthToken,
    account: &str,
    selector: &S,
) -> Option<String> {
    let roles = match discovery.roles(token, account).await {
        Ok(roles) => roles,
        Err(RequestError::InvalidBody(body)) => {
            error!("unexpected role list for account {}: {}", account, body);
            return None;
        }
        Err(e) => {
            error!("failed to list roles for account {}: {}", account, e);
            return None;
        }
    };

    match roles.as_slice() {
        [] => {
            error!("no roles found for account {}", account);
            None
        }
        [role] => match selector.preselected() {
            Some(wanted) if wanted != role.as_str() => {
                error!(
                    "role \"{}\" is not available in account {}. candidates:{}",
                    wanted, account, role
                );
                None
            }
            _ => {
                info!("auto-selected the only role {}", role);
                Some(role.clone())
            }
        },
        _ => match selector.select_item("role", &roles) {
            Ok(role) => role,
            Err(e) => {
                error!("failed to select a role: {}", e);
                None
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::select::StaticSelector;
    use crate::testing;
    use axum::http::StatusCode;
    use axum::routing::{any, get};
    use axum::{Json, Router};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct PanicSelector;

    impl SelectItem for PanicSelector {
        fn select_item(&self, _prompt: &str, _items: &[String]) -> anyhow::Result<Option<String>> {
            panic!("selection must not be prompted");
        }
    }

    /// Returns whatever it was handed, sorted, so tests can inspect it.
    struct FirstSelector {
        seen: std::sync::Mutex<Vec<String>>,
    }

    impl SelectItem for FirstSelector {
        fn select_item(&self, _prompt: &str, items: &[String]) -> anyhow::Result<Option<String>> {
            *self.seen.lock().unwrap() = items.to_vec();
            Ok(items.first().cloned())
        }
    }

    fn token() -> AuthToken {
        AuthToken::new("s.abc", i64::MAX, vec![])
    }

    async fn discovery_for(router: Router) -> Discovery {
        let base = testing::serve(router).await;
        let config = Config::new(base).unwrap();
        let client = HttpClient::new(config.timeout).unwrap();
        Discovery::new(config, client)
    }

    fn roles(keys: serde_json::Value) -> Json<serde_json::Value> {
        Json(json!({ "data": { "keys": keys } }))
    }

    fn mounts_router() -> Router {
        Router::new()
            .route(
                "/v1/sys/mounts",
                get(|| async {
                    Json(json!({
                        "aws/prod/": { "type": "aws" },
                        "aws/dev/": { "type": "aws" },
                        "aws/secret/": { "type": "aws" },
                        "aws/broken/": { "type": "aws" },
                        "secret/": { "type": "kv" },
                        "sys/": { "type": "system" },
                    }))
                }),
            )
            .route("/v1/aws/prod/roles", any(|| async { roles(json!(["admin"])) }))
            .route("/v1/aws/dev/roles", any(|| async { roles(json!([])) }))
            .route(
                "/v1/aws/secret/roles",
                any(|| async { (StatusCode::FORBIDDEN, "permission denied") }),
            )
    }

    #[test]
    fn test_account_id() {
        assert_eq!(account_id("aws/prod/"), Some("prod"));
        assert_eq!(account_id("aws/team/prod"), Some("prod"));
        assert_eq!(account_id("prod/"), Some("prod"));
        assert_eq!(account_id("/"), None);
    }

    #[tokio::test]
    async fn test_candidate_mounts_filter_by_prefix() {
        let discovery = discovery_for(mounts_router()).await;
        let mut mounts = discovery.candidate_mounts(&token()).await.unwrap();
        mounts.sort();
        assert_eq!(mounts, ["aws/broken/", "aws/dev/", "aws/prod/", "aws/secret/"]);
    }

    #[tokio::test]
    async fn test_accounts_exclude_inaccessible_mounts() {
        let discovery = discovery_for(mounts_router()).await;
        let accounts = discovery.accounts(&token()).await.unwrap();
        assert_eq!(accounts, ["dev", "prod"]);
    }

    #[tokio::test]
    async fn test_checks_every_candidate_once() {
        let hits = Arc::new(AtomicUsize::new(0));
        let mut router = Router::new().route(
            "/v1/sys/mounts",
            get(|| async {
                let mounts = (0..20)
                    .map(|i| (format!("aws/a{:02}/", i), json!({})))
                    .collect::<serde_json::Map<_, _>>();
                Json(serde_json::Value::Object(mounts))
            }),
        );
        for i in 0..20 {
            let hits = hits.clone();
            router = router.route(
                &format!("/v1/aws/a{:02}/roles", i),
                any(move || async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    roles(json!(["r"]))
                }),
            );
        }
        let discovery = discovery_for(router).await;

        let accounts = discovery.accounts(&token()).await.unwrap();
        assert_eq!(accounts.len(), 20);
        assert_eq!(accounts.first().map(|s| s.as_str()), Some("a00"));
        assert_eq!(hits.load(Ordering::SeqCst), 20);
    }

    #[tokio::test]
    async fn test_choose_account_offers_sorted_accessible_accounts() {
        let discovery = discovery_for(mounts_router()).await;
        let selector = FirstSelector {
            seen: Default::default(),
        };

        let account = choose_account(&discovery, &token(), &selector).await;
        assert_eq!(account.as_deref(), Some("dev"));
        assert_eq!(*selector.seen.lock().unwrap(), ["dev", "prod"]);
    }

    #[tokio::test]
    async fn test_choose_account_with_failed_mount_listing() {
        let router = Router::new().route(
            "/v1/sys/mounts",
            get(|| async { (StatusCode::FORBIDDEN, "permission denied") }),
        );
        let discovery = discovery_for(router).await;
        assert_eq!(choose_account(&discovery, &token(), &PanicSelector).await, None);
    }

    #[tokio::test]
    async fn test_choose_account_with_unknown_preselection() {
        let discovery = discovery_for(mounts_router()).await;
        let selector = StaticSelector::from("staging");
        assert_eq!(choose_account(&discovery, &token(), &selector).await, None);
    }

    #[tokio::test]
    async fn test_choose_role_auto_selects_single_role() {
        let discovery = discovery_for(mounts_router()).await;
        let role = choose_role(&discovery, &token(), "prod", &PanicSelector).await;
        assert_eq!(role.as_deref(), Some("admin"));
    }

    #[tokio::test]
    async fn test_choose_role_single_role_honours_preselection() {
        let discovery = discovery_for(mounts_router()).await;

        let role = choose_role(&discovery, &token(), "prod", &StaticSelector::from("admin")).await;
        assert_eq!(role.as_deref(), Some("admin"));

        let role =
            choose_role(&discovery, &token(), "prod", &StaticSelector::from("readonly")).await;
        assert_eq!(role, None);
    }

    #[tokio::test]
    async fn test_choose_role_without_roles() {
        let discovery = discovery_for(mounts_router()).await;
        let role = choose_role(&discovery, &token(), "dev", &PanicSelector).await;
        assert_eq!(role, None);
    }

    #[tokio::test]
    async fn test_choose_role_prompts_with_sorted_roles() {
        let router = Router::new().route(
            "/v1/aws/prod/roles",
            any(|| async { roles(json!(["readonly", "admin", "deploy"])) }),
        );
        let discovery = discovery_for(router).await;
        let selector = FirstSelector {
            seen: Default::default(),
        };

        let role = choose_role(&discovery, &token(), "prod", &selector).await;
        assert_eq!(role.as_deref(), Some("admin"));
        assert_eq!(*selector.seen.lock().unwrap(), ["admin", "deploy", "readonly"]);
    }

    #[tokio::test]
    async fn test_choose_role_rejects_malformed_listing() {
        for body in [json!({ "data": {} }), json!({ "data": { "keys": ["a", 2] } }), json!([])] {
            let router = Router::new().route(
                "/v1/aws/prod/roles",
                any(move || {
                    let body = body.clone();
                    async move { Json(body) }
                }),
            );
            let discovery = discovery_for(router).await;
            let role = choose_role(&discovery, &token(), "prod", &PanicSelector).await;
            assert_eq!(role, None);
        }
    }
}
