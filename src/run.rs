use std::fmt;

use chrono::Utc;
use reqwest::Url;
use tracing::{debug, error, info, warn};

use vault_assume_role_schema::credentials::AccountCredentials;
use vault_assume_role_schema::token::AuthToken;

use crate::assume_role::RoleAssumer;
use crate::auth::{AuthError, Authenticator};
use crate::config::Config;
use crate::discovery::{choose_account, choose_role, Discovery};
use crate::federation::FederationClient;
use crate::http::HttpClient;
use crate::login::ReadLoginCredentials;
use crate::select::SelectItem;
use crate::store::StoreCredentials;
use crate::token_cache::TokenCache;

pub const USAGE_EXIT_CODE: u8 = 1;

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Command {
    /// Write credentials to the shared credentials file.
    Keys,
    /// Build a federated console sign-in URL.
    Console { issuer: String, region: String },
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum CommandKind {
    Keys,
    Console,
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandKind::Keys => write!(f, "keys"),
            CommandKind::Console => write!(f, "console"),
        }
    }
}

impl Command {
    pub fn kind(&self) -> CommandKind {
        match self {
            Command::Keys => CommandKind::Keys,
            Command::Console { .. } => CommandKind::Console,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Failure {
    #[error("could not read login credentials: {0:#}")]
    LoginInput(anyhow::Error),
    #[error("authentication failed: {0}")]
    Authentication(#[from] AuthError),
    #[error("no account chosen")]
    NoAccount,
    #[error("no role chosen")]
    NoRole,
    #[error("failed to obtain credentials for {0}")]
    AssumeRole(CommandKind),
    #[error("failed to obtain a console sign-in token")]
    SigninToken,
}

impl Failure {
    pub fn exit_code(&self) -> u8 {
        match self {
            Failure::LoginInput(_) | Failure::Authentication(_) => 2,
            Failure::NoAccount => 3,
            Failure::NoRole => 4,
            Failure::AssumeRole(CommandKind::Keys) => 5,
            Failure::AssumeRole(CommandKind::Console) => 6,
            Failure::SigninToken => 7,
        }
    }
}

#[derive(Debug)]
pub enum Outcome {
    Keys(AccountCredentials),
    Console(Url),
}

pub struct VaultAssumeRole<R, T, A, S, C> {
    config: Config,
    client: HttpClient,
    login_reader: R,
    token_cache: T,
    account_selector: A,
    role_selector: S,
    store: C,
}

impl<R, T, A, S, C> VaultAssumeRole<R, T, A, S, C>
where
    R: ReadLoginCredentials + Send + Sync,
    T: TokenCache + Send + Sync,
    A: SelectItem,
    S: SelectItem,
    C: StoreCredentials + Send + Sync,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: Config,
        client: HttpClient,
        login_reader: R,
        token_cache: T,
        account_selector: A,
        role_selector: S,
        store: C,
    ) -> Self {
        Self {
            config,
            client,
            login_reader,
            token_cache,
            account_selector,
            role_selector,
            store,
        }
    }

    pub async fn run(&self, command: &Command) -> Result<Outcome, Failure> {
        let token = self.authenticate().await?;

        let discovery = Discovery::new(self.config.clone(), self.client.clone());
        let account = choose_account(&discovery, &token, &self.account_selector)
            .await
            .ok_or(Failure::NoAccount)?;
        debug!("target account:{}", account);

        let role = choose_role(&discovery, &token, &account, &self.role_selector)
            .await
            .ok_or(Failure::NoRole)?;
        debug!("target role:{}", role);

        let assumer = RoleAssumer::new(self.config.clone(), self.client.clone());
        let credentials = assumer
            .assume_role(&token, &account, &role)
            .await
            .map_err(|e| {
                error!("failed to assume role {} in account {}: {}", role, account, e);
                Failure::AssumeRole(command.kind())
            })?;

        let stored = match self.store.store_credentials(&credentials).await {
            Ok(()) => true,
            Err(e) => {
                error!("could not save credentials: {:#}", e);
                print_credentials(&credentials);
                false
            }
        };

        match command {
            Command::Keys if stored => Ok(Outcome::Keys(credentials)),
            Command::Keys => Err(Failure::AssumeRole(CommandKind::Keys)),
            Command::Console { issuer, region } => {
                let federation = FederationClient::new(self.config.clone(), self.client.clone());
                let signin_token = federation
                    .signin_token(&credentials.credentials)
                    .await
                    .map_err(|e| {
                        error!("failed to get a sign-in token: {}", e);
                        Failure::SigninToken
                    })?;
                Ok(Outcome::Console(federation.signin_url(
                    &signin_token,
                    issuer,
                    region,
                )))
            }
        }
    }

    /// Reuses the cached token when it is still valid, otherwise logs in.
    async fn authenticate(&self) -> Result<AuthToken, Failure> {
        if let Some(token) = self.token_cache.load().await {
            info!(
                "using cached vault token, expires in {} minutes",
                token.minutes_remaining(Utc::now())
            );
            return Ok(token);
        }

        let login = self
            .login_reader
            .read_login_credentials()
            .await
            .map_err(Failure::LoginInput)?;
        let authenticator = Authenticator::new(self.config.clone(), self.client.clone());
        let token = authenticator.login(&login).await.inspect_err(|e| {
            error!("login failed: {}", e);
        })?;

        if let Err(e) = self.token_cache.save(&token).await {
            warn!("could not cache the vault token: {:#}", e);
        }
        Ok(token)
    }
}

fn print_credentials(credentials: &AccountCredentials) {
    let creds = &credentials.credentials;
    println!("[{}]", credentials.account());
    println!("aws_access_key_id = {}", creds.key());
    println!("aws_secret_access_key = {}", creds.secret());
    println!("aws_session_token = {}", creds.token());
    println!("expiry = {}", creds.expiry());
    println!("role = {}", credentials.role());
}
