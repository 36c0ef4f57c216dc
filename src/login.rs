use std::env;
use std::fmt;

use anyhow::Context;
use async_trait::async_trait;
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Input, Password};

pub const USERNAME_VAR: &str = "VAULT_USERNAME";
pub const PASSWORD_VAR: &str = "VAULT_PASSWORD";

/// An LDAP username/password pair. Only ever held in memory.
#[derive(Clone)]
pub struct LoginCredentials {
    pub username: String,
    password: String,
}

impl LoginCredentials {
    pub fn new<U: Into<String>, P: Into<String>>(username: U, password: P) -> LoginCredentials {
        LoginCredentials {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for LoginCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Username and password picked up from `VAULT_USERNAME` / `VAULT_PASSWORD`.
#[derive(Debug, Clone, Default)]
pub struct EnvLogin {
    pub username: Option<String>,
    pub password: Option<String>,
}

impl EnvLogin {
    pub fn from_env() -> EnvLogin {
        fn non_empty(name: &str) -> Option<String> {
            env::var(name).ok().filter(|v| !v.is_empty())
        }

        EnvLogin {
            username: non_empty(USERNAME_VAR),
            password: non_empty(PASSWORD_VAR),
        }
    }

    pub fn complete(&self) -> Option<LoginCredentials> {
        match (&self.username, &self.password) {
            (Some(u), Some(p)) => Some(LoginCredentials::new(u, p)),
            _ => None,
        }
    }
}

#[async_trait]
pub trait ReadLoginCredentials {
    async fn read_login_credentials(&self) -> anyhow::Result<LoginCredentials>;
}

/// Asks on the terminal, offering the environment values as defaults.
pub struct PromptLoginReader {
    defaults: EnvLogin,
}

impl From<EnvLogin> for PromptLoginReader {
    fn from(defaults: EnvLogin) -> Self {
        PromptLoginReader { defaults }
    }
}

#[async_trait]
impl ReadLoginCredentials for PromptLoginReader {
    async fn read_login_credentials(&self) -> anyhow::Result<LoginCredentials> {
        let theme = ColorfulTheme::default();

        let mut username = Input::<String>::with_theme(&theme).with_prompt("Vault username");
        if let Some(default) = self.defaults.username.as_ref() {
            username = username.default(default.clone());
        }
        let username = username
            .interact_text()
            .context("Failed to read Vault username")?;

        let has_default = self.defaults.password.is_some();
        let prompt = if has_default {
            format!("Vault password (empty to use {})", PASSWORD_VAR)
        } else {
            "Vault password".to_string()
        };
        let password = Password::with_theme(&theme)
            .with_prompt(prompt)
            .allow_empty_password(has_default)
            .interact()
            .context("Failed to read Vault password")?;

        let password = match (password.is_empty(), self.defaults.password.as_ref()) {
            (true, Some(default)) => default.clone(),
            _ => password,
        };

        Ok(LoginCredentials::new(username, password))
    }
}

pub struct StaticLoginReader {
    credentials: LoginCredentials,
}

impl From<LoginCredentials> for StaticLoginReader {
    fn from(credentials: LoginCredentials) -> Self {
        StaticLoginReader { credentials }
    }
}

#[async_trait]
impl ReadLoginCredentials for StaticLoginReader {
    async fn read_login_credentials(&self) -> anyhow::Result<LoginCredentials> {
        Ok(self.credentials.clone())
    }
}
