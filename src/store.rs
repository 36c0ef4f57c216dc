use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use ini::Ini;
use tracing::info;

use vault_assume_role_schema::credentials::AccountCredentials;

#[async_trait]
pub trait StoreCredentials {
    /// Replaces the profile named after the account with `credentials`.
    async fn store_credentials(&self, credentials: &AccountCredentials) -> anyhow::Result<()>;
}

/// The AWS shared credentials file, one profile per account.
#[derive(Debug, Clone)]
pub struct IniCredentialsStore {
    path: PathBuf,
}

impl IniCredentialsStore {
    pub fn new<P: AsRef<Path>>(path: P) -> IniCredentialsStore {
        IniCredentialsStore {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl StoreCredentials for IniCredentialsStore {
    async fn store_credentials(&self, credentials: &AccountCredentials) -> anyhow::Result<()> {
        // rust-ini does blocking IO.
        let path = self.path.clone();
        let credentials = credentials.clone();
        tokio::task::spawn_blocking(move || write_profile(&path, &credentials))
            .await
            .context("credentials writer did not finish")?
    }
}

fn write_profile(path: &Path, credentials: &AccountCredentials) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    // Other profiles must survive, so an unreadable file is an error rather than a reset.
    let mut ini = if path.exists() {
        Ini::load_from_file(path).with_context(|| format!("Failed to read {}", path.display()))?
    } else {
        Ini::new()
    };

    let profile = credentials.account();
    let creds = &credentials.credentials;
    ini.delete(Some(profile));
    ini.with_section(Some(profile))
        .set("aws_access_key_id", creds.key())
        .set("aws_secret_access_key", creds.secret())
        .set("aws_session_token", creds.token())
        .set("expiry", creds.expiry())
        .set("role", credentials.role());

    ini.write_to_file(path)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    }

    info!("credentials saved to profile {} in {}", profile, path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::TempDir;
    use vault_assume_role_schema::credentials::Credentials;

    fn account_credentials(account: &str, role: &str, key: &str) -> AccountCredentials {
        AccountCredentials {
            account: account.to_string(),
            role: role.to_string(),
            credentials: Credentials::issued_at(
                Utc::now(),
                key.to_string(),
                format!("{}-secret", key),
                format!("{}-session", key),
                3600,
            )
            .unwrap(),
        }
    }

    #[tokio::test]
    async fn test_writes_profile_section() {
        let dir = TempDir::new().unwrap();
        let store = IniCredentialsStore::new(dir.path().join(".aws").join("credentials"));
        let credentials = account_credentials("prod", "admin", "AKIA1");

        store.store_credentials(&credentials).await.unwrap();

        let ini = Ini::load_from_file(store.path()).unwrap();
        let section = ini.section(Some("prod")).unwrap();
        assert_eq!(section.get("aws_access_key_id"), Some("AKIA1"));
        assert_eq!(section.get("aws_secret_access_key"), Some("AKIA1-secret"));
        assert_eq!(section.get("aws_session_token"), Some("AKIA1-session"));
        assert_eq!(section.get("role"), Some("admin"));
        assert_eq!(
            section.get("expiry"),
            Some(credentials.credentials.expiry().as_str())
        );
    }

    #[tokio::test]
    async fn test_second_assumption_replaces_profile() {
        let dir = TempDir::new().unwrap();
        let store = IniCredentialsStore::new(dir.path().join("credentials"));

        store
            .store_credentials(&account_credentials("prod", "admin", "AKIA1"))
            .await
            .unwrap();
        store
            .store_credentials(&account_credentials("prod", "readonly", "AKIA2"))
            .await
            .unwrap();

        let ini = Ini::load_from_file(store.path()).unwrap();
        assert_eq!(ini.sections().filter(|s| *s == Some("prod")).count(), 1);
        let section = ini.section(Some("prod")).unwrap();
        assert_eq!(section.get("role"), Some("readonly"));
        assert_eq!(section.get("aws_access_key_id"), Some("AKIA2"));
    }

    #[tokio::test]
    async fn test_other_profiles_are_kept() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("credentials");
        std::fs::write(
            &path,
            "[default]\naws_access_key_id = AKIADEFAULT\naws_secret_access_key = s\n",
        )
        .unwrap();
        let store = IniCredentialsStore::new(&path);

        store
            .store_credentials(&account_credentials("prod", "admin", "AKIA1"))
            .await
            .unwrap();

        let ini = Ini::load_from_file(&path).unwrap();
        assert_eq!(
            ini.section(Some("default")).unwrap().get("aws_access_key_id"),
            Some("AKIADEFAULT")
        );
        assert!(ini.section(Some("prod")).is_some());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let store = IniCredentialsStore::new(dir.path().join("credentials"));

        store
            .store_credentials(&account_credentials("prod", "admin", "AKIA1"))
            .await
            .unwrap();

        let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_write_profile_creates_missing_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a").join("b").join("credentials");

        write_profile(&path, &account_credentials("prod", "admin", "AKIA1")).unwrap();

        let ini = Ini::load_from_file(&path).unwrap();
        assert_eq!(
            ini.section(Some("prod")).unwrap().get("aws_access_key_id"),
            Some("AKIA1")
        );
    }

    #[tokio::test]
    async fn test_unwritable_location_fails() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "").unwrap();
        let store = IniCredentialsStore::new(blocker.join("credentials"));

        assert!(store
            .store_credentials(&account_credentials("prod", "admin", "AKIA1"))
            .await
            .is_err());
    }
}
