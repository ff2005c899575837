//! Credential record shape and the storage interface that persists it.
//!
//! Persistence itself is delegated — `CredentialStore` is the seam a host
//! application implements (file-backed, keychain-backed, in-memory for
//! tests); `FileCredentialStore` is the on-disk implementation this crate
//! ships, modeled on how `codex-login` reads/writes `auth.json` with
//! restrictive file permissions.

use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

use crate::error::AuthError;
use crate::error::Result;

/// One cached set of credentials for talking to Cursor.
///
/// `refresh_token` may arrive (from disk, or pasted by a user) in the packed
/// form `"<refresh>|<api_key>"`; [`CredentialRecord::from_packed_refresh`]
/// splits it on the first `|`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CredentialRecord {
    pub refresh_token: String,
    pub access_token: Option<String>,
    pub expires_at_ms: Option<i64>,
    pub api_key: Option<String>,
}

impl CredentialRecord {
    pub fn from_packed_refresh(packed_refresh: String) -> Self {
        match packed_refresh.split_once('|') {
            Some((refresh, api_key)) => Self {
                refresh_token: refresh.to_string(),
                api_key: Some(api_key.to_string()),
                ..Default::default()
            },
            None => Self {
                refresh_token: packed_refresh,
                ..Default::default()
            },
        }
    }

    /// Whether the access token needs a refresh: missing, or expiring within
    /// the next 60 seconds.
    pub fn is_expired(&self, now_ms: i64) -> bool {
        match (&self.access_token, self.expires_at_ms) {
            (Some(_), Some(expires_at_ms)) => expires_at_ms <= now_ms + 60_000,
            _ => true,
        }
    }
}

/// On-disk JSON shape (`auth.json`). Field names match the real file.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct AuthDotJson {
    #[serde(rename = "accessToken", skip_serializing_if = "Option::is_none")]
    access_token: Option<String>,
    #[serde(rename = "refreshToken", skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,
    #[serde(rename = "apiKey", skip_serializing_if = "Option::is_none")]
    api_key: Option<String>,
}

/// Persistence seam for [`CredentialRecord`]. Implementations only need to
/// round-trip whatever they're given; expiry/refresh policy lives in
/// `AuthManager`.
pub trait CredentialStore: Send + Sync {
    fn load(&self) -> Result<Option<CredentialRecord>>;
    fn save(&self, record: &CredentialRecord) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

/// Resolve the platform-specific path to the Cursor credential file, mirroring
/// Cursor's own auth.json placement:
/// Windows `%APPDATA%/Cursor/auth.json`; macOS `~/.cursor/auth.json`; other
/// `$XDG_CONFIG_HOME/cursor/auth.json` or `~/.config/cursor/auth.json`.
pub fn default_credential_path() -> Result<PathBuf> {
    if cfg!(target_os = "windows") {
        let appdata = dirs::config_dir().ok_or(AuthError::NoConfigDir)?;
        return Ok(appdata.join("Cursor").join("auth.json"));
    }
    if cfg!(target_os = "macos") {
        let home = dirs::home_dir().ok_or(AuthError::NoConfigDir)?;
        return Ok(home.join(".cursor").join("auth.json"));
    }
    let config_home = dirs::config_dir().ok_or(AuthError::NoConfigDir)?;
    Ok(config_home.join("cursor").join("auth.json"))
}

pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn at_default_path() -> Result<Self> {
        Ok(Self::new(default_credential_path()?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> Result<Option<CredentialRecord>> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let on_disk: AuthDotJson = serde_json::from_str(&contents)?;
        let refresh_token = on_disk.refresh_token.unwrap_or_default();
        let mut record = CredentialRecord::from_packed_refresh(refresh_token);
        record.access_token = on_disk.access_token;
        record.api_key = record.api_key.or(on_disk.api_key);
        Ok(Some(record))
    }

    fn save(&self, record: &CredentialRecord) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let on_disk = AuthDotJson {
            access_token: record.access_token.clone(),
            refresh_token: Some(record.refresh_token.clone()),
            api_key: record.api_key.clone(),
        };
        let json = serde_json::to_string_pretty(&on_disk)?;
        write_restricted(&self.path, &json)
    }

    fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(unix)]
fn write_restricted(path: &Path, contents: &str) -> Result<()> {
    use std::fs::OpenOptions;
    use std::io::Write;
    use std::os::unix::fs::OpenOptionsExt;

    let mut file = OpenOptions::new()
        .truncate(true)
        .write(true)
        .create(true)
        .mode(0o600)
        .open(path)?;
    file.write_all(contents.as_bytes())?;
    Ok(file.flush()?)
}

#[cfg(not(unix))]
fn write_restricted(path: &Path, contents: &str) -> Result<()> {
    std::fs::write(path, contents).map_err(AuthError::from)
}

/// In-memory store for tests and for hosts that manage persistence
/// themselves (the credential record is then cached in `AuthManager` only).
#[derive(Default)]
pub struct InMemoryCredentialStore {
    inner: std::sync::Mutex<Option<CredentialRecord>>,
}

impl CredentialStore for InMemoryCredentialStore {
    fn load(&self) -> Result<Option<CredentialRecord>> {
        #[expect(clippy::unwrap_used)]
        Ok(self.inner.lock().unwrap().clone())
    }

    fn save(&self, record: &CredentialRecord) -> Result<()> {
        #[expect(clippy::unwrap_used)]
        {
            *self.inner.lock().unwrap() = Some(record.clone());
        }
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        #[expect(clippy::unwrap_used)]
        {
            *self.inner.lock().unwrap() = None;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn packed_refresh_splits_on_first_pipe() {
        let rec = CredentialRecord::from_packed_refresh("refresh-tok|api-key".to_string());
        assert_eq!(rec.refresh_token, "refresh-tok");
        assert_eq!(rec.api_key.as_deref(), Some("api-key"));
    }

    #[test]
    fn packed_refresh_without_pipe_has_no_api_key() {
        let rec = CredentialRecord::from_packed_refresh("just-refresh".to_string());
        assert_eq!(rec.refresh_token, "just-refresh");
        assert_eq!(rec.api_key, None);
    }

    #[test]
    fn expiry_predicate_treats_missing_access_as_expired() {
        let rec = CredentialRecord {
            refresh_token: "r".into(),
            access_token: None,
            expires_at_ms: None,
            api_key: None,
        };
        assert!(rec.is_expired(0));
    }

    #[test]
    fn expiry_predicate_honors_sixty_second_margin() {
        let rec = CredentialRecord {
            refresh_token: "r".into(),
            access_token: Some("a".into()),
            expires_at_ms: Some(100_000),
            api_key: None,
        };
        assert!(rec.is_expired(50_000)); // 100_000 <= 50_000 + 60_000
        assert!(!rec.is_expired(10_000)); // 100_000 > 10_000 + 60_000
    }

    #[test]
    fn file_store_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("auth.json");
        let store = FileCredentialStore::new(path.clone());
        assert!(store.load().unwrap().is_none());

        let record = CredentialRecord {
            refresh_token: "r1".into(),
            access_token: Some("a1".into()),
            expires_at_ms: Some(123),
            api_key: Some("k1".into()),
        };
        store.save(&record).unwrap();
        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.refresh_token, "r1");
        assert_eq!(loaded.access_token.as_deref(), Some("a1"));
        assert_eq!(loaded.api_key.as_deref(), Some("k1"));

        store.clear().unwrap();
        assert!(store.load().unwrap().is_none());
    }

    #[cfg(unix)]
    #[test]
    fn file_store_writes_with_owner_only_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let path = dir.path().join("auth.json");
        let store = FileCredentialStore::new(path.clone());
        store
            .save(&CredentialRecord::from_packed_refresh("r".into()))
            .unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
    }
}
