use std::sync::Arc;
use std::sync::RwLock;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use tracing::warn;

use crate::credentials::CredentialRecord;
use crate::credentials::CredentialStore;
use crate::error::Result;
use crate::oauth;
use crate::oauth::DEFAULT_API_BASE;
use crate::pkce::PkceLogin;
use crate::pkce::start_pkce_login;

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Central, `Arc`-shared cache of one [`CredentialRecord`], modeled on
/// `codex-login::AuthManager`: a single `RwLock`-guarded snapshot that every
/// caller reads, loaded once at construction and mutated only through
/// explicit `reload`/`refresh` calls so the rest of the program always sees a
/// consistent view.
///
/// Concurrent refreshes are coalesced through `refresh_lock`: whichever
/// caller gets there first performs the HTTP refresh; everyone else blocks on
/// the same `tokio::sync::Mutex` and then observes the already-refreshed
/// cache on the double-check, rather than firing a second request.
pub struct AuthManager {
    store: Arc<dyn CredentialStore>,
    client: reqwest::Client,
    api_base: String,
    cache: RwLock<Option<CredentialRecord>>,
    refresh_lock: tokio::sync::Mutex<()>,
}

impl AuthManager {
    pub fn new(store: Arc<dyn CredentialStore>) -> Result<Self> {
        Self::with_api_base(store, DEFAULT_API_BASE)
    }

    pub fn with_api_base(store: Arc<dyn CredentialStore>, api_base: impl Into<String>) -> Result<Self> {
        let cached = store.load()?;
        Ok(Self {
            store,
            client: reqwest::Client::new(),
            api_base: api_base.into(),
            cache: RwLock::new(cached),
            refresh_lock: tokio::sync::Mutex::new(()),
        })
    }

    pub fn shared(store: Arc<dyn CredentialStore>) -> Result<Arc<Self>> {
        Ok(Arc::new(Self::new(store)?))
    }

    /// Current cached snapshot, unrefreshed.
    pub fn current(&self) -> Option<CredentialRecord> {
        #[expect(clippy::unwrap_used)]
        self.cache.read().unwrap().clone()
    }

    /// Force-reload from the backing store, discarding the in-memory cache.
    pub fn reload(&self) -> Result<()> {
        let fresh = self.store.load()?;
        #[expect(clippy::unwrap_used)]
        {
            *self.cache.write().unwrap() = fresh;
        }
        Ok(())
    }

    /// Start an OAuth/PKCE login; returns the URL to open plus the
    /// verifier/uuid needed to poll for completion.
    pub fn start_login(&self) -> PkceLogin {
        start_pkce_login()
    }

    /// Poll for the PKCE login started by `start_login` to complete, then
    /// cache and persist the resulting tokens.
    pub async fn complete_login(&self, login: &PkceLogin) -> Result<bool> {
        let tokens =
            oauth::poll_for_tokens(&self.client, &self.api_base, &login.uuid, &login.verifier)
                .await?;
        let Some(tokens) = tokens else {
            return Ok(false);
        };
        let expires_at_ms = crate::jwt::expiry_ms_from_jwt(&tokens.access_token);
        self.set_auth(CredentialRecord {
            refresh_token: tokens.refresh_token,
            access_token: Some(tokens.access_token),
            expires_at_ms,
            api_key: None,
        })?;
        Ok(true)
    }

    /// Exchange a pasted API key for OAuth-shaped tokens and cache them.
    pub async fn login_with_api_key(&self, api_key: &str) -> Result<()> {
        let tokens = oauth::exchange_api_key(&self.client, &self.api_base, api_key).await?;
        let expires_at_ms = crate::jwt::expiry_ms_from_jwt(&tokens.access_token);
        self.set_auth(CredentialRecord {
            refresh_token: tokens.refresh_token,
            access_token: Some(tokens.access_token),
            expires_at_ms,
            api_key: Some(api_key.to_string()),
        })?;
        Ok(())
    }

    fn set_auth(&self, record: CredentialRecord) -> Result<()> {
        self.store.save(&record)?;
        #[expect(clippy::unwrap_used)]
        {
            *self.cache.write().unwrap() = Some(record);
        }
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        self.store.clear()?;
        #[expect(clippy::unwrap_used)]
        {
            *self.cache.write().unwrap() = None;
        }
        Ok(())
    }

    /// Return a live, non-expired access token, refreshing first if needed.
    /// `None` when there is no cached credential at all.
    pub async fn access_token(&self) -> Result<Option<String>> {
        Ok(self
            .ensure_fresh()
            .await?
            .and_then(|rec| rec.access_token))
    }

    /// Ensure the cached credential's access token is fresh, refreshing via a
    /// single-flight call if it is missing or within 60s of expiry. Returns
    /// the (possibly stale, if refresh failed) cached record.
    pub async fn ensure_fresh(&self) -> Result<Option<CredentialRecord>> {
        if let Some(rec) = self.fresh_from_cache() {
            return Ok(Some(rec));
        }

        let _permit = self.refresh_lock.lock().await;

        // Double-check: another task may have refreshed while we waited.
        if let Some(rec) = self.fresh_from_cache() {
            return Ok(Some(rec));
        }

        self.refresh_locked().await
    }

    /// Force a refresh regardless of what the local clock thinks about the
    /// cached token's expiry. Used when the server itself rejects a token
    /// with a 401 despite `expires_at_ms` not having elapsed yet (e.g. a
    /// server-side revocation `ensure_fresh`'s local expiry check can't see).
    pub async fn force_refresh(&self) -> Result<Option<CredentialRecord>> {
        let _permit = self.refresh_lock.lock().await;
        self.refresh_locked().await
    }

    /// Performs the actual refresh HTTP call and cache/store update. Caller
    /// must hold `refresh_lock`.
    async fn refresh_locked(&self) -> Result<Option<CredentialRecord>> {
        let Some(refresh_token) = self.current().map(|rec| rec.refresh_token) else {
            return Ok(None);
        };
        if refresh_token.is_empty() {
            // API-key-only credential; there is nothing to refresh against.
            return Ok(self.current());
        }

        match oauth::refresh(&self.client, &self.api_base, &refresh_token, now_ms()).await {
            Ok(refreshed) => {
                let mut updated = self.current().unwrap_or_default();
                updated.access_token = Some(refreshed.access_token);
                updated.expires_at_ms = Some(refreshed.expires_at_ms);
                if let Some(rt) = refreshed.refresh_token {
                    updated.refresh_token = rt;
                }
                // Persistence failures are surfaced but do not invalidate the
                // freshly refreshed in-memory token.
                if let Err(e) = self.store.save(&updated) {
                    warn!("failed to persist refreshed credentials: {e}");
                }
                #[expect(clippy::unwrap_used)]
                {
                    *self.cache.write().unwrap() = Some(updated.clone());
                }
                Ok(Some(updated))
            }
            Err(e) => {
                warn!("auth refresh failed, continuing with existing token: {e}");
                Ok(self.current())
            }
        }
    }

    fn fresh_from_cache(&self) -> Option<CredentialRecord> {
        let rec = self.current()?;
        if rec.is_expired(now_ms()) {
            None
        } else {
            Some(rec)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::InMemoryCredentialStore;

    #[tokio::test]
    async fn access_token_is_none_without_credentials() {
        let store = Arc::new(InMemoryCredentialStore::default());
        let manager = AuthManager::new(store).unwrap();
        assert_eq!(manager.access_token().await.unwrap(), None);
    }

    #[tokio::test]
    async fn api_key_only_credential_is_never_refreshed() {
        let store = Arc::new(InMemoryCredentialStore::default());
        store
            .save(&CredentialRecord {
                refresh_token: String::new(),
                access_token: Some("sk-live".into()),
                expires_at_ms: None,
                api_key: Some("sk-live".into()),
            })
            .unwrap();
        let manager = AuthManager::new(store).unwrap();
        // expires_at_ms is None so is_expired() is true, but refresh_token is
        // empty so ensure_fresh must short-circuit rather than calling out.
        let rec = manager.ensure_fresh().await.unwrap().unwrap();
        assert_eq!(rec.access_token.as_deref(), Some("sk-live"));
    }

    #[tokio::test]
    async fn non_expired_token_is_returned_without_refresh() {
        let store = Arc::new(InMemoryCredentialStore::default());
        store
            .save(&CredentialRecord {
                refresh_token: "r".into(),
                access_token: Some("a".into()),
                expires_at_ms: Some(now_ms() + 10 * 60_000),
                api_key: None,
            })
            .unwrap();
        let manager = AuthManager::new(store).unwrap();
        assert_eq!(manager.access_token().await.unwrap().as_deref(), Some("a"));
    }

    #[test]
    fn clear_empties_cache_and_store() {
        let store = Arc::new(InMemoryCredentialStore::default());
        store
            .save(&CredentialRecord::from_packed_refresh("r".into()))
            .unwrap();
        let manager = AuthManager::new(store).unwrap();
        assert!(manager.current().is_some());
        manager.clear().unwrap();
        assert!(manager.current().is_none());
    }
}
