//! HTTP calls that drive the OAuth/PKCE login flow: poll, API-key exchange,
//! and refresh. Modeled on `codex-core::client::ModelClient::stream`'s
//! retry/backoff shape, minus the SSE streaming (these are all single JSON
//! responses).

use std::time::Duration;

use serde::Deserialize;
use tracing::debug;
use tracing::warn;

use crate::error::AuthError;
use crate::error::Result;
use crate::jwt::expiry_ms_from_jwt;

pub const DEFAULT_API_BASE: &str = "https://api2.cursor.sh";

const POLL_BASE_DELAY: Duration = Duration::from_secs(1);
const POLL_BACKOFF_FACTOR: f64 = 1.2;
const POLL_MAX_DELAY: Duration = Duration::from_secs(10);
const POLL_MAX_ATTEMPTS: u32 = 150;
const POLL_MAX_CONSECUTIVE_FAILURES: u32 = 3;

/// Tokens returned by a successful poll or API-key exchange.
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthTokens {
    #[serde(rename = "accessToken")]
    pub access_token: String,
    #[serde(rename = "refreshToken")]
    pub refresh_token: String,
}

/// Result of a refresh call: a new access token and its computed expiry.
#[derive(Debug, Clone)]
pub struct RefreshedToken {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at_ms: i64,
}

fn poll_delay(attempt: u32) -> Duration {
    let scaled = POLL_BASE_DELAY.as_secs_f64() * POLL_BACKOFF_FACTOR.powi(attempt as i32);
    Duration::from_secs_f64(scaled.min(POLL_MAX_DELAY.as_secs_f64()))
}

/// Poll `{api}/auth/poll?uuid=&verifier=` until the login completes, the
/// attempt budget is exhausted, or three consecutive non-404 failures occur.
/// Returns `None` (not an error) for "gave up" rather than propagating a
/// hard error — callers that want to know why should look at the warnings
/// logged along the way.
pub async fn poll_for_tokens(
    client: &reqwest::Client,
    api_base: &str,
    uuid: &str,
    verifier: &str,
) -> Result<Option<OAuthTokens>> {
    let url = format!("{api_base}/auth/poll");
    let mut consecutive_failures = 0u32;

    for attempt in 0..POLL_MAX_ATTEMPTS {
        tokio::time::sleep(poll_delay(attempt)).await;

        let resp = client
            .get(&url)
            .query(&[("uuid", uuid), ("verifier", verifier)])
            .send()
            .await;

        match resp {
            Ok(r) if r.status() == reqwest::StatusCode::NOT_FOUND => {
                consecutive_failures = 0;
                continue;
            }
            Ok(r) if r.status().is_success() => {
                let tokens: OAuthTokens = r.json().await?;
                return Ok(Some(tokens));
            }
            Ok(r) => {
                consecutive_failures += 1;
                debug!(status = %r.status(), attempt, "auth poll returned non-success status");
            }
            Err(e) => {
                consecutive_failures += 1;
                debug!(error = %e, attempt, "auth poll request failed");
            }
        }

        if consecutive_failures >= POLL_MAX_CONSECUTIVE_FAILURES {
            warn!("auth poll gave up after {consecutive_failures} consecutive failures");
            return Ok(None);
        }
    }

    warn!("auth poll timed out after {POLL_MAX_ATTEMPTS} attempts");
    Ok(None)
}

/// Exchange a user-supplied Cursor API key for an access/refresh token pair.
pub async fn exchange_api_key(
    client: &reqwest::Client,
    api_base: &str,
    api_key: &str,
) -> Result<OAuthTokens> {
    let url = format!("{api_base}/auth/exchange_user_api_key");
    let resp = client.post(&url).bearer_auth(api_key).send().await?;
    if !resp.status().is_success() {
        return Err(AuthError::RefreshFailed(format!(
            "api key exchange failed: {}",
            resp.status()
        )));
    }
    Ok(resp.json().await?)
}

#[derive(Deserialize)]
struct RefreshResponse {
    #[serde(rename = "accessToken")]
    access_token: String,
    #[serde(rename = "refreshToken", default)]
    refresh_token: Option<String>,
}

const DEFAULT_TOKEN_LIFETIME_MS: i64 = 3_600_000;

/// Refresh the access token using the stored refresh token. The refreshed
/// access token's `exp` claim (read without verification) sets
/// `expires_at_ms`; if it's absent or unparsable we fall back to `now +
/// 3_600_000`.
pub async fn refresh(
    client: &reqwest::Client,
    api_base: &str,
    refresh_token: &str,
    now_ms: i64,
) -> Result<RefreshedToken> {
    let url = format!("{api_base}/auth/refresh");
    let resp = client.post(&url).bearer_auth(refresh_token).send().await?;
    if !resp.status().is_success() {
        return Err(AuthError::RefreshFailed(format!(
            "refresh returned {}",
            resp.status()
        )));
    }
    let body: RefreshResponse = resp.json().await.map_err(|e| {
        AuthError::RefreshFailed(format!("refresh returned a non-JSON body: {e}"))
    })?;

    let expires_at_ms =
        expiry_ms_from_jwt(&body.access_token).unwrap_or(now_ms + DEFAULT_TOKEN_LIFETIME_MS);

    Ok(RefreshedToken {
        access_token: body.access_token,
        refresh_token: body.refresh_token,
        expires_at_ms,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn poll_delay_grows_and_caps() {
        assert_eq!(poll_delay(0), POLL_BASE_DELAY);
        assert!(poll_delay(1) > poll_delay(0));
        assert!(poll_delay(100) <= POLL_MAX_DELAY);
    }
}
