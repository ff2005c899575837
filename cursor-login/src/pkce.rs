//! PKCE challenge/verifier generation for the Cursor "deep control" login flow.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use sha2::Digest;
use sha2::Sha256;
use uuid::Uuid;

const LOGIN_URL_BASE: &str = "https://cursor.com/loginDeepControl";

/// The verifier/challenge pair plus the correlation `uuid` the poll endpoint
/// uses to find this login attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkceLogin {
    pub uuid: String,
    pub verifier: String,
    pub challenge: String,
    pub login_url: String,
}

/// Generate a fresh PKCE verifier/challenge pair and the login URL the user
/// should open in a browser.
pub fn start_pkce_login() -> PkceLogin {
    let mut verifier_bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut verifier_bytes);
    let verifier = URL_SAFE_NO_PAD.encode(verifier_bytes);

    let challenge = URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()));
    let uuid = Uuid::new_v4().to_string();

    let login_url = format!(
        "{LOGIN_URL_BASE}?challenge={challenge}&uuid={uuid}&mode=login&redirectTarget=cli"
    );

    PkceLogin {
        uuid,
        verifier,
        challenge,
        login_url,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn challenge_is_sha256_of_verifier() {
        let login = start_pkce_login();
        let expected = URL_SAFE_NO_PAD.encode(Sha256::digest(login.verifier.as_bytes()));
        assert_eq!(login.challenge, expected);
    }

    #[test]
    fn login_url_carries_challenge_and_uuid() {
        let login = start_pkce_login();
        assert!(login.login_url.contains(&format!("challenge={}", login.challenge)));
        assert!(login.login_url.contains(&format!("uuid={}", login.uuid)));
        assert!(login.login_url.contains("mode=login"));
        assert!(login.login_url.contains("redirectTarget=cli"));
    }

    #[test]
    fn two_logins_never_collide() {
        let a = start_pkce_login();
        let b = start_pkce_login();
        assert_ne!(a.uuid, b.uuid);
        assert_ne!(a.verifier, b.verifier);
    }
}
