//! Unverified JWT payload inspection. Tokens are opaque to this core: we only
//! read the `exp` claim to compute a local expiry estimate, never check the
//! signature.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Deserialize;

#[derive(Deserialize)]
struct ExpClaim {
    #[serde(default)]
    exp: Option<i64>,
}

/// Parse the `exp` claim (seconds since epoch) out of a JWT's payload segment
/// without verifying the signature. Returns `None` for anything that isn't a
/// well-formed `header.payload.signature` JWT with a numeric `exp`.
pub fn expiry_ms_from_jwt(token: &str) -> Option<i64> {
    let mut parts = token.split('.');
    let (_header, payload_b64, _sig) = (parts.next()?, parts.next()?, parts.next()?);
    let payload_bytes = URL_SAFE_NO_PAD.decode(payload_b64).ok()?;
    let claims: ExpClaim = serde_json::from_slice(&payload_bytes).ok()?;
    claims.exp.map(|exp_secs| exp_secs * 1_000)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_jwt(payload: &serde_json::Value) -> String {
        let b64 = |b: &[u8]| URL_SAFE_NO_PAD.encode(b);
        let header = b64(br#"{"alg":"none","typ":"JWT"}"#);
        let payload = b64(&serde_json::to_vec(payload).unwrap());
        let sig = b64(b"sig");
        format!("{header}.{payload}.{sig}")
    }

    #[test]
    fn extracts_exp_in_milliseconds() {
        let jwt = fake_jwt(&serde_json::json!({ "exp": 1_700_000_000 }));
        assert_eq!(expiry_ms_from_jwt(&jwt), Some(1_700_000_000_000));
    }

    #[test]
    fn missing_exp_is_none() {
        let jwt = fake_jwt(&serde_json::json!({ "sub": "user" }));
        assert_eq!(expiry_ms_from_jwt(&jwt), None);
    }

    #[test]
    fn malformed_token_is_none() {
        assert_eq!(expiry_ms_from_jwt("not-a-jwt"), None);
        assert_eq!(expiry_ms_from_jwt("a.b"), None);
    }
}
