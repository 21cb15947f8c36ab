//! Session authenticator (C3).
//!
//! Verifies the compact `header.payload.signature` token the out-of-scope
//! identity service mints (HMAC-SHA256 over `header.payload`, base64url
//! no-pad encoded, JSON claims `{userId, email, exp?}`). The core only
//! ever verifies; minting lives in the external auth service.

use base64::Engine;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use time::OffsetDateTime;

use crate::error::GameError;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthClaims {
    pub user_id: String,
    pub email: String,
}

#[derive(Serialize, Deserialize)]
struct RawClaims {
    #[serde(rename = "userId")]
    user_id: String,
    email: String,
    #[serde(default)]
    exp: Option<i64>,
}

/// Verifies tokens signed with a shared HMAC secret.
pub trait SessionAuthenticator: Send + Sync {
    fn authenticate(&self, token: Option<&str>) -> Result<AuthClaims, GameError>;
}

pub struct JwtAuthenticator {
    secret: Vec<u8>,
}

impl JwtAuthenticator {
    pub fn new(secret: impl Into<String>) -> Self {
        Self { secret: secret.into().into_bytes() }
    }
}

impl SessionAuthenticator for JwtAuthenticator {
    fn authenticate(&self, token: Option<&str>) -> Result<AuthClaims, GameError> {
        let token = token.filter(|t| !t.is_empty()).ok_or(GameError::AuthMissing)?;
        let (header_b64, payload_b64, sig_b64) = split_token(token).ok_or(GameError::AuthInvalid)?;

        let signing_input = format!("{header_b64}.{payload_b64}");
        let expected_sig = sign(&self.secret, signing_input.as_bytes()).map_err(|_| GameError::AuthInvalid)?;
        let given_sig = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(sig_b64)
            .map_err(|_| GameError::AuthInvalid)?;
        if given_sig != expected_sig {
            return Err(GameError::AuthInvalid);
        }

        let payload_bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(payload_b64)
            .map_err(|_| GameError::AuthInvalid)?;
        let claims: RawClaims = serde_json::from_slice(&payload_bytes).map_err(|_| GameError::AuthInvalid)?;

        if let Some(exp) = claims.exp {
            if exp < OffsetDateTime::now_utc().unix_timestamp() {
                return Err(GameError::AuthInvalid);
            }
        }

        Ok(AuthClaims { user_id: claims.user_id, email: claims.email })
    }
}

fn split_token(token: &str) -> Option<(&str, &str, &str)> {
    let mut parts = token.split('.');
    let header = parts.next()?;
    let payload = parts.next()?;
    let sig = parts.next()?;
    if parts.next().is_some() {
        return None;
    }
    Some((header, payload, sig))
}

fn sign(secret: &[u8], data: &[u8]) -> Result<Vec<u8>, ()> {
    let mut mac = HmacSha256::new_from_slice(secret).map_err(|_| ())?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Mints tokens in the same shape the external identity service would,
/// so tests can exercise the core end-to-end without a real auth service
/// running. Not reachable from the running binary.
#[cfg(test)]
pub fn issue_test_token(secret: &[u8], user_id: &str, email: &str) -> String {
    let header = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(b"{}");
    let claims = RawClaims { user_id: user_id.to_string(), email: email.to_string(), exp: None };
    let payload = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims).unwrap());
    let signing_input = format!("{header}.{payload}");
    let sig = sign(secret, signing_input.as_bytes()).unwrap();
    let sig_b64 = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(sig);
    format!("{signing_input}.{sig_b64}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_well_formed_token() {
        let secret = b"super-secret";
        let token = issue_test_token(secret, "u1", "u1@example.com");
        let auth = JwtAuthenticator::new(String::from_utf8(secret.to_vec()).unwrap());
        let claims = auth.authenticate(Some(&token)).unwrap();
        assert_eq!(claims.user_id, "u1");
        assert_eq!(claims.email, "u1@example.com");
    }

    #[test]
    fn rejects_missing_token() {
        let auth = JwtAuthenticator::new("secret");
        let err = auth.authenticate(None).unwrap_err();
        assert_eq!(err.wire_message(), "AUTH_MISSING");
    }

    #[test]
    fn rejects_tampered_signature() {
        let secret = b"super-secret";
        let token = issue_test_token(secret, "u1", "u1@example.com");
        let tampered = format!("{token}x");
        let auth = JwtAuthenticator::new(String::from_utf8(secret.to_vec()).unwrap());
        let err = auth.authenticate(Some(&tampered)).unwrap_err();
        assert_eq!(err.wire_message(), "AUTH_INVALID");
    }

    #[test]
    fn rejects_token_signed_with_other_secret() {
        let token = issue_test_token(b"secret-a", "u1", "u1@example.com");
        let auth = JwtAuthenticator::new("secret-b");
        let err = auth.authenticate(Some(&token)).unwrap_err();
        assert_eq!(err.wire_message(), "AUTH_INVALID");
    }

    #[test]
    fn rejects_expired_token() {
        #[derive(Serialize)]
        struct Claims {
            #[serde(rename = "userId")]
            user_id: String,
            email: String,
            exp: i64,
        }
        let secret = b"super-secret";
        let header = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(b"{}");
        let claims = Claims { user_id: "u1".into(), email: "u1@example.com".into(), exp: 1 };
        let payload = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims).unwrap());
        let signing_input = format!("{header}.{payload}");
        let sig = sign(secret, signing_input.as_bytes()).unwrap();
        let sig_b64 = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(sig);
        let token = format!("{signing_input}.{sig_b64}");

        let auth = JwtAuthenticator::new(String::from_utf8(secret.to_vec()).unwrap());
        let err = auth.authenticate(Some(&token)).unwrap_err();
        assert_eq!(err.wire_message(), "AUTH_INVALID");
    }
}
