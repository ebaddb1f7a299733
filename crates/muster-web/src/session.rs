//! Stateless admin sessions carried in a signed cookie.
//!
//! A token is `base64url(json claims)` and a hex HMAC-SHA256 of that text,
//! joined by `.`. Nothing is stored server-side, so rotating the secret key
//! logs every admin out.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

pub const COOKIE_NAME: &str = "admin_session";

const MAX_TOKEN_LEN: usize = 512;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
  pub admin: bool,
  /// Expiry as a unix timestamp in seconds.
  pub exp:   i64,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
  #[error("malformed session token")]
  Malformed,
  #[error("bad session signature")]
  BadSignature,
  #[error("session expired")]
  Expired,
  #[error("session does not grant admin")]
  NotAdmin,
}

fn keyed(secret: &[u8]) -> Result<HmacSha256, SessionError> {
  HmacSha256::new_from_slice(secret).map_err(|_| SessionError::Malformed)
}

pub fn sign(claims: &SessionClaims, secret: &[u8]) -> Result<String, SessionError> {
  let payload = serde_json::to_vec(claims).map_err(|_| SessionError::Malformed)?;
  let payload_part = URL_SAFE_NO_PAD.encode(payload);
  let mut mac = keyed(secret)?;
  mac.update(payload_part.as_bytes());
  let sig = hex::encode(mac.finalize().into_bytes());
  Ok(format!("{payload_part}.{sig}"))
}

/// Check signature, expiry and the admin flag.
pub fn verify(token: &str, secret: &[u8], now: i64) -> Result<SessionClaims, SessionError> {
  if token.len() > MAX_TOKEN_LEN {
    return Err(SessionError::Malformed);
  }
  let (payload_part, sig_part) =
    token.split_once('.').ok_or(SessionError::Malformed)?;
  let sig = hex::decode(sig_part).map_err(|_| SessionError::Malformed)?;

  let mut mac = keyed(secret)?;
  mac.update(payload_part.as_bytes());
  mac.verify_slice(&sig).map_err(|_| SessionError::BadSignature)?;

  let payload = URL_SAFE_NO_PAD
    .decode(payload_part)
    .map_err(|_| SessionError::Malformed)?;
  let claims: SessionClaims =
    serde_json::from_slice(&payload).map_err(|_| SessionError::Malformed)?;

  if claims.exp <= now {
    return Err(SessionError::Expired);
  }
  if !claims.admin {
    return Err(SessionError::NotAdmin);
  }
  Ok(claims)
}

#[cfg(test)]
mod tests {
  use super::*;

  const SECRET: &[u8] = b"test-secret";

  fn admin_until(exp: i64) -> SessionClaims { SessionClaims { admin: true, exp } }

  #[test]
  fn signed_token_verifies() {
    let token = sign(&admin_until(2_000), SECRET).unwrap();
    assert_eq!(verify(&token, SECRET, 1_000).unwrap(), admin_until(2_000));
  }

  #[test]
  fn expired_token_is_rejected() {
    let token = sign(&admin_until(1_000), SECRET).unwrap();
    assert_eq!(verify(&token, SECRET, 1_000), Err(SessionError::Expired));
  }

  #[test]
  fn other_secret_is_rejected() {
    let token = sign(&admin_until(2_000), SECRET).unwrap();
    assert_eq!(
      verify(&token, b"another-secret", 1_000),
      Err(SessionError::BadSignature)
    );
  }

  #[test]
  fn tampered_payload_is_rejected() {
    let token = sign(&admin_until(2_000), SECRET).unwrap();
    let (_, sig) = token.split_once('.').unwrap();
    let forged = URL_SAFE_NO_PAD.encode(br#"{"admin":true,"exp":9999999999}"#);
    assert_eq!(
      verify(&format!("{forged}.{sig}"), SECRET, 1_000),
      Err(SessionError::BadSignature)
    );
  }

  #[test]
  fn non_admin_claims_are_rejected() {
    let token = sign(&SessionClaims { admin: false, exp: 2_000 }, SECRET).unwrap();
    assert_eq!(verify(&token, SECRET, 1_000), Err(SessionError::NotAdmin));
  }

  #[test]
  fn garbage_is_malformed() {
    assert_eq!(verify("nodot", SECRET, 0), Err(SessionError::Malformed));
    assert_eq!(verify("abc.zz", SECRET, 0), Err(SessionError::Malformed));
  }
}
