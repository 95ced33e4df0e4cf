use anyhow::Result;
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::config::Auth;

type HmacSha256 = Hmac<Sha256>;

pub const SESSION_COOKIE: &str = "session";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub email: String,
    pub exp: i64,
}

/// Issues and verifies signed session tokens.
///
/// A token is `base64url(claims json) "." base64url(hmac-sha256(payload))`.
pub struct Sessions {
    key: Vec<u8>,
    ttl_seconds: i64,
    admin_email: String,
    allow_plaintext_passwords: bool,
}

impl Sessions {
    pub fn new(secret: &str, ttl_seconds: i64, admin_email: &str) -> Self {
        Self {
            key: secret.as_bytes().to_vec(),
            ttl_seconds,
            admin_email: admin_email.to_string(),
            allow_plaintext_passwords: false,
        }
    }

    pub fn from_config(auth: &Auth) -> Self {
        Self::new(&auth.session_secret, auth.session_ttl_seconds, &auth.admin_email)
            .with_plaintext_passwords(auth.allow_plaintext_passwords)
    }

    pub fn with_plaintext_passwords(mut self, allow: bool) -> Self {
        self.allow_plaintext_passwords = allow;
        self
    }

    pub fn allow_plaintext_passwords(&self) -> bool {
        self.allow_plaintext_passwords
    }

    pub fn ttl_seconds(&self) -> i64 {
        self.ttl_seconds
    }

    pub fn admin_email(&self) -> &str {
        &self.admin_email
    }

    pub fn is_admin(&self, email: &str) -> bool {
        email.eq_ignore_ascii_case(&self.admin_email)
    }

    fn mac(&self) -> Result<HmacSha256> {
        HmacSha256::new_from_slice(&self.key).map_err(|e| anyhow::anyhow!("invalid session key: {e}"))
    }

    pub fn issue(&self, user_id: i64, email: &str) -> Result<String> {
        self.issue_at(user_id, email, chrono::Utc::now().timestamp())
    }

    pub fn issue_at(&self, user_id: i64, email: &str, now: i64) -> Result<String> {
        let claims = Claims {
            sub: user_id,
            email: email.to_string(),
            exp: now + self.ttl_seconds,
        };
        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims)?);

        let mut mac = self.mac()?;
        mac.update(payload.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        Ok(format!("{payload}.{signature}"))
    }

    pub fn verify(&self, token: &str) -> Option<Claims> {
        self.verify_at(token, chrono::Utc::now().timestamp())
    }

    pub fn verify_at(&self, token: &str, now: i64) -> Option<Claims> {
        let (payload, signature) = token.split_once('.')?;
        let signature = URL_SAFE_NO_PAD.decode(signature).ok()?;

        let mut mac = self.mac().ok()?;
        mac.update(payload.as_bytes());
        mac.verify_slice(&signature).ok()?;

        let claims: Claims = serde_json::from_slice(&URL_SAFE_NO_PAD.decode(payload).ok()?).ok()?;
        if claims.exp <= now {
            tracing::debug!(user_id = claims.sub, "session token expired");
            return None;
        }
        Some(claims)
    }
}
