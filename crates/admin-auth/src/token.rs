//! Admin bearer tokens.
//!
//! A token is `base64("<issued_at_ms>:<secret>")`. Nothing is stored
//! server-side: validity is recomputed on every use from the token's own
//! timestamp and the server's expected secret. There is no MAC, so the
//! scheme is only as strong as the secret is unknown.

use std::fmt;

use data_encoding::BASE64;
use zeroize::{Zeroize, Zeroizing};

use crate::error::{AuthError, Result};
use crate::hash::hashes_equal;

/// 24 hours.
pub const DEFAULT_MAX_AGE_MS: i64 = 24 * 60 * 60 * 1000;

/// Decoded token contents.
pub struct AdminToken {
    /// Issue time in milliseconds since the Unix epoch.
    pub issued_at_ms: i64,
    secret: String,
}

impl AdminToken {
    /// Secret material carried by the token.
    pub fn secret(&self) -> &str {
        &self.secret
    }

    /// Check the token against the expected secret and age window.
    ///
    /// Fails for a secret mismatch, a timestamp in the future, or an age
    /// above `max_age_ms`.
    pub fn is_valid(&self, expected_secret: &str, now_ms: i64, max_age_ms: i64) -> bool {
        let secret_ok = hashes_equal(self.secret.as_bytes(), expected_secret.as_bytes());
        let age_ok = match now_ms.checked_sub(self.issued_at_ms) {
            Some(age) => (0..=max_age_ms).contains(&age),
            None => false,
        };
        secret_ok && age_ok
    }
}

impl fmt::Debug for AdminToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdminToken")
            .field("issued_at_ms", &self.issued_at_ms)
            .field("secret", &"<redacted>")
            .finish()
    }
}

impl Drop for AdminToken {
    fn drop(&mut self) {
        self.secret.zeroize();
    }
}

/// Issue a token for `secret` stamped with `now_ms`.
pub fn issue(secret: &str, now_ms: i64) -> String {
    let payload = Zeroizing::new(format!("{now_ms}:{secret}"));
    BASE64.encode(payload.as_bytes())
}

/// Decode a token without judging its validity.
pub fn parse(token: &str) -> Result<AdminToken> {
    let decoded = Zeroizing::new(
        BASE64
            .decode(token.as_bytes())
            .map_err(|_| AuthError::MalformedToken)?,
    );
    let text = std::str::from_utf8(&decoded).map_err(|_| AuthError::MalformedToken)?;

    // Split on the first ':' only; the secret itself may contain colons.
    let (timestamp, secret) = text.split_once(':').ok_or(AuthError::MalformedToken)?;
    if timestamp.is_empty() || secret.is_empty() {
        return Err(AuthError::MalformedToken);
    }

    let issued_at_ms = timestamp
        .parse::<i64>()
        .map_err(|_| AuthError::MalformedToken)?;

    Ok(AdminToken {
        issued_at_ms,
        secret: secret.to_string(),
    })
}

/// Validate a token string. Any decoding failure counts as invalid.
pub fn validate(token: &str, expected_secret: &str, now_ms: i64, max_age_ms: i64) -> bool {
    match parse(token) {
        Ok(parsed) => parsed.is_valid(expected_secret, now_ms, max_age_ms),
        Err(_) => false,
    }
}
