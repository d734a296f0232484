//! Tunables for the admin authentication service.

use crate::rate_limit::Limit;
use crate::token::DEFAULT_MAX_AGE_MS;

/// Longest password accepted before it reaches the KDF.
pub const DEFAULT_MAX_PASSWORD_LEN: usize = 1000;

/// Default cap on client keys tracked by a single rate limiter.
pub const DEFAULT_MAX_TRACKED: usize = 10_000;

/// Configuration for [`AuthService`](crate::AuthService).
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Attempts allowed per client key on the login endpoint.
    pub login_limit: Limit,
    /// Maximum token age in milliseconds.
    pub token_max_age_ms: i64,
    /// Maximum password length in characters.
    pub max_password_len: usize,
    /// Maximum number of client keys the login limiter remembers.
    pub max_tracked: usize,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            login_limit: Limit::LOGIN,
            token_max_age_ms: DEFAULT_MAX_AGE_MS,
            max_password_len: DEFAULT_MAX_PASSWORD_LEN,
            max_tracked: DEFAULT_MAX_TRACKED,
        }
    }
}

impl AuthConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the login rate limit.
    pub fn with_login_limit(mut self, limit: Limit) -> Self {
        self.login_limit = limit;
        self
    }

    /// Set the token max age.
    pub fn with_token_max_age(mut self, max_age_ms: i64) -> Self {
        self.token_max_age_ms = max_age_ms;
        self
    }

    /// Set the maximum password length.
    pub fn with_max_password_len(mut self, len: usize) -> Self {
        self.max_password_len = len;
        self
    }

    /// Set how many client keys the login limiter may track.
    pub fn with_max_tracked(mut self, max: usize) -> Self {
        self.max_tracked = max;
        self
    }
}
