//! Shared-secret authentication for a single site administrator.
//!
//! This crate provides:
//! - PBKDF2-HMAC-SHA256 password hashes stored as `iterations$salt$hash`
//! - Constant-time verification of candidate passwords
//! - Timestamped bearer tokens carrying the shared secret
//! - Fixed-window rate limiting keyed by client identity
//! - [`AuthService`], which ties the pieces together for HTTP handlers
//!
//! # Example
//!
//! ```rust
//! use admin_auth::{AuthConfig, AuthService, HashParams, StaticHashStore, hash_password_with};
//!
//! // Offline: hash the admin password and store the result.
//! let stored = hash_password_with("CorrectHorse", &HashParams::with_iterations(1_000));
//!
//! let auth = AuthService::new(StaticHashStore::new(stored), "CorrectHorse", AuthConfig::default());
//!
//! let grant = auth.login("CorrectHorse", "203.0.113.7").unwrap();
//! assert!(auth.authorize_request(&grant.token));
//! assert!(auth.login("wrong", "203.0.113.7").is_err());
//! ```

mod config;
mod error;
mod hash;
mod rate_limit;
mod schema;
mod service;
mod store;
pub mod token;

// Public re-exports
pub use config::{AuthConfig, DEFAULT_MAX_PASSWORD_LEN, DEFAULT_MAX_TRACKED};
pub use error::{AuthError, Result};
pub use hash::{
    DEFAULT_HASH_LEN, DEFAULT_ITERATIONS, DEFAULT_SALT_LEN, HashParams, MIN_ITERATIONS,
    StoredHash, hash_password, hash_password_with, verify_password,
};
pub use rate_limit::{Limit, MAX_WINDOW_MS, RateLimiter};
pub use schema::{ErrorBody, LoginRequest, LoginResponse};
pub use service::{AuthService, LoginGrant};
pub use store::{HashStore, StaticHashStore};
pub use token::{AdminToken, DEFAULT_MAX_AGE_MS};

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
