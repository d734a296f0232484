//! Admin login and request authorization.

use std::fmt;
use std::sync::{Arc, OnceLock};

use zeroize::Zeroizing;

use crate::config::AuthConfig;
use crate::error::{AuthError, Result};
use crate::hash::{StoredHash, hash_password, verify_password};
use crate::rate_limit::RateLimiter;
use crate::schema::LoginRequest;
use crate::store::HashStore;
use crate::token;

/// Successful login result.
pub struct LoginGrant {
    /// Bearer token for privileged requests.
    pub token: String,
}

impl fmt::Debug for LoginGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginGrant")
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Gate in front of every privileged operation.
///
/// Holds the login rate limiter, the hash store and the expected token
/// secret. Shared across request handlers behind an `Arc`.
pub struct AuthService {
    store: Box<dyn HashStore + Send + Sync>,
    limiter: Arc<RateLimiter>,
    secret: Zeroizing<String>,
    config: AuthConfig,
}

impl AuthService {
    /// Create a service.
    ///
    /// `secret` is the material embedded in issued tokens and expected back
    /// on privileged requests.
    pub fn new<S>(store: S, secret: impl Into<String>, config: AuthConfig) -> Self
    where
        S: HashStore + Send + Sync + 'static,
    {
        let limiter =
            RateLimiter::new(config.login_limit).with_max_tracked(config.max_tracked);
        // Derive the decoy now so the first failed lookup costs one KDF run.
        decoy_hash();
        Self {
            store: Box::new(store),
            limiter: Arc::new(limiter),
            secret: Zeroizing::new(secret.into()),
            config,
        }
    }

    /// Limiter guarding the login endpoint.
    pub fn login_limiter(&self) -> Arc<RateLimiter> {
        Arc::clone(&self.limiter)
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Check a password for `client_key` and issue a token on success.
    pub fn login(&self, password: &str, client_key: &str) -> Result<LoginGrant> {
        self.login_at(password, client_key, crate::now_millis())
    }

    pub fn login_at(&self, password: &str, client_key: &str, now_ms: i64) -> Result<LoginGrant> {
        self.admit(client_key, now_ms)?;
        self.authenticate(password, client_key, now_ms)
    }

    /// Same as [`login`](Self::login) for a raw JSON request body.
    ///
    /// The attempt is counted before the body is parsed, so malformed bodies
    /// consume the client's allowance too.
    pub fn login_request(&self, body: &[u8], client_key: &str) -> Result<LoginGrant> {
        self.login_request_at(body, client_key, crate::now_millis())
    }

    pub fn login_request_at(
        &self,
        body: &[u8],
        client_key: &str,
        now_ms: i64,
    ) -> Result<LoginGrant> {
        self.admit(client_key, now_ms)?;
        let request = LoginRequest::from_json(body)?;
        self.authenticate(&request.password, client_key, now_ms)
    }

    /// Whether `token` grants access to privileged operations.
    pub fn authorize_request(&self, token: &str) -> bool {
        self.authorize_request_at(token, crate::now_millis())
    }

    pub fn authorize_request_at(&self, token: &str, now_ms: i64) -> bool {
        token::validate(token, &self.secret, now_ms, self.config.token_max_age_ms)
    }

    fn admit(&self, client_key: &str, now_ms: i64) -> Result<()> {
        if self.limiter.check_and_consume_at(client_key, now_ms) {
            Ok(())
        } else {
            Err(AuthError::RateLimited)
        }
    }

    fn authenticate(&self, password: &str, client_key: &str, now_ms: i64) -> Result<LoginGrant> {
        if password.is_empty() {
            return Err(AuthError::InvalidInput("Password is required"));
        }
        if password.chars().count() > self.config.max_password_len {
            return Err(AuthError::InvalidInput("Invalid password"));
        }

        let stored = match self.store.password_hash() {
            Ok(stored) => stored,
            Err(e) => {
                log::error!("Failed to fetch admin password hash: {}", e);
                burn_decoy(password);
                return Err(AuthError::AuthenticationFailed);
            }
        };
        let stored = match stored.parse::<StoredHash>() {
            Ok(parsed) => parsed,
            Err(e) => {
                log::error!("Stored admin password hash is unusable: {}", e);
                burn_decoy(password);
                return Err(AuthError::AuthenticationFailed);
            }
        };

        if !stored.matches(password) {
            log::info!("Admin login rejected for client {}", client_key);
            return Err(AuthError::AuthenticationFailed);
        }

        if self.secret.is_empty() {
            log::error!("Admin token secret is not configured");
            return Err(AuthError::AuthenticationFailed);
        }

        self.limiter.reset(client_key);
        log::info!("Admin login succeeded for client {}", client_key);

        Ok(LoginGrant {
            token: token::issue(&self.secret, now_ms),
        })
    }
}

/// Run one full KDF check so a broken configuration answers as slowly as a
/// wrong password.
fn burn_decoy(password: &str) {
    #[cfg(test)]
    tests::DECOY_RUNS.with(|runs| runs.set(runs.get() + 1));
    verify_password(password, decoy_hash());
}

fn decoy_hash() -> &'static str {
    static DECOY: OnceLock<String> = OnceLock::new();
    DECOY.get_or_init(|| hash_password("decoy password never used"))
}
