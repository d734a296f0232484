//! Error types for admin authentication.

use thiserror::Error;

/// Errors that can occur while authenticating the admin.
///
/// Several variants deliberately share a public message: callers must not be
/// able to tell a wrong password apart from a misconfigured deployment.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Request body or password failed validation.
    #[error("Invalid input: {0}")]
    InvalidInput(&'static str),

    /// Too many attempts from this client in the current window.
    #[error("Rate limit exceeded")]
    RateLimited,

    /// Wrong password, or a token that failed validation.
    #[error("Authentication failed")]
    AuthenticationFailed,

    /// Stored hash could not be parsed.
    #[error("Malformed stored hash: {0}")]
    MalformedHash(&'static str),

    /// Bearer token could not be decoded.
    #[error("Malformed token")]
    MalformedToken,

    /// The datastore holding the stored hash failed.
    #[error("Hash store error: {0}")]
    Store(String),

    /// Unexpected failure outside the authentication logic itself.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// HTTP status code this error maps to.
    pub fn status(&self) -> u16 {
        match self {
            AuthError::InvalidInput(_) => 400,
            AuthError::RateLimited => 429,
            AuthError::AuthenticationFailed
            | AuthError::MalformedToken
            | AuthError::MalformedHash(_)
            | AuthError::Store(_) => 401,
            AuthError::Internal(_) => 500,
        }
    }

    /// Message safe to return to an untrusted caller.
    pub fn public_message(&self) -> &'static str {
        match self {
            AuthError::InvalidInput(reason) => reason,
            AuthError::RateLimited => "Too many attempts. Please try again later.",
            AuthError::AuthenticationFailed
            | AuthError::MalformedToken
            | AuthError::MalformedHash(_)
            | AuthError::Store(_) => "Invalid credentials",
            AuthError::Internal(_) => "Internal server error",
        }
    }
}

/// Result type alias for admin authentication.
pub type Result<T> = std::result::Result<T, AuthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_failure_looks_like_wrong_password() {
        let store = AuthError::Store("connection refused".to_string());
        let wrong = AuthError::AuthenticationFailed;
        assert_eq!(store.status(), wrong.status());
        assert_eq!(store.public_message(), wrong.public_message());
    }

    #[test]
    fn test_public_message_hides_detail() {
        let err = AuthError::Internal("worker panicked at src/hash.rs".to_string());
        assert_eq!(err.status(), 500);
        assert!(!err.public_message().contains("hash.rs"));
    }

    #[test]
    fn test_input_errors_are_client_errors() {
        let err = AuthError::InvalidInput("Password is required");
        assert_eq!(err.status(), 400);
        assert_eq!(err.public_message(), "Password is required");
        assert_eq!(AuthError::RateLimited.status(), 429);
    }
}
