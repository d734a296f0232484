//! Wire schemas for the login endpoint.

use serde::{Deserialize, Serialize};

use crate::error::{AuthError, Result};

/// Body of `POST /auth/verify`.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub password: String,
}

impl LoginRequest {
    /// Decode a JSON body. A missing, non-string or unparseable password is
    /// a client error.
    pub fn from_json(body: &[u8]) -> Result<Self> {
        serde_json::from_slice(body).map_err(|_| AuthError::InvalidInput("Password is required"))
    }
}

/// Response of `POST /auth/verify`.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoginResponse {
    pub authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
}

impl LoginResponse {
    pub fn granted(token: String) -> Self {
        Self {
            authenticated: true,
            token: Some(token),
            error: None,
        }
    }

    pub fn denied(err: &AuthError) -> Self {
        Self {
            authenticated: false,
            token: None,
            error: Some(err.public_message().to_string()),
        }
    }
}

/// Generic error body for guarded routes.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

impl ErrorBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_login_request() {
        let req = LoginRequest::from_json(br#"{"password":"hunter2"}"#).unwrap();
        assert_eq!(req.password, "hunter2");
    }

    #[test]
    fn test_missing_password_defaults_to_empty() {
        let req = LoginRequest::from_json(b"{}").unwrap();
        assert!(req.password.is_empty());
    }

    #[test]
    fn test_non_string_password_is_input_error() {
        let result = LoginRequest::from_json(br#"{"password":12345}"#);
        assert!(matches!(result, Err(AuthError::InvalidInput(_))));
        let result = LoginRequest::from_json(b"not json");
        assert!(matches!(result, Err(AuthError::InvalidInput(_))));
    }

    #[test]
    fn test_granted_response_shape() {
        let json = serde_json::to_string(&LoginResponse::granted("tok".to_string())).unwrap();
        assert_eq!(json, r#"{"authenticated":true,"token":"tok"}"#);
    }

    #[test]
    fn test_denied_response_shape() {
        let json = serde_json::to_string(&LoginResponse::denied(&AuthError::RateLimited)).unwrap();
        assert_eq!(
            json,
            r#"{"authenticated":false,"error":"Too many attempts. Please try again later."}"#
        );
    }
}
