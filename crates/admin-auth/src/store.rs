//! Access to the stored admin password hash.

use crate::error::{AuthError, Result};

/// Read-only source of the single admin password hash.
pub trait HashStore {
    /// Fetch the current stored hash string.
    fn password_hash(&self) -> Result<String>;
}

/// Fixed hash held in memory.
#[derive(Debug, Clone)]
pub struct StaticHashStore {
    hash: Option<String>,
}

impl StaticHashStore {
    pub fn new(hash: impl Into<String>) -> Self {
        Self {
            hash: Some(hash.into()),
        }
    }

    /// A store with nothing configured; every lookup fails.
    pub fn empty() -> Self {
        Self { hash: None }
    }
}

impl HashStore for StaticHashStore {
    fn password_hash(&self) -> Result<String> {
        self.hash
            .clone()
            .ok_or_else(|| AuthError::Store("no admin password hash configured".to_string()))
    }
}
