//! API handlers and the state they share.

pub mod auth;
pub mod files;

pub use auth::*;
pub use files::*;

use std::sync::Arc;

use crate::quota::StorageQuota;
use crate::store::Backend;
use crate::web::error::ApiError;
use crate::web::middleware::JwtState;

/// Application state shared across handlers.
pub struct AppState<S> {
    /// The file store picked at startup.
    pub store: Arc<S>,
    /// Upload and total storage limits.
    pub quota: StorageQuota,
    /// Token handling; `None` when authentication is disabled.
    pub jwt: Option<Arc<JwtState>>,
}

// Derived Clone would require `S: Clone`.
impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            quota: self.quota,
            jwt: self.jwt.clone(),
        }
    }
}

impl<S: Backend> AppState<S> {
    /// State for an open deployment without accounts.
    pub fn new(store: Arc<S>, quota: StorageQuota) -> Self {
        Self {
            store,
            quota,
            jwt: None,
        }
    }

    /// Enable token authentication.
    pub fn with_auth(mut self, jwt: Arc<JwtState>) -> Self {
        self.jwt = Some(jwt);
        self
    }

    pub fn auth_enabled(&self) -> bool {
        self.jwt.is_some()
    }

    fn jwt(&self) -> Result<&Arc<JwtState>, ApiError> {
        self.jwt
            .as_ref()
            .ok_or_else(|| ApiError::not_found("Authentication is not enabled"))
    }
}

/// Parse a path id, answering 400 in the API's error shape.
pub(crate) fn parse_id(raw: &str) -> Result<i64, ApiError> {
    raw.trim()
        .parse()
        .map_err(|_| ApiError::bad_request(format!("Invalid id: {raw}")))
}
