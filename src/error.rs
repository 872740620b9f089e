//! Error types surfaced by the middleware.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

pub const ERR_MISSING_TOKEN: &str = "missing token";
pub const ERR_INVALID_TOKEN: &str = "invalid token";

/// Structured 401 returned for every credential failure.
///
/// Distinct internal causes (absent header, wrong scheme, signature mismatch,
/// expiry) are collapsed into the two fixed messages so verification detail
/// never leaks to callers.
#[derive(Clone, Debug, Serialize)]
pub struct AuthorizationError {
    pub code: u16,
    pub message: String,
}

impl AuthorizationError {
    pub fn new(message: impl Into<String>) -> Self {
        let message = message.into();
        let message = if message.is_empty() {
            "Unauthorized".to_string()
        } else {
            message
        };
        Self { code: 401, message }
    }

    pub fn missing_token() -> Self {
        Self::new(ERR_MISSING_TOKEN)
    }

    pub fn invalid_token() -> Self {
        Self::new(ERR_INVALID_TOKEN)
    }
}

impl fmt::Display for AuthorizationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The string form doubles as the HTTP response body for
        // unauthenticated calls, so it must be well-formed JSON.
        let body = serde_json::json!({ "code": self.code, "message": self.message });
        write!(f, "{body}")
    }
}

impl std::error::Error for AuthorizationError {}

/// Identity was requested from a context that never passed the middleware.
///
/// This is a programming/ordering error local to the calling code, not a
/// request error, and is never serialized to the transport.
#[derive(Debug, Error)]
#[error("failed to get {0} from context")]
pub struct ContextError(&'static str);

impl ContextError {
    pub(crate) fn new(what: &'static str) -> Self {
        Self(what)
    }
}
