//! Per-call transport metadata and bearer-header extraction.
//!
//! The host transport resolves the operation name and header set for each
//! inbound call and binds them into the [`Context`] before any auth
//! middleware runs. A call with no bound metadata cannot be exempted or
//! authenticated and fails closed.

use axum::http::{HeaderMap, header};
use tracing::debug;

use crate::context::Context;
use crate::error::AuthorizationError;

pub const SCHEME_BEARER: &str = "Bearer";

/// Transport-resolved metadata for one inbound call.
#[derive(Clone, Debug)]
pub struct RequestMeta {
    operation: String,
    headers: HeaderMap,
}

impl RequestMeta {
    pub fn new(operation: impl Into<String>, headers: HeaderMap) -> Self {
        Self {
            operation: operation.into(),
            headers,
        }
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }
}

/// Binds transport metadata into a derived context.
pub fn bind(ctx: &Context, meta: RequestMeta) -> Context {
    ctx.with_value(meta)
}

/// Returns the transport metadata bound to `ctx`, if any.
pub fn from_context(ctx: &Context) -> Option<&RequestMeta> {
    ctx.value::<RequestMeta>()
}

/// Outcome of the shared exemption + header pipeline (steps 1-4 of both
/// middleware variants).
pub(crate) enum BearerCheck {
    /// Operation is on the exemption list; delegate without identity.
    Exempt,
    /// Syntactically valid `Bearer <value>` header; value not yet verified.
    Token(String),
}

/// Resolves the bearer value for the current call.
///
/// - no transport metadata, absent or empty `Authorization` header
///   -> `missing token`
/// - anything other than exactly `Bearer <non-empty value>` (scheme is
///   case-sensitive, split on the first space only) -> `invalid token`
pub(crate) fn resolve_bearer(
    ctx: &Context,
    exempt: &[String],
) -> Result<BearerCheck, AuthorizationError> {
    let Some(meta) = from_context(ctx) else {
        debug!("no transport metadata bound to context");
        return Err(AuthorizationError::missing_token());
    };

    if exempt.iter().any(|op| op == meta.operation()) {
        return Ok(BearerCheck::Exempt);
    }

    let value = match meta.headers().get(header::AUTHORIZATION) {
        None => {
            debug!(operation = meta.operation(), "authorization header absent");
            return Err(AuthorizationError::missing_token());
        }
        Some(v) => v
            .to_str()
            .map_err(|_| AuthorizationError::invalid_token())?,
    };

    if value.is_empty() {
        return Err(AuthorizationError::missing_token());
    }

    let Some((scheme, token)) = value.split_once(' ') else {
        debug!(operation = meta.operation(), "malformed authorization header");
        return Err(AuthorizationError::invalid_token());
    };

    if scheme != SCHEME_BEARER || token.is_empty() {
        debug!(operation = meta.operation(), "unsupported authorization scheme");
        return Err(AuthorizationError::invalid_token());
    }

    Ok(BearerCheck::Token(token.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    use crate::error::{ERR_INVALID_TOKEN, ERR_MISSING_TOKEN};

    fn ctx_with(operation: &str, auth: Option<&'static str>) -> Context {
        let mut headers = HeaderMap::new();
        if let Some(v) = auth {
            headers.insert(header::AUTHORIZATION, HeaderValue::from_static(v));
        }
        bind(&Context::new(), RequestMeta::new(operation, headers))
    }

    fn message(res: Result<BearerCheck, AuthorizationError>) -> String {
        res.err().expect("expected rejection").message
    }

    #[test]
    fn missing_metadata_fails_closed() {
        let err = resolve_bearer(&Context::new(), &[]).err().unwrap();
        assert_eq!(err.message, ERR_MISSING_TOKEN);
    }

    #[test]
    fn exempt_operation_skips_header_checks() {
        let ctx = ctx_with("/health", None);
        let res = resolve_bearer(&ctx, &["/health".to_string()]);
        assert!(matches!(res, Ok(BearerCheck::Exempt)));
    }

    #[test]
    fn exemption_is_exact_match() {
        let ctx = ctx_with("/healthz", None);
        let res = resolve_bearer(&ctx, &["/health".to_string()]);
        assert_eq!(message(res), ERR_MISSING_TOKEN);
    }

    #[test]
    fn absent_header_is_missing_token() {
        let res = resolve_bearer(&ctx_with("/orders", None), &[]);
        assert_eq!(message(res), ERR_MISSING_TOKEN);
    }

    #[test]
    fn empty_header_is_missing_token() {
        let res = resolve_bearer(&ctx_with("/orders", Some("")), &[]);
        assert_eq!(message(res), ERR_MISSING_TOKEN);
    }

    #[test]
    fn wrong_scheme_is_invalid_token() {
        let res = resolve_bearer(&ctx_with("/orders", Some("Basic abc")), &[]);
        assert_eq!(message(res), ERR_INVALID_TOKEN);
    }

    #[test]
    fn scheme_is_case_sensitive() {
        let res = resolve_bearer(&ctx_with("/orders", Some("bearer abc")), &[]);
        assert_eq!(message(res), ERR_INVALID_TOKEN);
    }

    #[test]
    fn missing_space_is_invalid_token() {
        let res = resolve_bearer(&ctx_with("/orders", Some("Bearer")), &[]);
        assert_eq!(message(res), ERR_INVALID_TOKEN);
    }

    #[test]
    fn empty_value_is_invalid_token() {
        let res = resolve_bearer(&ctx_with("/orders", Some("Bearer ")), &[]);
        assert_eq!(message(res), ERR_INVALID_TOKEN);
    }

    #[test]
    fn split_is_on_first_space_only() {
        let ctx = ctx_with("/orders", Some("Bearer a b c"));
        match resolve_bearer(&ctx, &[]) {
            Ok(BearerCheck::Token(t)) => assert_eq!(t, "a b c"),
            _ => panic!("expected token"),
        }
    }

    #[test]
    fn well_formed_header_yields_token() {
        let ctx = ctx_with("/orders", Some("Bearer abc.def.ghi"));
        match resolve_bearer(&ctx, &[]) {
            Ok(BearerCheck::Token(t)) => assert_eq!(t, "abc.def.ghi"),
            _ => panic!("expected token"),
        }
    }
}
