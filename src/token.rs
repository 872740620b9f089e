//! Opaque-token variant: server-issued random session handles.
//!
//! No cryptographic verification happens here; any syntactically valid
//! bearer value is accepted and injected into the context as-is. Validity is
//! the business of whatever session store a supplementary middleware (or the
//! handler itself) consults with the token already in scope.

use std::sync::Arc;

use uuid::Uuid;

use crate::context::Context;
use crate::error::ContextError;
use crate::middleware::{Handler, Middleware, chain, reject};
use crate::transport::{self, BearerCheck};

/// Opaque session-token generator + middleware factory.
#[derive(Clone, Copy, Debug, Default)]
pub struct TokenService;

impl TokenService {
    pub fn new() -> Self {
        Self
    }

    /// Returns a fresh 128-bit session token as 32 lowercase hex characters.
    ///
    /// The value carries no embedded claims; it is a pure lookup handle for
    /// an external session store.
    pub fn generate(&self) -> String {
        Uuid::new_v4().simple().to_string()
    }

    /// Builds the opaque-token middleware.
    ///
    /// Steps mirror the signed variant up to header extraction; the bearer
    /// value is then attached to the context unverified. `supplementary`
    /// middleware are composed around the next handler in list order (the
    /// first entry sits closest to the final handler) so they execute with
    /// the token already in scope. Exempted operations bypass the
    /// supplementary chain entirely.
    pub fn middleware<Req, Res>(
        &self,
        exempt: Vec<String>,
        supplementary: Vec<Middleware<Req, Res>>,
    ) -> Middleware<Req, Res>
    where
        Req: Send + 'static,
        Res: 'static,
    {
        let exempt = Arc::new(exempt);
        let supplementary = Arc::new(supplementary);

        Arc::new(move |next: Handler<Req, Res>| {
            let exempt = exempt.clone();
            let chained = chain(&supplementary, next.clone());

            Arc::new(move |ctx: Context, req: Req| {
                match transport::resolve_bearer(&ctx, &exempt) {
                    Ok(BearerCheck::Exempt) => next(ctx, req),
                    Ok(BearerCheck::Token(token)) => chained(with_token(&ctx, token), req),
                    Err(e) => reject(e),
                }
            })
        })
    }
}

// Private context key; distinct from the signed variant's subject key.
#[derive(Clone)]
struct SessionToken(String);

/// Returns a derived context carrying the raw bearer token.
pub fn with_token(ctx: &Context, token: String) -> Context {
    ctx.with_value(SessionToken(token))
}

/// Returns the raw token injected by the middleware, or a [`ContextError`]
/// if this call never passed it.
pub fn token(ctx: &Context) -> Result<String, ContextError> {
    ctx.value::<SessionToken>()
        .map(|t| t.0.clone())
        .ok_or_else(|| ContextError::new("token"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;

    use axum::http::{HeaderMap, HeaderValue, header};

    use crate::error::{AuthorizationError, ERR_INVALID_TOKEN, ERR_MISSING_TOKEN};
    use crate::middleware::{BoxError, handler_fn};
    use crate::transport::RequestMeta;

    fn call_ctx(operation: &str, auth: Option<&'static str>) -> Context {
        let mut headers = HeaderMap::new();
        if let Some(v) = auth {
            headers.insert(header::AUTHORIZATION, HeaderValue::from_static(v));
        }
        transport::bind(&Context::new(), RequestMeta::new(operation, headers))
    }

    fn token_handler() -> Handler<(), String> {
        handler_fn(|ctx, ()| async move { token(&ctx).map_err(BoxError::from) })
    }

    #[test]
    fn generated_tokens_are_32_lowercase_hex() {
        let service = TokenService::new();
        for _ in 0..100 {
            let t = service.generate();
            assert_eq!(t.len(), 32);
            assert!(t.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        }
    }

    #[test]
    fn generated_tokens_are_distinct() {
        let service = TokenService::new();
        let tokens: HashSet<String> = (0..1000).map(|_| service.generate()).collect();
        assert_eq!(tokens.len(), 1000);
    }

    #[tokio::test]
    async fn any_non_empty_bearer_is_accepted() {
        let service = TokenService::new();
        let handler = service.middleware(Vec::new(), Vec::new())(token_handler());

        let res = handler(call_ctx("/orders", Some("Bearer x")), ()).await;
        assert_eq!(res.unwrap(), "x");
    }

    #[tokio::test]
    async fn missing_header_is_rejected() {
        let service = TokenService::new();
        let handler = service.middleware(Vec::new(), Vec::new())(token_handler());

        let err = handler(call_ctx("/orders", None), ()).await.err().unwrap();
        let auth = err.downcast_ref::<AuthorizationError>().unwrap();
        assert_eq!(auth.message, ERR_MISSING_TOKEN);
    }

    #[tokio::test]
    async fn malformed_header_is_rejected() {
        let service = TokenService::new();
        let handler = service.middleware(Vec::new(), Vec::new())(token_handler());

        let err = handler(call_ctx("/orders", Some("Basic abc")), ())
            .await
            .err()
            .unwrap();
        let auth = err.downcast_ref::<AuthorizationError>().unwrap();
        assert_eq!(auth.message, ERR_INVALID_TOKEN);
    }

    #[tokio::test]
    async fn exempt_operation_skips_token_and_chain() {
        let service = TokenService::new();
        let hits = Arc::new(Mutex::new(0u32));

        let counting: Middleware<(), bool> = {
            let hits = hits.clone();
            Arc::new(move |next: Handler<(), bool>| {
                let hits = hits.clone();
                Arc::new(move |ctx: Context, req: ()| {
                    *hits.lock().unwrap() += 1;
                    next(ctx, req)
                })
            })
        };

        let handler = service.middleware(vec!["/health".to_string()], vec![counting])(
            handler_fn(|ctx, ()| async move { Ok(token(&ctx).is_ok()) }),
        );

        let res = handler(call_ctx("/health", None), ()).await.unwrap();
        assert!(!res, "exempt call must not carry a token");
        assert_eq!(*hits.lock().unwrap(), 0, "exempt call must bypass the chain");
    }

    #[tokio::test]
    async fn supplementary_chain_sees_token_in_order() {
        let service = TokenService::new();
        let log: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));

        let observer = |label: &'static str, log: Arc<Mutex<Vec<String>>>| -> Middleware<(), ()> {
            Arc::new(move |next: Handler<(), ()>| {
                let log = log.clone();
                Arc::new(move |ctx: Context, req: ()| {
                    // The token must already be in scope for the chain.
                    let t = token(&ctx).unwrap();
                    log.lock().unwrap().push(format!("{label}:{t}"));
                    next(ctx, req)
                })
            })
        };

        let handler = service.middleware(
            Vec::new(),
            vec![observer("first", log.clone()), observer("second", log.clone())],
        )({
            let log = log.clone();
            handler_fn(move |_ctx, ()| {
                let log = log.clone();
                async move {
                    log.lock().unwrap().push("handler".to_string());
                    Ok(())
                }
            })
        });

        handler(call_ctx("/orders", Some("Bearer s3ss10n")), ())
            .await
            .unwrap();

        // Last list entry runs first; the first entry is closest to the
        // final handler.
        assert_eq!(
            *log.lock().unwrap(),
            vec!["second:s3ss10n", "first:s3ss10n", "handler"]
        );
    }

    #[test]
    fn token_requires_injection() {
        assert!(token(&Context::new()).is_err());
        let ctx = with_token(&Context::new(), "abc".to_string());
        assert_eq!(token(&ctx).unwrap(), "abc");
    }
}
