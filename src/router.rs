//! Axum integration: applies either middleware variant to a `Router`.
//!
//! The request path stands in for the operation name and the extracted
//! identity travels in request extensions, where the [`CurrentUser`] /
//! [`BearerToken`] extractors pick it up. Rejections render as status 401
//! with the [`AuthorizationError`] JSON body.

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Body,
    extract::{FromRequestParts, State},
    http::{Request, request::Parts},
    middleware::{self, Next},
    response::{IntoResponse, Response},
};

use crate::context::Context;
use crate::error::AuthorizationError;
use crate::jwt::JwtService;
use crate::transport::{self, BearerCheck, RequestMeta};

impl IntoResponse for AuthorizationError {
    fn into_response(self) -> Response {
        (axum::http::StatusCode::UNAUTHORIZED, Json(self)).into_response()
    }
}

/// Subject id of the authenticated caller, inserted by the jwt layer.
#[derive(Clone, Copy, Debug)]
pub struct CurrentUser(pub u64);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AuthorizationError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Absent means the auth layer never ran for this route.
        parts
            .extensions
            .get::<CurrentUser>()
            .copied()
            .ok_or_else(|| AuthorizationError::new(""))
    }
}

/// Raw bearer token of the current call, inserted by the token layer.
#[derive(Clone, Debug)]
pub struct BearerToken(pub String);

impl<S> FromRequestParts<S> for BearerToken
where
    S: Send + Sync,
{
    type Rejection = AuthorizationError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<BearerToken>()
            .cloned()
            .ok_or_else(|| AuthorizationError::new(""))
    }
}

#[derive(Clone)]
struct JwtLayer {
    service: JwtService,
    exempt: Arc<Vec<String>>,
}

/// Applies the signed-credential middleware to every route of `router`.
pub fn apply_jwt<S>(router: Router<S>, service: JwtService, exempt: Vec<String>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    let layer = JwtLayer {
        service,
        exempt: Arc::new(exempt),
    };
    router.layer(middleware::from_fn_with_state(layer, jwt_middleware))
}

async fn jwt_middleware(
    State(layer): State<JwtLayer>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AuthorizationError> {
    let ctx = bind_request(&req);

    match transport::resolve_bearer(&ctx, &layer.exempt)? {
        BearerCheck::Exempt => Ok(next.run(req).await),
        BearerCheck::Token(token) => {
            let user_id = layer
                .service
                .verify(&token)
                .map_err(|_| AuthorizationError::invalid_token())?;
            req.extensions_mut().insert(CurrentUser(user_id));
            Ok(next.run(req).await)
        }
    }
}

#[derive(Clone)]
struct TokenLayer {
    exempt: Arc<Vec<String>>,
}

/// Applies the opaque-token middleware to every route of `router`.
///
/// No service state is involved: the layer only extracts the bearer value,
/// so the exemption list is the whole configuration. Supplementary per-route
/// logic composes naturally as further axum layers, so unlike
/// [`TokenService::middleware`](crate::token::TokenService::middleware) no
/// explicit chain is taken here.
pub fn apply_token<S>(router: Router<S>, exempt: Vec<String>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    let layer = TokenLayer {
        exempt: Arc::new(exempt),
    };
    router.layer(middleware::from_fn_with_state(layer, token_middleware))
}

async fn token_middleware(
    State(layer): State<TokenLayer>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AuthorizationError> {
    let ctx = bind_request(&req);

    match transport::resolve_bearer(&ctx, &layer.exempt)? {
        BearerCheck::Exempt => Ok(next.run(req).await),
        BearerCheck::Token(token) => {
            req.extensions_mut().insert(BearerToken(token));
            Ok(next.run(req).await)
        }
    }
}

fn bind_request(req: &Request<Body>) -> Context {
    let meta = RequestMeta::new(req.uri().path(), req.headers().clone());
    transport::bind(&Context::new(), meta)
}
