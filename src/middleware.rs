//! Handler and middleware composition primitives.
//!
//! A handler is a boxed async function from `(Context, Req)` to
//! `Result<Res, BoxError>`; middleware transforms one handler into another.
//! Both are `Arc`ed so a constructed chain can be applied to many calls.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::context::Context;
use crate::error::AuthorizationError;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Terminal (or already-wrapped) request handler.
pub type Handler<Req, Res> =
    Arc<dyn Fn(Context, Req) -> BoxFuture<'static, Result<Res, BoxError>> + Send + Sync>;

/// A handler-transforming step.
pub type Middleware<Req, Res> = Arc<dyn Fn(Handler<Req, Res>) -> Handler<Req, Res> + Send + Sync>;

/// Wraps an async closure into a [`Handler`].
pub fn handler_fn<Req, Res, F, Fut>(f: F) -> Handler<Req, Res>
where
    F: Fn(Context, Req) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Res, BoxError>> + Send + 'static,
{
    Arc::new(move |ctx, req| Box::pin(f(ctx, req)))
}

/// Applies `middlewares` around `handler` in list order: the first entry is
/// applied first and ends up closest to the final handler, so at call time
/// the last entry runs first and the first entry runs last before the
/// handler itself.
pub fn chain<Req, Res>(
    middlewares: &[Middleware<Req, Res>],
    handler: Handler<Req, Res>,
) -> Handler<Req, Res> {
    let mut handler = handler;
    for m in middlewares {
        handler = m(handler);
    }
    handler
}

/// Short-circuits a call with an [`AuthorizationError`].
pub(crate) fn reject<Res>(err: AuthorizationError) -> BoxFuture<'static, Result<Res, BoxError>>
where
    Res: 'static,
{
    Box::pin(async move { Err(err.into()) })
}
