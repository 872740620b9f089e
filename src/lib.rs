//! Bearer-credential authentication middleware for service handlers.
//!
//! Two variants share the same header/exemption pipeline:
//!
//! - [`jwt::JwtService`] verifies HMAC-signed credentials and injects the
//!   subject id into the request [`Context`].
//! - [`token::TokenService`] accepts any non-empty bearer value as an opaque
//!   session handle and injects the raw token, optionally composing a
//!   supplementary middleware chain around the final handler.
//!
//! The host transport binds per-request metadata (operation name + headers)
//! into the context before the middleware runs:
//!
//! ```ignore
//! let service = JwtService::new(&secret);
//! let auth = service.middleware(vec!["/health".to_string()]);
//! let handler = auth(handler_fn(|ctx, req: MyRequest| async move {
//!     let user_id = jwt::user_id(&ctx)?;
//!     // ...
//! }));
//!
//! let ctx = transport::bind(&Context::new(), RequestMeta::new(operation, headers));
//! let res = handler(ctx, req).await;
//! ```
//!
//! Rejections surface as [`AuthorizationError`], whose string form is the
//! JSON body expected by the transport's error writer. The `router` module
//! applies either variant to an axum `Router` directly.

pub mod context;
pub mod error;
pub mod jwt;
pub mod middleware;
pub mod router;
pub mod token;
pub mod transport;

pub use context::Context;
pub use error::{AuthorizationError, ContextError};
pub use middleware::{BoxError, BoxFuture, Handler, Middleware, chain, handler_fn};
pub use transport::RequestMeta;
