//! Signed-credential variant: HMAC-signed bearer tokens carrying a subject id.
//!
//! [`JwtService`] is both the credential codec (sign/verify) and the
//! middleware factory. Credentials are HS256-signed claims
//! `{"userID", "iat", "exp", "extra"}` with a fixed 30-day lifetime; on
//! verify, only HMAC-family algorithms are accepted so a token cannot
//! substitute its own algorithm.

use std::fmt;
use std::sync::Arc;

use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, warn};

use crate::context::Context;
use crate::error::{AuthorizationError, ContextError};
use crate::middleware::{Handler, Middleware, reject};
use crate::transport::{self, BearerCheck};

const TOKEN_TTL_DAYS: i64 = 30;
const SECRET_LEN: usize = 32;

#[derive(Debug, Error)]
pub enum JwtError {
    #[error("failed to generate secret: {0}")]
    Entropy(getrandom::Error),
    #[error("failed to sign claims: {0}")]
    Sign(#[source] jsonwebtoken::errors::Error),
    #[error("failed to serialize extra claims: {0}")]
    Extra(#[source] serde_json::Error),
    #[error("invalid token")]
    InvalidToken,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    #[serde(rename = "userID")]
    user_id: u64,
    exp: i64,
    iat: i64,
    #[serde(default)]
    extra: serde_json::Value,
}

/// HMAC credential codec + middleware factory.
///
/// The secret is set once at construction and shared read-only by all calls;
/// there is no in-process rotation.
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl fmt::Debug for JwtService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Do not print key material
        f.debug_struct("JwtService")
            .field("validation", &self.validation)
            .finish()
    }
}

impl JwtService {
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // HMAC family only; any other declared algorithm is rejected before
        // signature verification.
        validation.algorithms = vec![Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];
        // Not-yet-valid tokens are invalid. Tokens minted by `sign` carry no
        // `nbf`, so this only applies to foreign credentials that do.
        validation.validate_nbf = true;

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    /// Returns 32 bytes of cryptographically secure random material, suitable
    /// as a signing secret. Persisting it is the caller's responsibility.
    pub fn new_secret() -> Result<[u8; SECRET_LEN], JwtError> {
        let mut secret = [0u8; SECRET_LEN];
        getrandom::fill(&mut secret).map_err(JwtError::Entropy)?;
        Ok(secret)
    }

    /// Signs a credential for `user_id` with a 30-day expiry.
    ///
    /// `extra` is an opaque caller-supplied payload carried alongside the
    /// standard claims; it is not interpreted on verify.
    pub fn sign<T: Serialize>(&self, user_id: u64, extra: T) -> Result<String, JwtError> {
        let now = Utc::now();
        let claims = Claims {
            user_id,
            exp: (now + Duration::days(TOKEN_TTL_DAYS)).timestamp(),
            iat: now.timestamp(),
            extra: serde_json::to_value(extra).map_err(JwtError::Extra)?,
        };

        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key).map_err(
            |e| {
                error!(error = %e, "failed to sign credential");
                JwtError::Sign(e)
            },
        )
    }

    /// Verifies a credential and extracts the subject id.
    ///
    /// Signature, declared algorithm, time validity (expired or not yet
    /// valid) and claim shape are all checked;
    /// every failure collapses to [`JwtError::InvalidToken`] so the cause is
    /// not distinguishable by the caller.
    pub fn verify(&self, token: &str) -> Result<u64, JwtError> {
        match jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &self.validation) {
            Ok(data) => Ok(data.claims.user_id),
            Err(e) => {
                warn!(error = %e, "credential verification failed");
                Err(JwtError::InvalidToken)
            }
        }
    }

    /// Builds the signed-credential middleware.
    ///
    /// Operations on `exempt` (exact match) delegate directly with no
    /// identity injected. Everything else must present a verifiable
    /// `Authorization: Bearer <credential>`; on success the subject id is
    /// attached to the context handed to the next handler.
    pub fn middleware<Req, Res>(&self, exempt: Vec<String>) -> Middleware<Req, Res>
    where
        Req: Send + 'static,
        Res: 'static,
    {
        let service = self.clone();
        let exempt = Arc::new(exempt);

        Arc::new(move |next: Handler<Req, Res>| {
            let service = service.clone();
            let exempt = exempt.clone();

            Arc::new(move |ctx: Context, req: Req| {
                let token = match transport::resolve_bearer(&ctx, &exempt) {
                    Ok(BearerCheck::Exempt) => return next(ctx, req),
                    Ok(BearerCheck::Token(token)) => token,
                    Err(e) => return reject(e),
                };

                match service.verify(&token) {
                    Ok(user_id) => next(with_user_id(&ctx, user_id), req),
                    Err(_) => reject(AuthorizationError::invalid_token()),
                }
            })
        })
    }
}

// Private context key; distinct from the opaque variant's token key.
#[derive(Clone, Copy)]
struct UserId(u64);

/// Returns a derived context carrying `user_id`.
pub fn with_user_id(ctx: &Context, user_id: u64) -> Context {
    ctx.with_value(UserId(user_id))
}

/// Returns the subject id injected by the middleware, or a
/// [`ContextError`] if this call never passed it.
pub fn user_id(ctx: &Context) -> Result<u64, ContextError> {
    ctx.value::<UserId>()
        .map(|id| id.0)
        .ok_or_else(|| ContextError::new("user id"))
}
