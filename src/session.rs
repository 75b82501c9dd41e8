//! Signed session cookies and the role gate.
//!
//! The session cookie carries an HS256-signed token rather than raw user JSON,
//! so a tampered or forged cookie is indistinguishable from no session at all.
//! Every protected handler goes through `require_user` / `require_admin`;
//! there is no per-route path matching anywhere else.

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::entities::user::{self, Role};
use crate::error::AppError;

pub const SESSION_COOKIE: &str = "session";
const SESSION_TTL_HOURS: i64 = 24;

/// HMAC key pair derived from `SESSION_SECRET`.
#[derive(Clone)]
pub struct Keys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl Keys {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }
}

/// The authenticated identity a valid session resolves to.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SessionUser {
    pub id: String,
    pub name: Option<String>,
    pub email: String,
    pub role: Role,
}

#[derive(Serialize, Deserialize)]
struct Claims {
    sub: String,
    name: Option<String>,
    email: String,
    role: Role,
    exp: i64,
}

/// Build the session cookie for a freshly authenticated user.
pub fn issue_cookie(keys: &Keys, user: &user::Model) -> Result<Cookie<'static>, AppError> {
    let claims = Claims {
        sub: user.id.clone(),
        name: user.name.clone(),
        email: user.email.clone(),
        role: user.role.clone(),
        exp: (Utc::now() + Duration::hours(SESSION_TTL_HOURS)).timestamp(),
    };
    let token = encode(&Header::default(), &claims, &keys.encoding)
        .map_err(|e| AppError::InternalError(format!("failed to sign session token: {}", e)))?;

    Ok(Cookie::build((SESSION_COOKIE, token))
        .http_only(true)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(time::Duration::hours(SESSION_TTL_HOURS))
        .build())
}

/// An already-expired cookie that clears the session on the client.
pub fn expired_cookie() -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, ""))
        .http_only(true)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(time::Duration::ZERO)
        .build()
}

/// Resolve the request's session, if any. A missing, malformed, badly signed
/// or expired token all mean the caller is anonymous.
pub fn authenticate(keys: &Keys, jar: &CookieJar) -> Option<SessionUser> {
    let token = jar.get(SESSION_COOKIE)?.value().to_owned();
    match decode::<Claims>(&token, &keys.decoding, &Validation::default()) {
        Ok(data) => Some(SessionUser {
            id: data.claims.sub,
            name: data.claims.name,
            email: data.claims.email,
            role: data.claims.role,
        }),
        Err(e) => {
            tracing::debug!("rejecting session token: {}", e);
            None
        }
    }
}

pub fn require_user(keys: &Keys, jar: &CookieJar) -> Result<SessionUser, AppError> {
    authenticate(keys, jar)
        .ok_or_else(|| AppError::Unauthorized("please log in to continue".to_string()))
}

pub fn require_admin(keys: &Keys, jar: &CookieJar) -> Result<SessionUser, AppError> {
    let session = require_user(keys, jar)?;
    if session.role != Role::Admin {
        return Err(AppError::Forbidden(
            "administrator access required".to_string(),
        ));
    }
    Ok(session)
}
