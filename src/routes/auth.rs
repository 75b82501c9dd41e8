use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entities::user::{self, Role};
use crate::entities::User;
use crate::error::AppError;
use crate::session::{self, SessionUser};
use crate::AppState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterRequest {
    /// Display name of the new user
    pub name: Option<String>,
    /// Email address, unique per account
    pub email: Option<String>,
    /// Plaintext password, stored only as a bcrypt hash
    pub password: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RegisteredUser {
    pub id: String,
    pub name: Option<String>,
    pub email: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuthenticatedUser {
    pub id: String,
    pub name: Option<String>,
    pub email: String,
    pub role: Role,
}

/// Register a new user account
#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User created", body = RegisteredUser),
        (status = 400, description = "Missing required fields"),
        (status = 409, description = "Email already registered")
    )
)]
#[tracing::instrument(skip(state, body))]
pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let (name, email, password) = match (body.name, body.email, body.password) {
        (Some(n), Some(e), Some(p)) if !n.is_empty() && !e.is_empty() && !p.is_empty() => (n, e, p),
        _ => {
            return Err(AppError::Validation(
                "name, email and password are required".to_string(),
            ))
        }
    };

    let existing = User::find()
        .filter(user::Column::Email.eq(&email))
        .one(&state.db)
        .await?;
    if existing.is_some() {
        return Err(AppError::Conflict(
            "a user with this email already exists".to_string(),
        ));
    }

    // bcrypt is deliberately slow; keep it off the async workers
    let hashed = tokio::task::spawn_blocking(move || bcrypt::hash(password, bcrypt::DEFAULT_COST))
        .await
        .map_err(|e| AppError::InternalError(e.to_string()))?
        .map_err(|e| AppError::InternalError(format!("failed to hash password: {}", e)))?;

    let now = Utc::now();
    let created = user::ActiveModel {
        id: Set(Uuid::new_v4().to_string()),
        email: Set(email),
        name: Set(Some(name)),
        password: Set(hashed),
        role: Set(Role::User),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&state.db)
    .await?;

    tracing::info!(user_id = %created.id, "registered new user");

    Ok((
        StatusCode::CREATED,
        Json(RegisteredUser {
            id: created.id,
            name: created.name,
            email: created.email,
        }),
    ))
}

/// Log in and receive a signed session cookie
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in, session cookie set", body = AuthenticatedUser),
        (status = 400, description = "Missing required fields"),
        (status = 401, description = "Invalid credentials")
    )
)]
#[tracing::instrument(skip(state, jar, body))]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(body): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let (email, password) = match (body.email, body.password) {
        (Some(e), Some(p)) if !e.is_empty() && !p.is_empty() => (e, p),
        _ => {
            return Err(AppError::Validation(
                "email and password are required".to_string(),
            ))
        }
    };

    let found = User::find()
        .filter(user::Column::Email.eq(&email))
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::Unauthorized("invalid credentials".to_string()))?;

    let hash = found.password.clone();
    let valid = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|e| AppError::InternalError(e.to_string()))?
        .map_err(|e| AppError::InternalError(format!("failed to verify password: {}", e)))?;
    if !valid {
        return Err(AppError::Unauthorized("invalid credentials".to_string()));
    }

    let cookie = session::issue_cookie(&state.keys, &found)?;
    tracing::info!(user_id = %found.id, "user logged in");

    Ok((
        jar.add(cookie),
        Json(AuthenticatedUser {
            id: found.id,
            name: found.name,
            email: found.email,
            role: found.role,
        }),
    ))
}

/// Log out by expiring the session cookie
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    responses((status = 200, description = "Session cleared"))
)]
pub async fn logout(jar: CookieJar) -> impl IntoResponse {
    (
        jar.add(session::expired_cookie()),
        Json(json!({ "message": "Logged out successfully" })),
    )
}

/// Return the current session user, or null for anonymous callers
#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses((status = 200, description = "Current session user, or null for anonymous callers", body = SessionUser))
)]
pub async fn me(State(state): State<AppState>, jar: CookieJar) -> Json<Option<SessionUser>> {
    Json(session::authenticate(&state.keys, &jar))
}
