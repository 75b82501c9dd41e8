use axum::{extract::State, Json};
use axum_extra::extract::cookie::CookieJar;
use chrono::{DateTime, Utc};
use sea_orm::{EntityTrait, QueryOrder};
use serde::Serialize;
use utoipa::ToSchema;

use crate::entities::user::{self, Role};
use crate::entities::User;
use crate::error::AppError;
use crate::session;
use crate::AppState;

/// User record as shown on the admin dashboard. Never carries the password hash.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdminUser {
    pub id: String,
    pub name: Option<String>,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// List all user accounts (admin only)
#[utoipa::path(
    get,
    path = "/api/admin/users",
    responses(
        (status = 200, description = "All users", body = Vec<AdminUser>),
        (status = 401, description = "No valid session"),
        (status = 403, description = "Caller is not an administrator")
    )
)]
#[tracing::instrument(skip(state, jar))]
pub async fn list_users(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<Json<Vec<AdminUser>>, AppError> {
    session::require_admin(&state.keys, &jar)?;

    let users = User::find()
        .order_by_asc(user::Column::CreatedAt)
        .all(&state.db)
        .await?;

    Ok(Json(
        users
            .into_iter()
            .map(|u| AdminUser {
                id: u.id,
                name: u.name,
                email: u.email,
                role: u.role,
                created_at: u.created_at,
            })
            .collect(),
    ))
}
