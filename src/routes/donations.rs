use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use axum_extra::extract::cookie::CookieJar;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set, TransactionError,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entities::{donation, school, solar_panel, School, SolarPanel};
use crate::error::AppError;
use crate::session;
use crate::AppState;

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateDonationRequest {
    /// School whose panels are being claimed
    pub school_id: Option<i32>,
    /// Panel ids to claim; all must still be available
    pub panel_ids: Option<Vec<String>>,
    /// Total monetary value committed, must be positive
    pub donation_amount: Option<f64>,
    /// Optional display emblem chosen by the donor
    #[serde(default)]
    pub logo: Option<String>,
    /// Donor display name as entered in the form
    pub donor_name: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DonationResponse {
    pub id: String,
    pub amount: f64,
    pub logo: Option<String>,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}

impl From<donation::Model> for DonationResponse {
    fn from(donation: donation::Model) -> Self {
        DonationResponse {
            id: donation.id,
            amount: donation.amount,
            logo: donation.logo,
            user_id: donation.user_id,
            created_at: donation.created_at,
        }
    }
}

/// Commit a donation: claim panels, record the donation, bump the school's funded total
#[utoipa::path(
    post,
    path = "/api/donations",
    request_body = CreateDonationRequest,
    responses(
        (status = 201, description = "Donation committed", body = DonationResponse),
        (status = 400, description = "Missing or invalid fields"),
        (status = 401, description = "No valid session"),
        (status = 404, description = "School not found"),
        (status = 409, description = "One or more panels already claimed"),
        (status = 500, description = "Persistence failure, nothing committed")
    )
)]
#[tracing::instrument(skip(state, jar, body))]
pub async fn create_donation(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(body): Json<CreateDonationRequest>,
) -> Result<impl IntoResponse, AppError> {
    let caller = session::require_user(&state.keys, &jar)?;

    let school_id = body
        .school_id
        .ok_or_else(|| AppError::Validation("schoolId is required".to_string()))?;
    let panel_ids = match body.panel_ids {
        Some(ids) if !ids.is_empty() => ids,
        _ => {
            return Err(AppError::Validation(
                "panelIds must be a non-empty list".to_string(),
            ))
        }
    };
    let amount = match body.donation_amount {
        Some(a) if a > 0.0 => a,
        _ => {
            return Err(AppError::Validation(
                "donationAmount must be greater than zero".to_string(),
            ))
        }
    };
    // donorName is required by the form contract; the persisted display name
    // is resolved from the owning user
    if body.donor_name.as_deref().map_or(true, str::is_empty) {
        return Err(AppError::Validation("donorName is required".to_string()));
    }
    let logo = body.logo;
    let user_id = caller.id;
    let requested = panel_ids.len() as u64;

    // All three writes commit together or not at all. A panel set that cannot
    // be claimed in full aborts the transaction instead of silently shrinking.
    let result = state
        .db
        .transaction::<_, donation::Model, AppError>(move |txn| {
            Box::pin(async move {
                School::find_by_id(school_id)
                    .one(txn)
                    .await?
                    .ok_or_else(|| {
                        AppError::NotFound(format!("school {} does not exist", school_id))
                    })?;

                let now = Utc::now();
                let new_donation = donation::ActiveModel {
                    id: Set(Uuid::new_v4().to_string()),
                    amount: Set(amount),
                    logo: Set(logo),
                    user_id: Set(user_id),
                    created_at: Set(now),
                }
                .insert(txn)
                .await?;

                let claimed = SolarPanel::update_many()
                    .col_expr(
                        solar_panel::Column::DonationId,
                        Expr::value(new_donation.id.clone()),
                    )
                    .filter(solar_panel::Column::Id.is_in(panel_ids))
                    .filter(solar_panel::Column::SchoolId.eq(school_id))
                    .filter(solar_panel::Column::DonationId.is_null())
                    .exec(txn)
                    .await?;

                // Short count: a requested panel was already claimed, belongs
                // to another school, or does not exist. Roll everything back.
                if claimed.rows_affected != requested {
                    return Err(AppError::Conflict(
                        "one or more selected panels are no longer available".to_string(),
                    ));
                }

                School::update_many()
                    .col_expr(
                        school::Column::Funded,
                        Expr::col(school::Column::Funded).add(amount),
                    )
                    .col_expr(school::Column::UpdatedAt, Expr::value(now))
                    .filter(school::Column::Id.eq(school_id))
                    .exec(txn)
                    .await?;

                Ok(new_donation)
            })
        })
        .await;

    let committed = match result {
        Ok(donation) => donation,
        Err(TransactionError::Connection(e)) => return Err(AppError::from(e)),
        Err(TransactionError::Transaction(e)) => return Err(e),
    };

    tracing::info!(
        donation_id = %committed.id,
        school_id,
        amount,
        "donation committed"
    );

    Ok((StatusCode::CREATED, Json(DonationResponse::from(committed))))
}
