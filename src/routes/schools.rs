use std::collections::HashMap;

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use serde::Serialize;
use utoipa::ToSchema;

use crate::entities::{school, solar_panel, Donation, School, SolarPanel, User};
use crate::error::AppError;
use crate::grid::{self, ClaimedPanel, GridSection};
use crate::AppState;

/// A school record with its derived funding percentage.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SchoolResponse {
    pub id: i32,
    pub name: String,
    pub address: String,
    pub logo: Option<String>,
    pub description: Option<String>,
    pub goal: f64,
    pub funded: f64,
    pub percentage: i64,
    pub panel_grid_configs: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<school::Model> for SchoolResponse {
    fn from(school: school::Model) -> Self {
        let percentage = funding_percentage(school.funded, school.goal);
        SchoolResponse {
            id: school.id,
            name: school.name,
            address: school.address,
            logo: school.logo,
            description: school.description,
            goal: school.goal,
            funded: school.funded,
            percentage,
            panel_grid_configs: school.panel_grid_configs,
            created_at: school.created_at,
            updated_at: school.updated_at,
        }
    }
}

/// Percentage of the funding goal reached, rounded to the nearest integer.
/// Zero-goal schools report 0 rather than dividing by zero.
pub fn funding_percentage(funded: f64, goal: f64) -> i64 {
    if goal > 0.0 {
        (funded / goal * 100.0).round() as i64
    } else {
        0
    }
}

/// List all schools ordered by id
#[utoipa::path(
    get,
    path = "/api/schools",
    responses((status = 200, description = "All schools with funding percentages", body = Vec<SchoolResponse>))
)]
#[tracing::instrument(skip(state))]
pub async fn list_schools(
    State(state): State<AppState>,
) -> Result<Json<Vec<SchoolResponse>>, AppError> {
    let schools = School::find()
        .order_by_asc(school::Column::Id)
        .all(&state.db)
        .await?;
    Ok(Json(schools.into_iter().map(SchoolResponse::from).collect()))
}

/// Fetch a single school
#[utoipa::path(
    get,
    path = "/api/schools/{id}",
    params(("id" = i32, Path, description = "School id")),
    responses(
        (status = 200, description = "School with funding percentage", body = SchoolResponse),
        (status = 404, description = "School not found")
    )
)]
#[tracing::instrument(skip(state))]
pub async fn get_school(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<SchoolResponse>, AppError> {
    let school = School::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("school {} does not exist", id)))?;
    Ok(Json(SchoolResponse::from(school)))
}

/// Render-ready panel grid for a school
#[utoipa::path(
    get,
    path = "/api/schools/{id}/panels",
    params(("id" = i32, Path, description = "School id")),
    responses(
        (status = 200, description = "Per-sub-grid cell matrices with donor info", body = Vec<GridSection>),
        (status = 404, description = "School not found")
    )
)]
#[tracing::instrument(skip(state))]
pub async fn school_panels(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<Vec<GridSection>>, AppError> {
    let school = School::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("school {} does not exist", id)))?;
    let configs = grid::parse_grid_configs(&school.panel_grid_configs)?;

    let claimed_rows = SolarPanel::find()
        .filter(solar_panel::Column::SchoolId.eq(id))
        .filter(solar_panel::Column::DonationId.is_not_null())
        .find_also_related(Donation)
        .all(&state.db)
        .await?;

    // Donor display names come from the owning user of each donation
    let donor_ids: Vec<String> = claimed_rows
        .iter()
        .filter_map(|(_, donation)| donation.as_ref().map(|d| d.user_id.clone()))
        .collect();
    let donors: HashMap<String, Option<String>> = User::find()
        .filter(crate::entities::user::Column::Id.is_in(donor_ids))
        .all(&state.db)
        .await?
        .into_iter()
        .map(|u| (u.id, u.name))
        .collect();

    let claimed: Vec<ClaimedPanel> = claimed_rows
        .into_iter()
        .filter_map(|(panel, donation)| {
            let donation = donation?;
            let donor_name = donors.get(&donation.user_id).cloned().flatten();
            Some(ClaimedPanel {
                grid_id: panel.grid_id,
                row: panel.row,
                col: panel.col,
                donor_name,
                donation_amount: donation.amount,
                logo: donation.logo,
            })
        })
        .collect();

    Ok(Json(grid::build_grid_sections(id, &configs, &claimed)))
}
