//! Panel grid model: parsing a school's sub-grid descriptors, eagerly
//! materializing panel rows from them, and assembling the per-sub-grid view
//! of claimed and available cells.

use std::collections::HashMap;

use sea_orm::Set;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::entities::solar_panel;
use crate::error::AppError;

/// One named rectangular section of a school's overall panel layout.
/// Stored as a JSON array on the school row, camelCase on the wire.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PanelGridConfig {
    pub grid_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grid_title: Option<String>,
    pub rows: u32,
    pub cols: u32,
}

/// A single cell in the rendered grid.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PanelCell {
    pub id: String,
    pub row: u32,
    pub col: u32,
    pub is_donated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub donor_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub donation_amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
}

/// One sub-grid with its cells laid out row-major.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GridSection {
    pub grid_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grid_title: Option<String>,
    pub rows: u32,
    pub cols: u32,
    pub cells: Vec<Vec<PanelCell>>,
}

/// Donor-facing info for a panel that has already been claimed.
#[derive(Debug, Clone)]
pub struct ClaimedPanel {
    pub grid_id: String,
    pub row: i32,
    pub col: i32,
    pub donor_name: Option<String>,
    pub donation_amount: f64,
    pub logo: Option<String>,
}

pub fn parse_grid_configs(value: &serde_json::Value) -> Result<Vec<PanelGridConfig>, AppError> {
    serde_json::from_value(value.clone())
        .map_err(|e| AppError::InternalError(format!("malformed panel grid configs: {}", e)))
}

/// Globally unique panel identity for a cell.
pub fn panel_id(school_id: i32, grid_id: &str, row: u32, col: u32) -> String {
    format!("s{}-{}-r{}c{}", school_id, grid_id, row, col)
}

/// Enumerate every cell of every sub-grid into insertable panel rows.
/// Done once when a school is created, so the cell uniqueness invariant is
/// enforced by the database rather than synthesized client-side.
pub fn materialize_panels(
    school_id: i32,
    configs: &[PanelGridConfig],
) -> Vec<solar_panel::ActiveModel> {
    let mut panels = Vec::new();
    for config in configs {
        for row in 0..config.rows {
            for col in 0..config.cols {
                panels.push(solar_panel::ActiveModel {
                    id: Set(panel_id(school_id, &config.grid_id, row, col)),
                    grid_id: Set(config.grid_id.clone()),
                    row: Set(row as i32),
                    col: Set(col as i32),
                    school_id: Set(school_id),
                    donation_id: Set(None),
                });
            }
        }
    }
    panels
}

/// Assemble the per-sub-grid matrices the grid component renders, marking each
/// cell available or donated with the donor's display info.
pub fn build_grid_sections(
    school_id: i32,
    configs: &[PanelGridConfig],
    claimed: &[ClaimedPanel],
) -> Vec<GridSection> {
    let claimed_by_cell: HashMap<(&str, i32, i32), &ClaimedPanel> = claimed
        .iter()
        .map(|p| ((p.grid_id.as_str(), p.row, p.col), p))
        .collect();

    configs
        .iter()
        .map(|config| {
            let cells = (0..config.rows)
                .map(|row| {
                    (0..config.cols)
                        .map(|col| {
                            let key = (config.grid_id.as_str(), row as i32, col as i32);
                            match claimed_by_cell.get(&key) {
                                Some(panel) => PanelCell {
                                    id: panel_id(school_id, &config.grid_id, row, col),
                                    row,
                                    col,
                                    is_donated: true,
                                    donor_name: panel.donor_name.clone(),
                                    donation_amount: Some(panel.donation_amount),
                                    logo: panel.logo.clone(),
                                },
                                None => PanelCell {
                                    id: panel_id(school_id, &config.grid_id, row, col),
                                    row,
                                    col,
                                    is_donated: false,
                                    donor_name: None,
                                    donation_amount: None,
                                    logo: None,
                                },
                            }
                        })
                        .collect()
                })
                .collect();

            GridSection {
                grid_id: config.grid_id.clone(),
                grid_title: config.grid_title.clone(),
                rows: config.rows,
                cols: config.cols,
                cells,
            }
        })
        .collect()
}
