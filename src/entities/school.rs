use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "schools")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i32,
    pub name: String,
    pub address: String,
    pub logo: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,
    pub goal: f64,
    pub funded: f64,
    /// JSON array of `{gridId, gridTitle?, rows, cols}` sub-grid descriptors
    #[sea_orm(column_type = "Json")]
    pub panel_grid_configs: Json,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::solar_panel::Entity")]
    SolarPanels,
}

impl Related<super::solar_panel::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SolarPanels.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
