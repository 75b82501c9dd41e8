//! Seed job: bootstraps the admin account and the sample school campaigns,
//! eagerly materializing every panel cell described by the grid configs.
//! Safe to re-run; existing rows are left alone (the admin password is
//! refreshed like any other rotation).

use std::env;

use chrono::Utc;
use dotenvy::dotenv;
use migration::{Migrator, MigratorTrait};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Database, DatabaseConnection, EntityTrait, QueryFilter, Set,
};
use serde_json::json;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;
use uuid::Uuid;

use solarschools::entities::user::Role;
use solarschools::entities::{school, user, School, SolarPanel, User};
use solarschools::grid;

const ADMIN_EMAIL: &str = "admin@solarschools.dev";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialise tracing (INFO level)
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    let _ = tracing::subscriber::set_global_default(subscriber);

    // Load .env (if present) so DATABASE_URL from file is visible
    let _ = dotenv();

    let database_url = env::var("DATABASE_URL")?;
    let db = Database::connect(&database_url).await?;
    Migrator::up(&db, None).await?;

    info!("Start seeding ...");
    seed_admin(&db).await?;
    seed_schools(&db).await?;
    info!("Seeding finished.");

    Ok(())
}

async fn seed_admin(db: &DatabaseConnection) -> anyhow::Result<()> {
    let password = env::var("SEED_ADMIN_PASSWORD").unwrap_or_else(|_| "change-me".to_string());
    let hashed = bcrypt::hash(password, bcrypt::DEFAULT_COST)?;
    let now = Utc::now();

    match User::find()
        .filter(user::Column::Email.eq(ADMIN_EMAIL))
        .one(db)
        .await?
    {
        Some(existing) => {
            let mut admin: user::ActiveModel = existing.into();
            admin.password = Set(hashed);
            admin.role = Set(Role::Admin);
            admin.updated_at = Set(now);
            let updated = admin.update(db).await?;
            info!("Refreshed admin user: {}", updated.email);
        }
        None => {
            let created = user::ActiveModel {
                id: Set(Uuid::new_v4().to_string()),
                email: Set(ADMIN_EMAIL.to_string()),
                name: Set(Some("Admin User".to_string())),
                password: Set(hashed),
                role: Set(Role::Admin),
                created_at: Set(now),
                updated_at: Set(now),
            }
            .insert(db)
            .await?;
            info!("Created admin user: {}", created.email);
        }
    }

    Ok(())
}

async fn seed_schools(db: &DatabaseConnection) -> anyhow::Result<()> {
    let schools_data = vec![
        (
            1,
            "Greenfield Elementary",
            "123 Oak Street, Springfield, IL",
            "🏫",
            50_000.0,
            "Greenfield Elementary is dedicated to providing a nurturing environment...",
            json!([
                { "gridId": "section_A", "gridTitle": "Main Array - Section A", "rows": 4, "cols": 6 },
                { "gridId": "section_B", "gridTitle": "Main Array - Section B", "rows": 4, "cols": 6 },
                { "gridId": "roof_top", "gridTitle": "Rooftop Annex", "rows": 3, "cols": 8 },
            ]),
        ),
        (
            2,
            "Riverside High School",
            "456 River Road, Riverside, CA",
            "🎓",
            100_000.0,
            "Riverside High aims to equip students with the knowledge...",
            json!([
                { "gridId": "main_field", "gridTitle": "Field Installation", "rows": 10, "cols": 10 },
                { "gridId": "gym_roof", "gridTitle": "Gymnasium Roof", "rows": 5, "cols": 8 },
            ]),
        ),
    ];

    for (id, name, address, logo, goal, description, configs) in schools_data {
        if School::find_by_id(id).one(db).await?.is_some() {
            info!("School {} already seeded, skipping", name);
            continue;
        }

        let now = Utc::now();
        let created = school::ActiveModel {
            id: Set(id),
            name: Set(name.to_string()),
            address: Set(address.to_string()),
            logo: Set(Some(logo.to_string())),
            description: Set(Some(description.to_string())),
            goal: Set(goal),
            funded: Set(0.0),
            panel_grid_configs: Set(configs),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(db)
        .await?;

        let parsed = grid::parse_grid_configs(&created.panel_grid_configs)?;
        let panels = grid::materialize_panels(created.id, &parsed);
        let panel_count = panels.len();
        SolarPanel::insert_many(panels).exec(db).await?;
        info!(
            "Created school {} with {} panels across {} sub-grids",
            created.name,
            panel_count,
            parsed.len()
        );
    }

    Ok(())
}
