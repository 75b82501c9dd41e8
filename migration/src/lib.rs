pub use sea_orm_migration::prelude::*;

mod m20250812_101500_create_users_table;
mod m20250812_101900_create_schools_table;
mod m20250812_102200_create_donations_table;
mod m20250812_102600_create_solar_panels_table;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250812_101500_create_users_table::Migration),
            Box::new(m20250812_101900_create_schools_table::Migration),
            Box::new(m20250812_102200_create_donations_table::Migration),
            Box::new(m20250812_102600_create_solar_panels_table::Migration),
        ]
    }
}
