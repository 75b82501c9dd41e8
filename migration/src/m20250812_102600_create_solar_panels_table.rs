use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(SolarPanels::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SolarPanels::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(SolarPanels::GridId).string().not_null())
                    .col(ColumnDef::new(SolarPanels::Row).integer().not_null())
                    .col(ColumnDef::new(SolarPanels::Col).integer().not_null())
                    .col(ColumnDef::new(SolarPanels::SchoolId).integer().not_null())
                    // NULL means the panel is still available for donation
                    .col(ColumnDef::new(SolarPanels::DonationId).string().null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_solar_panels_school_id")
                            .from(SolarPanels::Table, SolarPanels::SchoolId)
                            .to(Schools::Table, Schools::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_solar_panels_donation_id")
                            .from(SolarPanels::Table, SolarPanels::DonationId)
                            .to(Donations::Table, Donations::Id),
                    )
                    .to_owned(),
            )
            .await?;

        // No two panels may occupy the same cell of the same sub-grid
        manager
            .create_index(
                Index::create()
                    .name("idx_solar_panels_cell_unique")
                    .table(SolarPanels::Table)
                    .col(SolarPanels::SchoolId)
                    .col(SolarPanels::GridId)
                    .col(SolarPanels::Row)
                    .col(SolarPanels::Col)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SolarPanels::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum SolarPanels {
    Table,
    Id,
    GridId,
    Row,
    Col,
    SchoolId,
    DonationId,
}

#[derive(DeriveIden)]
enum Schools {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum Donations {
    Table,
    Id,
}
