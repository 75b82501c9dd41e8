use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Schools::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Schools::Id)
                            .integer()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Schools::Name).string().not_null())
                    .col(ColumnDef::new(Schools::Address).string().not_null())
                    .col(ColumnDef::new(Schools::Logo).string().null())
                    .col(ColumnDef::new(Schools::Description).text().null())
                    .col(ColumnDef::new(Schools::Goal).double().not_null())
                    .col(
                        ColumnDef::new(Schools::Funded)
                            .double()
                            .not_null()
                            .default(0.0),
                    )
                    // One JSON array of {gridId, gridTitle?, rows, cols} objects
                    .col(ColumnDef::new(Schools::PanelGridConfigs).json().not_null())
                    .col(
                        ColumnDef::new(Schools::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Schools::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Schools::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Schools {
    Table,
    Id,
    Name,
    Address,
    Logo,
    Description,
    Goal,
    Funded,
    PanelGridConfigs,
    CreatedAt,
    UpdatedAt,
}
