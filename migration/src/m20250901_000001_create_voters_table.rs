use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Voters::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Voters::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Voters::OriginalId).big_integer().not_null())
                    .col(ColumnDef::new(Voters::FullName).text().not_null())
                    .col(ColumnDef::new(Voters::FatherName).text().null())
                    .col(ColumnDef::new(Voters::RegisterNumber).text().null())
                    .col(ColumnDef::new(Voters::Family).text().null())
                    .col(ColumnDef::new(Voters::Classification).text().null())
                    .col(ColumnDef::new(Voters::Religion).text().null())
                    .col(
                        ColumnDef::new(Voters::HasVoted)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Voters::VotedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .to_owned(),
            )
            .await?;

        // Import correlates spreadsheet rows by original_id; listings sort by it
        manager
            .create_index(
                Index::create()
                    .name("idx_voters_original_id")
                    .table(Voters::Table)
                    .col(Voters::OriginalId)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        // Not unique: imports may collide until fix-register-numbers runs
        manager
            .create_index(
                Index::create()
                    .name("idx_voters_register_number")
                    .table(Voters::Table)
                    .col(Voters::RegisterNumber)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_voters_has_voted")
                    .table(Voters::Table)
                    .col(Voters::HasVoted)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Voters::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Voters {
    Table,
    Id,
    OriginalId,
    FullName,
    FatherName,
    RegisterNumber,
    Family,
    Classification,
    Religion,
    HasVoted,
    VotedAt,
}
