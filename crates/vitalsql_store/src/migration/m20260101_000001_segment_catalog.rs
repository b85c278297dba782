use sea_orm_migration::prelude::*;

use crate::db::VitalsqlSegments;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(VitalsqlSegments::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(VitalsqlSegments::SegmentId)
                            .string_len(255)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(VitalsqlSegments::SegmentUri)
                            .string_len(255)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(VitalsqlSegments::TableName)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(VitalsqlSegments::CreatedAt)
                            .big_integer()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_vitalsql_segments_uri")
                    .table(VitalsqlSegments::Table)
                    .col(VitalsqlSegments::SegmentUri)
                    .unique()
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(VitalsqlSegments::Table).to_owned())
            .await?;
        Ok(())
    }
}
