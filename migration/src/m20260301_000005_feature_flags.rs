use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(FeatureFlags::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(FeatureFlags::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(FeatureFlags::Scope).string_len(36).not_null())
                    .col(ColumnDef::new(FeatureFlags::FlagKey).string_len(64).not_null())
                    .col(ColumnDef::new(FeatureFlags::Enabled).boolean().not_null())
                    .col(
                        ColumnDef::new(FeatureFlags::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // 每个 scope 下同一个 flag 只能有一条覆盖记录
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("uniq_feature_flags_scope_key")
                    .table(FeatureFlags::Table)
                    .col(FeatureFlags::Scope)
                    .col(FeatureFlags::FlagKey)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(FeatureFlags::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum FeatureFlags {
    Table,
    Id,
    Scope,
    FlagKey,
    Enabled,
    UpdatedAt,
}
