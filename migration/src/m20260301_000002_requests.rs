//! SEO 请求（订单）、状态历史与 webhook 事件表

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(SeoRequests::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SeoRequests::Id)
                            .string_len(36)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(SeoRequests::AgencyId)
                            .string_len(36)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SeoRequests::CreatedBy)
                            .string_len(36)
                            .not_null(),
                    )
                    .col(ColumnDef::new(SeoRequests::Title).string_len(200).not_null())
                    .col(ColumnDef::new(SeoRequests::Description).text().null())
                    .col(
                        ColumnDef::new(SeoRequests::ServiceType)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(ColumnDef::new(SeoRequests::TargetUrl).text().null())
                    .col(
                        ColumnDef::new(SeoRequests::Priority)
                            .string_len(16)
                            .not_null(),
                    )
                    .col(ColumnDef::new(SeoRequests::Status).string_len(16).not_null())
                    .col(
                        ColumnDef::new(SeoRequests::ExternalTaskId)
                            .string_len(128)
                            .null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(SeoRequests::DeliverableUrl).text().null())
                    .col(
                        ColumnDef::new(SeoRequests::DueDate)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(SeoRequests::CompletedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(SeoRequests::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SeoRequests::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // 列表查询按 agency + status 过滤
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_seo_requests_agency_status")
                    .table(SeoRequests::Table)
                    .col(SeoRequests::AgencyId)
                    .col(SeoRequests::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_seo_requests_created_at")
                    .table(SeoRequests::Table)
                    .col(SeoRequests::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(RequestEvents::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(RequestEvents::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(RequestEvents::RequestId)
                            .string_len(36)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(RequestEvents::FromStatus)
                            .string_len(16)
                            .null(),
                    )
                    .col(
                        ColumnDef::new(RequestEvents::ToStatus)
                            .string_len(16)
                            .not_null(),
                    )
                    .col(ColumnDef::new(RequestEvents::Actor).string_len(64).not_null())
                    .col(ColumnDef::new(RequestEvents::Note).text().null())
                    .col(
                        ColumnDef::new(RequestEvents::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_request_events_request_id")
                    .table(RequestEvents::Table)
                    .col(RequestEvents::RequestId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(WebhookEvents::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(WebhookEvents::EventId)
                            .string_len(128)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(WebhookEvents::Source).string_len(64).not_null())
                    .col(
                        ColumnDef::new(WebhookEvents::EventType)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(ColumnDef::new(WebhookEvents::Payload).text().not_null())
                    .col(ColumnDef::new(WebhookEvents::Status).string_len(16).not_null())
                    .col(ColumnDef::new(WebhookEvents::Error).text().null())
                    .col(
                        ColumnDef::new(WebhookEvents::RequestId)
                            .string_len(36)
                            .null(),
                    )
                    .col(
                        ColumnDef::new(WebhookEvents::ReceivedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(WebhookEvents::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(RequestEvents::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(SeoRequests::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum SeoRequests {
    Table,
    Id,
    AgencyId,
    CreatedBy,
    Title,
    Description,
    ServiceType,
    TargetUrl,
    Priority,
    Status,
    ExternalTaskId,
    DeliverableUrl,
    DueDate,
    CompletedAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum RequestEvents {
    Table,
    Id,
    RequestId,
    FromStatus,
    ToStatus,
    Actor,
    Note,
    CreatedAt,
}

#[derive(DeriveIden)]
enum WebhookEvents {
    Table,
    EventId,
    Source,
    EventType,
    Payload,
    Status,
    Error,
    RequestId,
    ReceivedAt,
}
