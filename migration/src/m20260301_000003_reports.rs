//! 报表调度、执行记录与升级（escalation）表

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ReportSchedules::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ReportSchedules::Id)
                            .string_len(36)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ReportSchedules::AgencyId)
                            .string_len(36)
                            .not_null(),
                    )
                    .col(ColumnDef::new(ReportSchedules::Name).string_len(120).not_null())
                    .col(
                        ColumnDef::new(ReportSchedules::ReportType)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ReportSchedules::CronExpression)
                            .string_len(120)
                            .not_null(),
                    )
                    .col(ColumnDef::new(ReportSchedules::Recipients).text().not_null())
                    .col(
                        ColumnDef::new(ReportSchedules::Status)
                            .string_len(16)
                            .not_null(),
                    )
                    .col(ColumnDef::new(ReportSchedules::PausedReason).text().null())
                    .col(
                        ColumnDef::new(ReportSchedules::PausedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(ReportSchedules::FailureCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(ReportSchedules::MaxFailures)
                            .integer()
                            .not_null()
                            .default(3),
                    )
                    .col(
                        ColumnDef::new(ReportSchedules::LastRunAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(ReportSchedules::NextRunAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(ColumnDef::new(ReportSchedules::LastError).text().null())
                    .col(
                        ColumnDef::new(ReportSchedules::CreatedBy)
                            .string_len(36)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ReportSchedules::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ReportSchedules::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // 调度器按 status + next_run_at 扫描到期任务
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_report_schedules_status_next_run")
                    .table(ReportSchedules::Table)
                    .col(ReportSchedules::Status)
                    .col(ReportSchedules::NextRunAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ReportExecutions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ReportExecutions::Id)
                            .string_len(36)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ReportExecutions::ScheduleId)
                            .string_len(36)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ReportExecutions::AgencyId)
                            .string_len(36)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ReportExecutions::TriggerKind)
                            .string_len(16)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ReportExecutions::Status)
                            .string_len(16)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ReportExecutions::Attempts)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(ReportExecutions::MaxAttempts)
                            .integer()
                            .not_null()
                            .default(3),
                    )
                    .col(
                        ColumnDef::new(ReportExecutions::ScheduledFor)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ReportExecutions::NextAttemptAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(ReportExecutions::StartedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(ReportExecutions::FinishedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(ColumnDef::new(ReportExecutions::Error).text().null())
                    .col(ColumnDef::new(ReportExecutions::Result).text().null())
                    .col(
                        ColumnDef::new(ReportExecutions::CreatedAt)
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
                    .name("idx_report_executions_status")
                    .table(ReportExecutions::Table)
                    .col(ReportExecutions::Status)
                    .col(ReportExecutions::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_report_executions_schedule_id")
                    .table(ReportExecutions::Table)
                    .col(ReportExecutions::ScheduleId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Escalations::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Escalations::Id)
                            .string_len(36)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Escalations::AgencyId).string_len(36).not_null())
                    .col(ColumnDef::new(Escalations::RequestId).string_len(36).null())
                    .col(ColumnDef::new(Escalations::ScheduleId).string_len(36).null())
                    .col(ColumnDef::new(Escalations::Subject).string_len(200).not_null())
                    .col(ColumnDef::new(Escalations::Details).text().null())
                    .col(ColumnDef::new(Escalations::Severity).string_len(16).not_null())
                    .col(ColumnDef::new(Escalations::Status).string_len(16).not_null())
                    .col(ColumnDef::new(Escalations::CreatedBy).string_len(36).null())
                    .col(
                        ColumnDef::new(Escalations::ResolvedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Escalations::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Escalations::UpdatedAt)
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
                    .name("idx_escalations_agency_status")
                    .table(Escalations::Table)
                    .col(Escalations::AgencyId)
                    .col(Escalations::Status)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Escalations::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ReportExecutions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ReportSchedules::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum ReportSchedules {
    Table,
    Id,
    AgencyId,
    Name,
    ReportType,
    CronExpression,
    Recipients,
    Status,
    PausedReason,
    PausedAt,
    FailureCount,
    MaxFailures,
    LastRunAt,
    NextRunAt,
    LastError,
    CreatedBy,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum ReportExecutions {
    Table,
    Id,
    ScheduleId,
    AgencyId,
    TriggerKind,
    Status,
    Attempts,
    MaxAttempts,
    ScheduledFor,
    NextAttemptAt,
    StartedAt,
    FinishedAt,
    Error,
    Result,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Escalations {
    Table,
    Id,
    AgencyId,
    RequestId,
    ScheduleId,
    Subject,
    Details,
    Severity,
    Status,
    CreatedBy,
    ResolvedAt,
    CreatedAt,
    UpdatedAt,
}
