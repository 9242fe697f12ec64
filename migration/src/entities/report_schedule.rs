//! Recurring report schedule

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "report_schedules")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub agency_id: String,
    pub name: String,
    pub report_type: String,
    pub cron_expression: String,
    /// JSON array of email addresses
    #[sea_orm(column_type = "Text")]
    pub recipients: String,
    /// active / paused
    pub status: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub paused_reason: Option<String>,
    pub paused_at: Option<DateTimeUtc>,
    /// Consecutive failed executions
    pub failure_count: i32,
    pub max_failures: i32,
    pub last_run_at: Option<DateTimeUtc>,
    pub next_run_at: Option<DateTimeUtc>,
    #[sea_orm(column_type = "Text", nullable)]
    pub last_error: Option<String>,
    pub created_by: String,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
