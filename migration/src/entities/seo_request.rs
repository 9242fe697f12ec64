//! SEO service request ("order") entity

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "seo_requests")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub agency_id: String,
    pub created_by: String,
    pub title: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,
    pub service_type: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub target_url: Option<String>,
    pub priority: String,
    pub status: String,
    /// Task id assigned by the fulfillment vendor
    #[sea_orm(unique)]
    pub external_task_id: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub deliverable_url: Option<String>,
    pub due_date: Option<DateTimeUtc>,
    pub completed_at: Option<DateTimeUtc>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
