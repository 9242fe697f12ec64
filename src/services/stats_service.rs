//! Dashboard counters for one agency

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use serde::Serialize;
use strum::IntoEnumIterator;

use crate::errors::Result;
use crate::storage::Storage;
use crate::storage::models::{EscalationStatus, ExecutionStatus, RequestStatus, ScheduleStatus};
use migration::entities::{escalation, report_execution, report_schedule, seo_request, user};

#[derive(Debug, Clone, Serialize)]
pub struct DashboardStats {
    pub requests_by_status: BTreeMap<String, u64>,
    pub requests_total: u64,
    pub open_escalations: u64,
    pub active_schedules: u64,
    pub paused_schedules: u64,
    pub failed_executions_7d: u64,
    pub members: u64,
}

pub struct StatsService {
    storage: Arc<Storage>,
}

impl StatsService {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self { storage }
    }

    pub async fn dashboard(&self, agency_id: &str) -> Result<DashboardStats> {
        let db = self.storage.get_db();

        let mut requests_by_status = BTreeMap::new();
        for status in RequestStatus::iter() {
            let n = seo_request::Entity::find()
                .filter(seo_request::Column::AgencyId.eq(agency_id))
                .filter(seo_request::Column::Status.eq(status.as_ref()))
                .count(db)
                .await?;
            requests_by_status.insert(status.to_string(), n);
        }

        let open_escalations = escalation::Entity::find()
            .filter(escalation::Column::AgencyId.eq(agency_id))
            .filter(escalation::Column::Status.ne(EscalationStatus::Resolved.as_ref()))
            .count(db)
            .await?;

        let schedules_with = |status: ScheduleStatus| {
            report_schedule::Entity::find()
                .filter(report_schedule::Column::AgencyId.eq(agency_id))
                .filter(report_schedule::Column::Status.eq(status.as_ref()))
                .count(db)
        };
        let active_schedules = schedules_with(ScheduleStatus::Active).await?;
        let paused_schedules = schedules_with(ScheduleStatus::Paused).await?;

        let failed_executions_7d = report_execution::Entity::find()
            .filter(report_execution::Column::AgencyId.eq(agency_id))
            .filter(report_execution::Column::Status.eq(ExecutionStatus::Failed.as_ref()))
            .filter(report_execution::Column::CreatedAt.gte(Utc::now() - Duration::days(7)))
            .count(db)
            .await?;

        let members = user::Entity::find()
            .filter(user::Column::AgencyId.eq(agency_id))
            .count(db)
            .await?;

        Ok(DashboardStats {
            requests_total: requests_by_status.values().sum(),
            requests_by_status,
            open_escalations,
            active_schedules,
            paused_schedules,
            failed_executions_7d,
            members,
        })
    }
}
