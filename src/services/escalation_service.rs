//! Escalations raised by users, the report scheduler and fulfillment webhooks

use std::sync::Arc;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, IntoActiveModel, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::{Result, SeoHubError};
use crate::storage::Storage;
use crate::storage::models::{EscalationSeverity, EscalationStatus, parse_enum};
use crate::utils::new_id;
use crate::utils::validation::require_text;
use migration::entities::{escalation, seo_request};

use super::Actor;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateEscalationInput {
    pub request_id: Option<String>,
    pub subject: String,
    pub details: Option<String>,
    #[serde(default = "default_severity")]
    pub severity: EscalationSeverity,
}

fn default_severity() -> EscalationSeverity {
    EscalationSeverity::Medium
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EscalationFilter {
    pub status: Option<EscalationStatus>,
    pub severity: Option<EscalationSeverity>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EscalationView {
    pub id: String,
    pub request_id: Option<String>,
    pub schedule_id: Option<String>,
    pub subject: String,
    pub details: Option<String>,
    pub severity: String,
    pub status: String,
    pub created_by: Option<String>,
    pub resolved_at: Option<chrono::DateTime<Utc>>,
    pub created_at: chrono::DateTime<Utc>,
    pub updated_at: chrono::DateTime<Utc>,
}

impl From<escalation::Model> for EscalationView {
    fn from(m: escalation::Model) -> Self {
        Self {
            id: m.id,
            request_id: m.request_id,
            schedule_id: m.schedule_id,
            subject: m.subject,
            details: m.details,
            severity: m.severity,
            status: m.status,
            created_by: m.created_by,
            resolved_at: m.resolved_at,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

/// 系统自动开启的 escalation（无创建人）
pub struct SystemEscalation<'a> {
    pub agency_id: &'a str,
    pub request_id: Option<&'a str>,
    pub schedule_id: Option<&'a str>,
    pub subject: String,
    pub details: Option<String>,
    pub severity: EscalationSeverity,
}

/// 在给定连接（可以是事务）上写入系统 escalation
pub async fn open_system_escalation<C: ConnectionTrait>(
    db: &C,
    input: SystemEscalation<'_>,
) -> Result<escalation::Model> {
    let now = Utc::now();
    let model = escalation::ActiveModel {
        id: Set(new_id()),
        agency_id: Set(input.agency_id.to_string()),
        request_id: Set(input.request_id.map(str::to_string)),
        schedule_id: Set(input.schedule_id.map(str::to_string)),
        subject: Set(input.subject),
        details: Set(input.details),
        severity: Set(input.severity.to_string()),
        status: Set(EscalationStatus::Open.to_string()),
        created_by: Set(None),
        resolved_at: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    };
    let created = model.insert(db).await?;
    info!(
        "System escalation {} opened for agency {}: {}",
        created.id, created.agency_id, created.subject
    );
    Ok(created)
}

pub struct EscalationService {
    storage: Arc<Storage>,
}

impl EscalationService {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self { storage }
    }

    pub async fn create(
        &self,
        actor: &Actor,
        input: CreateEscalationInput,
    ) -> Result<EscalationView> {
        let subject = require_text("subject", &input.subject, 200)?;
        let details = input
            .details
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());

        if let Some(request_id) = &input.request_id {
            let owned = seo_request::Entity::find_by_id(request_id.clone())
                .filter(seo_request::Column::AgencyId.eq(&actor.agency_id))
                .one(self.storage.get_db())
                .await?;
            if owned.is_none() {
                return Err(SeoHubError::not_found(format!(
                    "Request '{}' not found",
                    request_id
                )));
            }
        }

        let now = Utc::now();
        let model = escalation::ActiveModel {
            id: Set(new_id()),
            agency_id: Set(actor.agency_id.clone()),
            request_id: Set(input.request_id),
            schedule_id: Set(None),
            subject: Set(subject),
            details: Set(details),
            severity: Set(input.severity.to_string()),
            status: Set(EscalationStatus::Open.to_string()),
            created_by: Set(Some(actor.user_id.clone())),
            resolved_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let created = model.insert(self.storage.get_db()).await?;
        info!(
            "Escalation {} created by {} ({})",
            created.id, actor.user_id, created.severity
        );
        Ok(created.into())
    }

    pub async fn list(
        &self,
        agency_id: &str,
        filter: &EscalationFilter,
    ) -> Result<Vec<EscalationView>> {
        let mut query =
            escalation::Entity::find().filter(escalation::Column::AgencyId.eq(agency_id));
        if let Some(status) = filter.status {
            query = query.filter(escalation::Column::Status.eq(status.as_ref()));
        }
        if let Some(severity) = filter.severity {
            query = query.filter(escalation::Column::Severity.eq(severity.as_ref()));
        }
        let rows = query
            .order_by_desc(escalation::Column::CreatedAt)
            .all(self.storage.get_db())
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn find(&self, agency_id: &str, id: &str) -> Result<escalation::Model> {
        escalation::Entity::find_by_id(id.to_string())
            .filter(escalation::Column::AgencyId.eq(agency_id))
            .one(self.storage.get_db())
            .await?
            .ok_or_else(|| SeoHubError::not_found(format!("Escalation '{}' not found", id)))
    }

    pub async fn get(&self, agency_id: &str, id: &str) -> Result<EscalationView> {
        Ok(self.find(agency_id, id).await?.into())
    }

    pub async fn acknowledge(&self, agency_id: &str, id: &str) -> Result<EscalationView> {
        let current = self.find(agency_id, id).await?;
        let status: EscalationStatus = parse_enum("status", &current.status)?;
        if status != EscalationStatus::Open {
            return Err(SeoHubError::invalid_state(format!(
                "Escalation '{}' is {} and cannot be acknowledged",
                id, status
            )));
        }
        let mut model = current.into_active_model();
        model.status = Set(EscalationStatus::Acknowledged.to_string());
        model.updated_at = Set(Utc::now());
        Ok(model.update(self.storage.get_db()).await?.into())
    }

    pub async fn resolve(&self, agency_id: &str, id: &str) -> Result<EscalationView> {
        let current = self.find(agency_id, id).await?;
        let status: EscalationStatus = parse_enum("status", &current.status)?;
        if status == EscalationStatus::Resolved {
            return Err(SeoHubError::invalid_state(format!(
                "Escalation '{}' is already resolved",
                id
            )));
        }
        let now = Utc::now();
        let mut model = current.into_active_model();
        model.status = Set(EscalationStatus::Resolved.to_string());
        model.resolved_at = Set(Some(now));
        model.updated_at = Set(now);
        let updated = model.update(self.storage.get_db()).await?;
        info!("Escalation {} resolved", id);
        Ok(updated.into())
    }
}
