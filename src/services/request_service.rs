//! SEO request ("order") management
//!
//! 所有查询都按 agency 隔离；跨 agency 的资源一律视为不存在。

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Expr, ExprTrait, Func, LikeExpr};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, IntoActiveModel,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::{Result, SeoHubError};
use crate::storage::backend::retry;
use crate::storage::models::{PageRequest, Paginated, Priority, RequestStatus, ServiceType, parse_enum};
use crate::storage::Storage;
use crate::utils::new_id;
use crate::utils::validation::{LIKE_ESCAPE, escape_like, require_text, validate_http_url};
use migration::entities::{escalation, request_event, seo_request};

use super::Actor;

pub const MAX_TITLE_CHARS: usize = 200;
const MAX_DESCRIPTION_CHARS: usize = 10_000;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateRequestInput {
    pub title: String,
    pub description: Option<String>,
    pub service_type: ServiceType,
    pub target_url: Option<String>,
    pub priority: Option<Priority>,
    pub due_date: Option<DateTime<Utc>>,
}

/// 只更新提供的字段
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateRequestInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub due_date: Option<DateTime<Utc>>,
    pub target_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RequestFilter {
    pub status: Option<RequestStatus>,
    pub service_type: Option<ServiceType>,
    pub search: Option<String>,
    pub page: Option<u64>,
    pub page_size: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RequestView {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub service_type: String,
    pub target_url: Option<String>,
    pub priority: String,
    pub status: String,
    pub external_task_id: Option<String>,
    pub deliverable_url: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<seo_request::Model> for RequestView {
    fn from(m: seo_request::Model) -> Self {
        Self {
            id: m.id,
            title: m.title,
            description: m.description,
            service_type: m.service_type,
            target_url: m.target_url,
            priority: m.priority,
            status: m.status,
            external_task_id: m.external_task_id,
            deliverable_url: m.deliverable_url,
            due_date: m.due_date,
            completed_at: m.completed_at,
            created_by: m.created_by,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RequestEventView {
    pub from_status: Option<String>,
    pub to_status: String,
    pub actor: String,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<request_event::Model> for RequestEventView {
    fn from(m: request_event::Model) -> Self {
        Self {
            from_status: m.from_status,
            to_status: m.to_status,
            actor: m.actor,
            note: m.note,
            created_at: m.created_at,
        }
    }
}

fn clean_description(description: Option<String>) -> Result<Option<String>> {
    match description.map(|d| d.trim().to_string()) {
        Some(d) if d.is_empty() => Ok(None),
        Some(d) if d.chars().count() > MAX_DESCRIPTION_CHARS => Err(SeoHubError::validation(
            format!("description must be at most {} characters", MAX_DESCRIPTION_CHARS),
        )),
        other => Ok(other),
    }
}

fn clean_target_url(url: Option<String>) -> Result<Option<String>> {
    match url {
        Some(u) if u.trim().is_empty() => Ok(None),
        Some(u) => validate_http_url("target_url", &u).map(Some),
        None => Ok(None),
    }
}

async fn record_event<C: ConnectionTrait>(
    db: &C,
    request_id: &str,
    from: Option<RequestStatus>,
    to: RequestStatus,
    actor: &str,
    note: Option<String>,
) -> Result<()> {
    let event = request_event::ActiveModel {
        request_id: Set(request_id.to_string()),
        from_status: Set(from.map(|s| s.to_string())),
        to_status: Set(to.to_string()),
        actor: Set(actor.to_string()),
        note: Set(note),
        created_at: Set(Utc::now()),
        ..Default::default()
    };
    event.insert(db).await?;
    Ok(())
}

/// 校验生命周期并写入状态 + 历史事件
///
/// 调用方负责事务边界。`deliverable_url` 仅在迁移到 completed 时写入。
pub async fn apply_transition<C: ConnectionTrait>(
    db: &C,
    current: seo_request::Model,
    to: RequestStatus,
    actor: &str,
    note: Option<String>,
    deliverable_url: Option<String>,
) -> Result<seo_request::Model> {
    let from: RequestStatus = parse_enum("status", &current.status)?;
    if !from.can_transition_to(to) {
        return Err(SeoHubError::invalid_transition(format!(
            "Cannot move request '{}' from {} to {}",
            current.id, from, to
        )));
    }

    let now = Utc::now();
    let request_id = current.id.clone();
    let mut model = current.into_active_model();
    model.status = Set(to.to_string());
    model.updated_at = Set(now);
    if to == RequestStatus::Completed {
        model.completed_at = Set(Some(now));
        if deliverable_url.is_some() {
            model.deliverable_url = Set(deliverable_url);
        }
    }
    let updated = model.update(db).await?;

    record_event(db, &request_id, Some(from), to, actor, note).await?;
    info!("Request {} moved {} -> {} by {}", request_id, from, to, actor);
    Ok(updated)
}

pub struct RequestService {
    storage: Arc<Storage>,
}

impl RequestService {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self { storage }
    }

    async fn find(&self, agency_id: &str, id: &str) -> Result<seo_request::Model> {
        seo_request::Entity::find_by_id(id.to_string())
            .filter(seo_request::Column::AgencyId.eq(agency_id))
            .one(self.storage.get_db())
            .await?
            .ok_or_else(|| SeoHubError::not_found(format!("Request '{}' not found", id)))
    }

    pub async fn create(&self, actor: &Actor, input: CreateRequestInput) -> Result<RequestView> {
        let title = require_text("title", &input.title, MAX_TITLE_CHARS)?;
        let description = clean_description(input.description)?;
        let target_url = clean_target_url(input.target_url)?;

        let now = Utc::now();
        let id = new_id();
        let model = seo_request::ActiveModel {
            id: Set(id.clone()),
            agency_id: Set(actor.agency_id.clone()),
            created_by: Set(actor.user_id.clone()),
            title: Set(title),
            description: Set(description),
            service_type: Set(input.service_type.to_string()),
            target_url: Set(target_url),
            priority: Set(input.priority.unwrap_or_default().to_string()),
            status: Set(RequestStatus::Pending.to_string()),
            external_task_id: Set(None),
            deliverable_url: Set(None),
            due_date: Set(input.due_date),
            completed_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let txn = self.storage.get_db().begin().await?;
        let created = model.insert(&txn).await?;
        record_event(&txn, &id, None, RequestStatus::Pending, &actor.user_id, None).await?;
        txn.commit().await?;

        info!(
            "Request {} created in agency {} ({})",
            created.id, created.agency_id, created.service_type
        );
        Ok(created.into())
    }

    pub async fn list(&self, agency_id: &str, filter: &RequestFilter) -> Result<Paginated<RequestView>> {
        let (page, page_size) = PageRequest {
            page: filter.page,
            page_size: filter.page_size,
        }
        .resolve()?;

        let mut condition = Condition::all().add(seo_request::Column::AgencyId.eq(agency_id));
        if let Some(status) = filter.status {
            condition = condition.add(seo_request::Column::Status.eq(status.as_ref()));
        }
        if let Some(service_type) = filter.service_type {
            condition = condition.add(seo_request::Column::ServiceType.eq(service_type.as_ref()));
        }
        if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let pattern = format!("%{}%", escape_like(&search.to_lowercase()));
            condition = condition.add(
                Expr::expr(Func::lower(Expr::col(seo_request::Column::Title)))
                    .like(LikeExpr::new(pattern).escape(LIKE_ESCAPE)),
            );
        }

        let db = self.storage.get_db();
        let cond = condition.clone();
        let total = retry::with_retry("requests.list(count)", self.storage.retry_config(), || async {
            seo_request::Entity::find().filter(cond.clone()).count(db).await
        })
        .await?;

        let models = retry::with_retry("requests.list(data)", self.storage.retry_config(), || async {
            seo_request::Entity::find()
                .filter(condition.clone())
                .order_by_desc(seo_request::Column::CreatedAt)
                .order_by_desc(seo_request::Column::Id)
                .paginate(db, page_size)
                .fetch_page(page - 1)
                .await
        })
        .await?;

        Ok(Paginated::new(
            models.into_iter().map(Into::into).collect(),
            page,
            page_size,
            total,
        ))
    }

    pub async fn get(&self, agency_id: &str, id: &str) -> Result<RequestView> {
        Ok(self.find(agency_id, id).await?.into())
    }

    pub async fn update(
        &self,
        agency_id: &str,
        id: &str,
        input: UpdateRequestInput,
    ) -> Result<RequestView> {
        let current = self.find(agency_id, id).await?;
        let status: RequestStatus = parse_enum("status", &current.status)?;
        if status.is_terminal() {
            return Err(SeoHubError::invalid_state(format!(
                "Request '{}' is {} and can no longer be edited",
                id, status
            )));
        }

        let mut model = current.into_active_model();
        if let Some(title) = input.title {
            model.title = Set(require_text("title", &title, MAX_TITLE_CHARS)?);
        }
        if input.description.is_some() {
            model.description = Set(clean_description(input.description)?);
        }
        if let Some(priority) = input.priority {
            model.priority = Set(priority.to_string());
        }
        if input.due_date.is_some() {
            model.due_date = Set(input.due_date);
        }
        if input.target_url.is_some() {
            model.target_url = Set(clean_target_url(input.target_url)?);
        }
        model.updated_at = Set(Utc::now());

        Ok(model.update(self.storage.get_db()).await?.into())
    }

    /// 仅允许删除 pending / cancelled 的请求
    ///
    /// 关联的升级工单保留，但解除与该请求的关联。
    pub async fn delete(&self, agency_id: &str, id: &str) -> Result<()> {
        let current = self.find(agency_id, id).await?;
        let status: RequestStatus = parse_enum("status", &current.status)?;
        if !matches!(status, RequestStatus::Pending | RequestStatus::Cancelled) {
            return Err(SeoHubError::invalid_state(format!(
                "Request '{}' is {}; only pending or cancelled requests can be deleted",
                id, status
            )));
        }

        let txn = self.storage.get_db().begin().await?;
        request_event::Entity::delete_many()
            .filter(request_event::Column::RequestId.eq(id))
            .exec(&txn)
            .await?;
        escalation::Entity::update_many()
            .col_expr(escalation::Column::RequestId, Expr::value(Option::<String>::None))
            .filter(escalation::Column::AgencyId.eq(agency_id))
            .filter(escalation::Column::RequestId.eq(id))
            .exec(&txn)
            .await?;
        seo_request::Entity::delete_by_id(id.to_string())
            .exec(&txn)
            .await?;
        txn.commit().await?;

        info!("Request {} deleted from agency {}", id, agency_id);
        Ok(())
    }

    pub async fn transition(
        &self,
        agency_id: &str,
        id: &str,
        to: RequestStatus,
        actor: &str,
        note: Option<String>,
    ) -> Result<RequestView> {
        let note = note.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());
        let txn = self.storage.get_db().begin().await?;
        let current = seo_request::Entity::find_by_id(id.to_string())
            .filter(seo_request::Column::AgencyId.eq(agency_id))
            .one(&txn)
            .await?
            .ok_or_else(|| SeoHubError::not_found(format!("Request '{}' not found", id)))?;
        let updated = apply_transition(&txn, current, to, actor, note, None).await?;
        txn.commit().await?;
        Ok(updated.into())
    }

    /// 记录履约供应商的 task id（全局唯一）
    pub async fn assign_external_task(
        &self,
        agency_id: &str,
        id: &str,
        task_id: &str,
    ) -> Result<RequestView> {
        let task_id = require_text("task_id", task_id, 200)?;
        let current = self.find(agency_id, id).await?;

        let taken = seo_request::Entity::find()
            .filter(seo_request::Column::ExternalTaskId.eq(task_id.as_str()))
            .filter(seo_request::Column::Id.ne(id))
            .one(self.storage.get_db())
            .await?;
        if taken.is_some() {
            return Err(SeoHubError::conflict(format!(
                "External task '{}' is already linked to another request",
                task_id
            )));
        }

        let mut model = current.into_active_model();
        model.external_task_id = Set(Some(task_id));
        model.updated_at = Set(Utc::now());
        Ok(model.update(self.storage.get_db()).await?.into())
    }

    /// 状态历史，按时间正序
    pub async fn history(&self, agency_id: &str, id: &str) -> Result<Vec<RequestEventView>> {
        self.find(agency_id, id).await?;
        let events = request_event::Entity::find()
            .filter(request_event::Column::RequestId.eq(id))
            .order_by_asc(request_event::Column::CreatedAt)
            .order_by_asc(request_event::Column::Id)
            .all(self.storage.get_db())
            .await?;
        Ok(events.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_description() {
        assert_eq!(clean_description(None).unwrap(), None);
        assert_eq!(clean_description(Some("   ".into())).unwrap(), None);
        assert_eq!(
            clean_description(Some(" brief ".into())).unwrap(),
            Some("brief".to_string())
        );
        assert!(clean_description(Some("x".repeat(MAX_DESCRIPTION_CHARS + 1))).is_err());
    }

    #[test]
    fn test_clean_target_url() {
        assert_eq!(clean_target_url(Some("".into())).unwrap(), None);
        assert!(clean_target_url(Some("ftp://example.com".into())).is_err());
        assert_eq!(
            clean_target_url(Some("https://example.com".into())).unwrap(),
            Some("https://example.com".to_string())
        );
    }
}
