//! Fulfillment vendor webhooks
//!
//! 签名校验后按 `event_id` 幂等处理：重复投递直接返回已记录的结果，
//! 不会再次修改请求状态。处理失败的事件允许重新投递。

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseTransaction, DbErr, EntityTrait, IntoActiveModel,
    QueryFilter, Set, SqlErr, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::errors::{Result, SeoHubError};
use crate::storage::Storage;
use crate::storage::models::{
    EscalationSeverity, RequestStatus, WebhookEventType, WebhookOutcome, parse_enum,
};
use crate::utils::signature;
use crate::utils::validation::{require_text, truncate_chars, validate_http_url};
use migration::entities::{seo_request, webhook_event};

use super::escalation_service::{SystemEscalation, open_system_escalation};
use super::request_service::apply_transition;

/// 写入请求历史时使用的 actor
pub const WEBHOOK_ACTOR: &str = "webhook";
const MAX_MESSAGE_CHARS: usize = 2000;

#[derive(Debug, Clone, Deserialize)]
pub struct FulfillmentEvent {
    pub event_id: String,
    pub event_type: String,
    pub task_id: String,
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(default)]
    pub deliverable_url: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub occurred_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct WebhookReceipt {
    pub event_id: String,
    pub status: WebhookOutcome,
    pub request_id: Option<String>,
    pub duplicate: bool,
    pub detail: Option<String>,
}

impl WebhookReceipt {
    fn from_stored(model: &webhook_event::Model) -> Result<Self> {
        Ok(Self {
            event_id: model.event_id.clone(),
            status: parse_enum("status", &model.status)?,
            request_id: model.request_id.clone(),
            duplicate: true,
            detail: model.error.clone(),
        })
    }
}

/// 校验 `X-Webhook-Signature`
pub fn verify_signature(secret: &str, body: &[u8], header: Option<&str>) -> Result<()> {
    match header {
        Some(provided) if signature::verify(secret, body, provided) => Ok(()),
        Some(_) => Err(SeoHubError::unauthorized("Invalid webhook signature")),
        None => Err(SeoHubError::unauthorized("Missing webhook signature")),
    }
}

/// 单个事件处理后的结果
struct Applied {
    outcome: WebhookOutcome,
    request_id: Option<String>,
    detail: Option<String>,
}

impl Applied {
    fn processed(request_id: &str) -> Self {
        Self {
            outcome: WebhookOutcome::Processed,
            request_id: Some(request_id.to_string()),
            detail: None,
        }
    }

    fn ignored(request_id: Option<&str>, detail: impl Into<String>) -> Self {
        Self {
            outcome: WebhookOutcome::Ignored,
            request_id: request_id.map(str::to_string),
            detail: Some(detail.into()),
        }
    }
}

pub struct WebhookService {
    storage: Arc<Storage>,
    source: String,
}

impl WebhookService {
    pub fn new(storage: Arc<Storage>, source: &str) -> Self {
        Self {
            storage,
            source: source.to_string(),
        }
    }

    fn parse(body: &[u8]) -> Result<FulfillmentEvent> {
        let mut event: FulfillmentEvent = serde_json::from_slice(body)
            .map_err(|e| SeoHubError::validation(format!("Invalid webhook payload: {}", e)))?;
        event.event_id = require_text("event_id", &event.event_id, 200)?;
        event.task_id = require_text("task_id", &event.task_id, 200)?;
        if let Some(url) = event.deliverable_url.take().filter(|u| !u.trim().is_empty()) {
            event.deliverable_url = Some(validate_http_url("deliverable_url", &url)?);
        }
        event.message = event
            .message
            .map(|m| truncate_chars(m.trim(), MAX_MESSAGE_CHARS))
            .filter(|m| !m.is_empty());
        Ok(event)
    }

    /// 处理一条原始 webhook body（签名已校验）
    pub async fn ingest(&self, body: &[u8]) -> Result<WebhookReceipt> {
        let event = Self::parse(body)?;
        let payload = String::from_utf8_lossy(body).into_owned();
        let db = self.storage.get_db();

        let existing = webhook_event::Entity::find_by_id(event.event_id.clone())
            .one(db)
            .await?;
        if let Some(stored) = &existing {
            if stored.status != WebhookOutcome::Failed.as_ref() {
                info!("Duplicate webhook event {} ignored", stored.event_id);
                return WebhookReceipt::from_stored(stored);
            }
            warn!("Re-processing previously failed webhook event {}", stored.event_id);
        }

        let txn = db.begin().await?;
        match self.apply(&txn, &event).await {
            Ok(applied) => {
                if let Err(e) = self
                    .store_event(&txn, &event, &payload, &applied, existing.is_some())
                    .await
                {
                    txn.rollback().await?;
                    return self.stored_after_conflict(&event.event_id, e).await;
                }
                txn.commit().await?;
                info!(
                    "Webhook {} ({}) {} for request {:?}",
                    event.event_id, event.event_type, applied.outcome, applied.request_id
                );
                Ok(WebhookReceipt {
                    event_id: event.event_id,
                    status: applied.outcome,
                    request_id: applied.request_id,
                    duplicate: false,
                    detail: applied.detail,
                })
            }
            Err(e) => {
                txn.rollback().await?;
                error!("Webhook {} processing failed: {}", event.event_id, e);
                let failed = Applied {
                    outcome: WebhookOutcome::Failed,
                    request_id: event.request_id.clone(),
                    detail: Some(e.message().to_string()),
                };
                let txn = db.begin().await?;
                self.store_event(&txn, &event, &payload, &failed, existing.is_some())
                    .await?;
                txn.commit().await?;
                Err(e)
            }
        }
    }

    /// 同一 event_id 并发投递时，插入失败的一方返回先写入的结果
    async fn stored_after_conflict(&self, event_id: &str, err: DbErr) -> Result<WebhookReceipt> {
        if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
            let stored = webhook_event::Entity::find_by_id(event_id.to_string())
                .one(self.storage.get_db())
                .await?;
            if let Some(stored) = stored {
                info!("Webhook event {} was stored concurrently", event_id);
                return WebhookReceipt::from_stored(&stored);
            }
        }
        Err(err.into())
    }

    async fn store_event(
        &self,
        txn: &DatabaseTransaction,
        event: &FulfillmentEvent,
        payload: &str,
        applied: &Applied,
        replace: bool,
    ) -> std::result::Result<(), DbErr> {
        if replace {
            webhook_event::Entity::delete_by_id(event.event_id.clone())
                .exec(txn)
                .await?;
        }
        webhook_event::ActiveModel {
            event_id: Set(event.event_id.clone()),
            source: Set(self.source.clone()),
            event_type: Set(event.event_type.clone()),
            payload: Set(payload.to_string()),
            status: Set(applied.outcome.to_string()),
            error: Set(applied.detail.clone()),
            request_id: Set(applied.request_id.clone()),
            received_at: Set(Utc::now()),
        }
        .insert(txn)
        .await?;
        Ok(())
    }

    async fn resolve_request(
        &self,
        txn: &DatabaseTransaction,
        event: &FulfillmentEvent,
    ) -> Result<Option<seo_request::Model>> {
        if let Some(request_id) = &event.request_id {
            let Some(found) = seo_request::Entity::find_by_id(request_id.clone())
                .one(txn)
                .await?
            else {
                return Ok(None);
            };
            if found.external_task_id.is_some() {
                return Ok(Some(found));
            }
            // 首次关联 task id（若已被别的请求占用则保持原样）
            let taken = seo_request::Entity::find()
                .filter(seo_request::Column::ExternalTaskId.eq(event.task_id.as_str()))
                .one(txn)
                .await?
                .is_some();
            if taken {
                return Ok(Some(found));
            }
            let mut model = found.into_active_model();
            model.external_task_id = Set(Some(event.task_id.clone()));
            return Ok(Some(model.update(txn).await?));
        }

        Ok(seo_request::Entity::find()
            .filter(seo_request::Column::ExternalTaskId.eq(event.task_id.as_str()))
            .one(txn)
            .await?)
    }

    async fn apply(&self, txn: &DatabaseTransaction, event: &FulfillmentEvent) -> Result<Applied> {
        let Ok(event_type) = event.event_type.parse::<WebhookEventType>() else {
            return Ok(Applied::ignored(
                event.request_id.as_deref(),
                format!("unsupported event type '{}'", event.event_type),
            ));
        };

        let Some(request) = self.resolve_request(txn, event).await? else {
            return Ok(Applied::ignored(
                event.request_id.as_deref(),
                format!("no request matches task '{}'", event.task_id),
            ));
        };
        let request_id = request.id.clone();
        let status: RequestStatus = parse_enum("status", &request.status)?;

        match event_type {
            WebhookEventType::TaskStarted => match status {
                RequestStatus::Pending => {
                    apply_transition(
                        txn,
                        request,
                        RequestStatus::InProgress,
                        WEBHOOK_ACTOR,
                        event.message.clone(),
                        None,
                    )
                    .await?;
                    Ok(Applied::processed(&request_id))
                }
                RequestStatus::InProgress => Ok(Applied::processed(&request_id)),
                _ => Ok(Applied::ignored(
                    Some(&request_id),
                    format!("request is already {}", status),
                )),
            },
            WebhookEventType::TaskCompleted => {
                if status.is_terminal() {
                    return Ok(Applied::ignored(
                        Some(&request_id),
                        format!("request is already {}", status),
                    ));
                }
                apply_transition(
                    txn,
                    request,
                    RequestStatus::Completed,
                    WEBHOOK_ACTOR,
                    event.message.clone(),
                    event.deliverable_url.clone(),
                )
                .await?;
                Ok(Applied::processed(&request_id))
            }
            WebhookEventType::TaskFailed => {
                open_system_escalation(
                    txn,
                    SystemEscalation {
                        agency_id: &request.agency_id,
                        request_id: Some(&request_id),
                        schedule_id: None,
                        subject: format!("Fulfillment task {} failed", event.task_id),
                        details: event.message.clone(),
                        severity: EscalationSeverity::High,
                    },
                )
                .await?;
                Ok(Applied::processed(&request_id))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn temp_service() -> (WebhookService, TempDir) {
        crate::config::init_config();
        let dir = TempDir::new().unwrap();
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("hooks.db").display());
        let storage = Storage::connect_url(&url).await.unwrap();
        (WebhookService::new(Arc::new(storage), "fulfillment"), dir)
    }

    #[tokio::test]
    async fn test_concurrent_insert_returns_stored_outcome() {
        let (service, _dir) = temp_service().await;
        let body = br#"{"event_id":"evt_race","event_type":"task.completed","task_id":"nobody"}"#;
        let first = service.ingest(body).await.unwrap();
        assert_eq!(first.status, WebhookOutcome::Ignored);

        // 模拟另一方已先写入：再次插入同一 event_id
        let event = WebhookService::parse(body).unwrap();
        let applied = Applied::ignored(None, "late");
        let txn = service.storage.get_db().begin().await.unwrap();
        let err = service
            .store_event(&txn, &event, "{}", &applied, false)
            .await
            .unwrap_err();
        txn.rollback().await.unwrap();

        let receipt = service.stored_after_conflict("evt_race", err).await.unwrap();
        assert!(receipt.duplicate);
        assert_eq!(receipt.status, WebhookOutcome::Ignored);

        let other = service
            .stored_after_conflict("evt_race", DbErr::Custom("disk full".into()))
            .await;
        assert!(matches!(other, Err(SeoHubError::DatabaseOperation(_))));
    }

    #[test]
    fn test_verify_signature() {
        let body = br#"{"event_id":"e1"}"#;
        let header = signature::sign("s3cret", body);
        assert!(verify_signature("s3cret", body, Some(&header)).is_ok());
        assert!(matches!(
            verify_signature("other", body, Some(&header)),
            Err(SeoHubError::Unauthorized(_))
        ));
        assert!(verify_signature("s3cret", body, None).is_err());
    }

    #[test]
    fn test_parse_payload() {
        let event = WebhookService::parse(
            br#"{"event_id":" e1 ","event_type":"task.completed","task_id":"t1","deliverable_url":"https://cdn.example/r.pdf"}"#,
        )
        .unwrap();
        assert_eq!(event.event_id, "e1");
        assert_eq!(event.deliverable_url.as_deref(), Some("https://cdn.example/r.pdf"));

        assert!(WebhookService::parse(b"not json").is_err());
        assert!(
            WebhookService::parse(br#"{"event_id":"","event_type":"task.started","task_id":"t"}"#)
                .is_err()
        );
        assert!(WebhookService::parse(
            br#"{"event_id":"e","event_type":"task.completed","task_id":"t","deliverable_url":"javascript:alert(1)"}"#
        )
        .is_err());
    }
}
