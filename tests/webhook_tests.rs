//! Fulfillment webhook ingestion tests

use std::sync::{Arc, Once};

use chrono::Utc;
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use serde_json::json;

use migration::entities::webhook_event;
use seohub::config::init_config;
use seohub::errors::SeoHubError;
use seohub::services::agency_service::RegisterAgencyInput;
use seohub::services::escalation_service::EscalationFilter;
use seohub::services::request_service::CreateRequestInput;
use seohub::services::webhook_service::{WEBHOOK_ACTOR, verify_signature};
use seohub::services::{Actor, AgencyService, EscalationService, RequestService, WebhookService};
use seohub::storage::Storage;
use seohub::storage::models::{Role, ServiceType, WebhookOutcome};
use seohub::utils::signature;
use tempfile::TempDir;

static INIT: Once = Once::new();

fn init_test_config() {
    INIT.call_once(|| {
        init_config();
    });
}

struct Fixture {
    storage: Arc<Storage>,
    actor: Actor,
    requests: RequestService,
    webhooks: WebhookService,
    _dir: TempDir,
}

async fn setup() -> Fixture {
    init_test_config();

    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = temp_dir.path().join("webhook_test.db");
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let storage = Arc::new(
        Storage::connect_url(&db_url)
            .await
            .expect("Failed to create storage"),
    );

    let (_, owner) = AgencyService::new(storage.clone())
        .create_agency(RegisterAgencyInput {
            agency_name: "Acme".to_string(),
            email: "hooks@example.com".to_string(),
            name: "Owner".to_string(),
            password: "correct-horse".to_string(),
        })
        .await
        .expect("Failed to create agency");

    Fixture {
        actor: Actor {
            user_id: owner.id,
            agency_id: owner.agency_id,
            role: Role::Owner,
        },
        requests: RequestService::new(storage.clone()),
        webhooks: WebhookService::new(storage.clone(), "fulfillment"),
        storage,
        _dir: temp_dir,
    }
}

impl Fixture {
    async fn new_request(&self, title: &str) -> String {
        self.requests
            .create(
                &self.actor,
                CreateRequestInput {
                    title: title.to_string(),
                    description: None,
                    service_type: ServiceType::ContentWriting,
                    target_url: None,
                    priority: None,
                    due_date: None,
                },
            )
            .await
            .expect("Failed to create request")
            .id
    }
}

fn body(value: serde_json::Value) -> Vec<u8> {
    serde_json::to_vec(&value).unwrap()
}

#[test]
fn test_signature_header_verification() {
    let payload = body(json!({"event_id": "evt_sig"}));
    let header = signature::sign("whsec", &payload);
    assert!(verify_signature("whsec", &payload, Some(&header)).is_ok());
    let upper_hex = format!("sha256={}", header.trim_start_matches("sha256=").to_uppercase());
    assert!(verify_signature("whsec", &payload, Some(&upper_hex)).is_ok());
    assert!(verify_signature("whsec", b"tampered", Some(&header)).is_err());
    assert!(verify_signature("whsec", &payload, None).is_err());
}

#[tokio::test]
async fn test_started_then_completed() {
    let fx = setup().await;
    let request_id = fx.new_request("Blog series").await;

    let receipt = fx
        .webhooks
        .ingest(&body(json!({
            "event_id": "evt_1",
            "event_type": "task.started",
            "task_id": "vendor-42",
            "request_id": request_id,
        })))
        .await
        .unwrap();
    assert_eq!(receipt.status, WebhookOutcome::Processed);
    assert!(!receipt.duplicate);

    let req = fx.requests.get(&fx.actor.agency_id, &request_id).await.unwrap();
    assert_eq!(req.status, "in_progress");
    assert_eq!(req.external_task_id.as_deref(), Some("vendor-42"));

    // 之后只靠 task_id 也能关联到请求
    let receipt = fx
        .webhooks
        .ingest(&body(json!({
            "event_id": "evt_2",
            "event_type": "task.completed",
            "task_id": "vendor-42",
            "deliverable_url": "https://docs.example.com/deliverable",
            "message": "All five posts delivered",
        })))
        .await
        .unwrap();
    assert_eq!(receipt.status, WebhookOutcome::Processed);
    assert_eq!(receipt.request_id.as_deref(), Some(request_id.as_str()));

    let req = fx.requests.get(&fx.actor.agency_id, &request_id).await.unwrap();
    assert_eq!(req.status, "completed");
    assert_eq!(
        req.deliverable_url.as_deref(),
        Some("https://docs.example.com/deliverable")
    );

    let history = fx.requests.history(&fx.actor.agency_id, &request_id).await.unwrap();
    assert_eq!(history.len(), 3);
    assert!(history[1..].iter().all(|e| e.actor == WEBHOOK_ACTOR));
    assert_eq!(history[2].note.as_deref(), Some("All five posts delivered"));
}

#[tokio::test]
async fn test_duplicate_delivery_is_idempotent() {
    let fx = setup().await;
    let request_id = fx.new_request("Audit").await;
    let payload = body(json!({
        "event_id": "evt_dup",
        "event_type": "task.started",
        "task_id": "vendor-dup",
        "request_id": request_id,
    }));

    let first = fx.webhooks.ingest(&payload).await.unwrap();
    let second = fx.webhooks.ingest(&payload).await.unwrap();
    assert!(!first.duplicate);
    assert!(second.duplicate);
    assert_eq!(second.status, WebhookOutcome::Processed);

    let history = fx.requests.history(&fx.actor.agency_id, &request_id).await.unwrap();
    assert_eq!(history.len(), 2);
}

#[tokio::test]
async fn test_unknown_task_is_ignored() {
    let fx = setup().await;
    let receipt = fx
        .webhooks
        .ingest(&body(json!({
            "event_id": "evt_orphan",
            "event_type": "task.completed",
            "task_id": "nobody-knows",
        })))
        .await
        .unwrap();
    assert_eq!(receipt.status, WebhookOutcome::Ignored);
    assert!(receipt.request_id.is_none());
    assert!(receipt.detail.is_some());
}

#[tokio::test]
async fn test_unsupported_event_type_is_ignored() {
    let fx = setup().await;
    let request_id = fx.new_request("Links").await;
    let receipt = fx
        .webhooks
        .ingest(&body(json!({
            "event_id": "evt_odd",
            "event_type": "task.commented",
            "task_id": "vendor-7",
            "request_id": request_id,
        })))
        .await
        .unwrap();
    assert_eq!(receipt.status, WebhookOutcome::Ignored);

    let req = fx.requests.get(&fx.actor.agency_id, &request_id).await.unwrap();
    assert_eq!(req.status, "pending");
}

#[tokio::test]
async fn test_completed_on_terminal_request_is_ignored() {
    let fx = setup().await;
    let request_id = fx.new_request("Cancelled work").await;
    fx.requests
        .transition(
            &fx.actor.agency_id,
            &request_id,
            seohub::storage::models::RequestStatus::Cancelled,
            &fx.actor.user_id,
            None,
        )
        .await
        .unwrap();

    let receipt = fx
        .webhooks
        .ingest(&body(json!({
            "event_id": "evt_late",
            "event_type": "task.completed",
            "task_id": "vendor-late",
            "request_id": request_id,
        })))
        .await
        .unwrap();
    assert_eq!(receipt.status, WebhookOutcome::Ignored);
    let req = fx.requests.get(&fx.actor.agency_id, &request_id).await.unwrap();
    assert_eq!(req.status, "cancelled");
}

#[tokio::test]
async fn test_failed_task_opens_escalation() {
    let fx = setup().await;
    let request_id = fx.new_request("Local citations").await;

    let receipt = fx
        .webhooks
        .ingest(&body(json!({
            "event_id": "evt_fail",
            "event_type": "task.failed",
            "task_id": "vendor-9",
            "request_id": request_id,
            "message": "Writer unavailable",
        })))
        .await
        .unwrap();
    assert_eq!(receipt.status, WebhookOutcome::Processed);

    let escalations = EscalationService::new(fx.storage.clone())
        .list(&fx.actor.agency_id, &EscalationFilter::default())
        .await
        .unwrap();
    assert_eq!(escalations.len(), 1);
    assert_eq!(escalations[0].severity, "high");
    assert_eq!(escalations[0].request_id.as_deref(), Some(request_id.as_str()));
    assert_eq!(escalations[0].created_by, None);
    assert_eq!(escalations[0].details.as_deref(), Some("Writer unavailable"));
}

#[tokio::test]
async fn test_failed_event_is_reprocessed_on_redelivery() {
    let fx = setup().await;
    let request_id = fx.new_request("Schema markup").await;

    // 上一次投递处理失败，只留下 failed 记录
    webhook_event::ActiveModel {
        event_id: Set("evt_retry".to_string()),
        source: Set("fulfillment".to_string()),
        event_type: Set("task.started".to_string()),
        payload: Set("{}".to_string()),
        status: Set(WebhookOutcome::Failed.as_ref().to_string()),
        error: Set(Some("database is locked".to_string())),
        request_id: Set(None),
        received_at: Set(Utc::now()),
    }
    .insert(fx.storage.get_db())
    .await
    .unwrap();

    let receipt = fx
        .webhooks
        .ingest(&body(json!({
            "event_id": "evt_retry",
            "event_type": "task.started",
            "task_id": "vendor-7",
            "request_id": request_id,
        })))
        .await
        .unwrap();
    assert!(!receipt.duplicate);
    assert_eq!(receipt.status, WebhookOutcome::Processed);

    let req = fx.requests.get(&fx.actor.agency_id, &request_id).await.unwrap();
    assert_eq!(req.status, "in_progress");

    let stored = webhook_event::Entity::find_by_id("evt_retry".to_string())
        .one(fx.storage.get_db())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, "processed");
    assert_eq!(stored.error, None);
    assert_eq!(stored.request_id.as_deref(), Some(request_id.as_str()));

    // 处理成功后再投递就是普通重复
    let receipt = fx
        .webhooks
        .ingest(&body(json!({
            "event_id": "evt_retry",
            "event_type": "task.started",
            "task_id": "vendor-7",
            "request_id": request_id,
        })))
        .await
        .unwrap();
    assert!(receipt.duplicate);
}

#[tokio::test]
async fn test_malformed_payload_rejected() {
    let fx = setup().await;
    let err = fx.webhooks.ingest(b"not json").await.unwrap_err();
    assert!(matches!(err, SeoHubError::Validation(_)));

    let err = fx
        .webhooks
        .ingest(&body(json!({
            "event_id": " ",
            "event_type": "task.started",
            "task_id": "t",
        })))
        .await
        .unwrap_err();
    assert!(matches!(err, SeoHubError::Validation(_)));
}
