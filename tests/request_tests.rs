//! Request lifecycle, escalation and dashboard tests

use std::sync::{Arc, Once};

use seohub::config::init_config;
use seohub::errors::SeoHubError;
use seohub::services::agency_service::RegisterAgencyInput;
use seohub::services::escalation_service::{CreateEscalationInput, EscalationFilter};
use seohub::services::request_service::{CreateRequestInput, RequestFilter, UpdateRequestInput};
use seohub::services::{Actor, AgencyService, EscalationService, RequestService, StatsService};
use seohub::storage::Storage;
use seohub::storage::models::{
    EscalationSeverity, EscalationStatus, Priority, RequestStatus, Role, ServiceType,
};
use tempfile::TempDir;

static INIT: Once = Once::new();

fn init_test_config() {
    INIT.call_once(|| {
        init_config();
    });
}

async fn create_temp_storage() -> (Arc<Storage>, TempDir) {
    init_test_config();

    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = temp_dir.path().join("request_test.db");
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());

    let storage = Storage::connect_url(&db_url)
        .await
        .expect("Failed to create storage");

    (Arc::new(storage), temp_dir)
}

async fn create_owner(storage: &Arc<Storage>, agency: &str, email: &str) -> Actor {
    let (_, owner) = AgencyService::new(storage.clone())
        .create_agency(RegisterAgencyInput {
            agency_name: agency.to_string(),
            email: email.to_string(),
            name: "Owner".to_string(),
            password: "correct-horse".to_string(),
        })
        .await
        .expect("Failed to create agency");
    Actor {
        user_id: owner.id,
        agency_id: owner.agency_id,
        role: Role::Owner,
    }
}

fn new_request(title: &str, service_type: ServiceType) -> CreateRequestInput {
    CreateRequestInput {
        title: title.to_string(),
        description: Some("  ".to_string()),
        service_type,
        target_url: Some("https://client.example.com/pricing".to_string()),
        priority: None,
        due_date: None,
    }
}

// =============================================================================
// Requests
// =============================================================================

#[tokio::test]
async fn test_create_request_defaults() {
    let (storage, _dir) = create_temp_storage().await;
    let actor = create_owner(&storage, "Acme", "req@example.com").await;
    let service = RequestService::new(storage);

    let created = service
        .create(&actor, new_request("Audit homepage", ServiceType::TechnicalAudit))
        .await
        .unwrap();

    assert_eq!(created.status, "pending");
    assert_eq!(created.priority, "normal");
    assert_eq!(created.service_type, "technical_audit");
    assert_eq!(created.description, None);
    assert_eq!(created.created_by, actor.user_id);

    let history = service.history(&actor.agency_id, &created.id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].from_status, None);
    assert_eq!(history[0].to_status, "pending");
}

#[tokio::test]
async fn test_create_request_validation() {
    let (storage, _dir) = create_temp_storage().await;
    let actor = create_owner(&storage, "Acme", "val@example.com").await;
    let service = RequestService::new(storage);

    let err = service
        .create(&actor, new_request("   ", ServiceType::OnPage))
        .await
        .unwrap_err();
    assert!(matches!(err, SeoHubError::Validation(_)));

    let mut bad_url = new_request("Fix titles", ServiceType::OnPage);
    bad_url.target_url = Some("javascript:alert(1)".to_string());
    let err = service.create(&actor, bad_url).await.unwrap_err();
    assert!(matches!(err, SeoHubError::Validation(_)));
}

#[tokio::test]
async fn test_transitions_and_history() {
    let (storage, _dir) = create_temp_storage().await;
    let actor = create_owner(&storage, "Acme", "tr@example.com").await;
    let service = RequestService::new(storage);
    let req = service
        .create(&actor, new_request("Keyword plan", ServiceType::KeywordResearch))
        .await
        .unwrap();

    let started = service
        .transition(&actor.agency_id, &req.id, RequestStatus::InProgress, &actor.user_id, None)
        .await
        .unwrap();
    assert_eq!(started.status, "in_progress");

    // in_progress → pending 不合法
    let err = service
        .transition(&actor.agency_id, &req.id, RequestStatus::Pending, &actor.user_id, None)
        .await
        .unwrap_err();
    assert!(matches!(err, SeoHubError::InvalidTransition(_)));

    let done = service
        .transition(
            &actor.agency_id,
            &req.id,
            RequestStatus::Completed,
            &actor.user_id,
            Some("delivered".to_string()),
        )
        .await
        .unwrap();
    assert_eq!(done.status, "completed");
    assert!(done.completed_at.is_some());

    // 终态不能再迁移
    let err = service
        .transition(&actor.agency_id, &req.id, RequestStatus::Cancelled, &actor.user_id, None)
        .await
        .unwrap_err();
    assert!(matches!(err, SeoHubError::InvalidTransition(_)));

    let history = service.history(&actor.agency_id, &req.id).await.unwrap();
    let statuses: Vec<&str> = history.iter().map(|e| e.to_status.as_str()).collect();
    assert_eq!(statuses, vec!["pending", "in_progress", "completed"]);
    assert_eq!(history[2].note.as_deref(), Some("delivered"));
    assert_eq!(history[2].from_status.as_deref(), Some("in_progress"));
}

#[tokio::test]
async fn test_update_and_delete_rules() {
    let (storage, _dir) = create_temp_storage().await;
    let actor = create_owner(&storage, "Acme", "upd@example.com").await;
    let service = RequestService::new(storage);
    let req = service
        .create(&actor, new_request("Backlinks", ServiceType::LinkBuilding))
        .await
        .unwrap();

    let updated = service
        .update(
            &actor.agency_id,
            &req.id,
            UpdateRequestInput {
                title: Some("Backlinks Q3".to_string()),
                priority: Some(Priority::Urgent),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.title, "Backlinks Q3");
    assert_eq!(updated.priority, "urgent");
    assert_eq!(updated.target_url, req.target_url);

    service
        .transition(&actor.agency_id, &req.id, RequestStatus::InProgress, &actor.user_id, None)
        .await
        .unwrap();
    let err = service.delete(&actor.agency_id, &req.id).await.unwrap_err();
    assert!(matches!(err, SeoHubError::InvalidState(_)));

    service
        .transition(&actor.agency_id, &req.id, RequestStatus::Cancelled, &actor.user_id, None)
        .await
        .unwrap();
    let err = service
        .update(&actor.agency_id, &req.id, UpdateRequestInput::default())
        .await
        .unwrap_err();
    assert!(matches!(err, SeoHubError::InvalidState(_)));

    service.delete(&actor.agency_id, &req.id).await.unwrap();
    let err = service.get(&actor.agency_id, &req.id).await.unwrap_err();
    assert!(matches!(err, SeoHubError::NotFound(_)));
}

#[tokio::test]
async fn test_list_filters_and_pagination() {
    let (storage, _dir) = create_temp_storage().await;
    let actor = create_owner(&storage, "Acme", "list@example.com").await;
    let service = RequestService::new(storage);

    for i in 0..5 {
        service
            .create(&actor, new_request(&format!("Audit page {}", i), ServiceType::TechnicalAudit))
            .await
            .unwrap();
    }
    service
        .create(&actor, new_request("Write blog post", ServiceType::ContentWriting))
        .await
        .unwrap();

    let all = service
        .list(&actor.agency_id, &RequestFilter::default())
        .await
        .unwrap();
    assert_eq!(all.total, 6);

    let audits = service
        .list(
            &actor.agency_id,
            &RequestFilter {
                service_type: Some(ServiceType::TechnicalAudit),
                page: Some(2),
                page_size: Some(2),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(audits.total, 5);
    assert_eq!(audits.total_pages, 3);
    assert_eq!(audits.items.len(), 2);

    let search = service
        .list(
            &actor.agency_id,
            &RequestFilter {
                search: Some("BLOG".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(search.total, 1);
    assert_eq!(search.items[0].title, "Write blog post");

    let err = service
        .list(
            &actor.agency_id,
            &RequestFilter {
                page_size: Some(1000),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, SeoHubError::Validation(_)));
}

#[tokio::test]
async fn test_search_treats_wildcards_literally() {
    let (storage, _dir) = create_temp_storage().await;
    let actor = create_owner(&storage, "Acme", "wild@example.com").await;
    let service = RequestService::new(storage);

    for title in ["Homepage audit", "Grow 100% faster", "snake_case urls"] {
        service
            .create(&actor, new_request(title, ServiceType::OnPage))
            .await
            .unwrap();
    }

    let search = |term: &str| RequestFilter {
        search: Some(term.to_string()),
        ..Default::default()
    };

    let percent = service.list(&actor.agency_id, &search("%")).await.unwrap();
    assert_eq!(percent.total, 1);
    assert_eq!(percent.items[0].title, "Grow 100% faster");

    let underscore = service.list(&actor.agency_id, &search("_")).await.unwrap();
    assert_eq!(underscore.total, 1);
    assert_eq!(underscore.items[0].title, "snake_case urls");

    let none = service.list(&actor.agency_id, &search("\\")).await.unwrap();
    assert_eq!(none.total, 0);
}

#[tokio::test]
async fn test_delete_detaches_escalations() {
    let (storage, _dir) = create_temp_storage().await;
    let actor = create_owner(&storage, "Acme", "detach@example.com").await;
    let requests = RequestService::new(storage.clone());
    let escalations = EscalationService::new(storage);

    let req = requests
        .create(&actor, new_request("Short-lived", ServiceType::LocalSeo))
        .await
        .unwrap();
    let esc = escalations
        .create(
            &actor,
            CreateEscalationInput {
                request_id: Some(req.id.clone()),
                subject: "Vendor failed".to_string(),
                details: None,
                severity: EscalationSeverity::High,
            },
        )
        .await
        .unwrap();

    requests.delete(&actor.agency_id, &req.id).await.unwrap();

    let kept = escalations.get(&actor.agency_id, &esc.id).await.unwrap();
    assert_eq!(kept.request_id, None);
    assert_eq!(kept.subject, "Vendor failed");
}

#[tokio::test]
async fn test_requests_are_tenant_scoped() {
    let (storage, _dir) = create_temp_storage().await;
    let alpha = create_owner(&storage, "Alpha", "a@alpha.test").await;
    let beta = create_owner(&storage, "Beta", "b@beta.test").await;
    let service = RequestService::new(storage);

    let req = service
        .create(&alpha, new_request("Local listings", ServiceType::LocalSeo))
        .await
        .unwrap();

    let err = service.get(&beta.agency_id, &req.id).await.unwrap_err();
    assert!(matches!(err, SeoHubError::NotFound(_)));
    let err = service
        .transition(&beta.agency_id, &req.id, RequestStatus::Cancelled, &beta.user_id, None)
        .await
        .unwrap_err();
    assert!(matches!(err, SeoHubError::NotFound(_)));
    assert_eq!(
        service
            .list(&beta.agency_id, &RequestFilter::default())
            .await
            .unwrap()
            .total,
        0
    );
}

#[tokio::test]
async fn test_external_task_is_unique() {
    let (storage, _dir) = create_temp_storage().await;
    let actor = create_owner(&storage, "Acme", "ext@example.com").await;
    let service = RequestService::new(storage);
    let first = service
        .create(&actor, new_request("One", ServiceType::OnPage))
        .await
        .unwrap();
    let second = service
        .create(&actor, new_request("Two", ServiceType::OnPage))
        .await
        .unwrap();

    let linked = service
        .assign_external_task(&actor.agency_id, &first.id, "task-1")
        .await
        .unwrap();
    assert_eq!(linked.external_task_id.as_deref(), Some("task-1"));

    let err = service
        .assign_external_task(&actor.agency_id, &second.id, "task-1")
        .await
        .unwrap_err();
    assert!(matches!(err, SeoHubError::Conflict(_)));
}

// =============================================================================
// Escalations
// =============================================================================

#[tokio::test]
async fn test_escalation_lifecycle() {
    let (storage, _dir) = create_temp_storage().await;
    let actor = create_owner(&storage, "Acme", "esc@example.com").await;
    let requests = RequestService::new(storage.clone());
    let service = EscalationService::new(storage);

    let req = requests
        .create(&actor, new_request("Rankings dropped", ServiceType::Reporting))
        .await
        .unwrap();

    let created = service
        .create(
            &actor,
            CreateEscalationInput {
                request_id: Some(req.id.clone()),
                subject: "Client unhappy".to_string(),
                details: None,
                severity: EscalationSeverity::High,
            },
        )
        .await
        .unwrap();
    assert_eq!(created.status, "open");
    assert_eq!(created.created_by.as_deref(), Some(actor.user_id.as_str()));

    let acked = service.acknowledge(&actor.agency_id, &created.id).await.unwrap();
    assert_eq!(acked.status, "acknowledged");
    let err = service
        .acknowledge(&actor.agency_id, &created.id)
        .await
        .unwrap_err();
    assert!(matches!(err, SeoHubError::InvalidState(_)));

    let resolved = service.resolve(&actor.agency_id, &created.id).await.unwrap();
    assert_eq!(resolved.status, "resolved");
    assert!(resolved.resolved_at.is_some());
    let err = service.resolve(&actor.agency_id, &created.id).await.unwrap_err();
    assert!(matches!(err, SeoHubError::InvalidState(_)));

    let open = service
        .list(
            &actor.agency_id,
            &EscalationFilter {
                status: Some(EscalationStatus::Open),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(open.is_empty());
}

#[tokio::test]
async fn test_escalation_rejects_foreign_request() {
    let (storage, _dir) = create_temp_storage().await;
    let alpha = create_owner(&storage, "Alpha", "x@alpha.test").await;
    let beta = create_owner(&storage, "Beta", "y@beta.test").await;
    let req = RequestService::new(storage.clone())
        .create(&alpha, new_request("Alpha only", ServiceType::OnPage))
        .await
        .unwrap();

    let err = EscalationService::new(storage)
        .create(
            &beta,
            CreateEscalationInput {
                request_id: Some(req.id),
                subject: "Not mine".to_string(),
                details: None,
                severity: EscalationSeverity::Low,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, SeoHubError::NotFound(_)));
}

// =============================================================================
// Dashboard
// =============================================================================

#[tokio::test]
async fn test_dashboard_counts() {
    let (storage, _dir) = create_temp_storage().await;
    let actor = create_owner(&storage, "Acme", "dash@example.com").await;
    let requests = RequestService::new(storage.clone());

    let a = requests
        .create(&actor, new_request("A", ServiceType::OnPage))
        .await
        .unwrap();
    requests
        .create(&actor, new_request("B", ServiceType::OnPage))
        .await
        .unwrap();
    requests
        .transition(&actor.agency_id, &a.id, RequestStatus::InProgress, &actor.user_id, None)
        .await
        .unwrap();

    EscalationService::new(storage.clone())
        .create(
            &actor,
            CreateEscalationInput {
                request_id: None,
                subject: "Budget question".to_string(),
                details: Some("Needs a call".to_string()),
                severity: EscalationSeverity::Medium,
            },
        )
        .await
        .unwrap();

    let stats = StatsService::new(storage).dashboard(&actor.agency_id).await.unwrap();
    assert_eq!(stats.requests_total, 2);
    assert_eq!(stats.requests_by_status.get("pending"), Some(&1));
    assert_eq!(stats.requests_by_status.get("in_progress"), Some(&1));
    assert_eq!(stats.requests_by_status.get("completed"), Some(&0));
    assert_eq!(stats.open_escalations, 1);
    assert_eq!(stats.members, 1);
    assert_eq!(stats.active_schedules, 0);
}
