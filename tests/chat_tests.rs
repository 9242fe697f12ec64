//! AI chat tests with an in-process provider

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Once};

use async_trait::async_trait;

use seohub::config::{get_config, init_config};
use seohub::errors::{Result, SeoHubError};
use seohub::services::agency_service::RegisterAgencyInput;
use seohub::services::ai::{ChatCompletion, ChatProvider, ChatRequest};
use seohub::services::chat_service::AUTO_TITLE_CHARS;
use seohub::services::{Actor, AgencyService, ChatService};
use seohub::storage::Storage;
use seohub::storage::models::{MessageRole, Role};
use tempfile::TempDir;

static INIT: Once = Once::new();

fn init_test_config() {
    INIT.call_once(|| {
        init_config();
    });
}

/// 回显最后一条用户消息，并记录收到的请求
#[derive(Default)]
struct EchoProvider {
    requests: Mutex<Vec<ChatRequest>>,
    fail: AtomicBool,
}

#[async_trait]
impl ChatProvider for EchoProvider {
    async fn complete(&self, request: ChatRequest) -> Result<ChatCompletion> {
        self.requests.lock().unwrap().push(request.clone());
        if self.fail.load(Ordering::SeqCst) {
            return Err(SeoHubError::chat_provider("provider returned 502"));
        }
        let last = request
            .messages
            .last()
            .map(|m| m.content.clone())
            .unwrap_or_default();
        Ok(ChatCompletion {
            content: format!("echo: {}", last),
            model: request.model,
            prompt_tokens: Some(12),
            completion_tokens: Some(4),
        })
    }
}

async fn setup(provider: Option<Arc<EchoProvider>>) -> (ChatService, Actor, Arc<Storage>, TempDir) {
    init_test_config();

    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = temp_dir.path().join("chat_test.db");
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let storage = Arc::new(
        Storage::connect_url(&db_url)
            .await
            .expect("Failed to create storage"),
    );

    let (_, owner) = AgencyService::new(storage.clone())
        .create_agency(RegisterAgencyInput {
            agency_name: "Acme".to_string(),
            email: "chat@example.com".to_string(),
            name: "Owner".to_string(),
            password: "correct-horse".to_string(),
        })
        .await
        .expect("Failed to create agency");
    let actor = Actor {
        user_id: owner.id,
        agency_id: owner.agency_id,
        role: Role::Owner,
    };

    let provider = provider.map(|p| p as Arc<dyn ChatProvider>);
    (
        ChatService::new(storage.clone(), provider),
        actor,
        storage,
        temp_dir,
    )
}

#[tokio::test]
async fn test_conversation_crud() {
    let (service, actor, _storage, _dir) = setup(None).await;

    let conv = service
        .create_conversation(&actor, None, None)
        .await
        .unwrap();
    assert_eq!(conv.model, get_config().ai.default_model);
    assert!(conv.title.is_none());

    let err = service
        .create_conversation(&actor, None, Some("someone/unknown-model".to_string()))
        .await
        .unwrap_err();
    assert!(matches!(err, SeoHubError::Validation(_)));

    let renamed = service.rename(&actor, &conv.id, "Keyword ideas").await.unwrap();
    assert_eq!(renamed.title.as_deref(), Some("Keyword ideas"));
    assert_eq!(service.list_conversations(&actor).await.unwrap().len(), 1);

    service.delete(&actor, &conv.id).await.unwrap();
    let err = service.get_conversation(&actor, &conv.id).await.unwrap_err();
    assert!(matches!(err, SeoHubError::NotFound(_)));
}

#[tokio::test]
async fn test_conversations_are_private_to_user() {
    let (service, actor, _storage, _dir) = setup(None).await;
    let conv = service
        .create_conversation(&actor, Some("Mine".to_string()), None)
        .await
        .unwrap();

    // 同一机构的其他成员也看不到
    let colleague = Actor {
        user_id: "someone-else".to_string(),
        agency_id: actor.agency_id.clone(),
        role: Role::Admin,
    };
    let err = service.get_conversation(&colleague, &conv.id).await.unwrap_err();
    assert!(matches!(err, SeoHubError::NotFound(_)));
    assert!(service.list_conversations(&colleague).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_send_message_without_provider() {
    let (service, actor, _storage, _dir) = setup(None).await;
    let conv = service
        .create_conversation(&actor, None, None)
        .await
        .unwrap();
    let err = service
        .send_message(&actor, &conv.id, "hello", None)
        .await
        .unwrap_err();
    assert!(matches!(err, SeoHubError::ServiceUnavailable(_)));
}

#[tokio::test]
async fn test_send_message_round_trip() {
    let provider = Arc::new(EchoProvider::default());
    let (service, actor, _storage, _dir) = setup(Some(provider.clone())).await;
    let conv = service
        .create_conversation(&actor, None, None)
        .await
        .unwrap();

    let long_question = "What are the best local SEO tactics for a plumbing company in a mid-sized city?";
    let exchange = service
        .send_message(&actor, &conv.id, long_question, None)
        .await
        .unwrap();
    assert_eq!(exchange.user_message.role, "user");
    assert_eq!(exchange.assistant_message.role, "assistant");
    assert_eq!(
        exchange.assistant_message.content,
        format!("echo: {}", long_question)
    );
    assert_eq!(exchange.assistant_message.prompt_tokens, Some(12));
    // 首条消息自动生成标题
    let title = exchange.conversation.title.unwrap();
    assert_eq!(title.chars().count(), AUTO_TITLE_CHARS);
    assert!(long_question.starts_with(&title));

    let second = service
        .send_message(&actor, &conv.id, "And for backlinks?", Some("openai/gpt-4o".to_string()))
        .await
        .unwrap();
    assert_eq!(second.assistant_message.model.as_deref(), Some("openai/gpt-4o"));

    // 第二次请求带上完整历史
    let requests = provider.requests.lock().unwrap();
    assert_eq!(requests.len(), 2);
    let roles: Vec<MessageRole> = requests[1].messages.iter().map(|m| m.role).collect();
    assert_eq!(
        roles,
        vec![MessageRole::User, MessageRole::Assistant, MessageRole::User]
    );
    drop(requests);

    let detail = service.get_conversation(&actor, &conv.id).await.unwrap();
    assert_eq!(detail.messages.len(), 4);
}

#[tokio::test]
async fn test_provider_failure_keeps_user_message() {
    let provider = Arc::new(EchoProvider {
        fail: AtomicBool::new(true),
        ..Default::default()
    });
    let (service, actor, _storage, _dir) = setup(Some(provider)).await;
    let conv = service
        .create_conversation(&actor, None, None)
        .await
        .unwrap();

    let err = service
        .send_message(&actor, &conv.id, "hello?", None)
        .await
        .unwrap_err();
    assert!(matches!(err, SeoHubError::ChatProvider(_)));

    let detail = service.get_conversation(&actor, &conv.id).await.unwrap();
    assert_eq!(detail.messages.len(), 1);
    assert_eq!(detail.messages[0].role, "user");
    assert!(detail.conversation.title.is_none());
}

#[tokio::test]
async fn test_empty_message_rejected() {
    let provider = Arc::new(EchoProvider::default());
    let (service, actor, _storage, _dir) = setup(Some(provider.clone())).await;
    let conv = service
        .create_conversation(&actor, None, None)
        .await
        .unwrap();
    let err = service
        .send_message(&actor, &conv.id, "   ", None)
        .await
        .unwrap_err();
    assert!(matches!(err, SeoHubError::Validation(_)));
    assert!(provider.requests.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_title_uses_first_message_after_failed_send() {
    let provider = Arc::new(EchoProvider {
        fail: AtomicBool::new(true),
        ..Default::default()
    });
    let (service, actor, _storage, _dir) = setup(Some(provider.clone())).await;
    let conv = service
        .create_conversation(&actor, None, None)
        .await
        .unwrap();

    assert!(
        service
            .send_message(&actor, &conv.id, "FIRST question about citations", None)
            .await
            .is_err()
    );

    provider.fail.store(false, Ordering::SeqCst);
    let exchange = service
        .send_message(&actor, &conv.id, "second message", None)
        .await
        .unwrap();
    assert_eq!(
        exchange.conversation.title.as_deref(),
        Some("FIRST question about citations")
    );

    // 第二次请求带上失败那次留下的用户消息
    let requests = provider.requests.lock().unwrap();
    let last = requests.last().unwrap();
    assert_eq!(last.messages.len(), 2);
    assert_eq!(last.messages[0].content, "FIRST question about citations");
}
