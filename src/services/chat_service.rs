//! AI chat conversations

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, IntoActiveModel, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use serde::Serialize;
use tracing::{info, warn};

use crate::config::{AiConfig, get_config};
use crate::errors::{Result, SeoHubError};
use crate::storage::Storage;
use crate::storage::models::{MessageRole, parse_enum};
use crate::utils::new_id;
use crate::utils::validation::{require_text, truncate_chars};
use migration::entities::{conversation, message};

use super::Actor;
use super::ai::{ChatMessage, ChatProvider, ChatRequest, OpenRouterProvider};

pub const MAX_MESSAGE_CHARS: usize = 8000;
pub const AUTO_TITLE_CHARS: usize = 60;
const MAX_TITLE_CHARS: usize = 200;

#[derive(Debug, Clone, Serialize)]
pub struct ConversationView {
    pub id: String,
    pub title: Option<String>,
    pub model: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<conversation::Model> for ConversationView {
    fn from(m: conversation::Model) -> Self {
        Self {
            id: m.id,
            title: m.title,
            model: m.model,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageView {
    pub id: String,
    pub role: String,
    pub content: String,
    pub model: Option<String>,
    pub prompt_tokens: Option<i32>,
    pub completion_tokens: Option<i32>,
    pub created_at: DateTime<Utc>,
}

impl From<message::Model> for MessageView {
    fn from(m: message::Model) -> Self {
        Self {
            id: m.id,
            role: m.role,
            content: m.content,
            model: m.model,
            prompt_tokens: m.prompt_tokens,
            completion_tokens: m.completion_tokens,
            created_at: m.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ConversationDetail {
    #[serde(flatten)]
    pub conversation: ConversationView,
    pub messages: Vec<MessageView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExchangeView {
    pub conversation: ConversationView,
    pub user_message: MessageView,
    pub assistant_message: MessageView,
}

/// 按配置构造 provider；未配置 API key 时返回 None
pub fn provider_from_config(config: &AiConfig) -> Option<Arc<dyn ChatProvider>> {
    let key = config.api_key.as_deref().map(str::trim).filter(|k| !k.is_empty())?;
    Some(Arc::new(OpenRouterProvider::new(
        &config.base_url,
        key,
        config.timeout_secs,
    )))
}

pub struct ChatService {
    storage: Arc<Storage>,
    provider: Option<Arc<dyn ChatProvider>>,
}

impl ChatService {
    pub fn new(storage: Arc<Storage>, provider: Option<Arc<dyn ChatProvider>>) -> Self {
        Self { storage, provider }
    }

    fn check_model(model: Option<&str>) -> Result<String> {
        let config = get_config();
        let model = model
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(&config.ai.default_model);
        if config.ai.allowed_models.iter().any(|m| m == model) {
            Ok(model.to_string())
        } else {
            Err(SeoHubError::validation(format!(
                "model '{}' is not allowed (allowed: {})",
                model,
                config.ai.allowed_models.join(", ")
            )))
        }
    }

    fn clean_title(title: Option<String>) -> Result<Option<String>> {
        match title {
            Some(t) if t.trim().is_empty() => Ok(None),
            Some(t) => require_text("title", &t, MAX_TITLE_CHARS).map(Some),
            None => Ok(None),
        }
    }

    /// 只能访问自己的会话
    async fn find_owned(&self, actor: &Actor, id: &str) -> Result<conversation::Model> {
        conversation::Entity::find_by_id(id.to_string())
            .filter(conversation::Column::AgencyId.eq(&actor.agency_id))
            .filter(conversation::Column::UserId.eq(&actor.user_id))
            .one(self.storage.get_db())
            .await?
            .ok_or_else(|| SeoHubError::not_found(format!("Conversation '{}' not found", id)))
    }

    pub async fn create_conversation(
        &self,
        actor: &Actor,
        title: Option<String>,
        model: Option<String>,
    ) -> Result<ConversationView> {
        let model = Self::check_model(model.as_deref())?;
        let title = Self::clean_title(title)?;
        let now = Utc::now();
        let created = conversation::ActiveModel {
            id: Set(new_id()),
            agency_id: Set(actor.agency_id.clone()),
            user_id: Set(actor.user_id.clone()),
            title: Set(title),
            model: Set(model),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(self.storage.get_db())
        .await?;
        Ok(created.into())
    }

    pub async fn list_conversations(&self, actor: &Actor) -> Result<Vec<ConversationView>> {
        let rows = conversation::Entity::find()
            .filter(conversation::Column::AgencyId.eq(&actor.agency_id))
            .filter(conversation::Column::UserId.eq(&actor.user_id))
            .order_by_desc(conversation::Column::UpdatedAt)
            .all(self.storage.get_db())
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn get_conversation(&self, actor: &Actor, id: &str) -> Result<ConversationDetail> {
        let found = self.find_owned(actor, id).await?;
        let messages = message::Entity::find()
            .filter(message::Column::ConversationId.eq(id))
            .order_by_asc(message::Column::CreatedAt)
            .all(self.storage.get_db())
            .await?;
        Ok(ConversationDetail {
            conversation: found.into(),
            messages: messages.into_iter().map(Into::into).collect(),
        })
    }

    pub async fn rename(&self, actor: &Actor, id: &str, title: &str) -> Result<ConversationView> {
        let title = require_text("title", title, MAX_TITLE_CHARS)?;
        let mut model = self.find_owned(actor, id).await?.into_active_model();
        model.title = Set(Some(title));
        model.updated_at = Set(Utc::now());
        Ok(model.update(self.storage.get_db()).await?.into())
    }

    pub async fn delete(&self, actor: &Actor, id: &str) -> Result<()> {
        let found = self.find_owned(actor, id).await?;
        let txn = self.storage.get_db().begin().await?;
        message::Entity::delete_many()
            .filter(message::Column::ConversationId.eq(found.id.as_str()))
            .exec(&txn)
            .await?;
        conversation::Entity::delete_by_id(found.id)
            .exec(&txn)
            .await?;
        txn.commit().await?;
        Ok(())
    }

    /// 保存用户消息，调用模型并保存回复
    ///
    /// provider 失败时用户消息保留，返回 `ChatProvider` 错误。
    pub async fn send_message(
        &self,
        actor: &Actor,
        id: &str,
        content: &str,
        model: Option<String>,
    ) -> Result<ExchangeView> {
        let Some(provider) = self.provider.clone() else {
            return Err(SeoHubError::service_unavailable(
                "AI chat is not configured on this server",
            ));
        };
        let content = require_text("content", content, MAX_MESSAGE_CHARS)?;
        let found = self.find_owned(actor, id).await?;
        let model = match model {
            Some(m) => Self::check_model(Some(&m))?,
            None => found.model.clone(),
        };
        let db = self.storage.get_db();

        let user_message = message::ActiveModel {
            id: Set(new_id()),
            conversation_id: Set(found.id.clone()),
            role: Set(MessageRole::User.to_string()),
            content: Set(content.clone()),
            model: Set(None),
            prompt_tokens: Set(None),
            completion_tokens: Set(None),
            created_at: Set(Utc::now()),
        }
        .insert(db)
        .await?;

        let ai = get_config().ai.clone();
        let mut history = message::Entity::find()
            .filter(message::Column::ConversationId.eq(found.id.as_str()))
            .order_by_desc(message::Column::CreatedAt)
            .limit(ai.max_history.max(1))
            .all(db)
            .await?;
        history.reverse();

        let mut messages = Vec::with_capacity(history.len() + 1);
        if let Some(prompt) = ai.system_prompt.as_deref().filter(|p| !p.trim().is_empty()) {
            messages.push(ChatMessage::new(MessageRole::System, prompt));
        }
        for m in history {
            let role: MessageRole = parse_enum("role", &m.role)?;
            messages.push(ChatMessage::new(role, m.content));
        }

        let completion = provider
            .complete(ChatRequest {
                model: model.clone(),
                messages,
            })
            .await
            .inspect_err(|e| warn!("Chat completion failed for conversation {}: {}", id, e))?;

        let now = Utc::now();
        let txn = db.begin().await?;
        let assistant_message = message::ActiveModel {
            id: Set(new_id()),
            conversation_id: Set(found.id.clone()),
            role: Set(MessageRole::Assistant.to_string()),
            content: Set(completion.content),
            model: Set(Some(completion.model)),
            prompt_tokens: Set(completion.prompt_tokens),
            completion_tokens: Set(completion.completion_tokens),
            created_at: Set(now),
        }
        .insert(&txn)
        .await?;

        // 标题取自第一条用户消息，之前的发送可能失败过
        let auto_title = if found.title.is_none() {
            let first = message::Entity::find()
                .filter(message::Column::ConversationId.eq(found.id.as_str()))
                .filter(message::Column::Role.eq(MessageRole::User.as_ref()))
                .order_by_asc(message::Column::CreatedAt)
                .one(&txn)
                .await?;
            let source = first.map(|m| m.content).unwrap_or_else(|| content.clone());
            Some(truncate_chars(&source, AUTO_TITLE_CHARS))
        } else {
            None
        };
        let mut conv = found.into_active_model();
        if auto_title.is_some() {
            conv.title = Set(auto_title);
        }
        conv.updated_at = Set(now);
        let conv = conv.update(&txn).await?;
        txn.commit().await?;

        info!(
            "Chat exchange in conversation {} (model {}, tokens {:?}/{:?})",
            conv.id,
            model,
            assistant_message.prompt_tokens,
            assistant_message.completion_tokens
        );

        Ok(ExchangeView {
            conversation: conv.into(),
            user_message: user_message.into(),
            assistant_message: assistant_message.into(),
        })
    }
}
