//! AI 对话端点，全部受 `ai_chat` 开关控制

use actix_web::{HttpResponse, web};

use crate::errors::Result;
use crate::services::{Actor, AppServices, FlagKey};

use super::helpers::{api_created, api_result};
use super::types::{
    CreateConversationRequest, DeletedResponse, RenameConversationRequest, SendMessageRequest,
};

async fn require_chat(services: &AppServices, actor: &Actor) -> Result<()> {
    services
        .flags
        .require(&actor.agency_id, FlagKey::AiChat)
        .await
}

pub async fn list_conversations(services: web::Data<AppServices>, actor: Actor) -> HttpResponse {
    let result = async {
        require_chat(&services, &actor).await?;
        services.chat.list_conversations(&actor).await
    }
    .await;
    api_result(result)
}

pub async fn create_conversation(
    services: web::Data<AppServices>,
    actor: Actor,
    body: Option<web::Json<CreateConversationRequest>>,
) -> HttpResponse {
    let CreateConversationRequest { title, model } =
        body.map(|b| b.into_inner()).unwrap_or_default();
    let result = async {
        require_chat(&services, &actor).await?;
        services.chat.create_conversation(&actor, title, model).await
    }
    .await;
    api_created(result)
}

pub async fn get_conversation(
    services: web::Data<AppServices>,
    actor: Actor,
    path: web::Path<String>,
) -> HttpResponse {
    let result = async {
        require_chat(&services, &actor).await?;
        services.chat.get_conversation(&actor, &path).await
    }
    .await;
    api_result(result)
}

pub async fn rename_conversation(
    services: web::Data<AppServices>,
    actor: Actor,
    path: web::Path<String>,
    body: web::Json<RenameConversationRequest>,
) -> HttpResponse {
    let result = async {
        require_chat(&services, &actor).await?;
        services.chat.rename(&actor, &path, &body.title).await
    }
    .await;
    api_result(result)
}

pub async fn delete_conversation(
    services: web::Data<AppServices>,
    actor: Actor,
    path: web::Path<String>,
) -> HttpResponse {
    let id = path.into_inner();
    let result = async {
        require_chat(&services, &actor).await?;
        services.chat.delete(&actor, &id).await
    }
    .await;
    api_result(result.map(|_| DeletedResponse::new(id)))
}

/// POST /conversations/{id}/messages
pub async fn send_message(
    services: web::Data<AppServices>,
    actor: Actor,
    path: web::Path<String>,
    body: web::Json<SendMessageRequest>,
) -> HttpResponse {
    let SendMessageRequest { content, model } = body.into_inner();
    let result = async {
        require_chat(&services, &actor).await?;
        services
            .chat
            .send_message(&actor, &path, &content, model)
            .await
    }
    .await;
    api_created(result)
}
