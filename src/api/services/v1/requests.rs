//! 需求单端点

use actix_web::{HttpResponse, web};

use crate::services::request_service::{CreateRequestInput, RequestFilter, UpdateRequestInput};
use crate::services::{Actor, AppServices};

use super::helpers::{api_created, api_paginated, api_result};
use super::types::{DeletedResponse, TransitionRequest};

pub async fn list_requests(
    services: web::Data<AppServices>,
    actor: Actor,
    query: web::Query<RequestFilter>,
) -> HttpResponse {
    api_paginated(services.requests.list(&actor.agency_id, &query).await)
}

pub async fn create_request(
    services: web::Data<AppServices>,
    actor: Actor,
    body: web::Json<CreateRequestInput>,
) -> HttpResponse {
    api_created(services.requests.create(&actor, body.into_inner()).await)
}

pub async fn get_request(
    services: web::Data<AppServices>,
    actor: Actor,
    path: web::Path<String>,
) -> HttpResponse {
    api_result(services.requests.get(&actor.agency_id, &path).await)
}

pub async fn update_request(
    services: web::Data<AppServices>,
    actor: Actor,
    path: web::Path<String>,
    body: web::Json<UpdateRequestInput>,
) -> HttpResponse {
    api_result(
        services
            .requests
            .update(&actor.agency_id, &path, body.into_inner())
            .await,
    )
}

pub async fn delete_request(
    services: web::Data<AppServices>,
    actor: Actor,
    path: web::Path<String>,
) -> HttpResponse {
    let id = path.into_inner();
    let result = services.requests.delete(&actor.agency_id, &id).await;
    api_result(result.map(|_| DeletedResponse::new(id)))
}

/// POST /requests/{id}/transition
pub async fn transition_request(
    services: web::Data<AppServices>,
    actor: Actor,
    path: web::Path<String>,
    body: web::Json<TransitionRequest>,
) -> HttpResponse {
    let TransitionRequest { status, note } = body.into_inner();
    api_result(
        services
            .requests
            .transition(&actor.agency_id, &path, status, &actor.user_id, note)
            .await,
    )
}

pub async fn request_history(
    services: web::Data<AppServices>,
    actor: Actor,
    path: web::Path<String>,
) -> HttpResponse {
    api_result(services.requests.history(&actor.agency_id, &path).await)
}
