use actix_web::{HttpResponse, web};

use crate::services::escalation_service::{CreateEscalationInput, EscalationFilter};
use crate::services::{Actor, AppServices, FlagKey};

use super::helpers::{api_created, api_result};

pub async fn list_escalations(
    services: web::Data<AppServices>,
    actor: Actor,
    query: web::Query<EscalationFilter>,
) -> HttpResponse {
    api_result(services.escalations.list(&actor.agency_id, &query).await)
}

pub async fn create_escalation(
    services: web::Data<AppServices>,
    actor: Actor,
    body: web::Json<CreateEscalationInput>,
) -> HttpResponse {
    let result = async {
        services
            .flags
            .require(&actor.agency_id, FlagKey::Escalations)
            .await?;
        services.escalations.create(&actor, body.into_inner()).await
    }
    .await;
    api_created(result)
}

pub async fn get_escalation(
    services: web::Data<AppServices>,
    actor: Actor,
    path: web::Path<String>,
) -> HttpResponse {
    api_result(services.escalations.get(&actor.agency_id, &path).await)
}

pub async fn acknowledge_escalation(
    services: web::Data<AppServices>,
    actor: Actor,
    path: web::Path<String>,
) -> HttpResponse {
    api_result(
        services
            .escalations
            .acknowledge(&actor.agency_id, &path)
            .await,
    )
}

pub async fn resolve_escalation(
    services: web::Data<AppServices>,
    actor: Actor,
    path: web::Path<String>,
) -> HttpResponse {
    api_result(services.escalations.resolve(&actor.agency_id, &path).await)
}
