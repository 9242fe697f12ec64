//! 报告调度端点

use actix_web::{HttpResponse, web};

use crate::errors::SeoHubError;
use crate::services::report_service::{CreateScheduleInput, UpdateScheduleInput};
use crate::services::{Actor, AppServices, FlagKey};
use crate::storage::PageRequest;

use super::helpers::{api_created, api_paginated, api_result};
use super::types::{DeletedResponse, PauseRequest, RetryExecutionRequest, RetryExecutionResponse};

pub async fn list_schedules(services: web::Data<AppServices>, actor: Actor) -> HttpResponse {
    api_result(services.reports.list(&actor.agency_id).await)
}

pub async fn create_schedule(
    services: web::Data<AppServices>,
    actor: Actor,
    body: web::Json<CreateScheduleInput>,
) -> HttpResponse {
    let result = async {
        services
            .flags
            .require(&actor.agency_id, FlagKey::ReportScheduling)
            .await?;
        services.reports.create(&actor, body.into_inner()).await
    }
    .await;
    api_created(result)
}

pub async fn get_schedule(
    services: web::Data<AppServices>,
    actor: Actor,
    path: web::Path<String>,
) -> HttpResponse {
    api_result(services.reports.get(&actor.agency_id, &path).await)
}

pub async fn update_schedule(
    services: web::Data<AppServices>,
    actor: Actor,
    path: web::Path<String>,
    body: web::Json<UpdateScheduleInput>,
) -> HttpResponse {
    api_result(
        services
            .reports
            .update(&actor.agency_id, &path, body.into_inner())
            .await,
    )
}

pub async fn delete_schedule(
    services: web::Data<AppServices>,
    actor: Actor,
    path: web::Path<String>,
) -> HttpResponse {
    let id = path.into_inner();
    let result = services.reports.delete(&actor.agency_id, &id).await;
    api_result(result.map(|_| DeletedResponse::new(id)))
}

/// POST /reports/schedules/{id}/pause，body 可省略
pub async fn pause_schedule(
    services: web::Data<AppServices>,
    actor: Actor,
    path: web::Path<String>,
    body: Option<web::Json<PauseRequest>>,
) -> HttpResponse {
    let reason = body.and_then(|b| b.into_inner().reason);
    api_result(
        services
            .reports
            .pause(&actor.agency_id, &path, reason)
            .await,
    )
}

pub async fn resume_schedule(
    services: web::Data<AppServices>,
    actor: Actor,
    path: web::Path<String>,
) -> HttpResponse {
    api_result(services.reports.resume(&actor.agency_id, &path).await)
}

/// POST /reports/schedules/{id}/run，暂停中的调度也允许手动执行
pub async fn run_schedule(
    services: web::Data<AppServices>,
    actor: Actor,
    path: web::Path<String>,
) -> HttpResponse {
    let result = async {
        services
            .flags
            .require(&actor.agency_id, FlagKey::ReportScheduling)
            .await?;
        services.reports.run_now(&actor.agency_id, &path).await
    }
    .await;
    api_created(result)
}

pub async fn list_executions(
    services: web::Data<AppServices>,
    actor: Actor,
    path: web::Path<String>,
    query: web::Query<PageRequest>,
) -> HttpResponse {
    api_paginated(
        services
            .reports
            .executions(&actor.agency_id, &path, query.into_inner())
            .await,
    )
}

pub async fn get_execution(
    services: web::Data<AppServices>,
    actor: Actor,
    path: web::Path<String>,
) -> HttpResponse {
    api_result(services.reports.get_execution(&actor.agency_id, &path).await)
}

/// POST /reports/executions/{id}/retry
pub async fn retry_execution(
    services: web::Data<AppServices>,
    actor: Actor,
    path: web::Path<String>,
    body: Option<web::Json<RetryExecutionRequest>>,
) -> HttpResponse {
    let resume_schedule = body.is_some_and(|b| b.resume_schedule);
    let result = services
        .reports
        .retry_execution(&actor.agency_id, &path, resume_schedule)
        .await
        .map(|(execution, schedule)| RetryExecutionResponse {
            execution,
            schedule,
        });
    api_result::<_, SeoHubError>(result)
}
