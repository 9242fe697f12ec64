//! API v1 路由配置
//!
//! 公开端点（注册、登录、刷新、接受邀请、webhook）在前；
//! 其余端点挂在带 [`JwtAuth`] 的空前缀 scope 下，必须最后注册。

use actix_web::web;

use crate::api::constants::API_PREFIX;
use crate::api::middleware::JwtAuth;

use super::agency::{
    accept_invite, change_role, create_invite, get_agency, get_onboarding, list_invites,
    list_users, remove_user, rename_agency, revoke_invite, submit_onboarding,
};
use super::auth::{login, login_rate_limiter, me, refresh, register};
use super::chat::{
    create_conversation, delete_conversation, get_conversation, list_conversations,
    rename_conversation, send_message,
};
use super::escalations::{
    acknowledge_escalation, create_escalation, get_escalation, list_escalations,
    resolve_escalation,
};
use super::flags::{list_flags, set_flag, unset_flag};
use super::reports::{
    create_schedule, delete_schedule, get_execution, get_schedule, list_executions,
    list_schedules, pause_schedule, resume_schedule, retry_execution, run_schedule,
    update_schedule,
};
use super::requests::{
    create_request, delete_request, get_request, list_requests, request_history,
    transition_request, update_request,
};
use super::stats::get_stats;
use super::webhooks::{fulfillment_webhook, payload_config};

/// 认证路由 `/auth`
///
/// - POST /auth/register
/// - POST /auth/login（带限流）
/// - POST /auth/refresh
/// - GET /auth/me（需要 access token）
pub fn auth_routes() -> actix_web::Scope {
    web::scope("/auth")
        .route("/register", web::post().to(register))
        .route(
            "/login",
            web::post().to(login).wrap(login_rate_limiter()),
        )
        .route("/refresh", web::post().to(refresh))
        .route("/me", web::get().to(me).wrap(JwtAuth))
}

/// Webhook 路由 `/webhooks`，body 上限来自 `webhook.max_body_kb`
pub fn webhook_routes() -> actix_web::Scope {
    web::scope("/webhooks")
        .app_data(payload_config())
        .route("/fulfillment", web::post().to(fulfillment_webhook))
}

/// 机构路由 `/agency`
pub fn agency_routes() -> actix_web::Scope {
    web::scope("/agency")
        .route("", web::get().to(get_agency))
        .route("", web::patch().to(rename_agency))
        .route("/onboarding", web::get().to(get_onboarding))
        .route("/onboarding", web::put().to(submit_onboarding))
        .route("/users", web::get().to(list_users))
        .route("/users/{id}", web::patch().to(change_role))
        .route("/users/{id}", web::delete().to(remove_user))
        .route("/invites", web::get().to(list_invites))
        .route("/invites", web::post().to(create_invite))
        .route("/invites/{id}", web::delete().to(revoke_invite))
}

/// 需求单路由 `/requests`
pub fn requests_routes() -> actix_web::Scope {
    web::scope("/requests")
        .route("", web::get().to(list_requests))
        .route("", web::post().to(create_request))
        .route("/{id}/transition", web::post().to(transition_request))
        .route("/{id}/history", web::get().to(request_history))
        .route("/{id}", web::get().to(get_request))
        .route("/{id}", web::patch().to(update_request))
        .route("/{id}", web::delete().to(delete_request))
}

/// 报告路由 `/reports`
pub fn reports_routes() -> actix_web::Scope {
    web::scope("/reports")
        .route("/schedules", web::get().to(list_schedules))
        .route("/schedules", web::post().to(create_schedule))
        .route("/schedules/{id}/pause", web::post().to(pause_schedule))
        .route("/schedules/{id}/resume", web::post().to(resume_schedule))
        .route("/schedules/{id}/run", web::post().to(run_schedule))
        .route("/schedules/{id}/executions", web::get().to(list_executions))
        .route("/schedules/{id}", web::get().to(get_schedule))
        .route("/schedules/{id}", web::patch().to(update_schedule))
        .route("/schedules/{id}", web::delete().to(delete_schedule))
        .route("/executions/{id}/retry", web::post().to(retry_execution))
        .route("/executions/{id}", web::get().to(get_execution))
}

/// 升级工单路由 `/escalations`
pub fn escalations_routes() -> actix_web::Scope {
    web::scope("/escalations")
        .route("", web::get().to(list_escalations))
        .route("", web::post().to(create_escalation))
        .route("/{id}/acknowledge", web::post().to(acknowledge_escalation))
        .route("/{id}/resolve", web::post().to(resolve_escalation))
        .route("/{id}", web::get().to(get_escalation))
}

/// 对话路由 `/conversations`
pub fn conversations_routes() -> actix_web::Scope {
    web::scope("/conversations")
        .route("", web::get().to(list_conversations))
        .route("", web::post().to(create_conversation))
        .route("/{id}/messages", web::post().to(send_message))
        .route("/{id}", web::get().to(get_conversation))
        .route("/{id}", web::patch().to(rename_conversation))
        .route("/{id}", web::delete().to(delete_conversation))
}

/// 功能开关路由 `/feature-flags`
pub fn flags_routes() -> actix_web::Scope {
    web::scope("/feature-flags")
        .route("", web::get().to(list_flags))
        .route("/{key}", web::put().to(set_flag))
        .route("/{key}", web::delete().to(unset_flag))
}

/// 完整的 `/api/v1` scope
pub fn api_v1_routes() -> actix_web::Scope {
    web::scope(API_PREFIX)
        .service(auth_routes())
        .route("/invites/{token}/accept", web::post().to(accept_invite))
        .service(webhook_routes())
        .service(
            web::scope("")
                .wrap(JwtAuth)
                .service(agency_routes())
                .service(requests_routes())
                .service(reports_routes())
                .service(escalations_routes())
                .service(conversations_routes())
                .service(flags_routes())
                .route("/stats", web::get().to(get_stats)),
        )
}
