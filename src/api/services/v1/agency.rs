//! 机构、成员、邀请与 onboarding 端点

use actix_web::{HttpResponse, web};

use crate::errors::SeoHubError;
use crate::services::agency_service::OnboardingForm;
use crate::services::{Actor, AppServices, FlagKey};

use super::auth::issue_for;
use super::helpers::{api_created, api_result};
use super::types::{
    AcceptInviteRequest, ChangeRoleRequest, CreateInviteRequest, DeletedResponse,
    RenameAgencyRequest,
};

pub async fn get_agency(services: web::Data<AppServices>, actor: Actor) -> HttpResponse {
    api_result(services.agencies.get_agency(&actor.agency_id).await)
}

pub async fn rename_agency(
    services: web::Data<AppServices>,
    actor: Actor,
    body: web::Json<RenameAgencyRequest>,
) -> HttpResponse {
    api_result(services.agencies.rename_agency(&actor, &body.name).await)
}

pub async fn get_onboarding(services: web::Data<AppServices>, actor: Actor) -> HttpResponse {
    api_result(services.agencies.get_onboarding(&actor.agency_id).await)
}

pub async fn submit_onboarding(
    services: web::Data<AppServices>,
    actor: Actor,
    body: web::Json<OnboardingForm>,
) -> HttpResponse {
    let result = async {
        services
            .flags
            .require(&actor.agency_id, FlagKey::OnboardingWizard)
            .await?;
        services
            .agencies
            .submit_onboarding(&actor, body.into_inner())
            .await
    }
    .await;
    api_result(result)
}

pub async fn list_users(services: web::Data<AppServices>, actor: Actor) -> HttpResponse {
    api_result(services.agencies.list_users(&actor.agency_id).await)
}

pub async fn change_role(
    services: web::Data<AppServices>,
    actor: Actor,
    path: web::Path<String>,
    body: web::Json<ChangeRoleRequest>,
) -> HttpResponse {
    api_result(
        services
            .agencies
            .change_role(&actor, &path.into_inner(), body.role)
            .await,
    )
}

pub async fn remove_user(
    services: web::Data<AppServices>,
    actor: Actor,
    path: web::Path<String>,
) -> HttpResponse {
    let user_id = path.into_inner();
    let result = services.agencies.remove_user(&actor, &user_id).await;
    api_result(result.map(|_| DeletedResponse::new(user_id)))
}

pub async fn list_invites(services: web::Data<AppServices>, actor: Actor) -> HttpResponse {
    api_result(services.agencies.list_invites(&actor.agency_id).await)
}

pub async fn create_invite(
    services: web::Data<AppServices>,
    actor: Actor,
    body: web::Json<CreateInviteRequest>,
) -> HttpResponse {
    api_created(
        services
            .agencies
            .create_invite(&actor, &body.email, body.role)
            .await,
    )
}

pub async fn revoke_invite(
    services: web::Data<AppServices>,
    actor: Actor,
    path: web::Path<String>,
) -> HttpResponse {
    let invite_id = path.into_inner();
    let result = services.agencies.revoke_invite(&actor, &invite_id).await;
    api_result(result.map(|_| DeletedResponse::new(invite_id)))
}

/// POST /invites/{token}/accept，接受后直接登录
pub async fn accept_invite(
    services: web::Data<AppServices>,
    path: web::Path<String>,
    body: web::Json<AcceptInviteRequest>,
) -> HttpResponse {
    let result = async {
        let user = services
            .agencies
            .accept_invite(&path.into_inner(), &body.name, &body.password)
            .await?;
        issue_for(&services, user).await
    }
    .await;
    api_created::<_, SeoHubError>(result)
}
