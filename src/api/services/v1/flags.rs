//! 功能开关端点
//!
//! 成员可查看本机构的生效值；只有 owner 能写入机构级覆盖。
//! 全局覆盖只能通过 CLI 修改。

use actix_web::{HttpResponse, web};

use crate::errors::{Result, SeoHubError};
use crate::services::feature_flags::ResolvedFlag;
use crate::services::{Actor, AppServices, FlagKey, FlagScope};
use crate::storage::models::Role;

use super::helpers::api_result;
use super::types::SetFlagRequest;

pub async fn list_flags(services: web::Data<AppServices>, actor: Actor) -> HttpResponse {
    api_result(services.flags.list_resolved(Some(&actor.agency_id)).await)
}

/// PUT /feature-flags/{key}
pub async fn set_flag(
    services: web::Data<AppServices>,
    actor: Actor,
    path: web::Path<String>,
    body: web::Json<SetFlagRequest>,
) -> HttpResponse {
    let result: Result<ResolvedFlag> = async {
        actor.require_role(Role::Owner)?;
        let key = FlagKey::parse(&path)?;
        let scope = FlagScope::Agency(actor.agency_id.clone());
        services.flags.set(&scope, key, body.enabled).await?;
        services.flags.resolve(Some(&actor.agency_id), key).await
    }
    .await;
    api_result(result)
}

/// DELETE /feature-flags/{key}，恢复继承全局/默认值
pub async fn unset_flag(
    services: web::Data<AppServices>,
    actor: Actor,
    path: web::Path<String>,
) -> HttpResponse {
    let result: Result<ResolvedFlag> = async {
        actor.require_role(Role::Owner)?;
        let key = FlagKey::parse(&path)?;
        let scope = FlagScope::Agency(actor.agency_id.clone());
        if !services.flags.unset(&scope, key).await? {
            return Err(SeoHubError::not_found(format!(
                "No agency override for flag '{}'",
                key
            )));
        }
        services.flags.resolve(Some(&actor.agency_id), key).await
    }
    .await;
    api_result(result)
}
