//! 认证端点：注册、登录、刷新、当前用户

use actix_governor::{Governor, GovernorConfigBuilder, KeyExtractor, SimpleKeyExtractionError};
use actix_web::dev::ServiceRequest;
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, web};
use governor::middleware::NoOpMiddleware;
use tracing::{debug, info};

use crate::api::jwt::get_jwt_service;
use crate::config::get_config;
use crate::errors::{Result, SeoHubError};
use crate::services::agency_service::{RegisterAgencyInput, UserView};
use crate::services::{Actor, AppServices};
use crate::utils::ip::client_ip;

use super::error_code::ErrorCode;
use super::helpers::{api_created, api_result, error_response};
use super::types::{AuthResponse, LoginRequest, MeResponse, RefreshRequest};

/// 基于客户端 IP 的限流 key 提取器
///
/// 默认使用连接 IP；连接来自可信代理时才采用转发头中的地址。
#[derive(Clone, Copy)]
pub struct ClientIpKeyExtractor;

impl KeyExtractor for ClientIpKeyExtractor {
    type Key = String;
    type KeyExtractionError = SimpleKeyExtractionError<&'static str>;

    fn extract(&self, req: &ServiceRequest) -> std::result::Result<Self::Key, Self::KeyExtractionError> {
        let config = get_config();
        // 无连接地址的请求共用一个桶
        Ok(client_ip(&req.connection_info(), &config.auth.trusted_proxies)
            .unwrap_or_else(|| "unknown".to_string()))
    }
}

/// 创建登录限流器
///
/// 配置：每秒补充 1 个令牌，突发最多 5 次请求
/// 超限返回 HTTP 429 Too Many Requests
pub fn login_rate_limiter() -> Governor<ClientIpKeyExtractor, NoOpMiddleware> {
    let config = GovernorConfigBuilder::default()
        .seconds_per_request(1)
        .burst_size(5)
        .key_extractor(ClientIpKeyExtractor)
        .finish()
        .expect("Invalid rate limit config");

    debug!("Login rate limiter created: 1 req/s, burst 5");
    Governor::new(&config)
}

pub(super) async fn issue_for(services: &AppServices, user: UserView) -> Result<AuthResponse> {
    let agency = services.agencies.get_agency(&user.agency_id).await?;
    let tokens = get_jwt_service().issue_pair(&user.id, &user.agency_id, &user.role)?;
    Ok(AuthResponse {
        user,
        agency,
        tokens,
    })
}

/// POST /auth/register
pub async fn register(
    services: web::Data<AppServices>,
    body: web::Json<RegisterAgencyInput>,
) -> HttpResponse {
    if !get_config().auth.allow_registration {
        return error_response(
            StatusCode::FORBIDDEN,
            ErrorCode::RegistrationDisabled,
            "Registration is disabled",
        );
    }
    let result = async {
        let (_, owner) = services.agencies.register_agency(body.into_inner()).await?;
        issue_for(&services, owner).await
    }
    .await;
    api_created(result)
}

/// POST /auth/login
pub async fn login(
    services: web::Data<AppServices>,
    body: web::Json<LoginRequest>,
) -> HttpResponse {
    let result = async {
        let user = services
            .agencies
            .authenticate(&body.email, &body.password)
            .await?;
        info!("User {} logged in", user.id);
        issue_for(&services, user).await
    }
    .await;
    api_result(result)
}

/// POST /auth/refresh
///
/// 重新读取用户，角色变更与成员移除在刷新时生效。
pub async fn refresh(
    services: web::Data<AppServices>,
    body: web::Json<RefreshRequest>,
) -> HttpResponse {
    let result = async {
        let claims = get_jwt_service().validate_refresh_token(&body.refresh_token)?;
        let user = match services.agencies.get_user(&claims.sub).await {
            Ok(user) => user,
            Err(SeoHubError::NotFound(_)) => {
                return Err(SeoHubError::unauthorized("User no longer exists"));
            }
            Err(e) => return Err(e),
        };
        issue_for(&services, user).await
    }
    .await;
    api_result(result)
}

/// GET /auth/me
pub async fn me(services: web::Data<AppServices>, actor: Actor) -> HttpResponse {
    let result = async {
        let user = services.agencies.get_user(&actor.user_id).await?;
        let agency = services.agencies.get_agency(&actor.agency_id).await?;
        Ok::<_, SeoHubError>(MeResponse { user, agency })
    }
    .await;
    api_result(result)
}
