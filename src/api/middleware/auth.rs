use actix_service::{Service, Transform};
use actix_web::{
    Error, FromRequest, HttpMessage, HttpRequest, HttpResponse,
    body::EitherBody,
    dev::{Payload, ServiceRequest, ServiceResponse},
    http::{Method, header::CONTENT_TYPE},
};
use futures_util::future::{LocalBoxFuture, Ready, ready};
use std::rc::Rc;
use tracing::{info, trace};

use crate::api::jwt::get_jwt_service;
use crate::api::services::v1::{ApiResponse, ErrorCode, error_from_seohub};
use crate::errors::SeoHubError;
use crate::services::Actor;
use crate::storage::models::{Role, parse_enum};

/// Bearer JWT 认证中间件
///
/// 校验 access token 后把 [`Actor`] 放入 request extensions，
/// handler 通过 `Actor` extractor 获取。
#[derive(Clone, Default)]
pub struct JwtAuth;

impl<S, B> Transform<S, ServiceRequest> for JwtAuth
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = JwtAuthMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(JwtAuthMiddleware {
            service: Rc::new(service),
        }))
    }
}

pub struct JwtAuthMiddleware<S> {
    service: Rc<S>,
}

impl<S, B> JwtAuthMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    fn handle_unauthorized(req: ServiceRequest, message: &str) -> ServiceResponse<EitherBody<B>> {
        info!("Authentication failed: {}", message);
        req.into_response(
            HttpResponse::Unauthorized()
                .insert_header((CONTENT_TYPE, "application/json; charset=utf-8"))
                .json(ApiResponse::<()> {
                    code: ErrorCode::Unauthorized as i32,
                    message: message.to_string(),
                    data: None,
                })
                .map_into_right_body(),
        )
    }

    /// 从 Authorization header 提取 Bearer token
    fn extract_bearer_token(req: &ServiceRequest) -> Option<String> {
        req.headers()
            .get("Authorization")
            .and_then(|h| h.to_str().ok())
            .and_then(|s| s.strip_prefix("Bearer "))
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    fn actor_from_token(token: &str) -> Result<Actor, SeoHubError> {
        let claims = get_jwt_service().validate_access_token(token)?;
        let role: Role = parse_enum("role", &claims.role)
            .map_err(|_| SeoHubError::token("Token carries an unknown role"))?;
        Ok(Actor {
            user_id: claims.sub,
            agency_id: claims.agency_id,
            role,
        })
    }
}

impl<S, B> Service<ServiceRequest> for JwtAuthMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(
        &self,
        ctx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.service.poll_ready(ctx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let srv = self.service.clone();

        Box::pin(async move {
            // CORS 预检直接放行
            if req.method() == Method::OPTIONS {
                return srv.call(req).await.map(|res| res.map_into_left_body());
            }

            let Some(token) = Self::extract_bearer_token(&req) else {
                return Ok(Self::handle_unauthorized(
                    req,
                    "Unauthorized: missing bearer token",
                ));
            };

            match Self::actor_from_token(&token) {
                Ok(actor) => {
                    trace!(
                        "Authenticated user {} in agency {}",
                        actor.user_id, actor.agency_id
                    );
                    req.extensions_mut().insert(actor);
                    srv.call(req).await.map(|res| res.map_into_left_body())
                }
                Err(e) => {
                    let message = format!("Unauthorized: {}", e.message());
                    Ok(Self::handle_unauthorized(req, &message))
                }
            }
        })
    }
}

impl FromRequest for Actor {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let actor = req.extensions().get::<Actor>().cloned();
        ready(actor.ok_or_else(|| {
            let err = SeoHubError::unauthorized("Unauthorized: missing bearer token");
            actix_web::error::InternalError::from_response(
                err.message().to_string(),
                error_from_seohub(&err),
            )
            .into()
        }))
    }
}
