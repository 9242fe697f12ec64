use actix_web::http::StatusCode;
use actix_web::{HttpResponse, Responder, web};
use std::time::{Duration, Instant};
use tracing::{error, info, trace};

use crate::api::services::v1::{ApiResponse, ErrorCode, HealthResponse, HealthStorageCheck};
use crate::config::get_config;
use crate::services::AppServices;

const STORAGE_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

// 应用启动时间结构体
#[derive(Clone, Debug)]
pub struct AppStartTime {
    pub start_datetime: chrono::DateTime<chrono::Utc>,
}

impl AppStartTime {
    pub fn now() -> Self {
        Self {
            start_datetime: chrono::Utc::now(),
        }
    }
}

/// Health Service
///
/// 直接 ping 数据库，不经过业务服务。
pub struct HealthService;

impl HealthService {
    async fn check_storage(services: &AppServices) -> HealthStorageCheck {
        let backend = services.storage.backend_name().to_string();
        match tokio::time::timeout(STORAGE_CHECK_TIMEOUT, services.storage.ping()).await {
            Ok(Ok(())) => HealthStorageCheck {
                status: "healthy".to_string(),
                backend,
                error: None,
            },
            Ok(Err(e)) => {
                error!("Storage health check failed: {}", e);
                HealthStorageCheck {
                    status: "unhealthy".to_string(),
                    backend,
                    error: Some(format!("database error: {}", e)),
                }
            }
            Err(_) => {
                error!("Storage health check timeout");
                HealthStorageCheck {
                    status: "unhealthy".to_string(),
                    backend,
                    error: Some("timeout".to_string()),
                }
            }
        }
    }

    pub async fn health_check(
        services: web::Data<AppServices>,
        app_start_time: web::Data<AppStartTime>,
    ) -> impl Responder {
        let start_time = Instant::now();
        trace!("Received health check request");

        let storage = Self::check_storage(&services).await;
        let is_healthy = storage.status == "healthy";
        let now = chrono::Utc::now();
        let uptime = (now - app_start_time.start_datetime).num_seconds().max(0) as u64;

        let health_data = HealthResponse {
            status: if is_healthy { "healthy" } else { "unhealthy" }.to_string(),
            version: env!("CARGO_PKG_VERSION"),
            timestamp: now.to_rfc3339(),
            uptime,
            storage,
            scheduler_enabled: get_config().scheduler.enabled,
            response_time_ms: start_time.elapsed().as_millis() as u32,
        };

        let (status, code, message) = if is_healthy {
            (StatusCode::OK, ErrorCode::Success, "OK")
        } else {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorCode::ServiceUnavailable,
                "Service Unavailable",
            )
        };

        info!(
            "Health check completed in {:?}, status: {}, uptime: {}s",
            start_time.elapsed(),
            health_data.status,
            uptime
        );

        HttpResponse::build(status)
            .append_header(("Content-Type", "application/json; charset=utf-8"))
            .json(ApiResponse {
                code: code as i32,
                message: message.to_string(),
                data: Some(health_data),
            })
    }

    // 就绪检查：数据库可用才返回 200
    pub async fn readiness_check(services: web::Data<AppServices>) -> impl Responder {
        trace!("Received readiness check request");

        let storage = Self::check_storage(&services).await;
        if storage.status == "healthy" {
            HttpResponse::Ok()
                .append_header(("Content-Type", "text/plain"))
                .body("OK")
        } else {
            HttpResponse::ServiceUnavailable()
                .append_header(("Content-Type", "text/plain"))
                .body("Service Unavailable")
        }
    }

    // 活跃性检查
    pub async fn liveness_check() -> impl Responder {
        trace!("Received liveness check request");

        HttpResponse::NoContent().finish()
    }
}

/// Health 路由配置 `/health`
pub fn health_routes() -> actix_web::Scope {
    web::scope("/health")
        .route("", web::get().to(HealthService::health_check))
        .route("", web::head().to(HealthService::health_check))
        .route("/ready", web::get().to(HealthService::readiness_check))
        .route("/ready", web::head().to(HealthService::readiness_check))
        .route("/live", web::get().to(HealthService::liveness_check))
        .route("/live", web::head().to(HealthService::liveness_check))
}
