//! Server mode
//!
//! HTTP server startup: storage, services, report scheduler and routes.

use actix_cors::Cors;
use actix_web::{
    App, HttpServer,
    http::{Method, header},
    middleware::{Compress, DefaultHeaders},
    web,
};
use anyhow::Result;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::api::middleware::RequestIdMiddleware;
use crate::api::services::v1::{json_config, query_config};
use crate::api::services::{AppStartTime, api_v1_routes, health_routes};
use crate::config::CorsConfig;
use crate::runtime::lifetime;
use crate::runtime::lifetime::shutdown::ShutdownHandles;

/// JSON 请求体上限
const JSON_BODY_LIMIT: usize = 1024 * 1024;

/// Validate CORS configuration at startup (runs once)
fn validate_cors_config(cors_config: &CorsConfig) {
    if !cors_config.enabled {
        return;
    }

    if cors_config.allowed_origins.is_empty() {
        warn!(
            "CORS enabled but allowed_origins is empty. \
             Cross-origin requests will be rejected by browsers."
        );
    } else if cors_config.allowed_origins.iter().any(|o| o == "*") {
        warn!("CORS allows any origin. Do not use this in production.");
    }
}

/// Build CORS middleware from configuration
fn build_cors_middleware(cors_config: &CorsConfig) -> Cors {
    // 未启用时使用浏览器默认的同源策略
    if !cors_config.enabled {
        return Cors::default();
    }

    let mut cors = Cors::default();

    if cors_config.allowed_origins.iter().any(|o| o == "*") {
        cors = cors.allow_any_origin();
    } else {
        for origin in &cors_config.allowed_origins {
            cors = cors.allowed_origin(origin);
        }
    }

    cors.allowed_methods([
        Method::GET,
        Method::HEAD,
        Method::POST,
        Method::PUT,
        Method::PATCH,
        Method::DELETE,
        Method::OPTIONS,
    ])
    .allowed_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
    .allowed_header("X-Request-ID")
    .expose_headers(["X-Request-ID"])
    .max_age(cors_config.max_age)
}

/// Run the HTTP server
///
/// This function:
/// 1. Records startup time
/// 2. Prepares storage, services and the report scheduler
/// 3. Configures and starts the HTTP server
/// 4. Listens for graceful shutdown signals
///
/// **Note**: Logging system must be initialized before calling this function
pub async fn run_server() -> Result<()> {
    let app_start_time = AppStartTime::now();

    let startup = lifetime::startup::prepare_server_startup()
        .await
        .map_err(|e| {
            tracing::error!("Server startup failed: {:#}", e);
            e
        })?;

    let config = crate::config::get_config();
    let services = startup.services.clone();

    let cpu_count = config.server.cpu_count.clamp(1, 32);
    warn!("Using {} CPU cores for the server", cpu_count);

    let cors_config = config.cors.clone();
    validate_cors_config(&cors_config);

    if config.auth.trusted_proxies.is_empty() {
        warn!(
            "Login rate limiting: no trusted proxies configured, \
             the peer address is used as the client IP"
        );
    } else {
        info!(
            "Login rate limiting: trusted proxies configured: {:?}",
            config.auth.trusted_proxies
        );
    }

    // 调度器后台任务
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler_task = startup
        .scheduler
        .clone()
        .map(|scheduler| scheduler.spawn_background_task(shutdown_rx));

    let server = HttpServer::new(move || {
        let cors = build_cors_middleware(&cors_config);

        App::new()
            .wrap(RequestIdMiddleware)
            .wrap(cors)
            .wrap(Compress::default())
            .wrap(
                DefaultHeaders::new()
                    .add(("Cache-Control", "no-cache, no-store, must-revalidate")),
            )
            .app_data(web::Data::new(services.clone()))
            .app_data(web::Data::new(app_start_time.clone()))
            .app_data(json_config(JSON_BODY_LIMIT))
            .app_data(query_config())
            .service(health_routes())
            .service(api_v1_routes())
    })
    .keep_alive(std::time::Duration::from_secs(30))
    .client_request_timeout(std::time::Duration::from_millis(5000))
    .client_disconnect_timeout(std::time::Duration::from_millis(1000))
    .workers(cpu_count);

    let bind_address = format!("{}:{}", config.server.host, config.server.port);
    warn!("Starting server at http://{}", bind_address);
    let server = server.bind(&bind_address)?.run();

    let handles = ShutdownHandles {
        storage: startup.storage.clone(),
        scheduler_tx: shutdown_tx,
        scheduler_task,
    };

    // Wait for server or shutdown signal
    tokio::select! {
        res = server => {
            res?;
        }
        _ = lifetime::shutdown::listen_for_shutdown(handles) => {
            warn!("Graceful shutdown: all tasks completed");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_cors_config_disabled_is_noop() {
        let cfg = CorsConfig {
            enabled: false,
            allowed_origins: vec![],
            max_age: 3600,
        };
        validate_cors_config(&cfg);
        let _ = build_cors_middleware(&cfg);
    }

    #[test]
    fn test_build_cors_with_explicit_origins() {
        let cfg = CorsConfig {
            enabled: true,
            allowed_origins: vec!["https://app.example.com".to_string()],
            max_age: 600,
        };
        let _ = build_cors_middleware(&cfg);
    }
}
