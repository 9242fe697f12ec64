//! 履约方 webhook 入口
//!
//! 不走 JWT，使用 `X-Webhook-Signature` HMAC 签名认证；body 以原始字节读取，
//! 签名针对原始字节计算。

use actix_web::http::StatusCode;
use actix_web::{HttpRequest, HttpResponse, web};
use tracing::{debug, warn};

use crate::api::constants::WEBHOOK_SIGNATURE_HEADER;
use crate::config::get_config;
use crate::services::webhook_service::verify_signature;
use crate::services::{AppServices, FlagKey};
use crate::storage::models::WebhookOutcome;

use super::error_code::ErrorCode;
use super::helpers::{error_from_seohub, error_response, json_response};

/// POST /webhooks/fulfillment
pub async fn fulfillment_webhook(
    req: HttpRequest,
    services: web::Data<AppServices>,
    body: web::Bytes,
) -> HttpResponse {
    let config = get_config();
    let Some(secret) = config.webhook.secret.as_deref().filter(|s| !s.is_empty()) else {
        debug!("Webhook secret not configured - returning 404");
        return error_response(
            StatusCode::NOT_FOUND,
            ErrorCode::WebhookNotConfigured,
            "Not Found",
        );
    };

    match services.flags.is_enabled(None, FlagKey::WebhookIngest).await {
        Ok(true) => {}
        Ok(false) => {
            return error_response(
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorCode::FeatureDisabled,
                "Webhook ingestion is disabled",
            );
        }
        Err(e) => return error_from_seohub(&e),
    }

    let signature = req
        .headers()
        .get(WEBHOOK_SIGNATURE_HEADER)
        .and_then(|h| h.to_str().ok());
    if let Err(e) = verify_signature(secret, &body, signature) {
        warn!("Rejected webhook: {}", e.message());
        return error_response(
            StatusCode::UNAUTHORIZED,
            ErrorCode::WebhookSignatureInvalid,
            e.message(),
        );
    }

    match services.webhooks.ingest(&body).await {
        Ok(receipt) => {
            let status = match receipt.status {
                WebhookOutcome::Ignored => StatusCode::ACCEPTED,
                _ => StatusCode::OK,
            };
            json_response(status, ErrorCode::Success, "OK", Some(receipt))
        }
        Err(e) => error_from_seohub(&e),
    }
}

/// webhook body 上限
pub fn payload_config() -> web::PayloadConfig {
    web::PayloadConfig::new(get_config().webhook.max_body_kb * 1024)
}
