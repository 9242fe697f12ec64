//! API 模块常量定义

/// API 路由前缀
pub const API_PREFIX: &str = "/api/v1";

/// 请求 ID 响应头
pub const REQUEST_ID_HEADER: &str = "X-Request-ID";

/// 履约 webhook 签名头
pub const WEBHOOK_SIGNATURE_HEADER: &str = "X-Webhook-Signature";
