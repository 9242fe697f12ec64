//! 统一 API 错误码定义

use serde_repr::{Deserialize_repr, Serialize_repr};

use crate::errors::SeoHubError;

/// API 错误码枚举
///
/// 使用 serde_repr 序列化为数字，按千位分域：
/// - 0: 成功
/// - 1000-1099: 通用错误
/// - 2000-2099: 认证错误
/// - 3000-3099: 需求单错误
/// - 4000-4099: 报告调度错误
/// - 5000-5099: AI 对话错误
/// - 6000-6099: Webhook 错误
/// - 7000-7099: 机构/成员错误
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize_repr, Deserialize_repr)]
#[repr(i32)]
pub enum ErrorCode {
    // 成功
    Success = 0,

    // 通用错误 1000-1099
    BadRequest = 1000,
    Unauthorized = 1001,
    ValidationFailed = 1002,
    Forbidden = 1003,
    NotFound = 1004,
    InternalServerError = 1005,
    Conflict = 1009,
    PayloadTooLarge = 1013,
    ServiceUnavailable = 1030,
    FeatureDisabled = 1031,

    // 认证错误 2000-2099
    AuthFailed = 2000,
    TokenInvalid = 2002,

    // 需求单错误 3000-3099
    InvalidTransition = 3000,
    InvalidState = 3001,

    // 报告调度错误 4000-4099
    InvalidCron = 4000,

    // AI 对话错误 5000-5099
    ChatProviderFailed = 5000,

    // Webhook 错误 6000-6099
    WebhookSignatureInvalid = 6000,
    WebhookNotConfigured = 6001,

    // 机构错误 7000-7099
    RegistrationDisabled = 7000,
}

impl From<&SeoHubError> for ErrorCode {
    fn from(err: &SeoHubError) -> Self {
        match err {
            SeoHubError::Validation(_) => ErrorCode::ValidationFailed,
            SeoHubError::NotFound(_) => ErrorCode::NotFound,
            SeoHubError::Conflict(_) => ErrorCode::Conflict,
            SeoHubError::Unauthorized(_) => ErrorCode::AuthFailed,
            SeoHubError::Token(_) => ErrorCode::TokenInvalid,
            SeoHubError::Forbidden(_) => ErrorCode::Forbidden,
            SeoHubError::InvalidTransition(_) => ErrorCode::InvalidTransition,
            SeoHubError::InvalidState(_) => ErrorCode::InvalidState,
            SeoHubError::FeatureDisabled(_) => ErrorCode::FeatureDisabled,
            SeoHubError::ServiceUnavailable(_) => ErrorCode::ServiceUnavailable,
            SeoHubError::ChatProvider(_) => ErrorCode::ChatProviderFailed,
            SeoHubError::InvalidCron(_) => ErrorCode::InvalidCron,
            SeoHubError::DatabaseConfig(_)
            | SeoHubError::DatabaseConnection(_)
            | SeoHubError::DatabaseOperation(_)
            | SeoHubError::FileOperation(_)
            | SeoHubError::Serialization(_)
            | SeoHubError::PasswordHash(_) => ErrorCode::InternalServerError,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes_as_number() {
        let json = serde_json::to_string(&ErrorCode::InvalidTransition).unwrap();
        assert_eq!(json, "3000");
        let code: ErrorCode = serde_json::from_str("1004").unwrap();
        assert_eq!(code, ErrorCode::NotFound);
    }

    #[test]
    fn test_from_error() {
        assert_eq!(
            ErrorCode::from(&SeoHubError::invalid_cron("x")),
            ErrorCode::InvalidCron
        );
        assert_eq!(
            ErrorCode::from(&SeoHubError::database_operation("x")),
            ErrorCode::InternalServerError
        );
        assert_eq!(
            ErrorCode::from(&SeoHubError::feature_disabled("x")),
            ErrorCode::FeatureDisabled
        );
    }
}
