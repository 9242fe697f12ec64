use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use crate::errors::{Result, SeoHubError};

/// Global cached JwtService instance
static JWT_SERVICE: OnceLock<JwtService> = OnceLock::new();

/// Get the cached JwtService instance
///
/// Initialized from `[auth]` on first use and reused for every request.
pub fn get_jwt_service() -> &'static JwtService {
    JWT_SERVICE.get_or_init(JwtService::from_config)
}

const ACCESS: &str = "access";
const REFRESH: &str = "refresh";

/// Token claims; access and refresh tokens differ only in `token_type` and lifetime
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// user id
    pub sub: String,
    pub agency_id: String,
    pub role: String,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
    pub token_type: String,
}

/// 登录 / 刷新返回的 token 对
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    /// access token 有效期（秒）
    pub expires_in: i64,
}

/// JWT Service for generating and validating tokens
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_token_minutes: u64,
    refresh_token_days: u64,
}

impl JwtService {
    pub fn new(secret: &str, access_token_minutes: u64, refresh_token_days: u64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            access_token_minutes,
            refresh_token_days,
        }
    }

    /// Create JwtService from config
    pub fn from_config() -> Self {
        let config = crate::config::get_config();

        // 未配置 secret 时生成随机值（重启后旧 token 全部失效）
        let jwt_secret = if config.auth.jwt_secret.is_empty() {
            tracing::warn!("JWT secret not configured, generating a random one");
            crate::utils::generate_secure_token(32)
        } else {
            config.auth.jwt_secret.clone()
        };

        Self::new(
            &jwt_secret,
            config.auth.access_token_minutes,
            config.auth.refresh_token_days,
        )
    }

    fn issue(
        &self,
        user_id: &str,
        agency_id: &str,
        role: &str,
        token_type: &str,
        ttl: Duration,
    ) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            agency_id: agency_id.to_string(),
            role: role.to_string(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            jti: uuid::Uuid::new_v4().to_string(),
            token_type: token_type.to_string(),
        };
        Ok(encode(&Header::default(), &claims, &self.encoding_key)?)
    }

    /// Generate an access + refresh token pair
    pub fn issue_pair(&self, user_id: &str, agency_id: &str, role: &str) -> Result<TokenPair> {
        let access_ttl = Duration::minutes(self.access_token_minutes as i64);
        Ok(TokenPair {
            access_token: self.issue(user_id, agency_id, role, ACCESS, access_ttl)?,
            refresh_token: self.issue(
                user_id,
                agency_id,
                role,
                REFRESH,
                Duration::days(self.refresh_token_days as i64),
            )?,
            token_type: "Bearer",
            expires_in: access_ttl.num_seconds(),
        })
    }

    fn validate(&self, token: &str, expected_type: &str) -> Result<Claims> {
        let token_data = decode::<Claims>(token, &self.decoding_key, &Validation::default())?;

        if token_data.claims.token_type != expected_type {
            return Err(SeoHubError::token(format!(
                "expected {} token, got {}",
                expected_type, token_data.claims.token_type
            )));
        }

        Ok(token_data.claims)
    }

    pub fn validate_access_token(&self, token: &str) -> Result<Claims> {
        self.validate(token, ACCESS)
    }

    pub fn validate_refresh_token(&self, token: &str) -> Result<Claims> {
        self.validate(token, REFRESH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_service() -> JwtService {
        JwtService::new("test_secret_key_32_bytes_long!!", 15, 7)
    }

    #[test]
    fn test_issue_and_validate_pair() {
        let service = create_test_service();
        let pair = service.issue_pair("user-1", "agency-1", "owner").unwrap();
        assert_eq!(pair.expires_in, 15 * 60);

        let access = service.validate_access_token(&pair.access_token).unwrap();
        assert_eq!(access.sub, "user-1");
        assert_eq!(access.agency_id, "agency-1");
        assert_eq!(access.role, "owner");
        assert!(access.exp > access.iat);

        let refresh = service.validate_refresh_token(&pair.refresh_token).unwrap();
        assert_eq!(refresh.token_type, "refresh");
        assert_ne!(refresh.jti, access.jti);
    }

    #[test]
    fn test_token_types_not_interchangeable() {
        let service = create_test_service();
        let pair = service.issue_pair("u", "a", "member").unwrap();
        assert!(service.validate_refresh_token(&pair.access_token).is_err());
        assert!(service.validate_access_token(&pair.refresh_token).is_err());
    }

    #[test]
    fn test_wrong_secret_and_garbage_rejected() {
        let service1 = create_test_service();
        let service2 = JwtService::new("different_secret_key_32_bytes!!", 15, 7);
        let pair = service1.issue_pair("u", "a", "member").unwrap();
        assert!(service2.validate_access_token(&pair.access_token).is_err());
        assert!(service1.validate_access_token("invalid.token.here").is_err());
    }

    #[test]
    fn test_expired_token_rejected() {
        let service = create_test_service();
        let now = chrono::Utc::now();
        let claims = Claims {
            sub: "u".to_string(),
            agency_id: "a".to_string(),
            role: "owner".to_string(),
            iat: (now - chrono::Duration::hours(2)).timestamp(),
            // 超过默认 leeway
            exp: (now - chrono::Duration::hours(1)).timestamp(),
            jti: uuid::Uuid::new_v4().to_string(),
            token_type: ACCESS.to_string(),
        };
        let key = EncodingKey::from_secret(b"test_secret_key_32_bytes_long!!");
        let token = encode(&Header::default(), &claims, &key).unwrap();

        let err = service.validate_access_token(&token).unwrap_err();
        assert!(matches!(err, SeoHubError::Token(_)));
    }
}
