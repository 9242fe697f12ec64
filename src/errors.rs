use std::fmt;

use actix_web::http::StatusCode;

#[derive(Debug, Clone)]
pub enum SeoHubError {
    DatabaseConfig(String),
    DatabaseConnection(String),
    DatabaseOperation(String),
    FileOperation(String),
    Validation(String),
    NotFound(String),
    Conflict(String),
    Unauthorized(String),
    Forbidden(String),
    InvalidTransition(String),
    InvalidState(String),
    FeatureDisabled(String),
    ServiceUnavailable(String),
    ChatProvider(String),
    Serialization(String),
    PasswordHash(String),
    Token(String),
    InvalidCron(String),
}

impl SeoHubError {
    /// 获取错误代码
    pub fn code(&self) -> &'static str {
        match self {
            SeoHubError::DatabaseConfig(_) => "E001",
            SeoHubError::DatabaseConnection(_) => "E002",
            SeoHubError::DatabaseOperation(_) => "E003",
            SeoHubError::FileOperation(_) => "E004",
            SeoHubError::Validation(_) => "E005",
            SeoHubError::NotFound(_) => "E006",
            SeoHubError::Conflict(_) => "E007",
            SeoHubError::Unauthorized(_) => "E008",
            SeoHubError::Forbidden(_) => "E009",
            SeoHubError::InvalidTransition(_) => "E010",
            SeoHubError::InvalidState(_) => "E011",
            SeoHubError::FeatureDisabled(_) => "E012",
            SeoHubError::ServiceUnavailable(_) => "E013",
            SeoHubError::ChatProvider(_) => "E014",
            SeoHubError::Serialization(_) => "E015",
            SeoHubError::PasswordHash(_) => "E016",
            SeoHubError::Token(_) => "E017",
            SeoHubError::InvalidCron(_) => "E018",
        }
    }

    /// 获取错误类型名称
    pub fn error_type(&self) -> &'static str {
        match self {
            SeoHubError::DatabaseConfig(_) => "Database Configuration Error",
            SeoHubError::DatabaseConnection(_) => "Database Connection Error",
            SeoHubError::DatabaseOperation(_) => "Database Operation Error",
            SeoHubError::FileOperation(_) => "File Operation Error",
            SeoHubError::Validation(_) => "Validation Error",
            SeoHubError::NotFound(_) => "Resource Not Found",
            SeoHubError::Conflict(_) => "Conflict",
            SeoHubError::Unauthorized(_) => "Unauthorized",
            SeoHubError::Forbidden(_) => "Forbidden",
            SeoHubError::InvalidTransition(_) => "Invalid Status Transition",
            SeoHubError::InvalidState(_) => "Invalid State",
            SeoHubError::FeatureDisabled(_) => "Feature Disabled",
            SeoHubError::ServiceUnavailable(_) => "Service Unavailable",
            SeoHubError::ChatProvider(_) => "Chat Provider Error",
            SeoHubError::Serialization(_) => "Serialization Error",
            SeoHubError::PasswordHash(_) => "Password Hash Error",
            SeoHubError::Token(_) => "Token Error",
            SeoHubError::InvalidCron(_) => "Invalid Cron Expression",
        }
    }

    /// 获取错误详情
    pub fn message(&self) -> &str {
        match self {
            SeoHubError::DatabaseConfig(msg)
            | SeoHubError::DatabaseConnection(msg)
            | SeoHubError::DatabaseOperation(msg)
            | SeoHubError::FileOperation(msg)
            | SeoHubError::Validation(msg)
            | SeoHubError::NotFound(msg)
            | SeoHubError::Conflict(msg)
            | SeoHubError::Unauthorized(msg)
            | SeoHubError::Forbidden(msg)
            | SeoHubError::InvalidTransition(msg)
            | SeoHubError::InvalidState(msg)
            | SeoHubError::FeatureDisabled(msg)
            | SeoHubError::ServiceUnavailable(msg)
            | SeoHubError::ChatProvider(msg)
            | SeoHubError::Serialization(msg)
            | SeoHubError::PasswordHash(msg)
            | SeoHubError::Token(msg)
            | SeoHubError::InvalidCron(msg) => msg,
        }
    }

    /// 映射到 HTTP 状态码
    pub fn http_status(&self) -> StatusCode {
        match self {
            SeoHubError::Validation(_) | SeoHubError::InvalidCron(_) => StatusCode::BAD_REQUEST,
            SeoHubError::NotFound(_) => StatusCode::NOT_FOUND,
            SeoHubError::Conflict(_)
            | SeoHubError::InvalidTransition(_)
            | SeoHubError::InvalidState(_) => StatusCode::CONFLICT,
            SeoHubError::Unauthorized(_) | SeoHubError::Token(_) => StatusCode::UNAUTHORIZED,
            SeoHubError::Forbidden(_) | SeoHubError::FeatureDisabled(_) => StatusCode::FORBIDDEN,
            SeoHubError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            SeoHubError::ChatProvider(_) => StatusCode::BAD_GATEWAY,
            SeoHubError::DatabaseConfig(_)
            | SeoHubError::DatabaseConnection(_)
            | SeoHubError::DatabaseOperation(_)
            | SeoHubError::FileOperation(_)
            | SeoHubError::Serialization(_)
            | SeoHubError::PasswordHash(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// 格式化为彩色输出（用于 Server 模式启动失败）
    pub fn format_colored(&self) -> String {
        use colored::Colorize;
        format!(
            "{} {} {}\n  {}",
            "[ERROR]".red().bold(),
            self.code().yellow(),
            self.error_type().red(),
            self.message().white()
        )
    }

    /// 格式化为简洁输出（用于 CLI 模式）
    pub fn format_simple(&self) -> String {
        format!("{}: {}", self.error_type(), self.message())
    }
}

impl fmt::Display for SeoHubError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_simple())
    }
}

impl std::error::Error for SeoHubError {}

// 便捷的构造函数
impl SeoHubError {
    pub fn database_config<T: Into<String>>(msg: T) -> Self {
        SeoHubError::DatabaseConfig(msg.into())
    }

    pub fn database_connection<T: Into<String>>(msg: T) -> Self {
        SeoHubError::DatabaseConnection(msg.into())
    }

    pub fn database_operation<T: Into<String>>(msg: T) -> Self {
        SeoHubError::DatabaseOperation(msg.into())
    }

    pub fn validation<T: Into<String>>(msg: T) -> Self {
        SeoHubError::Validation(msg.into())
    }

    pub fn not_found<T: Into<String>>(msg: T) -> Self {
        SeoHubError::NotFound(msg.into())
    }

    pub fn conflict<T: Into<String>>(msg: T) -> Self {
        SeoHubError::Conflict(msg.into())
    }

    pub fn unauthorized<T: Into<String>>(msg: T) -> Self {
        SeoHubError::Unauthorized(msg.into())
    }

    pub fn forbidden<T: Into<String>>(msg: T) -> Self {
        SeoHubError::Forbidden(msg.into())
    }

    pub fn invalid_transition<T: Into<String>>(msg: T) -> Self {
        SeoHubError::InvalidTransition(msg.into())
    }

    pub fn invalid_state<T: Into<String>>(msg: T) -> Self {
        SeoHubError::InvalidState(msg.into())
    }

    pub fn feature_disabled<T: Into<String>>(msg: T) -> Self {
        SeoHubError::FeatureDisabled(msg.into())
    }

    pub fn service_unavailable<T: Into<String>>(msg: T) -> Self {
        SeoHubError::ServiceUnavailable(msg.into())
    }

    pub fn chat_provider<T: Into<String>>(msg: T) -> Self {
        SeoHubError::ChatProvider(msg.into())
    }

    pub fn serialization<T: Into<String>>(msg: T) -> Self {
        SeoHubError::Serialization(msg.into())
    }

    pub fn password_hash<T: Into<String>>(msg: T) -> Self {
        SeoHubError::PasswordHash(msg.into())
    }

    pub fn token<T: Into<String>>(msg: T) -> Self {
        SeoHubError::Token(msg.into())
    }

    pub fn invalid_cron<T: Into<String>>(msg: T) -> Self {
        SeoHubError::InvalidCron(msg.into())
    }
}

// 为常见的错误类型实现 From trait
impl From<sea_orm::DbErr> for SeoHubError {
    fn from(err: sea_orm::DbErr) -> Self {
        SeoHubError::DatabaseOperation(err.to_string())
    }
}

impl From<std::io::Error> for SeoHubError {
    fn from(err: std::io::Error) -> Self {
        SeoHubError::FileOperation(err.to_string())
    }
}

impl From<serde_json::Error> for SeoHubError {
    fn from(err: serde_json::Error) -> Self {
        SeoHubError::Serialization(err.to_string())
    }
}

impl From<jsonwebtoken::errors::Error> for SeoHubError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        SeoHubError::Token(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SeoHubError>;
