use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// 静态配置（从 TOML 加载，启动时使用）
///
/// 包含：
/// - server: 服务器地址、端口、worker 数量
/// - database: 数据库连接与重试
/// - logging: 日志输出
/// - auth: JWT 与邀请
/// - scheduler: 报表调度器
/// - webhook: 履约供应商回调
/// - ai: 聊天模型提供方
/// - features: feature flag 默认值覆盖
/// - cors: 跨域设置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StaticConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub webhook: WebhookConfig,
    #[serde(default)]
    pub ai: AiConfig,
    #[serde(default)]
    pub features: HashMap<String, bool>,
    #[serde(default)]
    pub cors: CorsConfig,
}

impl StaticConfig {
    /// 从 TOML 文件和环境变量加载配置
    ///
    /// 优先级：ENV > config.toml > 默认值
    /// ENV 前缀：SEOHUB，分隔符：__
    /// 示例：SEOHUB__SERVER__PORT=9999
    pub fn load(path: &str) -> Self {
        use config::{Config, Environment, File};

        let builder = Config::builder()
            // 1. 从 TOML 文件加载（可选）
            .add_source(File::with_name(path).required(false))
            // 2. 从环境变量覆盖
            .add_source(
                Environment::with_prefix("SEOHUB")
                    .separator("__")
                    .try_parsing(true),
            );

        match builder.build() {
            Ok(settings) => match settings.try_deserialize::<StaticConfig>() {
                Ok(config) => {
                    if std::path::Path::new(path).exists() {
                        eprintln!("[INFO] Configuration loaded from: {}", path);
                    }
                    config
                }
                Err(e) => {
                    eprintln!("[ERROR] Failed to deserialize config: {}", e);
                    Self::default()
                }
            },
            Err(e) => {
                eprintln!("[ERROR] Failed to build config: {}", e);
                Self::default()
            }
        }
    }

    /// 生成示例 TOML 配置文件
    pub fn generate_sample_config() -> String {
        let sample_config = Self::default();
        toml::to_string_pretty(&sample_config)
            .unwrap_or_else(|e| format!("Error generating sample config: {}", e))
    }

    /// 保存配置到 TOML 文件
    pub fn save_to_file<P: AsRef<std::path::Path>>(
        &self,
        path: P,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let content = toml::to_string_pretty(self)?;

        if let Some(parent) = path.as_ref().parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, content)?;
        Ok(())
    }
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_host")]
    pub host: String,
    #[serde(default = "default_server_port")]
    pub port: u16,
    #[serde(default = "default_cpu_count")]
    pub cpu_count: usize,
}

/// 数据库连接配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_database_pool_size")]
    pub pool_size: u32,
    #[serde(default = "default_database_timeout")]
    pub timeout: u64,
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default = "default_max_backups")]
    pub max_backups: u32,
    #[serde(default = "default_enable_rotation")]
    pub enable_rotation: bool,
}

/// 认证配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// 为空时启动时随机生成（重启后已签发的 token 失效）
    #[serde(default)]
    pub jwt_secret: String,
    #[serde(default = "default_access_token_minutes")]
    pub access_token_minutes: u64,
    #[serde(default = "default_refresh_token_days")]
    pub refresh_token_days: u64,
    #[serde(default = "default_invite_ttl_hours")]
    pub invite_ttl_hours: u64,
    /// 是否开放自助注册新 agency
    #[serde(default = "default_true")]
    pub allow_registration: bool,
    /// 登录限流时信任 X-Forwarded-For 的代理（IP 或 CIDR）
    #[serde(default)]
    pub trusted_proxies: Vec<String>,
}

/// 报表调度器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_tick_interval_secs")]
    pub tick_interval_secs: u64,
    #[serde(default = "default_batch_size")]
    pub batch_size: u64,
    /// 单次执行最多尝试次数
    #[serde(default = "default_max_attempts")]
    pub max_attempts: i32,
    /// 连续失败多少次后自动暂停调度
    #[serde(default = "default_pause_after_failures")]
    pub pause_after_failures: i32,
    #[serde(default = "default_retry_base_delay_secs")]
    pub retry_base_delay_secs: u64,
    #[serde(default = "default_retry_max_delay_secs")]
    pub retry_max_delay_secs: u64,
    /// running 状态超过该时长视为进程崩溃遗留
    #[serde(default = "default_stale_after_secs")]
    pub stale_after_secs: u64,
}

/// Webhook 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// HMAC-SHA256 共享密钥，未配置时 webhook 端点返回 404
    #[serde(default)]
    pub secret: Option<String>,
    #[serde(default = "default_webhook_source")]
    pub source: String,
    #[serde(default = "default_webhook_max_body_kb")]
    pub max_body_kb: usize,
}

/// AI 聊天配置（OpenAI 兼容接口）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_ai_base_url")]
    pub base_url: String,
    #[serde(default = "default_ai_model")]
    pub default_model: String,
    #[serde(default = "default_ai_allowed_models")]
    pub allowed_models: Vec<String>,
    #[serde(default = "default_ai_timeout_secs")]
    pub timeout_secs: u64,
    /// 发送给模型的历史消息条数上限
    #[serde(default = "default_ai_max_history")]
    pub max_history: u64,
    #[serde(default)]
    pub system_prompt: Option<String>,
}

/// CORS 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub allowed_origins: Vec<String>,
    #[serde(default = "default_cors_max_age")]
    pub max_age: usize,
}

// ============================================================
// Default value functions
// ============================================================

fn default_true() -> bool {
    true
}

fn default_server_host() -> String {
    "127.0.0.1".to_string()
}

fn default_server_port() -> u16 {
    8080
}

fn default_cpu_count() -> usize {
    num_cpus::get()
}

fn default_database_url() -> String {
    "seohub.db".to_string()
}

fn default_database_pool_size() -> u32 {
    10
}

fn default_database_timeout() -> u64 {
    30
}

fn default_retry_count() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    100
}

fn default_retry_max_delay_ms() -> u64 {
    2000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_max_backups() -> u32 {
    5
}

fn default_enable_rotation() -> bool {
    true
}

fn default_access_token_minutes() -> u64 {
    60
}

fn default_refresh_token_days() -> u64 {
    14
}

fn default_invite_ttl_hours() -> u64 {
    72
}

fn default_tick_interval_secs() -> u64 {
    30
}

fn default_batch_size() -> u64 {
    20
}

fn default_max_attempts() -> i32 {
    3
}

fn default_pause_after_failures() -> i32 {
    3
}

fn default_retry_base_delay_secs() -> u64 {
    60
}

fn default_retry_max_delay_secs() -> u64 {
    1800
}

fn default_stale_after_secs() -> u64 {
    900
}

fn default_webhook_source() -> String {
    "fulfillment".to_string()
}

fn default_webhook_max_body_kb() -> usize {
    256
}

fn default_ai_base_url() -> String {
    "https://openrouter.ai/api/v1".to_string()
}

fn default_ai_model() -> String {
    "openai/gpt-4o-mini".to_string()
}

fn default_ai_allowed_models() -> Vec<String> {
    vec![
        "openai/gpt-4o-mini".to_string(),
        "openai/gpt-4o".to_string(),
        "anthropic/claude-3.5-sonnet".to_string(),
        "google/gemini-flash-1.5".to_string(),
    ]
}

fn default_ai_timeout_secs() -> u64 {
    60
}

fn default_ai_max_history() -> u64 {
    20
}

fn default_cors_max_age() -> usize {
    3600
}

// ============================================================
// Default implementations
// ============================================================

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_server_port(),
            cpu_count: default_cpu_count(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            pool_size: default_database_pool_size(),
            timeout: default_database_timeout(),
            retry_count: default_retry_count(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            file: None,
            max_backups: default_max_backups(),
            enable_rotation: default_enable_rotation(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            access_token_minutes: default_access_token_minutes(),
            refresh_token_days: default_refresh_token_days(),
            invite_ttl_hours: default_invite_ttl_hours(),
            allow_registration: true,
            trusted_proxies: Vec::new(),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tick_interval_secs: default_tick_interval_secs(),
            batch_size: default_batch_size(),
            max_attempts: default_max_attempts(),
            pause_after_failures: default_pause_after_failures(),
            retry_base_delay_secs: default_retry_base_delay_secs(),
            retry_max_delay_secs: default_retry_max_delay_secs(),
            stale_after_secs: default_stale_after_secs(),
        }
    }
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            secret: None,
            source: default_webhook_source(),
            max_body_kb: default_webhook_max_body_kb(),
        }
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_ai_base_url(),
            default_model: default_ai_model(),
            allowed_models: default_ai_allowed_models(),
            timeout_secs: default_ai_timeout_secs(),
            max_history: default_ai_max_history(),
            system_prompt: None,
        }
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            allowed_origins: Vec::new(),
            max_age: default_cors_max_age(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_config_round_trips_through_toml() {
        let sample = StaticConfig::generate_sample_config();
        assert!(sample.contains("[scheduler]"));
        let parsed: StaticConfig = toml::from_str(&sample).expect("sample config should parse");
        assert_eq!(parsed.server.port, 8080);
        assert_eq!(parsed.scheduler.max_attempts, 3);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let parsed: StaticConfig = toml::from_str(
            r#"
            [scheduler]
            tick_interval_secs = 5

            [features]
            ai_chat = false
            "#,
        )
        .expect("partial config should parse");
        assert_eq!(parsed.scheduler.tick_interval_secs, 5);
        assert_eq!(parsed.scheduler.pause_after_failures, 3);
        assert_eq!(parsed.features.get("ai_chat"), Some(&false));
        assert_eq!(parsed.auth.access_token_minutes, 60);
    }

    #[test]
    fn test_save_to_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        StaticConfig::default().save_to_file(&path).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("database_url"));
    }
}
