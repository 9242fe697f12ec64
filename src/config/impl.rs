use std::sync::{Arc, OnceLock};

use arc_swap::ArcSwap;

use super::StaticConfig;

/// 默认配置文件路径
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

static CONFIG: OnceLock<ArcSwap<StaticConfig>> = OnceLock::new();

/// Get the global configuration instance
///
/// Returns an Arc pointer to the configuration, which is cheap to clone
/// and doesn't hold any locks.
pub fn get_config() -> Arc<StaticConfig> {
    CONFIG
        .get_or_init(|| ArcSwap::from_pointee(StaticConfig::load(DEFAULT_CONFIG_PATH)))
        .load_full()
}

/// Initialize the global configuration from `config.toml`
///
/// If the file doesn't exist, uses in-memory defaults (plus `SEOHUB__*`
/// environment overrides).
///
/// # Examples
/// ```no_run
/// use seohub::config::init_config;
/// init_config();
/// ```
pub fn init_config() {
    init_config_from(DEFAULT_CONFIG_PATH);
}

/// Initialize the global configuration from a specific TOML file
pub fn init_config_from(path: &str) {
    CONFIG.get_or_init(|| ArcSwap::from_pointee(StaticConfig::load(path)));
}

/// Replace the whole configuration (CLI overrides, tests)
pub fn replace_config(config: StaticConfig) {
    match CONFIG.get() {
        Some(current) => current.store(Arc::new(config)),
        None => {
            let _ = CONFIG.set(ArcSwap::from_pointee(config));
        }
    }
}
