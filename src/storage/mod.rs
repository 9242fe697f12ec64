use std::sync::Arc;

use crate::errors::Result;

pub mod backend;
pub mod models;

pub use backend::Storage;
pub use models::{PageRequest, Paginated};

pub struct StorageFactory;

impl StorageFactory {
    /// 按全局配置连接数据库并执行迁移
    pub async fn create() -> Result<Arc<Storage>> {
        let config = crate::config::get_config();
        let storage = Storage::connect(&config.database.database_url, &config.database).await?;
        Ok(Arc::new(storage))
    }
}
