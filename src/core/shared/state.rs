use std::sync::Arc;

use crate::activity::ActivityLogger;
use crate::core::config::AppConfig;
use crate::core::store::CrmStore;
use crate::security::jwt::JwtManager;

/// Shared by every handler behind an `Arc`.
pub struct AppState {
    pub config: AppConfig,
    pub store: Arc<dyn CrmStore>,
    pub jwt: JwtManager,
    pub activity: ActivityLogger,
}

impl AppState {
    pub fn new(config: AppConfig, store: Arc<dyn CrmStore>) -> anyhow::Result<Self> {
        let jwt = JwtManager::from_config(&config.auth)?;
        let activity = ActivityLogger::new(Arc::clone(&store));
        Ok(Self {
            config,
            store,
            jwt,
            activity,
        })
    }
}
