use std::path::PathBuf;
use std::sync::Arc;

use crate::api::{FeedApi, HttpApi};
use crate::app::error::{MurmurError, Result};
use crate::config::Config;
use crate::domain::FeedTarget;
use crate::service::FeedService;
use crate::session::FeedSession;
use crate::store::sqlite::SqliteStore;
use crate::telemetry::Metrics;

pub struct AppContext {
    pub config: Config,
    pub store: Arc<SqliteStore>,
    pub api: Arc<dyn FeedApi>,
    pub metrics: Metrics,
    pub service: Arc<FeedService>,
}

impl AppContext {
    pub fn new(db_path: Option<PathBuf>, config: Config) -> Result<Self> {
        let db_path = match db_path {
            Some(p) => p,
            None => Self::default_db_path()?,
        };
        Self::with_store(Arc::new(SqliteStore::new(&db_path)?), config)
    }

    pub fn in_memory(config: Config) -> Result<Self> {
        Self::with_store(Arc::new(SqliteStore::in_memory()?), config)
    }

    fn with_store(store: Arc<SqliteStore>, config: Config) -> Result<Self> {
        let api: Arc<dyn FeedApi> = Arc::new(HttpApi::new(&config.api, store.clone())?);
        Ok(Self::with_api(store, api, config))
    }

    /// Wire the service around an already-built API client.
    pub fn with_api(store: Arc<SqliteStore>, api: Arc<dyn FeedApi>, config: Config) -> Self {
        let metrics = Metrics::new();
        let service = Arc::new(FeedService::new(
            api.clone(),
            store.clone(),
            metrics.clone(),
            config.account.user_id.clone(),
        ));

        Self {
            config,
            store,
            api,
            metrics,
            service,
        }
    }

    /// A feed session over `target` using the configured page size.
    pub fn session(&self, target: FeedTarget, limit: Option<u32>) -> FeedSession {
        let limit = limit.unwrap_or_else(|| self.config.feed.limit());
        FeedSession::new(self.service.clone(), target, limit)
    }

    fn default_db_path() -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| MurmurError::Config("Could not find data directory".into()))?;
        let murmur_dir = data_dir.join("murmur");
        std::fs::create_dir_all(&murmur_dir)?;
        Ok(murmur_dir.join("murmur.db"))
    }
}
