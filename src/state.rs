use std::sync::Arc;

use tracing::info;

use crate::auth::JwtKeys;
use crate::config::{AppConfig, StoreBackend};
use crate::database::{DatabaseError, DatabaseManager, PgStore};
use crate::middleware::{AllowList, AuthGate};
use crate::services::OrderService;
use crate::store::Stores;
use crate::uploads::UploadStore;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub stores: Stores,
    pub orders: Arc<OrderService>,
    pub gate: AuthGate,
    pub keys: JwtKeys,
    pub uploads: UploadStore,
    /// Present when running on Postgres; used by the health check
    pub database: Option<DatabaseManager>,
}

impl AppState {
    pub fn new(config: AppConfig, stores: Stores) -> Self {
        let keys = JwtKeys::from_config(&config.security);
        let gate = AuthGate::new(
            AllowList::default_for(&config.api.prefix),
            keys.clone(),
            config.security.revocation_policy,
        );

        Self {
            orders: Arc::new(OrderService::new(&stores)),
            uploads: UploadStore::new(config.api.upload_dir.clone()),
            config: Arc::new(config),
            stores,
            gate,
            keys,
            database: None,
        }
    }

    pub fn with_database(mut self, database: DatabaseManager) -> Self {
        self.database = Some(database);
        self
    }

    /// Build the stores for the configured backend, connecting and
    /// migrating Postgres when selected
    pub async fn from_config(config: AppConfig) -> Result<Self, DatabaseError> {
        match config.database.backend {
            StoreBackend::Memory => {
                info!("Using in-memory store; data is lost on restart");
                Ok(Self::new(config, Stores::memory()))
            }
            StoreBackend::Postgres => {
                let database = DatabaseManager::connect(&config.database).await?;
                if config.database.run_migrations {
                    database.migrate().await?;
                }
                let store = PgStore::new(database.pool())?;
                Ok(Self::new(config, Stores::from_backend(Arc::new(store))).with_database(database))
            }
        }
    }
}
