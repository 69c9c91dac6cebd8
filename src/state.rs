use std::sync::Arc;

use tracing::{info, warn};

use crate::config::{AppConfig, StoreBackend};
use crate::database::manager::{DatabaseError, DatabaseManager};
use crate::database::memory::MemoryStore;
use crate::database::postgres::PgStore;
use crate::database::repository::{NotificationStore, PaymentLedger, StoreHealth, StudentDirectory};
use crate::services::clock::{Clock, SystemClock};
use crate::services::overdue_service::OverdueService;

/// Everything a handler needs, shared across requests
#[derive(Clone)]
pub struct AppState {
    pub students: Arc<dyn StudentDirectory>,
    pub payments: Arc<dyn PaymentLedger>,
    pub notifications: Arc<dyn NotificationStore>,
    pub health: Arc<dyn StoreHealth>,
    pub overdue: Arc<OverdueService>,
    pub config: Arc<AppConfig>,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    /// Wire every store seam to the same backend
    pub fn from_store<S>(store: Arc<S>, config: Arc<AppConfig>, clock: Arc<dyn Clock>) -> Self
    where
        S: StudentDirectory + PaymentLedger + NotificationStore + StoreHealth + 'static,
    {
        let students: Arc<dyn StudentDirectory> = store.clone();
        let payments: Arc<dyn PaymentLedger> = store.clone();
        let notifications: Arc<dyn NotificationStore> = store.clone();
        let overdue = Arc::new(OverdueService::new(
            students.clone(),
            payments.clone(),
            notifications.clone(),
            &config.billing,
        ));

        Self {
            students,
            payments,
            notifications,
            health: store,
            overdue,
            config,
            clock,
        }
    }

    /// Open the backend named by the configuration, using the system clock
    pub async fn connect(config: AppConfig) -> Result<Self, DatabaseError> {
        let config = Arc::new(config);
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        match config.store {
            StoreBackend::Memory => {
                warn!("Using in-memory store; it starts empty and students cannot be added");
                Ok(Self::from_store(Arc::new(MemoryStore::new()), config, clock))
            }
            StoreBackend::Postgres => {
                let pool = DatabaseManager::connect(&config.database).await?;
                if config.database.bootstrap_schema {
                    DatabaseManager::bootstrap_schema(&pool).await?;
                }
                info!("Using PostgreSQL store");
                Ok(Self::from_store(Arc::new(PgStore::new(pool)), config, clock))
            }
        }
    }
}
