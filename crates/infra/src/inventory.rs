use sqlx::SqlitePool;

use crate::categories::CategoryRegistry;
use crate::config::StoreConfig;
use crate::db;
use crate::error::StoreResult;
use crate::items::ItemStore;
use crate::ledger::MovementLedger;
use crate::registry::{DestinationRegistry, ProviderRegistry, UnitRegistry};

/// All stores over one shared pool.
#[derive(Debug, Clone)]
pub struct Inventory {
    pool: SqlitePool,
    pub items: ItemStore,
    pub ledger: MovementLedger,
    pub units: UnitRegistry,
    pub providers: ProviderRegistry,
    pub destinations: DestinationRegistry,
    pub categories: CategoryRegistry,
}

impl Inventory {
    /// Connect, migrate, and build the stores.
    pub async fn open(config: &StoreConfig) -> StoreResult<Self> {
        let pool = db::connect(config).await?;
        Ok(Self::from_pool(pool))
    }

    /// Wrap an already-migrated pool.
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self {
            items: ItemStore::new(pool.clone()),
            ledger: MovementLedger::new(pool.clone()),
            units: UnitRegistry::new(pool.clone()),
            providers: ProviderRegistry::new(pool.clone()),
            destinations: DestinationRegistry::new(pool.clone()),
            categories: CategoryRegistry::new(pool.clone()),
            pool,
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
