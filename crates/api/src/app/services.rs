use std::sync::Arc;

use hotelmenu_infra::{
    AvailabilityOracle, BookingLifecycle, BookingStore, CatalogService, CatalogStore,
    InMemoryStore, StoreError, Transactional,
};

use crate::config::ApiConfig;

/// Everything the handlers need, shared behind one `Arc`.
#[derive(Clone)]
pub struct AppServices {
    pub catalog: CatalogService,
    pub lifecycle: BookingLifecycle,
    pub oracle: AvailabilityOracle,
    /// Applied to products created without a currency.
    pub default_currency: String,
}

impl AppServices {
    /// Wire every service onto one store.
    pub fn from_store<S>(store: Arc<S>, config: &ApiConfig) -> Self
    where
        S: CatalogStore + BookingStore + Transactional + 'static,
    {
        let catalog_store: Arc<dyn CatalogStore> = store.clone();
        let booking_store: Arc<dyn BookingStore> = store.clone();
        let transactions: Arc<dyn Transactional> = store;

        Self {
            catalog: CatalogService::new(catalog_store.clone()),
            lifecycle: BookingLifecycle::new(
                transactions,
                booking_store.clone(),
                config.admission_policy,
            ),
            oracle: AvailabilityOracle::new(catalog_store, booking_store),
            default_currency: config.default_currency.clone(),
        }
    }

    pub fn in_memory(config: &ApiConfig) -> Self {
        Self::from_store(Arc::new(InMemoryStore::new()), config)
    }
}

pub async fn build_services(config: &ApiConfig) -> Result<AppServices, StoreError> {
    if config.use_persistent_stores {
        #[cfg(feature = "postgres")]
        {
            return build_persistent_services(config).await;
        }
        #[cfg(not(feature = "postgres"))]
        {
            tracing::warn!(
                "USE_PERSISTENT_STORES=true but postgres feature not enabled, falling back to in-memory"
            );
            return Ok(AppServices::in_memory(config));
        }
    }

    tracing::info!("using in-memory store");
    Ok(AppServices::in_memory(config))
}

#[cfg(feature = "postgres")]
async fn build_persistent_services(config: &ApiConfig) -> Result<AppServices, StoreError> {
    use hotelmenu_infra::store::PostgresStore;

    let database_url = config
        .database_url
        .as_deref()
        .ok_or_else(|| StoreError::Backend("DATABASE_URL is not set".to_string()))?;

    let store = PostgresStore::connect(database_url).await?;
    store.migrate().await?;
    tracing::info!("using postgres store");

    Ok(AppServices::from_store(Arc::new(store), config))
}
