//! Service container for dependency injection
//!
//! Wires the nested-set services to one store and one forest lock.

use std::sync::{Arc, RwLock};

use tracing::debug;

use crate::application::services::{ForestLock, NestedSetService, TraversalService};
use crate::config::Settings;
use crate::infrastructure::error::InfraResult;
use crate::infrastructure::store::TomlFileStore;
use crate::infrastructure::traits::BoundsStore;

/// Container holding all application services for one forest.
pub struct ServiceContainer {
    /// Application settings
    pub settings: Arc<Settings>,

    /// Bounds store shared by all services
    pub store: Arc<dyn BoundsStore>,

    /// Structural mutations
    pub nested_set: NestedSetService,

    /// Read-only queries
    pub traversal: TraversalService,
}

impl ServiceContainer {
    /// Create a container over the TOML forest file named in `settings`.
    pub fn new(settings: Settings) -> InfraResult<Self> {
        debug!("opening forest {}", settings.store.display());
        let store = TomlFileStore::open(&settings.store, settings.columns.clone())?;
        Ok(Self::with_store(settings, Arc::new(store)))
    }

    /// Create a container over a custom store (for testing).
    pub fn with_store(settings: Settings, store: Arc<dyn BoundsStore>) -> Self {
        let settings = Arc::new(settings);
        let lock: ForestLock = Arc::new(RwLock::new(()));

        let nested_set = NestedSetService::new(store.clone(), lock.clone(), &settings);
        let traversal = TraversalService::new(store.clone(), lock, &settings);

        Self {
            settings,
            store,
            nested_set,
            traversal,
        }
    }
}
