//! Application state.

use std::sync::Arc;

use points_core::BonusRules;
use points_engine::Ledger;
use points_store::Store;

use crate::config::ServiceConfig;

/// Application state shared across handlers.
pub struct AppState<S> {
    /// The ledger.
    pub ledger: Arc<Ledger<S>>,

    /// Service configuration.
    pub config: ServiceConfig,
}

impl<S: Store> AppState<S> {
    /// Create a new application state with the default bonus rules.
    #[must_use]
    pub fn new(store: S, config: ServiceConfig) -> Self {
        let ledger = Ledger::new(store, BonusRules::default(), config.tx_timeout());
        Self::with_ledger(Arc::new(ledger), config)
    }

    /// Create a new application state around an existing ledger.
    #[must_use]
    pub fn with_ledger(ledger: Arc<Ledger<S>>, config: ServiceConfig) -> Self {
        Self { ledger, config }
    }
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            ledger: Arc::clone(&self.ledger),
            config: self.config.clone(),
        }
    }
}
