//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use bitacora_core::advisory::Advisor;
use bitacora_core::fleet::FleetService;
use bitacora_core::identity::IdentityGate;
use bitacora_core::ports::{
    AdvisoryService, ChangeEvent, ChangeOperation, Collection, CredentialHasher, DatabaseService,
};
use bitacora_core::workflow::LogBookWorkflow;
use std::sync::Arc;
use tokio::sync::broadcast;

/// How many change events a slow WebSocket session may fall behind before it
/// lags. A lagged session just refreshes once more.
pub const CHANGE_BUFFER: usize = 64;

//=========================================================================================
// AppState (Shared Across All Connections)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn DatabaseService>,
    pub config: Arc<Config>,
    pub changes: broadcast::Sender<ChangeEvent>,
    pub advisor: Advisor,
    pub identity: Arc<IdentityGate>,
    pub workflow: LogBookWorkflow,
    pub fleet: FleetService,
}

impl AppState {
    /// Wires the core services around the given adapters.
    pub fn new(
        db: Arc<dyn DatabaseService>,
        hasher: Arc<dyn CredentialHasher>,
        advisory: Arc<dyn AdvisoryService>,
        config: Arc<Config>,
    ) -> Self {
        let identity = Arc::new(IdentityGate::new(
            db.clone(),
            hasher,
            config.master_credentials.clone(),
        ));
        let (changes, _) = broadcast::channel(CHANGE_BUFFER);
        Self {
            workflow: LogBookWorkflow::new(db.clone()),
            fleet: FleetService::new(db.clone(), identity.clone()),
            advisor: Advisor::new(advisory),
            identity,
            changes,
            config,
            db,
        }
    }

    /// Tells every connected session that `collection` changed. Having no
    /// listeners is not an error.
    pub fn publish(&self, collection: Collection, operation: ChangeOperation) {
        let _ = self.changes.send(ChangeEvent {
            collection,
            operation,
        });
    }
}
