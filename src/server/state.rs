//! Shared application state for the HTTP surfaces.

use std::sync::Arc;

use crate::events::PushBus;
use crate::settings::Settings;
use crate::storage::RepoManager;
use crate::validator::SchemaValidator;

/// Everything a request handler needs. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub repos: RepoManager,
    pub bus: PushBus,
    pub validator: Arc<SchemaValidator>,
    pub settings: Arc<Settings>,
}

impl AppState {
    pub fn new(
        repos: RepoManager,
        bus: PushBus,
        validator: SchemaValidator,
        settings: Settings,
    ) -> Self {
        Self {
            repos,
            bus,
            validator: Arc::new(validator),
            settings: Arc::new(settings),
        }
    }
}
