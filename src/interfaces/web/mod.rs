//! HTTP surface over the core. Handlers stay thin: parse, check access,
//! call one core operation, map the result.

pub(crate) mod auth;
mod error;
mod handlers;
mod router;

use std::sync::Arc;

use crate::core::app::App;
use crate::core::cache::CacheGateway;
use crate::core::store::RecordStore;
use crate::core::sync::SyncOrchestrator;
use crate::core::workflow::WorkflowEngine;

pub use router::build_api_router;

#[derive(Clone)]
pub struct AppState {
    pub(crate) store: Arc<dyn RecordStore>,
    pub(crate) cache: CacheGateway,
    pub(crate) workflow: WorkflowEngine,
    pub(crate) sync: Arc<SyncOrchestrator>,
    pub(crate) api_host: String,
    pub(crate) api_port: u16,
}

impl AppState {
    pub fn from_app(app: &App) -> Self {
        Self {
            store: app.store.clone(),
            cache: app.cache.clone(),
            workflow: app.workflow.clone(),
            sync: app.sync.clone(),
            api_host: app.config.api_host.clone(),
            api_port: app.config.api_port,
        }
    }
}
