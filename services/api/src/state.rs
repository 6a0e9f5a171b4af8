//! Shared Application State
//!
//! This module defines the `AppState` struct, which holds all shared,
//! clonable resources like the database pool and service clients.

use crate::auth::AuthService;
use crate::config::Config;
use crate::speech::AzureSynthesizer;
use samtale_core::{gateway::ModelGateway, scenario::ScenarioStore};
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
/// All fields are public to be accessible from other modules.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<crate::db::Db>,
    pub auth: Arc<AuthService>,
    pub gateway: Arc<dyn ModelGateway>,
    pub scenarios: Arc<dyn ScenarioStore>,
    pub synthesizer: Option<Arc<AzureSynthesizer>>,
    pub config: Arc<Config>,
}
