//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use healthlens_core::AnalysisService;
use std::sync::Arc;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
/// Requests share nothing mutable; each analysis is independent.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub analysis: AnalysisService,
}
