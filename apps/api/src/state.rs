use std::sync::Arc;

use crate::config::Config;
use crate::triage::pipeline::TriagePipeline;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Analysis oracle, notifier and estimator are chosen at startup from config.
    pub pipeline: Arc<TriagePipeline>,
    pub config: Config,
}
