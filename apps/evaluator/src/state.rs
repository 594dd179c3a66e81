use std::sync::Arc;

use crate::evaluation::orchestrator::Orchestrator;
use crate::store::EvaluationStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Read side for the ranking and scoring endpoints.
    pub store: Arc<dyn EvaluationStore>,
    pub orchestrator: Arc<Orchestrator>,
}
