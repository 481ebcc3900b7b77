use std::sync::Arc;

use crate::recommendation::service::RecommendationService;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Built once at startup; read-only afterwards, so no locking is needed.
    pub service: Arc<RecommendationService>,
}
