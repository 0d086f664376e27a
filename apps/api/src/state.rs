use crate::compatibility::service::CompatibilityService;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Primary cascade plus optional escalation engine.
    pub compatibility: CompatibilityService,
}
