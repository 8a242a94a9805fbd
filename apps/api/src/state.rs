use std::sync::Arc;

use crate::auth::JwtVerifier;
use crate::config::Config;
use crate::credits::store::CreditStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Sole mutation point for balances and plan flags.
    pub store: Arc<dyn CreditStore>,
    pub verifier: JwtVerifier,
    pub config: Config,
}
