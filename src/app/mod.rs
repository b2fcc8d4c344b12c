//! Application routes.
//!
//! Everything except `/saml/*` sits behind one session guard.

pub mod files;
pub mod whoami;

use axum::{routing::any, Router};
use std::path::Path;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::guard::SamlGuard;

/// Build the complete HTTP router.
pub fn router(guard: Arc<SamlGuard>, dist_dir: &Path) -> Router {
    let app = Router::new()
        .route("/api/v1/whoami", any(whoami::whoami))
        .route("/api/v1/whoami/{*rest}", any(whoami::whoami))
        .fallback_service(files::spa_service(dist_dir));

    Router::new()
        .merge(guard.saml_routes())
        .merge(guard.require_account(app))
        .layer(TraceLayer::new_for_http())
}
