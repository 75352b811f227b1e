// Route exports
pub mod auth;
pub mod discovery;
pub mod profiles;
pub mod signals;

use std::sync::Arc;

use actix_web::{web, HttpResponse, Responder};

use crate::core::{DiscoveryDefaults, DiscoveryEngine, ProfileDirectory, SignalTracker};
use crate::error::{AppError, AppResult};
use crate::models::{HealthResponse, ProfileId};
use crate::services::DatingStore;

pub use auth::AuthUser;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DatingStore>,
    pub engine: DiscoveryEngine,
    pub signals: SignalTracker,
    pub directory: ProfileDirectory,
    /// Cookie carrying the session token
    pub session_cookie: String,
}

impl AppState {
    pub fn new(store: Arc<dyn DatingStore>, defaults: DiscoveryDefaults, session_cookie: impl Into<String>) -> Self {
        Self {
            engine: DiscoveryEngine::new(store.clone(), defaults),
            signals: SignalTracker::new(store.clone()),
            directory: ProfileDirectory::new(store.clone()),
            store,
            session_cookie: session_cookie.into(),
        }
    }
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .route("/health", web::get().to(health_check))
            .configure(discovery::configure)
            .configure(signals::configure)
            .configure(profiles::configure),
    );
}

/// Health check endpoint
async fn health_check(state: web::Data<AppState>) -> impl Responder {
    let healthy = state.store.health_check().await.unwrap_or_else(|e| {
        tracing::warn!("Store health check failed: {}", e);
        false
    });

    let status = if healthy { "healthy" } else { "degraded" };

    HttpResponse::Ok().json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now(),
    })
}

/// Parse a path-scoped profile id
pub(crate) fn parse_profile_id(raw: &str) -> AppResult<ProfileId> {
    raw.trim()
        .parse::<ProfileId>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| AppError::bad_input("Invalid user ID"))
}
