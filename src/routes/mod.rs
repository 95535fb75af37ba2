pub mod anthropic;
pub mod brand_voice;
pub mod content;
pub mod generations;
pub mod health;
pub mod sources;
pub mod usage;

use crate::middleware;
use crate::state::AppState;
use axum::http::{header, Method};
use axum::routing::{any, get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

pub fn build_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    // Account routes (behind bearer auth)
    let account_routes = Router::new()
        .route("/api/sources", get(sources::list_sources).post(sources::create_source))
        .route("/api/sources/{id}", get(sources::get_source))
        .route(
            "/api/generations",
            get(generations::list_generations).post(generations::create_generation),
        )
        .route("/api/generations/{id}", get(generations::get_generation))
        .route("/api/content", get(content::list_content))
        .route(
            "/api/content/{id}/revisions",
            get(content::list_revisions).post(content::create_revision),
        )
        .route("/api/content/{id}/polish", post(content::polish))
        .route("/api/content/{id}/archive", post(content::archive))
        .route("/api/content/{id}/unarchive", post(content::unarchive))
        .route("/api/content/archive", post(content::bulk_archive))
        .route("/api/brand-voice", post(brand_voice::analyze))
        .route("/api/usage", get(usage::monthly_usage))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::api_auth::require_account,
        ));

    Router::new()
        // Gateway (runs its own checks, including method)
        .route("/api/anthropic", any(anthropic::proxy))
        // Health
        .route("/health", get(health::health_check))
        .merge(account_routes)
        // Middleware layers (applied bottom-up)
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(2 * 1024 * 1024)) // 2MB, room for long transcripts
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
