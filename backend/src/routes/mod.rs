//! Route definitions for the Verdex API

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Create API routes
pub fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Health check (public)
        .route("/health", get(handlers::health_check))
        // Protected routes - harvest batches
        .nest("/harvests", harvest_routes(state.clone()))
        // Protected routes - distributions
        .nest("/distributions", distribution_routes(state.clone()))
        // Protected routes - dashboard reports
        .nest("/reports", report_routes(state.clone()))
        // Protected routes - spreadsheet import
        .nest("/import", import_routes(state))
}

/// Harvest batch routes (protected)
fn harvest_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_harvests).post(handlers::create_harvest))
        .route(
            "/:id",
            get(handlers::get_harvest)
                .put(handlers::update_harvest)
                .delete(handlers::delete_harvest),
        )
        .route("/by-batch/:seed_batch_id", get(handlers::get_harvest_by_batch_id))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Distribution routes (protected)
fn distribution_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_distributions).post(handlers::create_distribution),
        )
        .route(
            "/:id",
            get(handlers::get_distribution)
                .put(handlers::update_distribution)
                .delete(handlers::delete_distribution),
        )
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Report routes (protected)
fn report_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(handlers::get_dashboard))
        .route("/crops", get(handlers::get_crop_stats))
        .route("/harvest-trends", get(handlers::get_harvest_trends))
        .route("/distribution-trends", get(handlers::get_distribution_trends))
        .route("/recent", get(handlers::get_recent_activity))
        .route("/consistency", get(handlers::get_consistency_report))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Import routes (protected)
fn import_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/harvests", post(handlers::import_harvests))
        .route("/distributions", post(handlers::import_distributions))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}
