//! Route definitions for the farmstead server

use axum::{routing::get, Router};

use crate::{handlers, AppState};

/// Create application routes
pub fn app_routes() -> Router<AppState> {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Farm management
        .nest("/farms", farm_routes())
}

/// Farm management routes
fn farm_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_farms).post(handlers::create_farm))
        .route(
            "/:farm_id",
            get(handlers::get_farm)
                .put(handlers::update_farm)
                .delete(handlers::delete_farm),
        )
}
