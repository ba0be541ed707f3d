pub mod people;
pub mod rates;
pub mod sessions;
pub mod subscriptions;

use axum::{routing::get, Router};
use tower_http::cors::CorsLayer;

use crate::state::AppState;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(people::routes())
        .merge(sessions::routes())
        .merge(subscriptions::routes())
        .merge(rates::routes())
        // Health check
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> &'static str {
    "OK"
}
