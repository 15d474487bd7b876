pub mod middleware;

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post};
use tower_http::trace::TraceLayer;

use crate::api::middleware::require_admin;
use crate::service::admin::{ip_server_handler, list_database_handler, list_server_handler};
use crate::service::delete::delete_handler;
use crate::service::download::download_handler;
use crate::service::upload::{upload_handler, upload_mirrored_handler};
use crate::utils::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", post(upload_handler))
        .route("/up", post(upload_mirrored_handler))
        .route("/{filename}", delete(delete_handler))
        .route("/down/{filename}", get(download_handler))
        .route("/ping", get(|| async { "pong" }))
        .merge(admin_router(state.clone()))
        .layer(DefaultBodyLimit::max(state.config.max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn admin_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/listserver/{admin}", get(list_server_handler))
        .route("/listdatabase/{admin}", get(list_database_handler))
        .route("/ipserver/{admin}", get(ip_server_handler))
        .route_layer(axum::middleware::from_fn_with_state(state, require_admin))
}
