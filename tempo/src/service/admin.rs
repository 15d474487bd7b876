use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;

use crate::error::{AppError, Result};
use crate::utils::net::local_ip;
use crate::utils::state::AppState;

/// GET /listserver/{admin}
pub async fn list_server_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let files = state.queue.snapshot().await;
    tracing::info!("Admin listed {} server files", files.len());
    files.join("\n")
}

/// GET /listdatabase/{admin}
pub async fn list_database_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse> {
    let files = state.content.list().await?;
    tracing::info!("Admin listed {} content store files", files.len());
    Ok(files.join("\n"))
}

/// GET /ipserver/{admin}
pub async fn ip_server_handler() -> Result<impl IntoResponse> {
    let ip = local_ip()
        .await
        .map_err(|err| AppError::StorageIo(format!("failed to get IP: {err}")))?;
    Ok(ip.to_string())
}
