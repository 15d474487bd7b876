use std::sync::Arc;

use axum::extract::{Path, Request, State};
use axum::middleware::Next;
use axum::response::IntoResponse;

use crate::error::AppError;
use crate::utils::state::AppState;

/// Admin routes carry the password as their last path segment.
pub async fn require_admin(
    State(state): State<Arc<AppState>>,
    Path(admin): Path<String>,
    req: Request,
    next: Next,
) -> Result<impl IntoResponse, AppError> {
    if admin != state.config.admin_password {
        tracing::warn!("rejected admin request to {}", req.uri().path());
        return Err(AppError::Unauthorized("Authentication failed".to_string()));
    }
    Ok(next.run(req).await)
}
