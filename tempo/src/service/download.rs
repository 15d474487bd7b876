use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use tokio_util::io::ReaderStream;

use crate::error::{AppError, Result};
use crate::utils::state::AppState;
use crate::utils::validation::sanitize_filename;

/// GET /down/{filename}
///
/// Serves from the local copy, fetching it from the content store first when
/// it is not staged. The local copy is removed again after a fixed delay.
pub async fn download_handler(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
) -> Result<Response> {
    let filename = sanitize_filename(&filename)?;

    if !state.content.exists(&filename).await? {
        tracing::info!("File not found in content store: {filename}");
        return Err(AppError::NotFound(filename));
    }

    if !state.local.exists(&filename).await {
        let data = state.content.get(&filename).await?;
        state.local.write_bytes(&filename, data).await?;
    }

    let file = state.local.read(&filename).await?;
    let content_length = file.metadata().await?.len();
    schedule_cleanup(&state, filename.clone());
    tracing::info!("File downloaded from content store: {filename}");

    let body = Body::from_stream(ReaderStream::new(file));
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (header::CONTENT_LENGTH, content_length.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", disposition_name(&filename)),
            ),
        ],
        body,
    )
        .into_response())
}

/// Header values must be visible ASCII, so anything else is dropped.
fn disposition_name(filename: &str) -> String {
    filename
        .chars()
        .filter(|c| (c.is_ascii_graphic() && *c != '"') || *c == ' ')
        .collect()
}

/// Removes the local copy once the download window has passed.
///
/// Shutdown cuts the wait short so no staged download outlives the process.
fn schedule_cleanup(state: &AppState, filename: String) {
    let local = state.local.clone();
    let queue = state.queue.clone();
    let delay = state.config.download_cleanup_delay;
    let token = state.shutdown.clone();

    state.tasks.spawn(async move {
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = token.cancelled() => {}
        }
        match local.delete(&filename).await {
            Ok(true) => tracing::info!("Removed temporary file: {filename}"),
            Ok(false) => {}
            Err(err) => tracing::warn!("Error removing temporary file {filename}: {err}"),
        }
        queue.replace_all_except(&filename).await;
    });
}
