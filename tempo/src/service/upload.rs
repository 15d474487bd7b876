use std::sync::Arc;

use axum::Json;
use axum::extract::{Multipart, State};
use axum::response::IntoResponse;
use bytes::Buf;
use futures::Stream;
use serde::Serialize;

use crate::error::{AppError, Result};
use crate::service::queue::PendingQueue;
use crate::storage::ContentStore;
use crate::storage::local::LocalStore;
use crate::utils::state::AppState;
use crate::utils::validation::sanitize_filename;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MirrorOutcome {
    Skipped,
    Mirrored,
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct UploadReport {
    pub filename: String,
    pub size: u64,
    pub mirror: MirrorOutcome,
}

#[derive(Serialize)]
struct UploadResponse {
    message: String,
    size: u64,
}

#[derive(Serialize)]
struct MirroredUploadResponse {
    message: &'static str,
    filename: String,
    size: u64,
    mirrored: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    mirror_error: Option<String>,
}

/// Stages incoming files locally and optionally mirrors them.
pub struct UploadCoordinator {
    local: Arc<LocalStore>,
    content: Arc<dyn ContentStore>,
    queue: Arc<PendingQueue>,
}

impl UploadCoordinator {
    pub fn new(
        local: Arc<LocalStore>,
        content: Arc<dyn ContentStore>,
        queue: Arc<PendingQueue>,
    ) -> Self {
        Self {
            local,
            content,
            queue,
        }
    }

    /// Writes `stream` to local storage, tracks it, then mirrors if asked.
    ///
    /// Only the local write can fail the upload. A mirror failure is reported
    /// in the result and leaves the local copy and its queue entry in place.
    pub async fn upload<S, B, E>(
        &self,
        raw_name: &str,
        stream: S,
        mirror: bool,
    ) -> Result<UploadReport>
    where
        S: Stream<Item = std::result::Result<B, E>>,
        B: Buf,
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let filename = sanitize_filename(raw_name)?;
        let size = self.local.write(&filename, stream).await?;
        self.queue.enqueue(filename.clone()).await;
        tracing::info!("File uploaded: {filename} ({size} bytes)");

        let mirror = if mirror {
            self.mirror(&filename).await
        } else {
            MirrorOutcome::Skipped
        };

        Ok(UploadReport {
            filename,
            size,
            mirror,
        })
    }

    async fn mirror(&self, filename: &str) -> MirrorOutcome {
        let data = match self.local.read_all(filename).await {
            Ok(data) => data,
            Err(err) => {
                tracing::warn!("mirror of {filename} skipped, local copy unreadable: {err}");
                return MirrorOutcome::Failed(err.to_string());
            }
        };
        match self.content.put(filename, data).await {
            Ok(()) => {
                tracing::info!("File mirrored to content store: {filename}");
                MirrorOutcome::Mirrored
            }
            Err(err) => {
                tracing::warn!("mirror of {filename} failed: {err}");
                MirrorOutcome::Failed(err.to_string())
            }
        }
    }
}

/// Pulls the `file` field out of a multipart body and hands it to the coordinator.
async fn receive(state: &AppState, mut multipart: Multipart, mirror: bool) -> Result<UploadReport> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }
        let raw_name = field.file_name().map(str::to_string).ok_or_else(|| {
            AppError::BadRequest("Failed to receive file: missing file name".to_string())
        })?;
        return state.uploads.upload(&raw_name, field, mirror).await;
    }
    Err(AppError::BadRequest(
        "Failed to receive file: missing `file` field".to_string(),
    ))
}

/// POST /
pub async fn upload_handler(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<impl IntoResponse> {
    let report = receive(&state, multipart, false).await?;
    Ok(Json(UploadResponse {
        message: format!("File {} uploaded successfully!", report.filename),
        size: report.size,
    }))
}

/// POST /up
pub async fn upload_mirrored_handler(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<impl IntoResponse> {
    let report = receive(&state, multipart, true).await?;
    let (message, mirrored, mirror_error) = match &report.mirror {
        MirrorOutcome::Mirrored => (
            "File uploaded successfully to server and content store",
            true,
            None,
        ),
        MirrorOutcome::Failed(err) => (
            "File uploaded to server, content store mirror failed",
            false,
            Some(err.clone()),
        ),
        MirrorOutcome::Skipped => ("File uploaded successfully to server", false, None),
    };

    Ok(Json(MirroredUploadResponse {
        message,
        filename: report.filename,
        size: report.size,
        mirrored,
        mirror_error,
    }))
}
