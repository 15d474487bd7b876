use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;

use crate::error::{AppError, Result};
use crate::service::queue::PendingQueue;
use crate::storage::ContentStore;
use crate::storage::local::LocalStore;
use crate::utils::state::AppState;
use crate::utils::validation::sanitize_filename;

pub const DELETE_CONFIRMATION: &str = "File successfully removed from server and content store";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TierOutcome {
    Removed,
    Absent,
    Failed(String),
}

impl TierOutcome {
    fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionReport {
    pub filename: String,
    /// Whether the queue held the name when deletion started.
    pub was_tracked: bool,
    pub local: TierOutcome,
    pub content: TierOutcome,
}

impl DeletionReport {
    /// Absence counts as success, only real tier failures are errors.
    pub fn into_result(self) -> Result<()> {
        if !self.local.is_failed() && !self.content.is_failed() {
            return Ok(());
        }
        let describe = |outcome: &TierOutcome| match outcome {
            TierOutcome::Failed(err) => err.clone(),
            _ => "ok".to_string(),
        };
        Err(AppError::StorageIo(format!(
            "delete {}: local {}, content store {}",
            self.filename,
            describe(&self.local),
            describe(&self.content)
        )))
    }
}

/// Removes a file from both tiers and drops it from the pending queue.
pub struct DeletionCoordinator {
    local: Arc<LocalStore>,
    content: Arc<dyn ContentStore>,
    queue: Arc<PendingQueue>,
}

impl DeletionCoordinator {
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

    /// Idempotent: deleting an untracked or absent file is not an error.
    ///
    /// Each tier is attempted regardless of the other's outcome. Only an
    /// unusable name fails the call itself.
    pub async fn remove(&self, raw_name: &str) -> Result<DeletionReport> {
        let filename = sanitize_filename(raw_name)?;
        let was_tracked = self.queue.snapshot().await.contains(&filename);

        let local = match self.local.delete(&filename).await {
            Ok(true) => TierOutcome::Removed,
            Ok(false) => TierOutcome::Absent,
            Err(err) => {
                tracing::error!("Error removing local file {filename}: {err}");
                TierOutcome::Failed(err.to_string())
            }
        };

        let content = match self.content.delete(&filename).await {
            Ok(()) => TierOutcome::Removed,
            Err(err) if err.is_not_found() => TierOutcome::Absent,
            Err(err) => {
                tracing::error!("Error removing {filename} from content store: {err}");
                TierOutcome::Failed(err.to_string())
            }
        };

        // Best effort: an enqueue of the same name racing this call may be dropped.
        self.queue.replace_all_except(&filename).await;

        tracing::info!(
            "File removed: {filename} (tracked: {was_tracked}, local: {local:?}, \
             content: {content:?})"
        );
        Ok(DeletionReport {
            filename,
            was_tracked,
            local,
            content,
        })
    }
}

/// Where the eviction loop sends the files it wants gone.
#[async_trait::async_trait]
pub trait DeletionEntryPoint: Send + Sync {
    async fn delete(&self, name: &str) -> Result<()>;
}

#[async_trait::async_trait]
impl DeletionEntryPoint for DeletionCoordinator {
    async fn delete(&self, name: &str) -> Result<()> {
        self.remove(name).await?.into_result()
    }
}

/// Deletes through the relay's own `DELETE /{filename}` route.
pub struct LoopbackDeletion {
    client: reqwest::Client,
    base_url: reqwest::Url,
}

impl LoopbackDeletion {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = reqwest::Url::parse(base_url)
            .map_err(|err| AppError::BadRequest(format!("invalid relay url `{base_url}`: {err}")))?;
        if base_url.cannot_be_a_base() {
            return Err(AppError::BadRequest(format!("relay url `{base_url}` cannot be a base")));
        }
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base_url })
    }
}

#[async_trait::async_trait]
impl DeletionEntryPoint for LoopbackDeletion {
    async fn delete(&self, name: &str) -> Result<()> {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(name);
        }

        let response = self.client.delete(url).send().await?.error_for_status()?;
        let body = response.text().await?;
        tracing::info!("loopback delete of {name}: {}", body.trim());
        Ok(())
    }
}

/// DELETE /{filename}
///
/// Always confirms. Tier failures and unusable names are only logged.
pub async fn delete_handler(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
) -> impl IntoResponse {
    match state.deletions.remove(&filename).await {
        Ok(report) => {
            if let Err(err) = report.into_result() {
                tracing::warn!("{err}");
            }
        }
        Err(err) => tracing::warn!("delete of {filename:?} skipped: {err}"),
    }
    (StatusCode::OK, DELETE_CONFIRMATION)
}
