use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::config::{Config, DeletionMode};
use crate::error::Result;
use crate::service::delete::{DeletionCoordinator, DeletionEntryPoint, LoopbackDeletion};
use crate::service::eviction::{EvictionPolicy, EvictionScheduler};
use crate::service::queue::PendingQueue;
use crate::service::upload::UploadCoordinator;
use crate::storage::local::LocalStore;
use crate::storage::{ContentStore, TimedContentStore};

/// Everything a request handler or background task needs, built once at startup.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub queue: Arc<PendingQueue>,
    pub local: Arc<LocalStore>,
    pub content: Arc<dyn ContentStore>,
    pub uploads: Arc<UploadCoordinator>,
    pub deletions: Arc<DeletionCoordinator>,
    /// Delayed download cleanups.
    pub tasks: TaskTracker,
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Creates the upload directory and wires the coordinators around one queue.
    pub async fn new(config: Config, backend: Arc<dyn ContentStore>) -> Result<Self> {
        let local = Arc::new(LocalStore::open(&config.upload_dir).await?);
        let content: Arc<dyn ContentStore> =
            Arc::new(TimedContentStore::new(backend, config.store_timeout));
        let queue = Arc::new(PendingQueue::new());

        Ok(AppState {
            uploads: Arc::new(UploadCoordinator::new(
                local.clone(),
                content.clone(),
                queue.clone(),
            )),
            deletions: Arc::new(DeletionCoordinator::new(
                local.clone(),
                content.clone(),
                queue.clone(),
            )),
            config: Arc::new(config),
            queue,
            local,
            content,
            tasks: TaskTracker::new(),
            shutdown: CancellationToken::new(),
        })
    }

    pub fn deletion_entry_point(&self) -> Result<Arc<dyn DeletionEntryPoint>> {
        let entry_point: Arc<dyn DeletionEntryPoint> = match self.config.deletion_mode {
            DeletionMode::InProcess => self.deletions.clone(),
            DeletionMode::Loopback => Arc::new(LoopbackDeletion::new(
                &self.config.self_url(),
                self.config.delete_timeout,
            )?),
        };
        Ok(entry_point)
    }

    pub fn eviction_scheduler(&self) -> Result<EvictionScheduler> {
        Ok(EvictionScheduler::new(
            self.queue.clone(),
            self.content.clone(),
            self.local.clone(),
            self.deletion_entry_point()?,
            EvictionPolicy::from_config(&self.config),
        ))
    }
}
