use std::sync::Arc;

use crate::config::{Config, ContentStoreKind};
use crate::error::Result;
use crate::storage::ContentStore;

pub mod filesystem;
pub mod memory;
pub mod s3;

/// Builds the configured content store backend.
pub async fn connect(config: &Config) -> Result<Arc<dyn ContentStore>> {
    let backend: Arc<dyn ContentStore> = match config.content_store {
        ContentStoreKind::Filesystem => {
            Arc::new(filesystem::FilesystemContentStore::open(&config.content_root).await?)
        }
        ContentStoreKind::S3 => Arc::new(s3::S3ContentStore::connect(&config.s3).await),
        ContentStoreKind::Memory => Arc::new(memory::MemoryContentStore::new()),
    };
    Ok(backend)
}
