use std::sync::atomic::{AtomicBool, Ordering};

use axum::body::Bytes;

use crate::error::{AppError, Result};
use crate::storage::ContentStore;
use crate::storage::driver::memory::MemoryContentStore;

/// Memory store whose operations can be switched to fail.
///
/// `default()` fails everything.
pub struct FailingContentStore {
    pub inner: MemoryContentStore,
    pub fail_put: AtomicBool,
    pub fail_get: AtomicBool,
    pub fail_list: AtomicBool,
    pub fail_delete: AtomicBool,
}

impl Default for FailingContentStore {
    fn default() -> Self {
        Self::healthy().failing_all()
    }
}

impl FailingContentStore {
    pub fn healthy() -> Self {
        Self {
            inner: MemoryContentStore::new(),
            fail_put: AtomicBool::new(false),
            fail_get: AtomicBool::new(false),
            fail_list: AtomicBool::new(false),
            fail_delete: AtomicBool::new(false),
        }
    }

    fn failing_all(self) -> Self {
        for flag in [&self.fail_put, &self.fail_get, &self.fail_list, &self.fail_delete] {
            flag.store(true, Ordering::SeqCst);
        }
        self
    }

    fn check(flag: &AtomicBool, operation: &str) -> Result<()> {
        if flag.load(Ordering::SeqCst) {
            return Err(AppError::StorageIo(format!("injected {operation} failure")));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl ContentStore for FailingContentStore {
    async fn put(&self, name: &str, data: Bytes) -> Result<()> {
        Self::check(&self.fail_put, "put")?;
        self.inner.put(name, data).await
    }

    async fn get(&self, name: &str) -> Result<Bytes> {
        Self::check(&self.fail_get, "get")?;
        self.inner.get(name).await
    }

    async fn list(&self) -> Result<Vec<String>> {
        Self::check(&self.fail_list, "list")?;
        self.inner.list().await
    }

    async fn delete(&self, name: &str) -> Result<()> {
        Self::check(&self.fail_delete, "delete")?;
        self.inner.delete(name).await
    }
}
