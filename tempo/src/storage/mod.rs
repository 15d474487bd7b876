use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;

use crate::error::{AppError, Result};

pub mod driver;
pub mod local;

/// Durable blob store the relay mirrors into.
///
/// Implementations must be safe to call concurrently. `list` returns names
/// oldest first so the pending queue can use listing order as age.
#[async_trait::async_trait]
pub trait ContentStore: Send + Sync {
    async fn put(&self, name: &str, data: Bytes) -> Result<()>;

    /// Fails with [`AppError::NotFound`] when `name` is absent.
    async fn get(&self, name: &str) -> Result<Bytes>;

    async fn list(&self) -> Result<Vec<String>>;

    /// Fails with [`AppError::NotFound`] when `name` is absent.
    async fn delete(&self, name: &str) -> Result<()>;

    async fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.list().await?.iter().any(|n| n == name))
    }
}

/// Puts a deadline on every call of the wrapped store.
pub struct TimedContentStore {
    inner: Arc<dyn ContentStore>,
    timeout: Duration,
}

impl TimedContentStore {
    pub fn new(inner: Arc<dyn ContentStore>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

pub async fn with_deadline<T, F>(after: Duration, operation: &str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(after, fut).await {
        Ok(result) => result,
        Err(_) => Err(AppError::Timeout {
            operation: operation.to_string(),
            after,
        }),
    }
}

#[async_trait::async_trait]
impl ContentStore for TimedContentStore {
    async fn put(&self, name: &str, data: Bytes) -> Result<()> {
        with_deadline(self.timeout, "content store put", self.inner.put(name, data)).await
    }

    async fn get(&self, name: &str) -> Result<Bytes> {
        with_deadline(self.timeout, "content store get", self.inner.get(name)).await
    }

    async fn list(&self) -> Result<Vec<String>> {
        with_deadline(self.timeout, "content store list", self.inner.list()).await
    }

    async fn delete(&self, name: &str) -> Result<()> {
        with_deadline(self.timeout, "content store delete", self.inner.delete(name)).await
    }

    async fn exists(&self, name: &str) -> Result<bool> {
        with_deadline(self.timeout, "content store exists", self.inner.exists(name)).await
    }
}
