//! In-process content store, for development runs and tests.

use axum::body::Bytes;
use tokio::sync::RwLock;

use crate::error::{AppError, Result};
use crate::storage::ContentStore;

#[derive(Debug, Default)]
pub struct MemoryContentStore {
    // insertion order doubles as age
    objects: RwLock<Vec<(String, Bytes)>>,
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl ContentStore for MemoryContentStore {
    async fn put(&self, name: &str, data: Bytes) -> Result<()> {
        let mut objects = self.objects.write().await;
        objects.retain(|(n, _)| n != name);
        objects.push((name.to_string(), data));
        Ok(())
    }

    async fn get(&self, name: &str) -> Result<Bytes> {
        let objects = self.objects.read().await;
        objects
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, data)| data.clone())
            .ok_or_else(|| AppError::NotFound(name.to_string()))
    }

    async fn list(&self) -> Result<Vec<String>> {
        let objects = self.objects.read().await;
        Ok(objects.iter().map(|(n, _)| n.clone()).collect())
    }

    async fn delete(&self, name: &str) -> Result<()> {
        let mut objects = self.objects.write().await;
        let before = objects.len();
        objects.retain(|(n, _)| n != name);
        if objects.len() == before {
            return Err(AppError::NotFound(name.to_string()));
        }
        Ok(())
    }

    async fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.objects.read().await.iter().any(|(n, _)| n == name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn overwrite_moves_name_to_newest() {
        let store = MemoryContentStore::new();
        store.put("a", Bytes::from_static(b"1")).await.unwrap();
        store.put("b", Bytes::from_static(b"2")).await.unwrap();
        store.put("a", Bytes::from_static(b"3")).await.unwrap();

        assert_eq!(store.list().await.unwrap(), vec!["b", "a"]);
        assert_eq!(store.get("a").await.unwrap(), Bytes::from_static(b"3"));
    }

    #[tokio::test]
    async fn delete_missing_is_not_found() {
        let store = MemoryContentStore::new();
        assert!(matches!(store.delete("nope").await, Err(AppError::NotFound(_))));
        assert!(matches!(store.get("nope").await, Err(AppError::NotFound(_))));
    }
}
