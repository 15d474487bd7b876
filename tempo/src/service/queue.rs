use std::collections::VecDeque;

use tokio::sync::RwLock;

/// FIFO of file names believed to be present in local storage.
///
/// Insertion order stands in for age, and duplicates are kept: uploading the
/// same name twice overwrites the local file twice and pushes two entries.
/// The queue is a working cache of the content store listing, which stays
/// the durable ground truth. No I/O happens while the lock is held.
#[derive(Debug, Default)]
pub struct PendingQueue {
    items: RwLock<VecDeque<String>>,
}

impl PendingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_names<I>(names: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        Self {
            items: RwLock::new(names.into_iter().collect()),
        }
    }

    pub async fn enqueue(&self, name: impl Into<String>) {
        let mut items = self.items.write().await;
        items.push_back(name.into());
    }

    /// Removes and returns the oldest entry.
    pub async fn dequeue(&self) -> Option<String> {
        let mut items = self.items.write().await;
        items.pop_front()
    }

    /// Returns the newest entry without removing it.
    pub async fn peek_last(&self) -> Option<String> {
        let items = self.items.read().await;
        items.back().cloned()
    }

    pub async fn is_empty(&self) -> bool {
        self.items.read().await.is_empty()
    }

    pub async fn len(&self) -> usize {
        self.items.read().await.len()
    }

    /// Point-in-time copy, oldest first.
    pub async fn snapshot(&self) -> Vec<String> {
        let items = self.items.read().await;
        items.iter().cloned().collect()
    }

    /// Atomically discards every entry and installs `names` in order.
    pub async fn replace_all<I>(&self, names: I)
    where
        I: IntoIterator<Item = String>,
    {
        // Build outside the lock so the swap itself is the only critical section.
        let fresh: VecDeque<String> = names.into_iter().collect();
        let mut items = self.items.write().await;
        *items = fresh;
    }

    /// `replace_all(snapshot minus name)` under a single write guard.
    ///
    /// Returns how many entries were dropped.
    pub async fn replace_all_except(&self, name: &str) -> usize {
        let mut items = self.items.write().await;
        let before = items.len();
        let kept: VecDeque<String> = items.iter().filter(|item| *item != name).cloned().collect();
        *items = kept;
        before - items.len()
    }
}
