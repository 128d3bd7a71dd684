use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::errors::{LoadStoreError, Result};
use crate::store::LoadDataStore;
use crate::watch::{StoreEvent, StoreEventStream};

/// In-memory `LoadDataStore` provider backed by a concurrent map.
///
/// The default for single-process brokers and tests. Replicated backends
/// sit behind the same trait and live with the cluster metadata layer.
#[derive(Debug)]
pub struct MemoryLoadStore<T> {
    inner: Arc<DashMap<String, T>>,
    watchers: broadcast::Sender<StoreEvent<T>>,
}

impl<T> Clone for MemoryLoadStore<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            watchers: self.watchers.clone(),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> MemoryLoadStore<T> {
    pub fn new() -> Self {
        let (watchers, _) = broadcast::channel(256);
        Self {
            inner: Arc::new(DashMap::new()),
            watchers,
        }
    }

    fn notify_watchers(&self, event: StoreEvent<T>) {
        // No receivers is fine: nobody is listening yet.
        let _ = self.watchers.send(event);
    }
}

impl<T: Clone + Send + Sync + 'static> Default for MemoryLoadStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T: Clone + Send + Sync + 'static> LoadDataStore<T> for MemoryLoadStore<T> {
    async fn push(&self, key: &str, value: T) -> Result<()> {
        if key.is_empty() {
            return Err(LoadStoreError::InvalidKey("empty key".to_string()));
        }
        self.inner.insert(key.to_owned(), value.clone());
        self.notify_watchers(StoreEvent::Put {
            key: key.to_owned(),
            value,
        });
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<T>> {
        Ok(self.inner.get(key).map(|entry| entry.value().clone()))
    }

    async fn remove(&self, key: &str) -> Result<()> {
        if self.inner.remove(key).is_some() {
            self.notify_watchers(StoreEvent::Delete {
                key: key.to_owned(),
            });
        }
        Ok(())
    }

    fn for_each(&self, action: &mut dyn FnMut(&str, &T)) -> Result<()> {
        // Materialize the snapshot first so the action never observes
        // entries inserted while it runs.
        let snapshot: Vec<(String, T)> = self
            .inner
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        for (key, value) in &snapshot {
            action(key, value);
        }
        Ok(())
    }

    fn listen(&self) -> Result<StoreEventStream<T>> {
        Ok(StoreEventStream::from_broadcast(self.watchers.subscribe()))
    }

    fn len(&self) -> usize {
        self.inner.len()
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use std::time::Duration;

    #[tokio::test]
    async fn test_push_get_replace() {
        let store: MemoryLoadStore<u64> = MemoryLoadStore::new();
        store.push("broker-1", 10).await.unwrap();
        assert_eq!(store.get("broker-1").await.unwrap(), Some(10));

        // push replaces, never merges
        store.push("broker-1", 20).await.unwrap();
        assert_eq!(store.get("broker-1").await.unwrap(), Some(20));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_get_missing_key() {
        let store: MemoryLoadStore<u64> = MemoryLoadStore::new();
        assert_eq!(store.get("absent").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_empty_key_rejected() {
        let store: MemoryLoadStore<u64> = MemoryLoadStore::new();
        let err = store.push("", 1).await.unwrap_err();
        assert!(matches!(err, LoadStoreError::InvalidKey(_)));
    }

    #[tokio::test]
    async fn test_remove() {
        let store: MemoryLoadStore<u64> = MemoryLoadStore::new();
        store.push("broker-1", 10).await.unwrap();
        store.remove("broker-1").await.unwrap();
        assert_eq!(store.get("broker-1").await.unwrap(), None);
        assert!(store.is_empty());

        // removing an absent key is a no-op
        store.remove("broker-1").await.unwrap();
    }

    #[tokio::test]
    async fn test_for_each_visits_all_entries_once() {
        let store: MemoryLoadStore<u64> = MemoryLoadStore::new();
        store.push("a", 1).await.unwrap();
        store.push("b", 2).await.unwrap();
        store.push("c", 3).await.unwrap();

        let mut seen = Vec::new();
        store
            .for_each(&mut |key, value| seen.push((key.to_owned(), *value)))
            .unwrap();
        seen.sort();
        assert_eq!(
            seen,
            vec![
                ("a".to_string(), 1),
                ("b".to_string(), 2),
                ("c".to_string(), 3)
            ]
        );
    }

    #[tokio::test]
    async fn test_listen_delivers_put_and_delete() {
        let store: MemoryLoadStore<u64> = MemoryLoadStore::new();
        let mut stream = store.listen().unwrap();

        store.push("broker-1", 42).await.unwrap();
        store.remove("broker-1").await.unwrap();

        let first = tokio::time::timeout(Duration::from_secs(1), stream.next())
            .await
            .expect("timed out waiting for put event")
            .unwrap()
            .unwrap();
        match first {
            StoreEvent::Put { key, value } => {
                assert_eq!(key, "broker-1");
                assert_eq!(value, 42);
            }
            other => panic!("expected put event, got {:?}", other),
        }

        let second = tokio::time::timeout(Duration::from_secs(1), stream.next())
            .await
            .expect("timed out waiting for delete event")
            .unwrap()
            .unwrap();
        match second {
            StoreEvent::Delete { key } => assert_eq!(key, "broker-1"),
            other => panic!("expected delete event, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_listen_ignores_noop_remove() {
        let store: MemoryLoadStore<u64> = MemoryLoadStore::new();
        let mut stream = store.listen().unwrap();

        store.remove("absent").await.unwrap();
        store.push("broker-1", 1).await.unwrap();

        // the first delivered event is the put; the no-op remove emitted nothing
        let event = tokio::time::timeout(Duration::from_secs(1), stream.next())
            .await
            .expect("timed out waiting for event")
            .unwrap()
            .unwrap();
        assert_eq!(event.key(), "broker-1");
    }
}
