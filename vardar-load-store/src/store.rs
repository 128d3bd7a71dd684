use async_trait::async_trait;

use crate::errors::Result;
use crate::watch::StoreEventStream;

/// The load data store interface.
///
/// One instance holds one telemetry type: per-broker load data or
/// per-bundle time-averaged data. Backends replicate entries between
/// brokers; the memory provider keeps them process-local.
#[async_trait]
pub trait LoadDataStore<T>: Send + Sync
where
    T: Clone + Send + Sync + 'static,
{
    /// Store the value under `key`, replacing any previous value.
    async fn push(&self, key: &str, value: T) -> Result<()>;

    async fn get(&self, key: &str) -> Result<Option<T>>;

    async fn remove(&self, key: &str) -> Result<()>;

    /// Visit a consistent snapshot of the entries.
    ///
    /// No entry is visited twice and entries added during the iteration are
    /// not visited; the snapshot may be slightly stale.
    fn for_each(&self, action: &mut dyn FnMut(&str, &T)) -> Result<()>;

    /// Subscribe to subsequent change events.
    fn listen(&self) -> Result<StoreEventStream<T>>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Release watchers and any backing resources.
    async fn close(&self) -> Result<()>;
}
