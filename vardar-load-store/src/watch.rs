use futures::stream::Stream;
use futures::StreamExt;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

use crate::errors::{LoadStoreError, Result};

/// Change notification emitted by a load data store.
///
/// Events for the same key arrive in the order the store applied them;
/// ordering across keys is unspecified.
#[derive(Debug, Clone)]
pub enum StoreEvent<T> {
    Put { key: String, value: T },
    Delete { key: String },
}

impl<T> StoreEvent<T> {
    pub fn key(&self) -> &str {
        match self {
            StoreEvent::Put { key, .. } => key,
            StoreEvent::Delete { key } => key,
        }
    }
}

pub struct StoreEventStream<T> {
    inner: Pin<Box<dyn Stream<Item = Result<StoreEvent<T>>> + Send>>,
}

impl<T> Stream for StoreEventStream<T> {
    type Item = Result<StoreEvent<T>>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

impl<T: Clone + Send + 'static> StoreEventStream<T> {
    pub fn new(stream: impl Stream<Item = Result<StoreEvent<T>>> + Send + 'static) -> Self {
        Self {
            inner: Box::pin(stream),
        }
    }

    /// Create a stream from a `tokio::sync::broadcast::Receiver`.
    /// Broadcast lag (slow consumer) is surfaced as `LoadStoreError::WatchLagged`.
    pub fn from_broadcast(rx: broadcast::Receiver<StoreEvent<T>>) -> Self {
        let stream = BroadcastStream::new(rx).filter_map(|result| {
            futures::future::ready(match result {
                Ok(event) => Some(Ok(event)),
                Err(tokio_stream::wrappers::errors::BroadcastStreamRecvError::Lagged(n)) => {
                    Some(Err(LoadStoreError::WatchLagged(n)))
                }
            })
        });
        Self {
            inner: Box::pin(stream),
        }
    }
}
