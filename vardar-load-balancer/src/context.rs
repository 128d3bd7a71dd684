use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use vardar_load_store::LoadDataStore;

use crate::config::LoadBalancerConfig;
use crate::load_data::{BrokerLoadData, BundleData};

/// Shared state handed to every strategy invocation: the two telemetry
/// stores and the balancer configuration.
#[derive(Clone)]
pub struct LoadManagerContext {
    pub broker_load_store: Arc<dyn LoadDataStore<BrokerLoadData>>,
    pub bundle_load_store: Arc<dyn LoadDataStore<BundleData>>,
    pub config: Arc<LoadBalancerConfig>,
}

/// Failure of an admin-side unload call.
#[derive(Error, Debug)]
pub enum AdminError {
    #[error("admin rejected the request: {0}")]
    Admin(String),

    #[error("server error: {0}")]
    Server(String),
}

/// Cluster membership view, backed by the broker registry.
#[async_trait]
pub trait BrokerRegistry: Send + Sync {
    async fn available_brokers(&self) -> anyhow::Result<HashSet<String>>;
}

/// Leader election view. The schedulers only ever ask one question.
#[async_trait]
pub trait LeaderElection: Send + Sync {
    async fn is_leader(&self) -> bool;
}

/// Admin client surface used to dispatch unload decisions.
#[async_trait]
pub trait NamespaceAdmin: Send + Sync {
    async fn unload_namespace_bundle(
        &self,
        namespace: &str,
        bundle_range: &str,
    ) -> Result<(), AdminError>;
}

/// Namespace service surface used by the split strategy.
#[async_trait]
pub trait NamespaceService: Send + Sync {
    async fn bundle_count(&self, namespace: &str) -> anyhow::Result<usize>;
}
