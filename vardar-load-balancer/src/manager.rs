use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::info;

use crate::balancer_metrics;
use crate::context::{
    BrokerRegistry, LeaderElection, LoadManagerContext, NamespaceAdmin, NamespaceService,
};
use crate::scheduler::{
    start_split_loop, start_unload_loop, BundleSplitScheduler, UnloadScheduler,
};

/// Placement seam consumed by `get_least_loaded`. Assignment of unloaded
/// bundles lives with the placement layer; only the selection interface is
/// defined here, and it receives the full context rather than a downcast.
pub trait BrokerSelectionStrategy: Send + Sync {
    fn select(
        &self,
        brokers: &[String],
        bundle: &str,
        context: &LoadManagerContext,
    ) -> Option<String>;
}

/// Facade tying the decision engine to the broker's legacy load-manager
/// surface: lifecycle, manual ticks, and the pass-throughs the outer
/// adapter expects.
pub struct LoadBalancer {
    context: LoadManagerContext,
    registry: Arc<dyn BrokerRegistry>,
    placement: Arc<dyn BrokerSelectionStrategy>,
    unload_scheduler: Arc<Mutex<UnloadScheduler>>,
    split_scheduler: Arc<Mutex<BundleSplitScheduler>>,
    tasks: Vec<JoinHandle<()>>,
}

impl LoadBalancer {
    pub fn new(
        context: LoadManagerContext,
        registry: Arc<dyn BrokerRegistry>,
        leader_election: Option<Arc<dyn LeaderElection>>,
        admin: Arc<dyn NamespaceAdmin>,
        namespace_service: Arc<dyn NamespaceService>,
        placement: Arc<dyn BrokerSelectionStrategy>,
    ) -> Self {
        let unload_scheduler = Arc::new(Mutex::new(UnloadScheduler::new(
            context.clone(),
            registry.clone(),
            leader_election.clone(),
            admin,
        )));
        let split_scheduler = Arc::new(Mutex::new(BundleSplitScheduler::new(
            context.clone(),
            registry.clone(),
            leader_election,
            namespace_service,
        )));
        Self {
            context,
            registry,
            placement,
            unload_scheduler,
            split_scheduler,
            tasks: Vec::new(),
        }
    }

    /// Start the shedding and split loops.
    pub fn start(&mut self) {
        balancer_metrics::describe();
        let conf = &self.context.config;
        info!(
            shedding_interval_seconds = conf.shedding_interval_seconds,
            split_interval_seconds = conf.split_interval_seconds,
            "starting load balancer schedulers"
        );
        self.tasks.push(start_unload_loop(
            self.unload_scheduler.clone(),
            conf.shedding_interval_seconds,
        ));
        self.tasks.push(start_split_loop(
            self.split_scheduler.clone(),
            conf.split_interval_seconds,
        ));
    }

    /// Stop the loops; in-flight tick work is abandoned.
    pub fn stop(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }

    /// Run one shedding tick immediately.
    pub async fn execute(&self) {
        self.unload_scheduler.lock().await.execute().await;
    }

    /// Run one split tick immediately, returning the proposed set.
    pub async fn execute_split(&self) -> HashSet<String> {
        self.split_scheduler.lock().await.execute().await
    }

    /// Interface-parity hook: split proposals come from the split
    /// scheduler and are dispatched by the namespace service side.
    pub fn do_namespace_bundle_split(&self) {}

    pub async fn get_available_brokers(&self) -> Result<HashSet<String>> {
        self.registry.available_brokers().await
    }

    /// Pick a broker for `bundle`. An empty cluster yields nothing and a
    /// single broker is chosen outright; otherwise the placement strategy
    /// decides over the sorted candidate list.
    pub async fn get_least_loaded(&self, bundle: &str) -> Result<Option<String>> {
        let mut brokers: Vec<String> = self.registry.available_brokers().await?.into_iter().collect();
        if brokers.is_empty() {
            return Ok(None);
        }
        if brokers.len() == 1 {
            return Ok(brokers.pop());
        }
        brokers.sort();
        Ok(self.placement.select(&brokers, bundle, &self.context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LoadBalancerConfig;
    use crate::context::AdminError;
    use async_trait::async_trait;
    use vardar_load_store::MemoryLoadStore;

    struct StaticRegistry(HashSet<String>);

    #[async_trait]
    impl BrokerRegistry for StaticRegistry {
        async fn available_brokers(&self) -> Result<HashSet<String>> {
            Ok(self.0.clone())
        }
    }

    struct NoopAdmin;

    #[async_trait]
    impl NamespaceAdmin for NoopAdmin {
        async fn unload_namespace_bundle(
            &self,
            _namespace: &str,
            _bundle_range: &str,
        ) -> std::result::Result<(), AdminError> {
            Ok(())
        }
    }

    struct NoopNamespaceService;

    #[async_trait]
    impl NamespaceService for NoopNamespaceService {
        async fn bundle_count(&self, _namespace: &str) -> Result<usize> {
            Ok(0)
        }
    }

    /// Always picks the first candidate.
    struct FirstBroker;

    impl BrokerSelectionStrategy for FirstBroker {
        fn select(
            &self,
            brokers: &[String],
            _bundle: &str,
            _context: &LoadManagerContext,
        ) -> Option<String> {
            brokers.first().cloned()
        }
    }

    fn balancer(brokers: &[&str]) -> LoadBalancer {
        let context = LoadManagerContext {
            broker_load_store: Arc::new(MemoryLoadStore::new()),
            bundle_load_store: Arc::new(MemoryLoadStore::new()),
            config: Arc::new(LoadBalancerConfig::default()),
        };
        let registry = Arc::new(StaticRegistry(
            brokers.iter().map(|b| (*b).to_string()).collect(),
        ));
        LoadBalancer::new(
            context,
            registry,
            None,
            Arc::new(NoopAdmin),
            Arc::new(NoopNamespaceService),
            Arc::new(FirstBroker),
        )
    }

    #[tokio::test]
    async fn test_get_least_loaded_empty_cluster() {
        let balancer = balancer(&[]);
        assert_eq!(
            balancer.get_least_loaded("ns/0x00_0x80").await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_get_least_loaded_single_broker_short_circuits() {
        let balancer = balancer(&["broker-b"]);
        assert_eq!(
            balancer.get_least_loaded("ns/0x00_0x80").await.unwrap(),
            Some("broker-b".to_string())
        );
    }

    #[tokio::test]
    async fn test_get_least_loaded_delegates_to_placement() {
        let balancer = balancer(&["broker-c", "broker-a", "broker-b"]);
        // candidates are sorted before delegation, so "first" is broker-a
        assert_eq!(
            balancer.get_least_loaded("ns/0x00_0x80").await.unwrap(),
            Some("broker-a".to_string())
        );
    }

    #[tokio::test]
    async fn test_get_available_brokers_passes_through() {
        let balancer = balancer(&["broker-a", "broker-b"]);
        let brokers = balancer.get_available_brokers().await.unwrap();
        assert_eq!(brokers.len(), 2);
        assert!(brokers.contains("broker-a"));
    }

    #[tokio::test]
    async fn test_start_and_stop_lifecycle() {
        let mut balancer = balancer(&["broker-a", "broker-b"]);
        balancer.start();
        // a manual tick while the loops run must not deadlock
        balancer.execute().await;
        assert!(balancer.execute_split().await.is_empty());
        balancer.stop();
    }
}
