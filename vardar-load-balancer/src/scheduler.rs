use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::balancer_metrics::{BUNDLE_SPLITS_PROPOSED_TOTAL, BUNDLE_UNLOADS_TOTAL};
use crate::context::{
    BrokerRegistry, LeaderElection, LoadManagerContext, NamespaceAdmin, NamespaceService,
};
use crate::shedder::{ThresholdShedder, Unload, UnloadStrategy};
use crate::split::BundleSplitStrategy;
use crate::utils::{now_millis, split_bundle_id};

/// As the leader, selects bundles for unloading so the placement layer can
/// reassign them.
///
/// `execute` is one tick and is safe to drive from a fixed-delay timer:
/// the scheduler lives behind a mutex, so ticks never overlap. The
/// smoothed-usage state (inside the pipeline strategies) and the cooldown
/// map are only ever touched from a tick.
pub struct UnloadScheduler {
    context: LoadManagerContext,
    pipeline: Vec<UnloadStrategy>,
    registry: Arc<dyn BrokerRegistry>,
    leader_election: Option<Arc<dyn LeaderElection>>,
    admin: Arc<dyn NamespaceAdmin>,
    /// Bundle id -> unload millis; entries expire after the grace period.
    pub(crate) recently_unloaded_bundles: HashMap<String, u64>,
}

impl UnloadScheduler {
    pub fn new(
        context: LoadManagerContext,
        registry: Arc<dyn BrokerRegistry>,
        leader_election: Option<Arc<dyn LeaderElection>>,
        admin: Arc<dyn NamespaceAdmin>,
    ) -> Self {
        Self {
            context,
            pipeline: vec![UnloadStrategy::Threshold(ThresholdShedder::new())],
            registry,
            leader_election,
            admin,
            recently_unloaded_bundles: HashMap::new(),
        }
    }

    pub fn with_pipeline(mut self, pipeline: Vec<UnloadStrategy>) -> Self {
        self.pipeline = pipeline;
        self
    }

    async fn is_leader(&self) -> bool {
        match &self.leader_election {
            Some(election) => election.is_leader().await,
            None => false,
        }
    }

    /// One shedding tick.
    pub async fn execute(&mut self) {
        let conf = self.context.config.clone();
        if !conf.enabled || !conf.shedding_enabled {
            return;
        }
        if !self.is_leader().await {
            return;
        }

        let available_brokers = match self.registry.available_brokers().await {
            Ok(brokers) => brokers,
            Err(e) => {
                warn!(error = %e, "failed to list available brokers, skipping shedding cycle");
                return;
            }
        };
        if available_brokers.len() <= 1 {
            info!("only one broker available: no load shedding will be performed");
            return;
        }

        // Age out bundles unloaded longer ago than the grace period.
        let expiry = now_millis().saturating_sub(conf.shedding_grace_period_minutes * 60_000);
        self.recently_unloaded_bundles.retain(|_, ts| *ts >= expiry);

        let rpc_timeout = Duration::from_secs(conf.rpc_timeout_seconds);
        for strategy in self.pipeline.iter_mut() {
            let proposals = match strategy
                .find_bundles_for_unloading(&self.context, &self.recently_unloaded_bundles)
            {
                Ok(proposals) => proposals,
                Err(e) => {
                    warn!(
                        strategy = strategy.name(),
                        error = %e,
                        "unload strategy failed, skipping shedding cycle"
                    );
                    return;
                }
            };

            // Per-broker dispatch order is the strategy's selection order.
            for Unload { broker, bundle } in proposals {
                let Some((namespace, bundle_range)) = split_bundle_id(&bundle) else {
                    warn!(bundle = %bundle, "malformed bundle id, skipping unload");
                    continue;
                };

                info!(
                    strategy = strategy.name(),
                    bundle = %bundle,
                    broker = %broker,
                    "unloading bundle"
                );
                match tokio::time::timeout(
                    rpc_timeout,
                    self.admin.unload_namespace_bundle(namespace, bundle_range),
                )
                .await
                {
                    Ok(Ok(())) => {
                        self.recently_unloaded_bundles
                            .insert(bundle.clone(), now_millis());
                        counter!(BUNDLE_UNLOADS_TOTAL.name, "broker" => broker.clone())
                            .increment(1);
                    }
                    // Not marked as unloaded, so a later tick may retry.
                    Ok(Err(e)) => {
                        warn!(
                            bundle = %bundle,
                            broker = %broker,
                            error = %e,
                            "load shedding call failed"
                        );
                    }
                    Err(_) => {
                        warn!(bundle = %bundle, broker = %broker, "load shedding call timed out");
                    }
                }
            }
        }
    }
}

/// Sibling scheduler proposing bundle splits, under the same gating
/// contract as the unload scheduler. Dispatch of the proposals belongs to
/// the namespace service side.
pub struct BundleSplitScheduler {
    context: LoadManagerContext,
    registry: Arc<dyn BrokerRegistry>,
    leader_election: Option<Arc<dyn LeaderElection>>,
    namespace_service: Arc<dyn NamespaceService>,
    strategy: BundleSplitStrategy,
}

impl BundleSplitScheduler {
    pub fn new(
        context: LoadManagerContext,
        registry: Arc<dyn BrokerRegistry>,
        leader_election: Option<Arc<dyn LeaderElection>>,
        namespace_service: Arc<dyn NamespaceService>,
    ) -> Self {
        Self {
            context,
            registry,
            leader_election,
            namespace_service,
            strategy: BundleSplitStrategy::new(),
        }
    }

    async fn is_leader(&self) -> bool {
        match &self.leader_election {
            Some(election) => election.is_leader().await,
            None => false,
        }
    }

    /// One split tick; returns the set of bundles that should be split.
    pub async fn execute(&mut self) -> HashSet<String> {
        if !self.context.config.enabled {
            return HashSet::new();
        }
        if !self.is_leader().await {
            return HashSet::new();
        }

        let available_brokers = match self.registry.available_brokers().await {
            Ok(brokers) => brokers,
            Err(e) => {
                warn!(error = %e, "failed to list available brokers, skipping split cycle");
                return HashSet::new();
            }
        };
        if available_brokers.len() <= 1 {
            info!("only one broker available: no bundle split will be proposed");
            return HashSet::new();
        }

        match self
            .strategy
            .find_bundles_to_split(&self.context, &self.namespace_service)
            .await
        {
            Ok(bundles) => {
                if !bundles.is_empty() {
                    info!(count = bundles.len(), "selected bundles for splitting");
                    counter!(BUNDLE_SPLITS_PROPOSED_TOTAL.name).increment(bundles.len() as u64);
                }
                bundles
            }
            Err(e) => {
                warn!(error = %e, "bundle split strategy failed, skipping split cycle");
                HashSet::new()
            }
        }
    }
}

/// Spawn the fixed-delay shedding loop. Late ticks are coalesced, never
/// queued.
pub fn start_unload_loop(
    scheduler: Arc<Mutex<UnloadScheduler>>,
    interval_seconds: u64,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(interval_seconds.max(1)));
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            scheduler.lock().await.execute().await;
        }
    })
}

/// Spawn the fixed-delay split loop.
pub fn start_split_loop(
    scheduler: Arc<Mutex<BundleSplitScheduler>>,
    interval_seconds: u64,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(interval_seconds.max(1)));
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            // The proposal set is consumed by the namespace service side;
            // here the tick only publishes logs and metrics.
            let _ = scheduler.lock().await.execute().await;
        }
    })
}

#[cfg(test)]
#[path = "scheduler_test.rs"]
mod tests;
