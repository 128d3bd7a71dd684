use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::{debug, info, warn};
use vardar_load_store::LoadDataStore;

use crate::context::{LoadManagerContext, NamespaceService};
use crate::load_data::BrokerLoadData;
use crate::utils::{split_bundle_id, MIB};

/// Determines which bundles should be split based on topic count, session
/// count, and sustained message rate or bandwidth.
///
/// Topic and session counts come from the short-term per-bundle stats;
/// rate and bandwidth come from the long-term bundle data, so a bundle
/// splits on sustained load rather than a spike.
#[derive(Debug, Default)]
pub struct BundleSplitStrategy;

impl BundleSplitStrategy {
    pub fn new() -> Self {
        Self
    }

    pub async fn find_bundles_to_split(
        &self,
        context: &LoadManagerContext,
        namespace_service: &Arc<dyn NamespaceService>,
    ) -> Result<HashSet<String>> {
        let conf = &context.config;
        let max_bundle_count = conf.namespace_maximum_bundles as usize;
        let max_bundle_topics = conf.namespace_bundle_max_topics;
        let max_bundle_sessions = conf.namespace_bundle_max_sessions;
        let max_bundle_msg_rate = conf.namespace_bundle_max_msg_rate;
        let max_bundle_bandwidth = conf.namespace_bundle_max_bandwidth_mbytes * MIB;
        let rpc_timeout = Duration::from_secs(conf.rpc_timeout_seconds);

        let mut brokers: Vec<(String, BrokerLoadData)> = Vec::new();
        context
            .broker_load_store
            .for_each(&mut |broker, data| brokers.push((broker.to_owned(), data.clone())))?;

        let mut bundles_to_split = HashSet::new();
        for (_broker, data) in &brokers {
            for (bundle, stats) in &data.last_stats {
                if stats.topics < 2 {
                    info!(bundle = %bundle, "bundle holds fewer than two topics, cannot split");
                    continue;
                }

                // Long-term message data, when present; a bundle with no
                // history simply does not trigger the traffic criteria.
                let (total_msg_rate, total_msg_throughput) =
                    match context.bundle_load_store.get(bundle).await {
                        Ok(Some(bundle_data)) => (
                            bundle_data.long_term.total_msg_rate,
                            bundle_data.long_term.total_msg_throughput,
                        ),
                        Ok(None) => (0.0, 0.0),
                        Err(e) => {
                            warn!(
                                bundle = %bundle,
                                error = %e,
                                "failed to read bundle load data, skipping bundle"
                            );
                            continue;
                        }
                    };

                let over_sessions =
                    max_bundle_sessions > 0 && stats.sessions() > max_bundle_sessions;
                if stats.topics > max_bundle_topics
                    || over_sessions
                    || total_msg_rate > max_bundle_msg_rate
                    || total_msg_throughput > max_bundle_bandwidth
                {
                    let Some((namespace, _range)) = split_bundle_id(bundle) else {
                        warn!(bundle = %bundle, "malformed bundle id, skipping split");
                        continue;
                    };

                    match tokio::time::timeout(rpc_timeout, namespace_service.bundle_count(namespace))
                        .await
                    {
                        Ok(Ok(bundle_count)) if bundle_count < max_bundle_count => {
                            bundles_to_split.insert(bundle.clone());
                        }
                        Ok(Ok(bundle_count)) => {
                            debug!(
                                bundle = %bundle,
                                namespace = %namespace,
                                bundle_count = bundle_count,
                                "namespace bundle cap reached, not splitting"
                            );
                        }
                        Ok(Err(e)) => {
                            warn!(
                                namespace = %namespace,
                                error = %e,
                                "failed to query namespace bundle count"
                            );
                        }
                        Err(_) => {
                            warn!(namespace = %namespace, "namespace bundle count query timed out");
                        }
                    }
                }
            }
        }

        Ok(bundles_to_split)
    }
}

#[cfg(test)]
#[path = "split_test.rs"]
mod tests;
