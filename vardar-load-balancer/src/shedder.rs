use std::collections::HashMap;
use std::time::{Duration, Instant};

use anyhow::Result;
use tracing::{error, info, warn};
use vardar_load_store::LoadDataStore;

use crate::context::LoadManagerContext;
use crate::load_data::{BrokerLoadData, ResourceWeights};
use crate::utils::MIB;

/// Extra margin so a shed broker aims below, not at, the fleet average.
const ADDITIONAL_THRESHOLD_MARGIN: f64 = 0.05;

/// Minimum delay between per-broker usage summary logs.
const LOAD_LOG_SAMPLE_DELAY: Duration = Duration::from_secs(5 * 60);

/// A single shedding proposal: unload `bundle` from `broker`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unload {
    pub broker: String,
    pub bundle: String,
}

/// Entry of the shedding pipeline. Strategies are a closed set dispatched
/// by tag; each variant carries its own cross-tick state.
#[derive(Debug)]
pub enum UnloadStrategy {
    Threshold(ThresholdShedder),
}

impl UnloadStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            UnloadStrategy::Threshold(_) => "threshold_shedder",
        }
    }

    pub fn find_bundles_for_unloading(
        &mut self,
        context: &LoadManagerContext,
        recently_unloaded_bundles: &HashMap<String, u64>,
    ) -> Result<Vec<Unload>> {
        match self {
            UnloadStrategy::Threshold(shedder) => {
                shedder.find_bundles_for_unloading(context, recently_unloaded_bundles)
            }
        }
    }
}

/// Load shedding strategy that unloads any broker exceeding the average
/// resource usage of all brokers by a configured threshold.
///
/// Each broker's usage is the weighted max of its resource signals,
/// smoothed across ticks by `history_resource_percentage`. For a broker
/// over `avg + threshold`, enough of its hottest bundles are proposed to
/// bring it 5% below the average. Recently unloaded bundles are never
/// proposed again within the grace period.
#[derive(Debug, Default)]
pub struct ThresholdShedder {
    /// EWMA of each broker's weighted max usage, persisted across ticks.
    /// Entries may outlive the broker by a few ticks.
    pub(crate) broker_avg_resource_usage: HashMap<String, f64>,
    last_sampled_log: Option<Instant>,
}

impl ThresholdShedder {
    pub fn new() -> Self {
        Self::default()
    }

    fn can_sample_log(&mut self) -> bool {
        let sample = self
            .last_sampled_log
            .map_or(true, |last| last.elapsed() >= LOAD_LOG_SAMPLE_DELAY);
        if sample {
            self.last_sampled_log = Some(Instant::now());
        }
        sample
    }

    pub fn find_bundles_for_unloading(
        &mut self,
        context: &LoadManagerContext,
        recently_unloaded_bundles: &HashMap<String, u64>,
    ) -> Result<Vec<Unload>> {
        let conf = &context.config;
        let sample_log = self.can_sample_log();
        let threshold = conf.broker_threshold_shedder_percentage / 100.0;
        let min_throughput_threshold = conf.bundle_unload_min_throughput_mb * MIB;

        // One snapshot serves both the average pass and the per-broker
        // decisions.
        let mut brokers: Vec<(String, BrokerLoadData)> = Vec::new();
        context
            .broker_load_store
            .for_each(&mut |broker, data| brokers.push((broker.to_owned(), data.clone())))?;

        let avg_usage = self.update_average_usage(
            &brokers,
            conf.history_resource_percentage,
            &conf.resource_weights,
            sample_log,
        );
        if sample_log {
            info!(
                avg_usage_pct = to_percentage(avg_usage),
                "brokers' average resource usage"
            );
        }
        if avg_usage == 0.0 {
            warn!("average max resource usage is 0");
            return Ok(Vec::new());
        }

        let mut selected = Vec::new();
        for (broker, data) in &brokers {
            let current_usage = self
                .broker_avg_resource_usage
                .get(broker)
                .copied()
                .unwrap_or(0.0);

            if current_usage < avg_usage + threshold {
                if sample_log {
                    info!(
                        broker = %broker,
                        usage_pct = to_percentage(current_usage),
                        "broker is not overloaded, ignoring"
                    );
                }
                continue;
            }

            let offload_fraction =
                current_usage - avg_usage - threshold + ADDITIONAL_THRESHOLD_MARGIN;
            let broker_throughput = data.total_throughput();
            let min_throughput_to_offload = broker_throughput * offload_fraction;

            if min_throughput_to_offload < min_throughput_threshold {
                if sample_log {
                    info!(
                        broker = %broker,
                        planned_mb_per_sec = min_throughput_to_offload / MIB,
                        threshold_mb_per_sec = min_throughput_threshold / MIB,
                        "planned shedding below the minimum throughput threshold, skipping"
                    );
                }
                continue;
            }

            info!(
                broker = %broker,
                usage_pct = to_percentage(current_usage),
                avg_usage_pct = to_percentage(avg_usage),
                threshold_pct = to_percentage(threshold),
                offload_mb_per_sec = min_throughput_to_offload / MIB,
                remaining_mb_per_sec = (broker_throughput - min_throughput_to_offload) / MIB,
                "attempting to shed load"
            );

            if data.bundles.len() > 1 {
                let mut candidates: Vec<(&String, f64)> = data
                    .last_stats
                    .iter()
                    .map(|(bundle, stats)| (bundle, stats.total_throughput()))
                    .filter(|(bundle, _)| !recently_unloaded_bundles.contains_key(*bundle))
                    .filter(|(bundle, _)| data.bundles.contains(*bundle))
                    .collect();
                // hottest first; stable sort keeps snapshot order on ties
                candidates.sort_by(|a, b| {
                    b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal)
                });

                let mut traffic_marked_to_offload = 0.0;
                let mut at_least_one_selected = false;
                for (bundle, throughput) in candidates {
                    if traffic_marked_to_offload >= min_throughput_to_offload
                        && at_least_one_selected
                    {
                        break;
                    }
                    selected.push(Unload {
                        broker: broker.clone(),
                        bundle: bundle.clone(),
                    });
                    traffic_marked_to_offload += throughput;
                    at_least_one_selected = true;
                }
            } else if let Some(bundle) = data.bundles.iter().next() {
                warn!(
                    broker = %broker,
                    bundle = %bundle,
                    "HIGH USAGE: sole bundle is overloading the broker, no shedding possible"
                );
            } else {
                warn!(broker = %broker, "broker is overloaded despite owning no bundles");
            }
        }

        Ok(selected)
    }

    fn update_average_usage(
        &mut self,
        brokers: &[(String, BrokerLoadData)],
        history_percentage: f64,
        weights: &ResourceWeights,
        sample_log: bool,
    ) -> f64 {
        let mut total_usage = 0.0;
        for (broker, data) in brokers {
            total_usage +=
                self.update_broker_usage(broker, data, history_percentage, weights, sample_log);
        }
        if brokers.is_empty() {
            0.0
        } else {
            total_usage / brokers.len() as f64
        }
    }

    fn update_broker_usage(
        &mut self,
        broker: &str,
        data: &BrokerLoadData,
        history_percentage: f64,
        weights: &ResourceWeights,
        sample_log: bool,
    ) -> f64 {
        let history = self.broker_avg_resource_usage.get(broker).copied();
        let mut usage = data.max_resource_usage(weights);

        if sample_log {
            info!(
                broker = %broker,
                history_pct = to_percentage(history.unwrap_or(0.0)),
                usage_pct = to_percentage(usage),
                "broker load sample"
            );
        }

        if data.exceeds_resource_limit() {
            usage = data.max_resource_usage_within_limit(weights);
            if sample_log {
                error!(
                    broker = %broker,
                    cpu = data.cpu,
                    memory = data.memory,
                    direct_memory = data.direct_memory,
                    bandwidth_in = data.bandwidth_in,
                    bandwidth_out = data.bandwidth_out,
                    recomputed_usage_pct = to_percentage(usage),
                    "resource usage above 100%, limits are misconfigured; over-limit signals ignored"
                );
            }
        }

        let updated = match history {
            None => usage,
            Some(h) => h * history_percentage + (1.0 - history_percentage) * usage,
        };
        self.broker_avg_resource_usage
            .insert(broker.to_owned(), updated);
        updated
    }
}

fn to_percentage(usage: f64) -> i64 {
    (usage * 100.0) as i64
}

#[cfg(test)]
#[path = "shedder_test.rs"]
mod tests;
