use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Weights applied to the resource signals when computing a broker's
/// effective usage. A weight of zero disables the signal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ResourceWeights {
    pub cpu: f64,
    pub memory: f64,
    pub direct_memory: f64,
    pub bandwidth_in: f64,
    pub bandwidth_out: f64,
}

impl Default for ResourceWeights {
    fn default() -> Self {
        Self {
            cpu: 1.0,
            memory: 1.0,
            direct_memory: 1.0,
            bandwidth_in: 1.0,
            bandwidth_out: 1.0,
        }
    }
}

/// Short-term stats of one bundle, as reported by its owning broker.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BundleStats {
    pub topics: u32,
    pub producer_count: u32,
    pub consumer_count: u32,
    /// Bytes per second.
    pub msg_throughput_in: f64,
    /// Bytes per second.
    pub msg_throughput_out: f64,
}

impl BundleStats {
    pub fn total_throughput(&self) -> f64 {
        self.msg_throughput_in + self.msg_throughput_out
    }

    pub fn sessions(&self) -> u32 {
        self.producer_count + self.consumer_count
    }
}

/// Per-broker telemetry snapshot consumed by the shedding and split
/// strategies.
///
/// The broker periodically reports this record into the broker load store.
/// Usage signals are fractions of the configured limit, so values above
/// 1.0 indicate a misconfigured limit and are sanitized by the evaluator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BrokerLoadData {
    pub cpu: f64,
    pub memory: f64,
    pub direct_memory: f64,
    pub bandwidth_in: f64,
    pub bandwidth_out: f64,
    /// Bytes per second.
    pub msg_throughput_in: f64,
    /// Bytes per second.
    pub msg_throughput_out: f64,
    /// Bundles currently owned by the broker.
    pub bundles: HashSet<String>,
    /// Short-term stats per bundle; may briefly retain bundles the broker
    /// no longer owns.
    pub last_stats: HashMap<String, BundleStats>,
    /// Millis of the last report.
    pub timestamp: u64,
}

impl BrokerLoadData {
    pub fn total_throughput(&self) -> f64 {
        self.msg_throughput_in + self.msg_throughput_out
    }

    fn weighted_signals(&self, weights: &ResourceWeights) -> [(f64, f64); 5] {
        [
            (self.cpu, self.cpu * weights.cpu),
            (self.memory, self.memory * weights.memory),
            (self.direct_memory, self.direct_memory * weights.direct_memory),
            (self.bandwidth_in, self.bandwidth_in * weights.bandwidth_in),
            (self.bandwidth_out, self.bandwidth_out * weights.bandwidth_out),
        ]
    }

    /// Maximum of the weighted resource signals.
    pub fn max_resource_usage(&self, weights: &ResourceWeights) -> f64 {
        self.weighted_signals(weights)
            .iter()
            .fold(0.0, |acc, (_, weighted)| acc.max(*weighted))
    }

    /// True when any signal reports above 100% of its limit.
    pub fn exceeds_resource_limit(&self) -> bool {
        [
            self.cpu,
            self.memory,
            self.direct_memory,
            self.bandwidth_in,
            self.bandwidth_out,
        ]
        .iter()
        .any(|usage| *usage > 1.0)
    }

    /// Maximum weighted signal among resources within their limit.
    ///
    /// Signals above 100% are dropped so a single misconfigured limit does
    /// not poison the fleet average; 0.0 when every signal is over.
    pub fn max_resource_usage_within_limit(&self, weights: &ResourceWeights) -> f64 {
        self.weighted_signals(weights)
            .iter()
            .filter(|(usage, _)| *usage <= 1.0)
            .fold(0.0, |acc, (_, weighted)| acc.max(*weighted))
    }
}

/// Time-averaged message data over one horizon.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimeAverageData {
    /// Messages per second.
    pub total_msg_rate: f64,
    /// Bytes per second.
    pub total_msg_throughput: f64,
}

/// Per-bundle load data. The split strategy consults only the long-term
/// horizon so bundles split on sustained load, not spikes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BundleData {
    /// EWMA over hours.
    pub long_term: TimeAverageData,
    /// EWMA over minutes.
    pub short_term: TimeAverageData,
}
