use serde::{Deserialize, Serialize};

use crate::load_data::ResourceWeights;

/// Load balancer configuration.
///
/// Thresholds and weights drive the threshold shedder and the bundle
/// split strategy; intervals drive the two scheduler loops.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoadBalancerConfig {
    /// Master switch for the whole balancer.
    pub enabled: bool,
    /// Enables the shedding pipeline.
    pub shedding_enabled: bool,
    /// Cadence of the shedding scheduler.
    pub shedding_interval_seconds: u64,
    /// Cadence of the split scheduler.
    pub split_interval_seconds: u64,
    /// Percent over the fleet average at which a broker counts as
    /// overloaded.
    pub broker_threshold_shedder_percentage: f64,
    /// EWMA weight of history vs. the current sample, in [0, 1].
    pub history_resource_percentage: f64,
    /// Minimum MB/s a shedding action must plan to move; below this the
    /// broker is skipped.
    pub bundle_unload_min_throughput_mb: f64,
    /// Cooldown before the same bundle may be unloaded again.
    pub shedding_grace_period_minutes: u64,
    pub resource_weights: ResourceWeights,
    /// Cap on the number of bundles a namespace may be split into.
    pub namespace_maximum_bundles: u32,
    pub namespace_bundle_max_topics: u32,
    /// 0 disables the session trigger.
    pub namespace_bundle_max_sessions: u32,
    pub namespace_bundle_max_msg_rate: f64,
    pub namespace_bundle_max_bandwidth_mbytes: f64,
    /// Deadline applied to each admin and namespace-service call.
    pub rpc_timeout_seconds: u64,
}

impl Default for LoadBalancerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            shedding_enabled: true,
            shedding_interval_seconds: 60,
            split_interval_seconds: 180,
            broker_threshold_shedder_percentage: 10.0,
            history_resource_percentage: 0.9,
            bundle_unload_min_throughput_mb: 10.0,
            shedding_grace_period_minutes: 30,
            resource_weights: ResourceWeights::default(),
            namespace_maximum_bundles: 128,
            namespace_bundle_max_topics: 1000,
            namespace_bundle_max_sessions: 1000,
            namespace_bundle_max_msg_rate: 30_000.0,
            namespace_bundle_max_bandwidth_mbytes: 100.0,
            rpc_timeout_seconds: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LoadBalancerConfig::default();
        assert!(config.enabled);
        assert!(config.shedding_enabled);
        assert_eq!(config.shedding_interval_seconds, 60);
        assert_eq!(config.split_interval_seconds, 180);
        assert_eq!(config.broker_threshold_shedder_percentage, 10.0);
        assert_eq!(config.history_resource_percentage, 0.9);
        assert_eq!(config.bundle_unload_min_throughput_mb, 10.0);
        assert_eq!(config.shedding_grace_period_minutes, 30);
        assert_eq!(config.namespace_maximum_bundles, 128);
        assert_eq!(config.namespace_bundle_max_topics, 1000);
        assert_eq!(config.namespace_bundle_max_sessions, 1000);
        assert_eq!(config.namespace_bundle_max_msg_rate, 30_000.0);
        assert_eq!(config.namespace_bundle_max_bandwidth_mbytes, 100.0);
        assert_eq!(config.rpc_timeout_seconds, 10);
        assert_eq!(config.resource_weights, ResourceWeights::default());
    }

    #[test]
    fn test_empty_document_deserializes_to_defaults() {
        let config: LoadBalancerConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, LoadBalancerConfig::default());
    }

    #[test]
    fn test_partial_document_overrides_only_named_fields() {
        let config: LoadBalancerConfig = serde_json::from_str(
            r#"{
                "shedding_enabled": false,
                "broker_threshold_shedder_percentage": 15.0,
                "resource_weights": { "memory": 0.0 }
            }"#,
        )
        .unwrap();
        assert!(config.enabled);
        assert!(!config.shedding_enabled);
        assert_eq!(config.broker_threshold_shedder_percentage, 15.0);
        assert_eq!(config.resource_weights.memory, 0.0);
        assert_eq!(config.resource_weights.cpu, 1.0);
    }
}
