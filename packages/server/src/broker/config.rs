//! Broker configuration knobs.

/// Configuration for the dispatcher and the health-registry sweep.
///
/// All intervals are milliseconds. `evict_after_ms` must exceed
/// `stale_after_ms`.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// Interval between sweep passes.
    pub sweep_interval_ms: u64,
    /// T1: silence after which a healthy service is demoted.
    pub stale_after_ms: u64,
    /// T2: silence after which a service is evicted entirely.
    pub evict_after_ms: u64,
    /// Deadline for one remote operation invocation.
    pub invoke_timeout_ms: u64,
    /// Deadline for one active health probe.
    pub probe_timeout_ms: u64,
    /// When true, the sweep corroborates passive heartbeat timing with
    /// active probes against each stale service's health-check URL.
    pub active_probing: bool,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            sweep_interval_ms: 10_000,
            stale_after_ms: 30_000,
            evict_after_ms: 120_000,
            invoke_timeout_ms: 10_000,
            probe_timeout_ms: 2_000,
            active_probing: false,
        }
    }
}
