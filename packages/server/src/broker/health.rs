//! Service health registry: remote provider registrations, heartbeats, and
//! the staleness sweep.
//!
//! Registrations live in a `DashMap` so heartbeats on different services
//! never contend. All time-dependent methods take an explicit `now_ms`
//! argument, which keeps the state machine deterministic under test.
//!
//! Concurrency contract: the sweep snapshots each entry's `last_heartbeat`
//! and re-checks it immediately before mutating. A heartbeat recorded after
//! the snapshot read always wins over the stale sweep decision.

use dashmap::DashMap;
use tracing::{debug, info};

use switchboard_core::{HealthStatus, ServiceRegistration};

use super::error::BrokerError;

// ---------------------------------------------------------------------------
// SweepStats
// ---------------------------------------------------------------------------

/// Outcome of a single sweep pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepStats {
    /// Entries demoted `HEALTHY -> UNHEALTHY`.
    pub demoted: usize,
    /// Entries evicted past the dead threshold.
    pub evicted: usize,
}

// ---------------------------------------------------------------------------
// ServiceHealthRegistry
// ---------------------------------------------------------------------------

/// Mutable table of remote service registrations, keyed by service name.
///
/// State machine per entry:
/// `UNKNOWN --heartbeat--> HEALTHY`;
/// `HEALTHY --silence > stale_after--> UNHEALTHY`;
/// `UNHEALTHY --heartbeat--> HEALTHY`;
/// `silence > evict_after --> evicted` (terminal).
pub struct ServiceHealthRegistry {
    services: DashMap<String, ServiceRegistration>,
    /// T1: silence after which a `HEALTHY` entry is demoted (ms).
    stale_after_ms: u64,
    /// T2: silence after which an entry is evicted entirely (ms). > T1.
    evict_after_ms: u64,
}

impl ServiceHealthRegistry {
    /// Creates an empty registry with the given sweep thresholds.
    #[must_use]
    pub fn new(stale_after_ms: u64, evict_after_ms: u64) -> Self {
        debug_assert!(evict_after_ms > stale_after_ms);
        Self {
            services: DashMap::new(),
            stale_after_ms,
            evict_after_ms,
        }
    }

    /// Registers or replaces a service.
    ///
    /// New entries start at `UNKNOWN` with `last_heartbeat = now_ms`.
    /// Re-registration resets the trust lifecycle the same way.
    ///
    /// # Errors
    ///
    /// `Validation` when the name, endpoint, or health-check URL is blank,
    /// or the operation set is empty.
    pub fn register(
        &self,
        mut registration: ServiceRegistration,
        now_ms: u64,
    ) -> Result<(), BrokerError> {
        if registration.service_name.trim().is_empty() {
            return Err(BrokerError::Validation("serviceName is required".into()));
        }
        if registration.operations.is_empty() {
            return Err(BrokerError::Validation(
                "operations must be non-empty".into(),
            ));
        }
        if registration.endpoint.trim().is_empty() {
            return Err(BrokerError::Validation("endpoint is required".into()));
        }
        if registration.health_check.trim().is_empty() {
            return Err(BrokerError::Validation("healthCheck is required".into()));
        }

        registration.status = HealthStatus::UNKNOWN;
        registration.last_heartbeat = now_ms;

        info!(
            service = %registration.service_name,
            operations = registration.operations.len(),
            "service registered"
        );
        self.services
            .insert(registration.service_name.clone(), registration);
        Ok(())
    }

    /// Records a liveness signal.
    ///
    /// A single heartbeat is sufficient to restore trust: `UNKNOWN` and
    /// `UNHEALTHY` both transition immediately to `HEALTHY`.
    ///
    /// # Errors
    ///
    /// `NotFound` when the service was never registered (or already
    /// evicted).
    pub fn heartbeat(&self, service_name: &str, now_ms: u64) -> Result<HealthStatus, BrokerError> {
        let mut entry =
            self.services
                .get_mut(service_name)
                .ok_or_else(|| BrokerError::NotFound {
                    name: service_name.to_string(),
                })?;
        entry.last_heartbeat = now_ms;
        if entry.status != HealthStatus::HEALTHY {
            debug!(
                service = service_name,
                from = entry.status.as_str(),
                "heartbeat restored service to healthy"
            );
            entry.status = HealthStatus::HEALTHY;
        }
        Ok(entry.status)
    }

    /// Removes the entry immediately, no grace period.
    ///
    /// # Errors
    ///
    /// `NotFound` when the service is not registered.
    pub fn deregister(&self, service_name: &str) -> Result<(), BrokerError> {
        match self.services.remove(service_name) {
            Some(_) => {
                info!(service = service_name, "service deregistered");
                Ok(())
            }
            None => Err(BrokerError::NotFound {
                name: service_name.to_string(),
            }),
        }
    }

    /// Direct lookup by service name.
    ///
    /// # Errors
    ///
    /// `NotFound` when absent.
    pub fn find_by_service_name(
        &self,
        service_name: &str,
    ) -> Result<ServiceRegistration, BrokerError> {
        self.services
            .get(service_name)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| BrokerError::NotFound {
                name: service_name.to_string(),
            })
    }

    /// Best remote candidate for an operation.
    ///
    /// Selection rule: `UNHEALTHY` is never selected; `HEALTHY` is preferred
    /// over `UNKNOWN`; ties break on most recent `last_heartbeat`, then on
    /// service name for a deterministic final order.
    ///
    /// # Errors
    ///
    /// `ServiceUnavailable` when no registration qualifies.
    pub fn find_by_operation(&self, operation: &str) -> Result<ServiceRegistration, BrokerError> {
        let mut best: Option<ServiceRegistration> = None;

        for entry in &self.services {
            let reg = entry.value();
            if reg.status == HealthStatus::UNHEALTHY {
                continue;
            }
            if !reg.operations.iter().any(|op| op == operation) {
                continue;
            }
            match &best {
                None => best = Some(reg.clone()),
                Some(current) => {
                    if Self::preferred(reg, current) {
                        best = Some(reg.clone());
                    }
                }
            }
        }

        best.ok_or_else(|| BrokerError::ServiceUnavailable {
            operation: operation.to_string(),
        })
    }

    /// All current registrations, for the listing endpoint.
    #[must_use]
    pub fn snapshot(&self) -> Vec<ServiceRegistration> {
        let mut all: Vec<ServiceRegistration> = self
            .services
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        all.sort_by(|a, b| a.service_name.cmp(&b.service_name));
        all
    }

    /// Services past the staleness threshold but not yet dead, with their
    /// health-check URLs. Input to the active-probing strategy.
    #[must_use]
    pub fn stale_candidates(&self, now_ms: u64) -> Vec<(String, String)> {
        self.services
            .iter()
            .filter(|entry| {
                let silence = now_ms.saturating_sub(entry.value().last_heartbeat);
                silence > self.stale_after_ms && silence <= self.evict_after_ms
            })
            .map(|entry| (entry.key().clone(), entry.value().health_check.clone()))
            .collect()
    }

    /// One sweep pass: demote stale `HEALTHY` entries, evict dead ones.
    ///
    /// The key set is snapshotted first to bound lock contention; each entry
    /// is then handled independently. Every mutation re-reads
    /// `last_heartbeat` and aborts if it moved since the snapshot — a
    /// concurrent heartbeat always beats a stale sweep decision.
    pub fn sweep_once(&self, now_ms: u64) -> SweepStats {
        let keys: Vec<String> = self.services.iter().map(|e| e.key().clone()).collect();
        let mut stats = SweepStats::default();

        for key in keys {
            // Snapshot read; the entry may have been touched or removed by
            // the time we act on it.
            let Some((observed_hb, status)) = self
                .services
                .get(&key)
                .map(|e| (e.value().last_heartbeat, e.value().status))
            else {
                continue;
            };

            let silence = now_ms.saturating_sub(observed_hb);

            if silence > self.evict_after_ms {
                // Optimistic eviction: only if no heartbeat landed since the
                // snapshot read.
                let removed = self
                    .services
                    .remove_if(&key, |_, reg| reg.last_heartbeat == observed_hb);
                if removed.is_some() {
                    info!(service = %key, silence_ms = silence, "evicted dead service");
                    stats.evicted += 1;
                }
            } else if silence > self.stale_after_ms && status == HealthStatus::HEALTHY {
                if let Some(mut entry) = self.services.get_mut(&key) {
                    if entry.last_heartbeat == observed_hb {
                        entry.status = HealthStatus::UNHEALTHY;
                        info!(service = %key, silence_ms = silence, "demoted stale service");
                        stats.demoted += 1;
                    }
                }
            }
        }

        stats
    }

    /// Returns true when `candidate` should be selected over `current`.
    fn preferred(candidate: &ServiceRegistration, current: &ServiceRegistration) -> bool {
        let rank = |status: HealthStatus| match status {
            HealthStatus::HEALTHY => 2,
            HealthStatus::UNKNOWN => 1,
            HealthStatus::UNHEALTHY => 0,
        };

        (
            rank(candidate.status),
            candidate.last_heartbeat,
            std::cmp::Reverse(candidate.service_name.as_str()),
        ) > (
            rank(current.status),
            current.last_heartbeat,
            std::cmp::Reverse(current.service_name.as_str()),
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
