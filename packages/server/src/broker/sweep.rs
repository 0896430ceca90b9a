//! Background sweep task for the service health registry.
//!
//! Runs `sweep_once` on a fixed interval. The passive strategy never blocks
//! on network calls; the optional active strategy probes stale candidates in
//! spawned tasks with their own short timeout, so probes never serialize
//! behind the sweep loop. A successful probe counts as a heartbeat.

use std::sync::Arc;

use tokio::sync::oneshot;
use tracing::{debug, warn};

use switchboard_core::now_millis;

use super::config::BrokerConfig;
use super::health::ServiceHealthRegistry;
use super::invoker::ExternalInvoker;

/// Handle to the periodic sweep task.
pub struct SweepWorker {
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl SweepWorker {
    /// Spawns the sweep loop.
    ///
    /// `invoker` is only consulted when `config.active_probing` is set.
    pub fn start(
        registry: Arc<ServiceHealthRegistry>,
        invoker: Arc<dyn ExternalInvoker>,
        config: BrokerConfig,
    ) -> Self {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_millis(
                config.sweep_interval_ms,
            ));
            // Skip the immediate first tick so a sweep never races startup
            // registration.
            interval.tick().await;

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let now = now_millis();

                        if config.active_probing {
                            spawn_probes(&registry, &invoker, now);
                        }

                        let stats = registry.sweep_once(now);
                        if stats.demoted > 0 || stats.evicted > 0 {
                            debug!(
                                demoted = stats.demoted,
                                evicted = stats.evicted,
                                "sweep pass complete"
                            );
                        }
                    }
                    _ = &mut shutdown_rx => break,
                }
            }
        });

        Self {
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    /// Stops the loop and waits for the task to finish.
    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

/// Fires one detached probe per stale candidate.
///
/// Probes run concurrently with the passive sweep below them; an entry that
/// passes its probe records a heartbeat, which the sweep's optimistic
/// re-check honors. A probe completing after eviction hits `NotFound` and is
/// dropped.
fn spawn_probes(
    registry: &Arc<ServiceHealthRegistry>,
    invoker: &Arc<dyn ExternalInvoker>,
    now_ms: u64,
) {
    for (service_name, health_check) in registry.stale_candidates(now_ms) {
        let registry = Arc::clone(registry);
        let invoker = Arc::clone(invoker);
        tokio::spawn(async move {
            if invoker.health_check(&health_check).await {
                match registry.heartbeat(&service_name, now_millis()) {
                    Ok(_) => debug!(service = %service_name, "active probe revived service"),
                    Err(_) => debug!(service = %service_name, "probe passed but entry is gone"),
                }
            } else {
                warn!(service = %service_name, "active probe failed");
            }
        });
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;

    use switchboard_core::{HealthStatus, ServiceRegistration};

    use super::*;
    use crate::broker::invoker::InvocationResult;

    struct ProbeCounter {
        probes: AtomicU32,
        alive: bool,
    }

    #[async_trait]
    impl ExternalInvoker for ProbeCounter {
        async fn invoke_operation(
            &self,
            _endpoint: &str,
            _operation: &str,
            _params: &BTreeMap<String, serde_json::Value>,
        ) -> InvocationResult {
            InvocationResult::failure(None, "not used in this test")
        }

        async fn health_check(&self, _url: &str) -> bool {
            self.probes.fetch_add(1, Ordering::SeqCst);
            self.alive
        }
    }

    fn registration(name: &str) -> ServiceRegistration {
        ServiceRegistration {
            service_name: name.to_string(),
            operations: vec!["op".to_string()],
            endpoint: format!("http://{name}/api"),
            health_check: format!("http://{name}/health"),
            metadata: BTreeMap::new(),
            last_heartbeat: 0,
            status: HealthStatus::UNKNOWN,
        }
    }

    #[tokio::test]
    async fn worker_sweeps_periodically_and_stops() {
        let registry = Arc::new(ServiceHealthRegistry::new(1, 5));
        let invoker: Arc<dyn ExternalInvoker> = Arc::new(ProbeCounter {
            probes: AtomicU32::new(0),
            alive: false,
        });

        // Entry registered in the distant past: the first real sweep evicts it.
        registry.register(registration("stale"), 0).unwrap();

        let config = BrokerConfig {
            sweep_interval_ms: 20,
            ..BrokerConfig::default()
        };
        let mut worker = SweepWorker::start(Arc::clone(&registry), invoker, config);

        tokio::time::sleep(std::time::Duration::from_millis(120)).await;
        worker.stop().await;

        assert!(registry.find_by_service_name("stale").is_err());
    }

    #[tokio::test]
    async fn active_probe_revives_stale_service() {
        let registry = Arc::new(ServiceHealthRegistry::new(1, u64::MAX / 2));
        let probe_counter = Arc::new(ProbeCounter {
            probes: AtomicU32::new(0),
            alive: true,
        });
        let invoker: Arc<dyn ExternalInvoker> = Arc::clone(&probe_counter) as _;

        registry.register(registration("s1"), 0).unwrap();
        registry.heartbeat("s1", 0).unwrap();

        let config = BrokerConfig {
            sweep_interval_ms: 20,
            active_probing: true,
            ..BrokerConfig::default()
        };
        let mut worker = SweepWorker::start(Arc::clone(&registry), invoker, config);

        tokio::time::sleep(std::time::Duration::from_millis(120)).await;
        worker.stop().await;
        // Let any probe spawned by the final tick land its heartbeat.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        assert!(probe_counter.probes.load(Ordering::SeqCst) > 0);
        // The probe heartbeat restored the entry to HEALTHY.
        assert_eq!(
            registry.find_by_service_name("s1").unwrap().status,
            HealthStatus::HEALTHY
        );
    }
}
