//! Switchboard server binary: argument parsing, logging, and bootstrap.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use switchboard_server::broker::{
    AesGcmCipher, AuditSink, BrokerConfig, CapabilityProvider, Dispatcher, ExternalInvoker,
    HttpInvoker, OperationRegistry, ServiceHealthRegistry, StringCipher, SweepWorker,
    TracingAuditSink,
};
use switchboard_server::network::{NetworkConfig, NetworkModule};
use switchboard_server::providers::{EchoProvider, LoginProvider};

#[derive(Parser, Debug)]
#[command(name = "switchboard-server")]
#[command(about = "Operation broker with a service health registry")]
#[command(version)]
struct Args {
    /// Bind host
    #[arg(long, env = "SWITCHBOARD_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Bind port (0 = OS-assigned)
    #[arg(long, env = "SWITCHBOARD_PORT", default_value_t = 8080)]
    port: u16,

    /// Comma-separated allowed CORS origins; "*" allows any
    #[arg(
        long,
        env = "SWITCHBOARD_CORS_ORIGINS",
        default_value = "*",
        value_delimiter = ','
    )]
    cors_origins: Vec<String>,

    /// Maximum time for one HTTP request, in seconds
    #[arg(long, env = "SWITCHBOARD_REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    request_timeout_secs: u64,

    /// Interval between health sweep passes, in milliseconds
    #[arg(long, env = "SWITCHBOARD_SWEEP_INTERVAL_MS", default_value_t = 10_000)]
    sweep_interval_ms: u64,

    /// Heartbeat silence after which a healthy service is demoted, in milliseconds
    #[arg(long, env = "SWITCHBOARD_STALE_AFTER_MS", default_value_t = 30_000)]
    stale_after_ms: u64,

    /// Heartbeat silence after which a service is evicted, in milliseconds
    #[arg(long, env = "SWITCHBOARD_EVICT_AFTER_MS", default_value_t = 120_000)]
    evict_after_ms: u64,

    /// Deadline for one remote operation invocation, in milliseconds
    #[arg(long, env = "SWITCHBOARD_INVOKE_TIMEOUT_MS", default_value_t = 10_000)]
    invoke_timeout_ms: u64,

    /// Deadline for one active health probe, in milliseconds
    #[arg(long, env = "SWITCHBOARD_PROBE_TIMEOUT_MS", default_value_t = 2_000)]
    probe_timeout_ms: u64,

    /// Probe stale services actively during sweeps
    #[arg(long, env = "SWITCHBOARD_ACTIVE_PROBING", default_value_t = false)]
    active_probing: bool,

    /// Secret for field-level encryption; encryption is disabled when absent
    #[arg(long, env = "SWITCHBOARD_ENCRYPTION_SECRET")]
    encryption_secret: Option<String>,

    /// Key id byte identifying the active encryption key
    #[arg(long, env = "SWITCHBOARD_ENCRYPTION_KEY_ID", default_value_t = 1)]
    encryption_key_id: u8,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let broker_config = BrokerConfig {
        sweep_interval_ms: args.sweep_interval_ms,
        stale_after_ms: args.stale_after_ms,
        evict_after_ms: args.evict_after_ms,
        invoke_timeout_ms: args.invoke_timeout_ms,
        probe_timeout_ms: args.probe_timeout_ms,
        active_probing: args.active_probing,
    };
    let network_config = NetworkConfig {
        host: args.host,
        port: args.port,
        cors_origins: args.cors_origins,
        request_timeout: Duration::from_secs(args.request_timeout_secs),
    };

    // Explicit bootstrap list: providers are enumerated here, never scanned.
    let providers: Vec<Arc<dyn CapabilityProvider>> = vec![
        Arc::new(LoginProvider::with_demo_accounts()),
        Arc::new(EchoProvider),
    ];
    let operations = Arc::new(OperationRegistry::from_providers(&providers)?);

    let health = Arc::new(ServiceHealthRegistry::new(
        broker_config.stale_after_ms,
        broker_config.evict_after_ms,
    ));
    let invoker: Arc<dyn ExternalInvoker> = Arc::new(HttpInvoker::new(
        Duration::from_millis(broker_config.invoke_timeout_ms),
        Duration::from_millis(broker_config.probe_timeout_ms),
    )?);
    let audit: Arc<dyn AuditSink> = Arc::new(TracingAuditSink);
    let cipher: Option<Arc<dyn StringCipher>> = args.encryption_secret.as_deref().map(|secret| {
        Arc::new(AesGcmCipher::from_secret(secret, args.encryption_key_id))
            as Arc<dyn StringCipher>
    });
    if cipher.is_none() {
        info!("no encryption secret configured; encrypted requests will be rejected");
    }

    let dispatcher = Arc::new(Dispatcher::new(
        Arc::clone(&operations),
        Arc::clone(&health),
        Arc::clone(&invoker),
        audit,
        cipher,
        &broker_config,
    ));

    let mut network = NetworkModule::new(network_config, dispatcher, Arc::clone(&health));
    let port = network.start().await?;
    info!(
        port,
        local_operations = operations.len(),
        "switchboard server starting"
    );

    let mut sweep = SweepWorker::start(Arc::clone(&health), invoker, broker_config);

    network
        .serve(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await?;

    sweep.stop().await;
    info!("server stopped");
    Ok(())
}
