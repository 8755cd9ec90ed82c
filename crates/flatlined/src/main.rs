//! flatlined: the flatline daemon.
//!
//! Wires the pieces together:
//! - Consul gateway (hyper transport)
//! - AWS bridge (EC2 + Auto Scaling)
//! - Health worker, started only while the leader lock is held
//! - Lock supervisor, the main loop
//!
//! # Usage
//!
//! ```text
//! flatlined --config /etc/flatline/flatline.toml
//! flatlined --consul-url http://consul.internal:8500/ --dry-run
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tokio::sync::watch;
use tracing::{Instrument, error, info, info_span};

use flatline_aws::{AwsBridge, SdkCloud};
use flatline_consul::{Consul, HyperTransport};
use flatline_core::FlatlineConfig;
use flatline_health::{HealthWorker, InstanceHealthBridge};
use flatline_lock::{LockSupervisor, worker_factory};

const DEFAULT_LOG_FILTER: &str = "info,flatline=debug";

#[derive(Parser, Debug)]
#[command(name = "flatlined", about = "Mirror Consul node health into EC2 Auto Scaling")]
struct Cli {
    /// Path to a flatline.toml file. Defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Base URL of the Consul HTTP API.
    #[arg(long)]
    consul_url: Option<String>,

    /// KV key used as the leader lock.
    #[arg(long)]
    lock_key: Option<String>,

    /// Log health changes without calling SetInstanceHealth.
    #[arg(long)]
    dry_run: bool,

    /// Log output format.
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let config = load_config(&cli)?;
    run(config).await
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

/// Config file (or defaults), then CLI overrides, then validation.
fn load_config(cli: &Cli) -> anyhow::Result<FlatlineConfig> {
    let mut config = match &cli.config {
        Some(path) => FlatlineConfig::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => FlatlineConfig::default(),
    };

    if let Some(url) = &cli.consul_url {
        config.consul.url = url.clone();
    }
    if let Some(key) = &cli.lock_key {
        config.lock.key = key.clone();
    }
    if cli.dry_run {
        config.aws.dry_run = true;
    }

    config.validate().context("invalid configuration")?;
    Ok(config)
}

async fn run(config: FlatlineConfig) -> anyhow::Result<()> {
    info!(
        consul = %config.consul.url,
        lock = %config.lock.key,
        dry_run = config.aws.dry_run,
        "flatline daemon starting"
    );

    // ── Consul ─────────────────────────────────────────────────

    let transport = HyperTransport::new(&config.consul.url, config.consul.http_timeout()?)
        .context("failed to set up consul transport")?;
    let consul = Consul::new(transport).with_retry_backoff(config.consul.retry_backoff()?);

    // ── AWS bridge ─────────────────────────────────────────────

    let cloud = SdkCloud::from_env(config.aws.region.clone()).await;
    let bridge: Arc<dyn InstanceHealthBridge> =
        Arc::new(AwsBridge::new(consul.clone(), cloud).with_dry_run(config.aws.dry_run));
    info!(region = ?config.aws.region, "aws bridge initialized");

    // ── Worker ─────────────────────────────────────────────────

    let wait = config.consul.wait()?;
    let worker_consul = consul.clone();
    let factory = worker_factory(move |cancel| {
        let worker = HealthWorker::new(worker_consul.clone(), Arc::clone(&bridge), wait);
        async move { Ok(worker.run(cancel).await?) }.instrument(info_span!("worker"))
    });

    // ── Shutdown signal ────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    // ── Lock supervisor ────────────────────────────────────────

    let supervisor = LockSupervisor::new(consul, &config.lock.key, &config.lock.session_name)
        .with_acquire_delay(config.lock.acquire_delay()?)
        .with_check_interval(config.lock.check_interval()?);

    let span = info_span!("supervisor", lock = %supervisor.key());
    supervisor
        .run(factory, shutdown_rx)
        .instrument(span)
        .await
        .context("lock supervisor failed")?;

    info!("flatline daemon stopped");
    Ok(())
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
