//! Election admin panel daemon.
//!
//! Wires the panel together: configuration, service-account session, the
//! sealed-election gate, the report scheduler on its own task, and the
//! axum HTTP surface with the gate layer applied.

use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use secrecy::SecretString;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use urna_core::client::{ElectionApi, HttpElectionApi, ServiceSession};
use urna_core::clock::{Clock, SystemClock};
use urna_core::config::PanelConfig;
use urna_core::gate::SealGate;
use urna_core::scheduler::{ProcessedMarkerStore, ReportScheduler, ReportSchedulerConfig};

use urna_daemon::routes::build_router;
use urna_daemon::AppState;

/// Bounded wait for the scheduler task to drain after shutdown.
const SCHEDULER_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Parser, Debug)]
#[command(name = "urna-daemon", about = "Election admin panel daemon", version)]
struct Args {
    /// Path to the panel configuration file.
    #[arg(short, long, default_value = "urna.toml")]
    config: PathBuf,

    /// Override the bind address from the configuration.
    #[arg(long)]
    bind: Option<String>,

    /// Write logs to a file instead of stdout.
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Log filter, e.g. `info` or `urna_core=debug` (overrides `RUST_LOG`).
    #[arg(long)]
    log_level: Option<String>,
}

fn init_tracing(args: &Args) -> anyhow::Result<()> {
    let filter = match &args.log_level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    if let Some(log_file) = &args.log_file {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_file)
            .context("failed to open log file")?;

        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(file)
                    .with_ansi(false),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
    Ok(())
}

/// Builds the service session; without configured credentials the session
/// can never log in, every gate refresh fails, and the gate fails safe to
/// "unsealed" (the panel stays usable, restrictions just never trigger).
fn build_session(
    config: &PanelConfig,
    http: reqwest::Client,
    clock: Arc<dyn Clock>,
) -> anyhow::Result<ServiceSession> {
    match &config.service_account {
        Some(account) => ServiceSession::from_env(
            http,
            config.api.base_url.clone(),
            account.email.clone(),
            &account.password_env,
            clock,
        )
        .context("failed to construct service session"),
        None => {
            warn!(
                "no [service_account] configured; sealed-election detection will \
                 always read as unsealed"
            );
            Ok(ServiceSession::new(
                http,
                config.api.base_url.clone(),
                String::new(),
                SecretString::new(String::new()),
                clock,
            ))
        },
    }
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!(%error, "failed to listen for shutdown signal");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(&args)?;

    let config = PanelConfig::from_file(&args.config)
        .with_context(|| format!("failed to load configuration from {}", args.config.display()))?;
    config
        .validate_startup_prerequisites()
        .context("startup validation failed")?;

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.api.request_timeout_secs))
        .build()
        .context("failed to construct HTTP client")?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let session = Arc::new(build_session(&config, http.clone(), Arc::clone(&clock))?);
    let api: Arc<dyn ElectionApi> = Arc::new(
        HttpElectionApi::new(http.clone(), config.api.base_url.clone(), session)
            .context("failed to construct election API client")?,
    );
    let gate = Arc::new(SealGate::new(
        Arc::clone(&api),
        Arc::clone(&clock),
        Duration::from_secs(config.gate.cache_ttl_secs),
        config.api.page_limit,
    ));

    let scheduler_handles = if config.scheduler.enabled {
        let mut scheduler = ReportScheduler::new(
            Arc::clone(&api),
            Arc::clone(&gate),
            Arc::clone(&clock),
            ReportSchedulerConfig::from_section(&config.scheduler, config.api.page_limit),
        );
        if let Some(path) = &config.scheduler.marker_db {
            let markers = ProcessedMarkerStore::open(path)
                .with_context(|| format!("failed to open marker store at {}", path.display()))?;
            scheduler = scheduler.with_markers(markers);
        }
        let shutdown = scheduler.shutdown_handle();
        let task = tokio::spawn(async move { scheduler.run().await });
        Some((shutdown, task))
    } else {
        info!("report scheduler disabled by configuration");
        None
    };

    let state = AppState::new(Arc::clone(&gate), http, config.api.base_url.clone());
    let app = build_router(state);

    let bind = args.bind.unwrap_or_else(|| config.server.bind.clone());
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("failed to bind panel server on {bind}"))?;
    info!(addr = %bind, upstream = %config.api.base_url, "panel server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("panel server error")?;

    if let Some((shutdown, task)) = scheduler_handles {
        info!("signaling report scheduler shutdown");
        shutdown.store(true, Ordering::Relaxed);
        if tokio::time::timeout(SCHEDULER_DRAIN_TIMEOUT, task).await.is_err() {
            warn!("report scheduler did not drain in time, abandoning task");
        }
    }

    info!("panel daemon stopped");
    Ok(())
}
