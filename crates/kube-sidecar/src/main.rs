use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use log::{error, info, warn};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::EnvFilter;

use kube_sidecar::cluster::{self, resolve_namespace, ClusterWriter, KubeCluster};
use kube_sidecar::self_check::{self, CHECK_INTERVAL};
use kube_sidecar::{
    load_config, server, watch, HttpNotifier, PrometheusValidity, Publisher, Reconciler,
    SidecarError,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

/// Aggregates labelled ConfigMaps and Secrets into one validated output.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Sidecar configuration file
    #[arg(long, env = "SIDECAR_CONFIG", default_value = "/config/sidecar.yaml")]
    config: PathBuf,

    /// Log at debug level
    #[arg(long)]
    debug: bool,

    /// Kubeconfig to use instead of the in-cluster / KUBECONFIG defaults
    #[arg(long)]
    kubeconfig: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

fn init_logging(debug: bool, format: LogFormat) -> Result<(), SidecarError> {
    let default_level = if debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let (text, json) = match format {
        LogFormat::Text => (Some(tracing_subscriber::fmt::layer()), None),
        LogFormat::Json => (None, Some(tracing_subscriber::fmt::layer().json())),
    };
    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(text)
        .with(json);

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| SidecarError::Logging(e.to_string()))?;
    tracing_log::LogTracer::init().map_err(|e| SidecarError::Logging(e.to_string()))
}

async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
        _ = shutdown.cancelled() => return,
    }
    shutdown.cancel();
}

#[tokio::main]
async fn main() -> Result<(), SidecarError> {
    let cli = Cli::parse();
    init_logging(cli.debug, cli.log_format)?;
    info!("Start version {}", env!("CARGO_PKG_VERSION"));

    info!("Load config {}", cli.config.display());
    let loaded = load_config(&cli.config)?;
    for warning in &loaded.warnings {
        warn!("{}", warning);
    }
    let config = loaded.config;
    let selectors = config.parsed_selectors()?;

    let shutdown = CancellationToken::new();
    tokio::spawn(shutdown_signal(shutdown.clone()));

    if config.check_self_config {
        let path = cli.config.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = self_check::watch_config_file(path, CHECK_INTERVAL, shutdown).await {
                error!("Config self-check disabled: {}", e);
            }
        });
    }

    let validity = Arc::new(PrometheusValidity::new()?);
    let metrics = {
        let validity = validity.clone();
        let port = config.prometheus_metrics_port;
        let path = config.prometheus_metrics_url.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = server::serve_metrics(validity, port, &path, shutdown).await {
                error!("{}", e);
            }
        })
    };

    let client = cluster::client::connect(cli.kubeconfig.as_deref()).await?;
    let writer: Arc<dyn ClusterWriter> = Arc::new(KubeCluster::new(client.clone()));
    let notifier = Arc::new(HttpNotifier::new(Duration::from_secs(
        config.url_reload_timeout,
    ))?);
    let publisher = Publisher::from_config(&config, Some(writer), notifier);
    let reconciler = Reconciler::from_config(&config, publisher, validity)?;

    let (tx, rx) = mpsc::unbounded_channel();
    let watchers = watch::spawn_watchers(
        client,
        selectors,
        config.watch_namespace().map(resolve_namespace),
        Duration::from_secs(config.selector_start_delay),
        tx,
        shutdown.clone(),
    );

    let result = reconciler.run(rx, shutdown.clone()).await;

    shutdown.cancel();
    for watcher in watchers {
        if let Err(e) = watcher.await {
            error!("Watch task failed: {}", e);
        }
    }
    if let Err(e) = metrics.await {
        error!("Metrics server task failed: {}", e);
    }

    info!("Sidecar stopped");
    result.map_err(SidecarError::from)
}
