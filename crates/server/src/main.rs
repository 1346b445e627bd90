use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use cuju_core::{MetricsSink, NoopMetrics, Scorer, Settings};
use cuju_scoring::{LinearScorer, WeightedScorer};
use cuju_store::FacadeMetrics;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "cujud", version, about = "Cuju talent leaderboard server")]
struct Cli {
    /// HTTP listen address
    #[arg(long, env = "CUJU_LISTEN", default_value = "0.0.0.0:8080")]
    listen: SocketAddr,

    /// Prometheus exporter listen address; metrics are discarded when unset
    #[arg(long = "metrics-addr", env = "CUJU_METRICS_ADDR")]
    metrics_addr: Option<SocketAddr>,

    /// Scoring strategy
    #[arg(long, value_enum, default_value_t = ScorerKind::Weighted)]
    scorer: ScorerKind,

    /// Leaderboard rebuild interval (ms); overrides CUJU_REBUILD_INTERVAL_MS
    #[arg(long = "rebuild-interval-ms")]
    rebuild_interval_ms: Option<u64>,

    /// Processing loop interval (ms); overrides CUJU_PROCESSING_INTERVAL_MS
    #[arg(long = "processing-interval-ms")]
    processing_interval_ms: Option<u64>,

    /// Events per processing cycle; overrides CUJU_BATCH_SIZE
    #[arg(long = "batch-size")]
    batch_size: Option<usize>,

    /// Scoring failures before an event is dead-lettered (0 = never); overrides CUJU_MAX_ATTEMPTS
    #[arg(long = "max-attempts")]
    max_attempts: Option<u32>,

    /// Concurrent scorer calls per batch; overrides CUJU_SCORING_CONCURRENCY
    #[arg(long = "scoring-concurrency")]
    scoring_concurrency: Option<usize>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum ScorerKind {
    /// metric x skill weight, with simulated model latency
    Weighted,
    /// score = metric
    Linear,
}

impl Cli {
    fn settings(&self) -> Settings {
        let mut s = Settings::from_env();
        if let Some(ms) = self.rebuild_interval_ms { s.rebuild_interval = Duration::from_millis(ms); }
        if let Some(ms) = self.processing_interval_ms { s.processing_interval = Duration::from_millis(ms); }
        if let Some(n) = self.batch_size { s.batch_size = n; }
        if let Some(n) = self.max_attempts { s.max_attempts = n; }
        if let Some(n) = self.scoring_concurrency { s.scoring_concurrency = n; }
        s.normalized()
    }

    fn scorer(&self) -> Arc<dyn Scorer> {
        match self.scorer {
            ScorerKind::Weighted => Arc::new(WeightedScorer::simulated()),
            ScorerKind::Linear => Arc::new(LinearScorer),
        }
    }
}

fn init_tracing() {
    let env = std::env::var("CUJU_LOG").unwrap_or_else(|_| "info".to_string());
    let filter = tracing_subscriber::EnvFilter::from_str(&env).unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).init();
}

/// Install the Prometheus exporter when an address is configured.
fn init_metrics(addr: Option<SocketAddr>) -> Arc<dyn MetricsSink> {
    let Some(sock) = addr else { return Arc::new(NoopMetrics) };
    let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
    match builder.with_http_listener(sock).install() {
        Ok(()) => {
            info!(addr = %sock, "Prometheus metrics exporter listening");
            Arc::new(FacadeMetrics)
        }
        Err(e) => {
            warn!(error = %e, "failed to install metrics exporter");
            Arc::new(NoopMetrics)
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "ctrl-c handler unavailable");
            std::future::pending::<()>().await;
        }
    };
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => { sig.recv().await; }
            Err(e) => {
                warn!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let metrics = init_metrics(cli.metrics_addr);
    let settings = cli.settings();

    let api = Arc::new(cuju_api::InProcApi::start(settings, cli.scorer(), metrics));
    let router = cuju_server::create_router(api.clone());

    let listener = tokio::net::TcpListener::bind(cli.listen)
        .await
        .with_context(|| format!("binding {}", cli.listen))?;
    info!(addr = %cli.listen, scorer = ?cli.scorer, "cujud listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("http server")?;

    api.shutdown().await;
    info!("exiting");
    Ok(())
}
