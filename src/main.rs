use clap::Parser;
use statsd_sampler::{
    DEFAULT_QUEUE_DEPTH, Supervisor, YamlConfigLoader, init_metrics, init_tracing,
    spawn_signal_listener,
};
use std::{path::PathBuf, time::Duration};
use tokio::sync::mpsc;
use tracing::info;

/// Sample values and send them to statsd.
///
/// SIGHUP reloads the config file. SIGINT and SIGTERM stop the agent.
#[derive(Debug, Parser)]
#[command(name = "sampler", version)]
struct Cli {
    /// Verbose logging (ignored when RUST_LOG is set).
    #[arg(short, long)]
    verbose: bool,

    /// Serve self-metrics for Prometheus on this port.
    #[arg(long)]
    metrics_port: Option<u16>,

    /// Samples that may wait for the sender before takers block.
    #[arg(long, default_value_t = DEFAULT_QUEUE_DEPTH)]
    queue_depth: usize,

    /// Milliseconds to wait between failed config loads.
    #[arg(long, default_value_t = 0)]
    reload_backoff_ms: u64,

    /// Path to the YAML config file.
    config: PathBuf,
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let cli = Cli::parse();

    let provider = init_tracing(cli.verbose)?;
    if let Some(port) = cli.metrics_port {
        let port = init_metrics(port)?;
        info!(port, "serving self-metrics");
    }

    let (tx, rx) = mpsc::channel(4);
    let _signals = spawn_signal_listener(tx)?;

    info!(config = %cli.config.display(), "sampler starting");
    let result = Supervisor::new(YamlConfigLoader::new(cli.config), rx)
        .with_queue_depth(cli.queue_depth)
        .with_reload_backoff(Duration::from_millis(cli.reload_backoff_ms))
        .run()
        .await;

    // Give the exporter a chance to flush any remaining spans.
    if let Some(provider) = provider {
        provider.shutdown()?;
    }

    result.map_err(Into::into)
}
