//! Pipeline lifecycle: building a generation, tearing it down, and the
//! reload loop around both.

use crate::{Config, ConfigLoader, Error, ItemSpec, SampleTaker, Sender, ValidationError};
use std::time::Duration;
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, instrument};

/// Default depth of the queue between the takers and the sender.
pub const DEFAULT_QUEUE_DEPTH: usize = 128;

/// What the supervisor should do with the running pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    /// Tear down and exit.
    Shutdown,
    /// Tear down, re-read the config, and start again.
    Reload,
}

/// One generation of the sampling pipeline: a sender, one taker per item,
/// and the cancellation token they all share.
///
/// Nothing in a pipeline outlives it. When it is shut down every task is
/// cancelled and joined, and the next generation starts from a clean slate,
/// delta baselines included.
pub struct Pipeline {
    items: Vec<ItemSpec>,
    cancel: CancellationToken,

    sender: JoinHandle<()>,
    takers: Vec<JoinHandle<()>>,
}

impl Pipeline {
    /// Validate `config` and start a pipeline for it.
    ///
    /// Every item is validated before anything is created, so an invalid
    /// config never leaves a partial pipeline running.
    #[instrument(skip_all, name = "Starting pipeline")]
    pub async fn start(config: &Config, queue_depth: usize) -> Result<Self, Error> {
        let items = config.validate()?;

        let cancel = CancellationToken::new();
        let (sender, handle) = Sender::connect(
            &config.statsd_host,
            config.statsd_port,
            &config.prefix,
            queue_depth.max(1),
            cancel.clone(),
        )
        .await?;
        let sender = sender.spawn();

        // Each taker gets its own copy of its item.
        let takers = items
            .iter()
            .cloned()
            .map(|item| SampleTaker::new(item, handle.clone()).spawn(cancel.clone()))
            .collect();

        info!(
            items = items.len(),
            host = %config.statsd_host,
            port = config.statsd_port,
            prefix = %config.prefix,
            "pipeline started"
        );

        Ok(Self {
            items,
            cancel,
            sender,
            takers,
        })
    }

    /// The validated items this pipeline is sampling, one taker each.
    pub fn items(&self) -> &[ItemSpec] {
        &self.items
    }

    /// Cancel every task and wait for all of them to finish.
    pub async fn shutdown(self) {
        self.cancel.cancel();

        for taker in self.takers {
            if let Err(error) = taker.await {
                error!(%error, "sample taker failed");
            }
        }
        if let Err(error) = self.sender.await {
            error!(%error, "sender failed");
        }
        debug!("pipeline stopped");
    }
}

/// Runs pipelines, one generation at a time, until told to stop.
pub struct Supervisor<L> {
    loader: L,
    control: mpsc::Receiver<Control>,
    queue_depth: usize,
    reload_backoff: Duration,
    generation: u64,
}

impl<L: ConfigLoader> Supervisor<L> {
    /// Create a supervisor that loads config from `loader` and takes orders
    /// from `control`. A closed `control` channel counts as a shutdown.
    pub fn new(loader: L, control: mpsc::Receiver<Control>) -> Self {
        Self {
            loader,
            control,
            queue_depth: DEFAULT_QUEUE_DEPTH,
            reload_backoff: Duration::ZERO,
            generation: 0,
        }
    }

    /// Set the depth of the sample queue.
    pub fn with_queue_depth(mut self, depth: usize) -> Self {
        self.queue_depth = depth;
        self
    }

    /// Wait this long between failed config loads. Zero, the default, retries
    /// immediately.
    pub fn with_reload_backoff(mut self, backoff: Duration) -> Self {
        self.reload_backoff = backoff;
        self
    }

    /// Run until a shutdown arrives. Returns an error only when a config
    /// fails validation.
    pub async fn run(mut self) -> Result<(), ValidationError> {
        loop {
            let span = info_span!("Generation", generation = self.generation);
            let Some(pipeline) = self.next_pipeline().instrument(span.clone()).await? else {
                span.in_scope(|| info!("shutdown requested while loading config"));
                return Ok(());
            };

            let control = self.control.recv().await;
            pipeline.shutdown().instrument(span.clone()).await;

            match control {
                Some(Control::Reload) => {
                    crate::metrics::record_reload();
                    span.in_scope(|| info!("reloading"));
                    self.generation += 1;
                }
                Some(Control::Shutdown) | None => {
                    span.in_scope(|| info!("shutting down"));
                    return Ok(());
                }
            }
        }
    }

    /// Load config and start a pipeline for it, retrying until it works.
    ///
    /// Load and connect failures are retried. Validation failures are not.
    /// `None` means a shutdown arrived while retrying.
    async fn next_pipeline(&mut self) -> Result<Option<Pipeline>, ValidationError> {
        let loader = &self.loader;
        let queue_depth = self.queue_depth;
        let control = &mut self.control;

        loop {
            let attempt = async {
                match loader.load().await {
                    Ok(config) => Pipeline::start(&config, queue_depth).await,
                    Err(error) => Err(error.into()),
                }
            };

            // A load that never finishes must not keep a shutdown waiting.
            let started = tokio::select! {
                biased;
                started = attempt => started,
                msg = control.recv() => match msg {
                    Some(Control::Reload) => {
                        debug!("reload requested mid-load, starting over");
                        continue;
                    }
                    Some(Control::Shutdown) | None => return Ok(None),
                },
            };

            match started {
                Ok(pipeline) => return Ok(Some(pipeline)),
                Err(Error::Validation(error)) => {
                    error!(%error, "invalid configuration");
                    return Err(error);
                }
                Err(Error::Config(error)) => {
                    crate::metrics::record_config_failure();
                    error!(%error, "failed to load configuration, retrying");
                }
            }

            tokio::select! {
                biased;
                msg = control.recv() => match msg {
                    Some(Control::Reload) => debug!("already reloading"),
                    Some(Control::Shutdown) | None => return Ok(None),
                },
                _ = pause(self.reload_backoff) => {}
            }
        }
    }
}

/// Wait before retrying a config load. Always yields, so a zero backoff still
/// lets the rest of the runtime (and the control channel) make progress.
async fn pause(backoff: Duration) {
    if backoff.is_zero() {
        tokio::task::yield_now().await;
    } else {
        tokio::time::sleep(backoff).await;
    }
}
