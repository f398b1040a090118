//! Sample numbers from local sources and push them to statsd.
//!
//! Each configured item names a source (a file, a shell command, or one of
//! the kernel's CPU, memory and uptime counters), a polling interval, and a
//! statsd metric type. The agent polls every item on its own schedule and
//! sends each reading to a statsd collector as a UDP datagram.
//!
//! The crate is structured as a small actor system, using [`mpsc`] channels
//! between tasks:
//!
//! - a [`SampleTaker`] per item owns a timer and a [`Sampler`], applies delta
//!   adjustment through its [`DeltaTracker`], and hands [`Sample`]s on;
//! - a single [`Sender`] owns the socket and writes every sample, so lines
//!   from different items never interleave;
//! - the [`Supervisor`] builds a [`Pipeline`] from the loaded [`Config`], and
//!   tears it down and rebuilds it when told to reload.
//!
//! Every task of a pipeline shares one [`CancellationToken`]. Cancelling it is
//! the only way tasks are stopped: each task checks it whenever it waits, and
//! winds down on its own.
//!
//! Tracing and self-metrics setup live in [`init_tracing`] and
//! [`init_metrics`].
//!
//! [`mpsc`]: tokio::sync::mpsc
//! [`CancellationToken`]: tokio_util::sync::CancellationToken

mod config;
pub use config::{
    Config, ConfigItem, ConfigLoader, ItemSpec, MetricKind, SamplerKind, YamlConfigLoader,
};

mod error;
pub use error::{ConfigError, DeliveryError, Error, SampleError, ValidationError};

pub(crate) mod metrics;
pub use metrics::init_metrics;

mod sample;
pub use sample::Sample;

mod sampler;
pub use sampler::{
    BashSampler, CpuSampler, FileSampler, MemorySampler, Readings, Sampler, UptimeSampler,
};

mod sender;
pub use sender::{Sender, SenderHandle};

mod signals;
pub use signals::spawn_signal_listener;

mod supervisor;
pub use supervisor::{Control, DEFAULT_QUEUE_DEPTH, Pipeline, Supervisor};

mod taker;
pub use taker::{DeltaTracker, SampleTaker};

mod trace;
pub use trace::{LOG_JSON_ENV, OTLP_ENDPOINT_ENV, init_tracing};
