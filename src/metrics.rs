//! Self-metrics: how the agent itself is doing. See [`init_metrics`].

use metrics::{counter, gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use std::sync::LazyLock;

const POLLS: &str = "sampler.polls";
const POLLS_DESC: &str = "The total number of successful sampler polls";

const POLL_FAILURES: &str = "sampler.poll_failures";
const POLL_FAILURES_DESC: &str = "The total number of failed sampler polls";

const SAMPLES_QUEUED: &str = "sampler.samples_queued";
const SAMPLES_QUEUED_DESC: &str = "The number of samples created but not yet written";

const DATAGRAMS_SENT: &str = "sampler.datagrams_sent";
const DATAGRAMS_SENT_DESC: &str = "The total number of statsd datagrams written";

const DELIVERY_FAILURES: &str = "sampler.delivery_failures";
const DELIVERY_FAILURES_DESC: &str = "The total number of samples dropped on write failure";

const TAKERS_LIVE: &str = "sampler.takers_live";
const TAKERS_LIVE_DESC: &str = "The number of sample takers currently running";

const RELOADS: &str = "sampler.reloads";
const RELOADS_DESC: &str = "The total number of pipeline reloads";

const CONFIG_FAILURES: &str = "sampler.config_failures";
const CONFIG_FAILURES_DESC: &str = "The total number of failed configuration loads";

static DESCRIBE: LazyLock<()> = LazyLock::new(|| {
    metrics::describe_counter!(POLLS, POLLS_DESC);
    metrics::describe_counter!(POLL_FAILURES, POLL_FAILURES_DESC);
    metrics::describe_gauge!(SAMPLES_QUEUED, SAMPLES_QUEUED_DESC);
    metrics::describe_counter!(DATAGRAMS_SENT, DATAGRAMS_SENT_DESC);
    metrics::describe_counter!(DELIVERY_FAILURES, DELIVERY_FAILURES_DESC);
    metrics::describe_gauge!(TAKERS_LIVE, TAKERS_LIVE_DESC);
    metrics::describe_counter!(RELOADS, RELOADS_DESC);
    metrics::describe_counter!(CONFIG_FAILURES, CONFIG_FAILURES_DESC);
});

pub(crate) fn record_poll(item: &str) {
    counter!(POLLS, "item" => item.to_owned()).increment(1);
}

pub(crate) fn record_poll_failure(item: &str, kind: &'static str) {
    counter!(POLL_FAILURES, "item" => item.to_owned(), "kind" => kind).increment(1);
}

pub(crate) fn sample_queued() {
    gauge!(SAMPLES_QUEUED).increment(1);
}

pub(crate) fn sample_dequeued() {
    gauge!(SAMPLES_QUEUED).decrement(1);
}

pub(crate) fn record_datagram() {
    counter!(DATAGRAMS_SENT).increment(1);
}

pub(crate) fn record_delivery_failure() {
    counter!(DELIVERY_FAILURES).increment(1);
}

pub(crate) fn taker_started() {
    gauge!(TAKERS_LIVE).increment(1);
}

pub(crate) fn taker_stopped() {
    gauge!(TAKERS_LIVE).decrement(1);
}

pub(crate) fn record_reload() {
    counter!(RELOADS).increment(1);
}

pub(crate) fn record_config_failure() {
    counter!(CONFIG_FAILURES).increment(1);
}

/// Install a Prometheus exporter listening on `port`.
///
/// The agent's job is pushing *other* numbers to statsd, but it is worth
/// knowing whether it is keeping up: whether polls are failing, whether the
/// sender is dropping datagrams, whether samples are piling up in the queue.
/// Those numbers are recorded through the [`metrics`] facade and, when this
/// function has been called, scraped from `http://<host>:<port>/`.
///
/// Without an exporter installed the facade discards everything, so calling
/// this is optional.
///
/// Metrics recorded:
/// - `sampler.polls` (counter, by `item`): successful sampler polls.
/// - `sampler.poll_failures` (counter, by `item` and `kind`): failed polls.
/// - `sampler.samples_queued` (gauge): samples created but not yet written.
/// - `sampler.datagrams_sent` (counter): datagrams written to the socket.
/// - `sampler.delivery_failures` (counter): samples dropped by the sender.
/// - `sampler.takers_live` (gauge): running sample takers.
/// - `sampler.reloads` (counter): pipeline rebuilds after a reload signal.
/// - `sampler.config_failures` (counter): failed config (re)loads.
pub fn init_metrics(port: u16) -> Result<u16, BuildError> {
    LazyLock::force(&DESCRIBE);
    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], port))
        .install()?;
    Ok(port)
}
