//! Per-item sampling. This module contains the [`SampleTaker`] struct.

use crate::{ItemSpec, Sample, SampleError, Sampler, SenderHandle};
use std::{collections::HashMap, sync::Arc};
use tokio::{
    task::JoinHandle,
    time::{Instant, MissedTickBehavior, interval_at},
};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info_span, instrument, trace, warn};

/// Remembers the last raw reading of each field, and turns raw readings into
/// the values to emit.
#[derive(Debug, Default)]
pub struct DeltaTracker {
    delta: bool,
    last: HashMap<String, i64>,
}

impl DeltaTracker {
    /// A tracker for an item. With `delta` unset, readings pass through.
    pub fn new(delta: bool) -> Self {
        Self {
            delta,
            last: HashMap::new(),
        }
    }

    /// Record `raw` for `field` and return the value to emit, if any.
    ///
    /// Delta trackers return `raw` minus the previous reading, and nothing at
    /// all for a field's first reading. The raw value, not the difference,
    /// becomes the next baseline.
    pub fn adjust(&mut self, field: &str, raw: i64) -> Option<i64> {
        let prev = self.last.insert(field.to_owned(), raw);
        if !self.delta {
            return Some(raw);
        }
        prev.map(|prev| raw.wrapping_sub(prev))
    }

    /// The last raw reading of `field`.
    pub fn last(&self, field: &str) -> Option<i64> {
        self.last.get(field).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.last.is_empty()
    }
}

/// Polls one configured item on its own interval and hands the results to
/// the sender.
///
/// A taker is running from the moment it is spawned until its cancellation
/// token fires. Ticks never overlap: a slow poll (say, a sluggish shell
/// command) pushes the next tick back rather than stacking polls up.
pub struct SampleTaker {
    spec: ItemSpec,
    name: Arc<str>,
    sampler: Sampler,
    history: DeltaTracker,
    ticks: u64,

    outbound: SenderHandle,
}

impl SampleTaker {
    /// Create a taker for `spec`, with the sampler its kind calls for.
    pub fn new(spec: ItemSpec, outbound: SenderHandle) -> Self {
        let sampler = Sampler::for_item(&spec);
        Self::with_sampler(spec, sampler, outbound)
    }

    /// Create a taker with an explicitly constructed sampler.
    pub fn with_sampler(spec: ItemSpec, sampler: Sampler, outbound: SenderHandle) -> Self {
        Self {
            name: spec.name.as_str().into(),
            history: DeltaTracker::new(spec.is_delta()),
            spec,
            sampler,
            ticks: 0,
            outbound,
        }
    }

    /// Poll the sampler once and build the samples to send. Must run inside
    /// the tick's span, which the samples pick up.
    #[instrument(skip(self), name = "Taking sample")]
    async fn take_samples(&mut self) -> Result<Vec<Sample>, SampleError> {
        let readings = self.sampler.sample().await?;
        trace!(fields = readings.len(), "sampled");

        let samples = readings
            .into_iter()
            .filter_map(|(field, raw)| {
                let value = self.history.adjust(&field, raw);
                if value.is_none() {
                    trace!(field = %field, raw, "recorded baseline");
                }
                value.map(|value| Sample::new(self.name.clone(), &field, value, self.spec.metric))
            })
            .collect();

        self.ticks = self.ticks.wrapping_add(1);
        Ok(samples)
    }

    /// Spawn the taker. It runs until `cancel` fires, and is observed at
    /// every wait: the timer, the poll, and a full send queue.
    pub fn spawn(mut self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            crate::metrics::taker_started();
            debug!(item = %self.name, interval = ?self.spec.interval, "sample taker started");

            let period = self.spec.interval;
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            'ticks: loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = interval.tick() => {}
                }

                let span = info_span!("Tick", item = %self.name, tick = self.ticks);

                let polled = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    polled = self.take_samples().instrument(span.clone()) => polled,
                };

                let samples = match polled {
                    Ok(samples) => {
                        crate::metrics::record_poll(&self.name);
                        samples
                    }
                    Err(error) => {
                        crate::metrics::record_poll_failure(&self.name, error.kind());
                        span.in_scope(|| warn!(%error, "sampling failed, skipping tick"));
                        continue;
                    }
                };

                for sample in samples {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break 'ticks,
                        sent = self.outbound.send(sample) => {
                            if sent.is_err() {
                                span.in_scope(|| debug!("sender closed, stopping"));
                                break 'ticks;
                            }
                        }
                    }
                }
            }

            crate::metrics::taker_stopped();
            debug!(item = %self.name, "sample taker stopped");
        })
    }
}
