//! The [`Sample`] struct, our unit of work.

use crate::MetricKind;
use std::sync::Arc;
use tracing::trace;

/// One value on its way to statsd.
///
/// A `Sample` is produced by a [`SampleTaker`] and consumed exactly once by
/// the [`Sender`]. It carries the span of the tick that produced it, so the
/// write to the socket is recorded as part of that tick. As with any data
/// that carries a span, don't hold on to samples: the tick's span stays open
/// until its last sample is dropped.
///
/// [`SampleTaker`]: crate::SampleTaker
/// [`Sender`]: crate::Sender
#[derive(Debug)]
pub struct Sample {
    name: Arc<str>,
    suffix: Option<String>,
    value: i64,
    metric: MetricKind,

    span: tracing::Span,
}

impl Sample {
    /// Create a sample inside the current span. An empty `suffix` means the
    /// item's name stands alone.
    pub fn new(name: Arc<str>, suffix: &str, value: i64, metric: MetricKind) -> Self {
        crate::metrics::sample_queued();
        Self {
            name,
            suffix: (!suffix.is_empty()).then(|| suffix.to_owned()),
            value,
            metric,
            span: tracing::Span::current(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn suffix(&self) -> Option<&str> {
        self.suffix.as_deref()
    }

    pub const fn value(&self) -> i64 {
        self.value
    }

    pub const fn metric(&self) -> MetricKind {
        self.metric
    }

    /// The span of the tick that produced this sample.
    pub fn span(&self) -> &tracing::Span {
        &self.span
    }

    /// The stat name, `name` or `name.suffix`.
    pub fn stat(&self) -> String {
        match &self.suffix {
            Some(suffix) => format!("{}.{suffix}", self.name),
            None => self.name.to_string(),
        }
    }

    /// Format as a statsd line: `[prefix.]name[.suffix]:value|type\n`.
    pub fn to_line(&self, prefix: &str) -> String {
        let stat = self.stat();
        let code = self.metric.code();
        if prefix.is_empty() {
            format!("{stat}:{}|{code}\n", self.value)
        } else {
            format!("{prefix}.{stat}:{}|{code}\n", self.value)
        }
    }
}

impl Drop for Sample {
    fn drop(&mut self) {
        self.span.in_scope(|| trace!("dropping sample"));
        crate::metrics::sample_dequeued();
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn sample(suffix: &str, value: i64, metric: MetricKind) -> Sample {
        Sample::new("host".into(), suffix, value, metric)
    }

    #[test]
    fn formats_with_prefix_and_suffix() {
        assert_eq!(
            sample("cpu", 42, MetricKind::Gauge).to_line("app"),
            "app.host.cpu:42|g\n"
        );
    }

    #[test]
    fn omits_empty_prefix_and_suffix() {
        assert_eq!(sample("", 7, MetricKind::Counter).to_line(""), "host:7|c\n");
        assert_eq!(
            sample("", -3, MetricKind::Set).to_line("app"),
            "app.host:-3|s\n"
        );
    }

    #[test]
    fn exposes_parts() {
        let s = sample("idle", 9, MetricKind::Counter);
        assert_eq!(s.name(), "host");
        assert_eq!(s.suffix(), Some("idle"));
        assert_eq!(s.stat(), "host.idle");
        assert_eq!(s.value(), 9);
        assert_eq!(s.metric(), MetricKind::Counter);
        assert_eq!(sample("", 1, MetricKind::Gauge).suffix(), None);
    }
}
