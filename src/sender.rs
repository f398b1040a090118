//! The single writer. Read [`Sender`].

use crate::{ConfigError, DeliveryError, Sample};
use std::{
    io,
    net::{Ipv4Addr, Ipv6Addr, SocketAddr},
    sync::Arc,
};
use tokio::{net::UdpSocket, sync::mpsc, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, instrument, trace, warn};

/// Owns the UDP socket to statsd and writes every sample to it.
///
/// Sample takers never touch the socket. They push [`Sample`]s into a bounded
/// queue through a [`SenderHandle`], and the sender's task pops them one at a
/// time and writes one datagram per sample. A single consumer means lines are
/// never interleaved, however many takers are sending.
///
/// Delivery is best effort: a failed write is logged and the sample dropped.
/// On cancellation the task stops, queued samples are discarded, the socket
/// is closed, and further sends fail with [`DeliveryError::Closed`].
pub struct Sender {
    inbound: mpsc::Receiver<Sample>,
    socket: UdpSocket,
    prefix: Arc<str>,

    cancel: CancellationToken,
}

/// The producing side of a [`Sender`]. Cheap to clone; one per taker.
#[derive(Debug, Clone)]
pub struct SenderHandle {
    outbound: mpsc::Sender<Sample>,
}

impl From<mpsc::Sender<Sample>> for SenderHandle {
    fn from(outbound: mpsc::Sender<Sample>) -> Self {
        Self { outbound }
    }
}

impl SenderHandle {
    /// Queue a sample. Waits while the queue is full.
    pub async fn send(&self, sample: Sample) -> Result<(), DeliveryError> {
        self.outbound
            .send(sample)
            .await
            .map_err(|_| DeliveryError::Closed)
    }

    /// True once the sender has stopped accepting samples.
    pub fn is_closed(&self) -> bool {
        self.outbound.is_closed()
    }
}

impl Sender {
    /// Resolve `host:port`, connect a UDP socket to it, and create a sender
    /// with a queue of `depth` samples. The sender does nothing until
    /// [`spawned`].
    ///
    /// [`spawned`]: Sender::spawn
    pub async fn connect(
        host: &str,
        port: u16,
        prefix: &str,
        depth: usize,
        cancel: CancellationToken,
    ) -> Result<(Self, SenderHandle), ConfigError> {
        let addr = format!("{host}:{port}");
        let connect_err = |source: io::Error| ConfigError::Connect {
            addr: addr.clone(),
            source,
        };

        let remote = tokio::net::lookup_host((host, port))
            .await
            .map_err(connect_err)?
            .next()
            .ok_or_else(|| {
                connect_err(io::Error::new(
                    io::ErrorKind::AddrNotAvailable,
                    "no addresses found",
                ))
            })?;

        let local: SocketAddr = if remote.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(local).await.map_err(connect_err)?;
        socket.connect(remote).await.map_err(connect_err)?;
        debug!(%remote, "connected statsd socket");

        let (tx, rx) = mpsc::channel(depth);
        let sender = Self {
            inbound: rx,
            socket,
            prefix: prefix.into(),
            cancel,
        };
        Ok((sender, tx.into()))
    }

    /// Format a sample and write it as one datagram.
    #[instrument(skip_all, name = "Writing sample")]
    async fn write(&self, sample: &Sample) -> Result<(), DeliveryError> {
        let line = sample.to_line(&self.prefix);
        self.socket.send(line.as_bytes()).await?;
        trace!(line = line.trim_end(), "sent");
        Ok(())
    }

    /// Spawn the consuming task.
    pub fn spawn(mut self) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                let sample = tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => break,
                    sample = self.inbound.recv() => match sample {
                        Some(sample) => sample,
                        None => break,
                    },
                };

                // Write inside the span of the tick that took the sample.
                let span = sample.span().clone();
                match self.write(&sample).instrument(span.clone()).await {
                    Ok(()) => crate::metrics::record_datagram(),
                    Err(error) => {
                        crate::metrics::record_delivery_failure();
                        span.in_scope(|| warn!(%error, stat = %sample.stat(), "dropping sample"));
                    }
                }
            }

            self.inbound.close();
            info!("statsd sender stopped, closing socket");
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::MetricKind;
    use std::{collections::HashSet, time::Duration};
    use tokio::time::timeout;

    async fn collector() -> (UdpSocket, u16) {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = socket.local_addr().unwrap().port();
        (socket, port)
    }

    async fn recv_line(socket: &UdpSocket) -> String {
        let mut buf = [0u8; 512];
        let n = timeout(Duration::from_secs(5), socket.recv(&mut buf))
            .await
            .expect("timed out waiting for datagram")
            .unwrap();
        String::from_utf8(buf[..n].to_vec()).unwrap()
    }

    #[tokio::test]
    async fn writes_one_line_per_datagram() {
        let (collector, port) = collector().await;
        let cancel = CancellationToken::new();
        let (sender, handle) = Sender::connect("127.0.0.1", port, "app", 8, cancel.clone())
            .await
            .unwrap();
        let task = sender.spawn();

        handle
            .send(Sample::new("host".into(), "cpu", 42, MetricKind::Gauge))
            .await
            .unwrap();
        handle
            .send(Sample::new("hits".into(), "", 3, MetricKind::Counter))
            .await
            .unwrap();

        assert_eq!(recv_line(&collector).await, "app.host.cpu:42|g\n");
        assert_eq!(recv_line(&collector).await, "app.hits:3|c\n");

        cancel.cancel();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn empty_prefix_is_omitted() {
        let (collector, port) = collector().await;
        let cancel = CancellationToken::new();
        let (sender, handle) = Sender::connect("127.0.0.1", port, "", 8, cancel.clone())
            .await
            .unwrap();
        let task = sender.spawn();

        handle
            .send(Sample::new("users".into(), "", 11, MetricKind::Set))
            .await
            .unwrap();
        assert_eq!(recv_line(&collector).await, "users:11|s\n");

        cancel.cancel();
        task.await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_sends_never_tear_lines() {
        const PRODUCERS: usize = 8;
        const EACH: usize = 25;

        let (collector, port) = collector().await;
        let cancel = CancellationToken::new();
        let (sender, handle) = Sender::connect("127.0.0.1", port, "app", 4, cancel.clone())
            .await
            .unwrap();
        let task = sender.spawn();

        let producers: Vec<_> = (0..PRODUCERS)
            .map(|p| {
                let handle = handle.clone();
                tokio::spawn(async move {
                    for i in 0..EACH {
                        let name = format!("item{p}");
                        let sample =
                            Sample::new(name.into(), "field", i as i64, MetricKind::Gauge);
                        handle.send(sample).await.unwrap();
                    }
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for _ in 0..PRODUCERS * EACH {
            let line = recv_line(&collector).await;
            let (stat, rest) = line.split_once(':').expect("missing ':'");
            let (value, code) = rest.split_once('|').expect("missing '|'");
            assert_eq!(code, "g\n");
            assert!(stat.starts_with("app.item") && stat.ends_with(".field"));
            assert!(seen.insert((stat.to_owned(), value.parse::<i64>().unwrap())));
        }
        assert_eq!(seen.len(), PRODUCERS * EACH);

        for producer in producers {
            producer.await.unwrap();
        }
        cancel.cancel();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn failed_writes_are_dropped_and_the_socket_stays_open() {
        // Nothing listens on this port until later, so writes are refused.
        let port = collector().await.1;
        let cancel = CancellationToken::new();
        let (sender, handle) = Sender::connect("127.0.0.1", port, "p", 8, cancel.clone())
            .await
            .unwrap();
        let task = sender.spawn();

        for i in 0..3 {
            handle
                .send(Sample::new("lost".into(), "", i, MetricKind::Gauge))
                .await
                .unwrap();
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!task.is_finished());

        let collector = UdpSocket::bind(("127.0.0.1", port)).await.unwrap();
        let mut buf = [0u8; 512];
        let mut line = None;
        for _ in 0..25 {
            handle
                .send(Sample::new("c".into(), "", 10, MetricKind::Gauge))
                .await
                .unwrap();
            if let Ok(n) = timeout(Duration::from_millis(200), collector.recv(&mut buf)).await {
                line = Some(String::from_utf8(buf[..n.unwrap()].to_vec()).unwrap());
                break;
            }
        }
        assert_eq!(line.as_deref(), Some("p.c:10|g\n"));
        assert!(!handle.is_closed());

        cancel.cancel();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn rejects_sends_after_cancel() {
        let (_collector, port) = collector().await;
        let cancel = CancellationToken::new();
        let (sender, handle) = Sender::connect("127.0.0.1", port, "app", 8, cancel.clone())
            .await
            .unwrap();
        let task = sender.spawn();

        cancel.cancel();
        task.await.unwrap();

        assert!(handle.is_closed());
        let err = handle
            .send(Sample::new("late".into(), "", 1, MetricKind::Gauge))
            .await
            .unwrap_err();
        assert!(matches!(err, DeliveryError::Closed));
    }

    #[tokio::test]
    async fn unresolvable_host_is_config_error() {
        let err = Sender::connect(
            "host.invalid",
            8125,
            "",
            8,
            CancellationToken::new(),
        )
        .await
        .err()
        .expect("connect should fail");
        assert!(matches!(err, ConfigError::Connect { .. }));
    }
}
