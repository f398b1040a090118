use statsd_sampler::{Config, ConfigError, ConfigItem, ConfigLoader, Control, Supervisor};
use std::{
    io::ErrorKind,
    path::Path,
    sync::{Arc, Mutex},
    time::Duration,
};
use tokio::{
    net::UdpSocket,
    sync::mpsc,
    time::{Instant, sleep, timeout},
};

/// Serves whatever config the test last put in it.
#[derive(Clone)]
struct Swap(Arc<Mutex<Config>>);

impl Swap {
    fn set(&self, config: Config) {
        *self.0.lock().unwrap() = config;
    }
}

impl ConfigLoader for Swap {
    async fn load(&self) -> Result<Config, ConfigError> {
        Ok(self.0.lock().unwrap().clone())
    }
}

fn item(name: &str, path: &Path, interval: u64, metric: &str, delta: bool) -> ConfigItem {
    ConfigItem {
        name: name.into(),
        kind: "file".into(),
        path: path.display().to_string(),
        interval,
        metric: metric.into(),
        delta,
    }
}

fn config(port: u16, items: Vec<ConfigItem>) -> Config {
    Config {
        statsd_host: "127.0.0.1".into(),
        statsd_port: port,
        prefix: "t".into(),
        items,
    }
}

async fn recv(socket: &UdpSocket) -> String {
    let mut buf = [0u8; 512];
    let n = timeout(Duration::from_secs(60), socket.recv(&mut buf))
        .await
        .expect("timed out waiting for datagram")
        .unwrap();
    String::from_utf8(buf[..n].to_vec()).unwrap()
}

fn assert_quiet(socket: &UdpSocket) {
    let mut buf = [0u8; 512];
    match socket.try_recv(&mut buf) {
        Err(e) if e.kind() == ErrorKind::WouldBlock => {}
        Ok(n) => panic!(
            "unexpected datagram: {:?}",
            String::from_utf8_lossy(&buf[..n])
        ),
        Err(e) => panic!("recv failed: {e}"),
    }
}

fn assert_elapsed(since: Instant, secs: u64) {
    let elapsed = since.elapsed();
    let expected = Duration::from_secs(secs);
    assert!(
        elapsed >= expected && elapsed < expected + Duration::from_millis(50),
        "elapsed {elapsed:?}, expected {expected:?}"
    );
}

#[tokio::test(start_paused = true)]
async fn reload_drops_items_and_resets_history() {
    let dir = tempfile::tempdir().unwrap();
    let alpha = dir.path().join("alpha");
    let beta = dir.path().join("beta");
    std::fs::write(&alpha, "10").unwrap();
    std::fs::write(&beta, "5").unwrap();

    let collector = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let port = collector.local_addr().unwrap().port();

    let loader = Swap(Arc::new(Mutex::new(config(
        port,
        vec![
            item("alpha", &alpha, 1, "counter", true),
            item("beta", &beta, 1, "gauge", false),
        ],
    ))));
    let (tx, rx) = mpsc::channel(1);
    let supervisor = tokio::spawn(Supervisor::new(loader.clone(), rx).run());

    // 1s: alpha records its baseline, beta reports.
    assert_eq!(recv(&collector).await, "t.beta:5|g\n");
    sleep(Duration::from_millis(500)).await;
    assert_quiet(&collector);
    std::fs::write(&alpha, "15").unwrap();

    // 2s: both report.
    let mut lines = vec![recv(&collector).await, recv(&collector).await];
    lines.sort();
    assert_eq!(lines, ["t.alpha:5|c\n", "t.beta:5|g\n"]);

    // Drop beta, slow alpha down, and reload.
    loader.set(config(port, vec![item("alpha", &alpha, 3, "counter", true)]));
    std::fs::write(&alpha, "100").unwrap();
    let reloaded_at = Instant::now();
    tx.send(Control::Reload).await.unwrap();

    // 5s after reload: the new alpha's first poll only sets a baseline. An old
    // baseline of 15 would have produced 85 here.
    sleep(Duration::from_millis(4500)).await;
    assert_quiet(&collector);
    std::fs::write(&alpha, "130").unwrap();

    assert_eq!(recv(&collector).await, "t.alpha:30|c\n");
    assert_elapsed(reloaded_at, 6);

    std::fs::write(&alpha, "140").unwrap();
    assert_eq!(recv(&collector).await, "t.alpha:10|c\n");
    assert_elapsed(reloaded_at, 9);

    tx.send(Control::Shutdown).await.unwrap();
    supervisor.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn shutdown_stops_all_sampling() {
    let dir = tempfile::tempdir().unwrap();
    let gauge = dir.path().join("gauge");
    std::fs::write(&gauge, "1").unwrap();

    let collector = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let port = collector.local_addr().unwrap().port();

    let loader = Swap(Arc::new(Mutex::new(config(
        port,
        vec![item("g", &gauge, 1, "gauge", false)],
    ))));
    let (tx, rx) = mpsc::channel(1);
    let supervisor = tokio::spawn(Supervisor::new(loader, rx).run());

    assert_eq!(recv(&collector).await, "t.g:1|g\n");
    tx.send(Control::Shutdown).await.unwrap();
    supervisor.await.unwrap().unwrap();

    sleep(Duration::from_secs(5)).await;
    assert_quiet(&collector);
}

#[tokio::test(start_paused = true)]
async fn unknown_sampler_starts_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let gauge = dir.path().join("gauge");
    std::fs::write(&gauge, "1").unwrap();

    let collector = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let port = collector.local_addr().unwrap().port();

    let mut bad = item("bad", &gauge, 1, "gauge", false);
    bad.kind = "xyz".into();
    let loader = Swap(Arc::new(Mutex::new(config(
        port,
        vec![item("good", &gauge, 1, "gauge", false), bad],
    ))));
    let (_tx, rx) = mpsc::channel(1);

    assert!(Supervisor::new(loader, rx).run().await.is_err());

    sleep(Duration::from_secs(5)).await;
    assert_quiet(&collector);
}
