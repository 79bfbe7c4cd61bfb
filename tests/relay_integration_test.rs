use herald::bridge::Bridge;
use herald::framing::{self, encode_frame};
use herald::server::IngressSocket;
use herald::{NotificationRequest, Priority, SubmitResponse, client};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncWriteExt, DuplexStream, duplex};
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

/// Send through the blocking client on a worker thread.
async fn send(path: &Path, request: NotificationRequest) -> SubmitResponse {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || client::send(&path, &request))
        .await
        .unwrap()
        .unwrap()
}

async fn next_frame(host_side: &mut DuplexStream) -> serde_json::Value {
    let body = timeout(WAIT, framing::read_frame(host_side))
        .await
        .expect("timed out waiting for frame")
        .unwrap()
        .expect("channel closed");
    serde_json::from_slice(&body).unwrap()
}

fn socket_in(dir: &TempDir) -> PathBuf {
    dir.path().join("herald.sock")
}

#[tokio::test]
async fn socket_submission_reaches_extension_as_one_frame() {
    let dir = TempDir::new().unwrap();
    let path = socket_in(&dir);
    let ingress = IngressSocket::bind(&path).unwrap();
    let (mut host_side, bridge_side) = duplex(64 * 1024);
    let bridge = Arc::new(Bridge::new(bridge_side));
    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();

    let producer = async {
        let response = send(
            &path,
            NotificationRequest::new("Build", "ok", Priority::Success),
        )
        .await;
        let SubmitResponse::Ok { id } = response else {
            panic!("expected ok, got {response:?}");
        };

        let frame = next_frame(&mut host_side).await;
        assert_eq!(frame["type"], "notification");
        assert_eq!(frame["data"]["title"], "Build");
        assert_eq!(frame["data"]["message"], "ok");
        assert_eq!(frame["data"]["priority"], "success");
        assert_eq!(frame["data"]["id"], id);
        assert!(frame["data"]["timestamp"].is_string());

        let _ = stop_tx.send(());
    };
    let server = ingress.serve(Arc::clone(&bridge), async {
        let _ = stop_rx.await;
    });

    timeout(WAIT, async { tokio::join!(producer, server) })
        .await
        .unwrap();
    drop(ingress);
    drop(bridge);

    assert!(framing::read_frame(&mut host_side).await.unwrap().is_none());
    assert!(!path.exists());
}

#[tokio::test]
async fn malformed_submission_does_not_stop_listener() {
    let dir = TempDir::new().unwrap();
    let path = socket_in(&dir);
    let ingress = IngressSocket::bind(&path).unwrap();
    let (mut host_side, bridge_side) = duplex(64 * 1024);
    let bridge = Arc::new(Bridge::new(bridge_side));
    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();

    let producers = async {
        let mut raw = tokio::net::UnixStream::connect(&path).await.unwrap();
        raw.write_all(b"{\"title\": oops").await.unwrap();
        let mut reply = Vec::new();
        tokio::io::AsyncReadExt::read_to_end(&mut raw, &mut reply)
            .await
            .unwrap();
        let reply: serde_json::Value = serde_json::from_slice(&reply).unwrap();
        assert_eq!(reply["status"], "error");
        assert!(reply["message"].is_string());

        for i in 0..3 {
            let response = send(
                &path,
                NotificationRequest::new(format!("n{i}"), "m", Priority::Info),
            )
            .await;
            assert!(matches!(response, SubmitResponse::Ok { .. }));
            let frame = next_frame(&mut host_side).await;
            assert_eq!(frame["data"]["title"], format!("n{i}"));
        }

        let _ = stop_tx.send(());
    };
    let server = ingress.serve(Arc::clone(&bridge), async {
        let _ = stop_rx.await;
    });

    timeout(WAIT, async { tokio::join!(producers, server) })
        .await
        .unwrap();
}

#[tokio::test]
async fn submission_after_extension_left_gets_error_status() {
    let dir = TempDir::new().unwrap();
    let path = socket_in(&dir);
    let ingress = IngressSocket::bind(&path).unwrap();
    let (host_side, bridge_side) = duplex(1024);
    drop(host_side);
    let bridge = Arc::new(Bridge::new(bridge_side));
    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();

    let producer = async {
        let response = send(&path, NotificationRequest::new("T", "M", Priority::Info)).await;
        assert_eq!(
            response,
            SubmitResponse::error("extension host disconnected")
        );
        let _ = stop_tx.send(());
    };
    let server = ingress.serve(Arc::clone(&bridge), async {
        let _ = stop_rx.await;
    });

    timeout(WAIT, async { tokio::join!(producer, server) })
        .await
        .unwrap();
}

#[tokio::test]
async fn concurrent_producers_and_pings() {
    const PRODUCERS: usize = 10;
    const PINGS: usize = 10;

    let dir = TempDir::new().unwrap();
    let path = socket_in(&dir);
    let ingress = IngressSocket::bind(&path).unwrap();
    let (host_out, bridge_out) = duplex(1024);
    let (mut host_in, bridge_in) = duplex(1024);
    let bridge = Arc::new(Bridge::new(bridge_out));

    let collector = tokio::spawn(async move {
        let mut host_out = host_out;
        let mut frames = Vec::new();
        while let Some(body) = framing::read_frame(&mut host_out).await.unwrap() {
            frames.push(serde_json::from_slice::<serde_json::Value>(&body).unwrap());
        }
        frames
    });

    let inbound = tokio::spawn({
        let bridge = Arc::clone(&bridge);
        async move { bridge.run_inbound(bridge_in).await }
    });

    let producers = async {
        let sends = (0..PRODUCERS).map(|i| {
            let path = path.clone();
            tokio::spawn(async move {
                send(&path, NotificationRequest::new(format!("p{i}"), "m", Priority::Warning)).await
            })
        });
        let handles: Vec<_> = sends.collect();

        for _ in 0..PINGS {
            host_in
                .write_all(&encode_frame(br#"{"type":"ping"}"#).unwrap())
                .await
                .unwrap();
        }

        for handle in handles {
            assert!(matches!(handle.await.unwrap(), SubmitResponse::Ok { .. }));
        }
    };

    // Accept until every producer has its reply.
    timeout(WAIT, ingress.serve(Arc::clone(&bridge), producers))
        .await
        .unwrap();

    // Extension closes the channel: the inbound loop ends cleanly.
    drop(host_in);
    timeout(WAIT, inbound).await.unwrap().unwrap().unwrap();
    drop(ingress);
    assert!(!path.exists());
    drop(bridge);

    let frames = timeout(WAIT, collector).await.unwrap().unwrap();
    let pongs = frames.iter().filter(|f| f["type"] == "pong").count();
    let mut titles: Vec<String> = frames
        .iter()
        .filter(|f| f["type"] == "notification")
        .map(|f| f["data"]["title"].as_str().unwrap().to_string())
        .collect();
    titles.sort();
    let mut expected: Vec<String> = (0..PRODUCERS).map(|i| format!("p{i}")).collect();
    expected.sort();

    assert_eq!(pongs, PINGS);
    assert_eq!(titles, expected);
}
