//! Coordinated shutdown with live sessions.

use std::sync::Arc;
use std::time::{Duration, Instant};

use petal::classify::{ClassificationError, Labels};
use petal::lifecycle::RunState;
use petal::net::SessionState;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Notify;

mod common;

use common::{start_server, start_server_with, test_config, wait_until, within, RecordingClassifier};

#[tokio::test]
async fn stop_unblocks_sessions_stuck_in_payload_read() {
    const K: usize = 4;
    let classifier = RecordingClassifier::rose();
    let handle = start_server(classifier.clone()).await;

    let mut clients = Vec::new();
    for _ in 0..K {
        let mut stream = TcpStream::connect(handle.local_addr()).await.unwrap();
        stream.write_all(&1000u64.to_be_bytes()).await.unwrap();
        stream.write_all(&[1u8; 5]).await.unwrap();
        clients.push(stream);
    }

    assert!(
        wait_until(Duration::from_secs(2), || {
            let sessions = handle.registry().snapshot();
            sessions.len() == K && sessions.iter().all(|s| s.state == SessionState::Receiving)
        })
        .await
    );

    let started = Instant::now();
    let report = handle.stop().await;

    assert!(started.elapsed() < Duration::from_secs(1) + Duration::from_millis(700));
    assert_eq!(report.closed_sessions, K);
    assert_eq!(report.joined, K);
    assert_eq!(report.aborted, 0);
    assert!(handle.registry().is_empty());
    assert_eq!(handle.run_state(), RunState::Stopped);
    assert_eq!(classifier.calls(), 0);

    for mut client in clients {
        let mut rest = Vec::new();
        let read = within(Duration::from_secs(2), client.read_to_end(&mut rest)).await;
        assert!(read.is_err() || rest.is_empty());
    }
}

#[tokio::test]
async fn registry_tracks_open_sockets() {
    let handle = start_server(RecordingClassifier::rose()).await;

    let idle: Vec<TcpStream> = {
        let mut streams = Vec::new();
        for _ in 0..3 {
            streams.push(TcpStream::connect(handle.local_addr()).await.unwrap());
        }
        streams
    };
    assert!(wait_until(Duration::from_secs(2), || handle.registry().len() == 3).await);

    drop(idle);
    assert!(wait_until(Duration::from_secs(2), || handle.registry().is_empty()).await);

    handle.stop().await;
}

#[tokio::test]
async fn stop_during_classification_closes_the_session() {
    let entered = Arc::new(Notify::new());
    let release = Arc::new(std::sync::Mutex::new(()));
    let held = release.lock().unwrap();

    let classifier = {
        let entered = Arc::clone(&entered);
        let release = Arc::clone(&release);
        RecordingClassifier::new(move |_: &[u8]| -> Result<Labels, ClassificationError> {
            entered.notify_one();
            let _wait = release.lock();
            Ok(Labels::new("rose", "장미"))
        })
    };

    let mut config = test_config();
    config.shutdown.join_timeout_ms = 500;
    let handle = start_server_with(config, classifier.clone()).await;

    let mut stream = TcpStream::connect(handle.local_addr()).await.unwrap();
    stream.write_all(&petal::protocol::encode(b"image")).await.unwrap();
    within(Duration::from_secs(2), entered.notified()).await;

    let report = within(Duration::from_secs(3), handle.stop()).await;
    assert_eq!(report.closed_sessions, 1);
    assert!(handle.registry().is_empty());
    drop(held);

    let mut rest = Vec::new();
    let read = within(Duration::from_secs(2), stream.read_to_end(&mut rest)).await;
    assert!(read.is_err() || rest.is_empty());
}

#[tokio::test]
async fn stop_is_idempotent() {
    let handle = start_server(RecordingClassifier::rose()).await;
    assert_eq!(handle.run_state(), RunState::Running);

    handle.stop().await;
    let second = handle.stop().await;

    assert_eq!(second.closed_sessions, 0);
    assert_eq!(handle.run_state(), RunState::Stopped);
}
