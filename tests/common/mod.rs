//! Shared utilities for integration tests.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use petal::classify::{ClassificationError, Classifier, Labels};
use petal::config::PetalConfig;
use petal::{Sender, Server, ServerHandle};

/// Config bound to an ephemeral loopback port with short ticks.
pub fn test_config() -> PetalConfig {
    let mut config = PetalConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.listener.accept_timeout_ms = 100;
    config.shutdown.join_timeout_ms = 1000;
    config.sender.response_timeout_ms = 5000;
    config
}

/// Classifier that records every call and answers via `label_fn`.
pub struct RecordingClassifier {
    calls: AtomicUsize,
    sizes: Mutex<Vec<usize>>,
    label_fn: Box<dyn Fn(&[u8]) -> Result<Labels, ClassificationError> + Send + Sync>,
}

impl RecordingClassifier {
    pub fn new<F>(label_fn: F) -> Arc<Self>
    where
        F: Fn(&[u8]) -> Result<Labels, ClassificationError> + Send + Sync + 'static,
    {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            sizes: Mutex::new(Vec::new()),
            label_fn: Box::new(label_fn),
        })
    }

    /// Always answers rose / 장미.
    pub fn rose() -> Arc<Self> {
        Self::new(|_| Ok(Labels::new("rose", "장미")))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    #[allow(dead_code)]
    pub fn sizes(&self) -> Vec<usize> {
        self.sizes.lock().unwrap().clone()
    }
}

impl Classifier for RecordingClassifier {
    fn classify(&self, image: &[u8]) -> Result<Labels, ClassificationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.sizes.lock().unwrap().push(image.len());
        (self.label_fn)(image)
    }
}

/// Bind and start a receiver with `config`.
#[allow(dead_code)]
pub async fn start_server_with(config: PetalConfig, classifier: Arc<dyn Classifier>) -> ServerHandle {
    Server::bind(config, classifier).await.unwrap().start()
}

/// Bind and start a receiver with the default test config.
#[allow(dead_code)]
pub async fn start_server(classifier: Arc<dyn Classifier>) -> ServerHandle {
    start_server_with(test_config(), classifier).await
}

/// Sender aimed at `handle` using the test config.
#[allow(dead_code)]
pub fn sender_for(handle: &ServerHandle) -> (Sender, String) {
    (Sender::from_config(&test_config()), handle.local_addr().to_string())
}

/// Poll `condition` until it holds or `timeout` passes.
#[allow(dead_code)]
pub async fn wait_until<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

/// Run `fut` and fail the test if it takes longer than `limit`.
#[allow(dead_code)]
pub async fn within<T>(limit: Duration, fut: impl Future<Output = T>) -> T {
    tokio::time::timeout(limit, fut)
        .await
        .expect("operation did not finish in time")
}
