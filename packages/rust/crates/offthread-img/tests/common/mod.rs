//! Shared test doubles for offthread-img.
//!
//! Fetcher, decoder and painter fakes that record what the coordinator asked
//! of them, plus polling helpers for asynchronous status changes.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use offthread_img::{
    Bitmap, Collaborators, CoordinatorConfig, DecodeError, Decoder, FetchError, Fetcher,
    ImageConsumer, PaintError, PaintTarget, Painter, ResourceIdentity, Status, WorkerCoordinator,
};
use tokio::sync::watch;

/// Canned behavior for one URL.
#[derive(Debug, Clone)]
pub enum Response {
    Body(Vec<u8>),
    Status(u16),
    Panic,
}

/// Fetcher that records calls and can hold every fetch, or single URLs,
/// behind a gate.
pub struct FakeFetcher {
    gate: watch::Sender<bool>,
    holds: Mutex<HashMap<String, watch::Sender<bool>>>,
    responses: Mutex<HashMap<String, Response>>,
    calls: Mutex<Vec<String>>,
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl FakeFetcher {
    /// Fetches complete immediately.
    pub fn open() -> Arc<Self> {
        Arc::new(Self::with_gate(true))
    }

    /// Fetches block until [`FakeFetcher::release`].
    pub fn gated() -> Arc<Self> {
        Arc::new(Self::with_gate(false))
    }

    fn with_gate(open: bool) -> Self {
        let (gate, _) = watch::channel(open);
        Self {
            gate,
            holds: Mutex::new(HashMap::new()),
            responses: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    pub fn release(&self) {
        self.gate.send_replace(true);
    }

    /// Fetches of `url` block until [`FakeFetcher::release_url`].
    pub fn hold(&self, url: &str) {
        let (gate, _) = watch::channel(false);
        self.holds.lock().unwrap().insert(url.to_string(), gate);
    }

    pub fn release_url(&self, url: &str) {
        if let Some(gate) = self.holds.lock().unwrap().get(url) {
            gate.send_replace(true);
        }
    }

    pub fn respond(&self, url: &str, response: Response) {
        self.responses
            .lock()
            .unwrap()
            .insert(url.to_string(), response);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, url: &str) -> usize {
        self.calls().iter().filter(|call| *call == url).count()
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher for FakeFetcher {
    async fn fetch(&self, identity: &ResourceIdentity) -> Result<Vec<u8>, FetchError> {
        let url = identity.as_str().to_string();
        self.calls.lock().unwrap().push(url.clone());
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        let mut gate = self.gate.subscribe();
        let _ = gate.wait_for(|open| *open).await;
        let hold = self.holds.lock().unwrap().get(&url).map(watch::Sender::subscribe);
        if let Some(mut hold) = hold {
            let _ = hold.wait_for(|open| *open).await;
        }
        self.active.fetch_sub(1, Ordering::SeqCst);

        let response = self.responses.lock().unwrap().get(&url).cloned();
        match response {
            None => Ok(url.into_bytes()),
            Some(Response::Body(bytes)) => Ok(bytes),
            Some(Response::Status(status)) => Err(FetchError::Status { url, status }),
            Some(Response::Panic) => panic!("fetcher exploded on {url}"),
        }
    }
}

/// Decodes any non-empty body into a 1x1 bitmap; `b"corrupt"` is rejected.
#[derive(Default)]
pub struct FakeDecoder {
    pub decoded: AtomicUsize,
}

#[async_trait]
impl Decoder for FakeDecoder {
    async fn decode(&self, bytes: Vec<u8>) -> Result<Bitmap, DecodeError> {
        if bytes.is_empty() {
            return Err(DecodeError::Empty);
        }
        if bytes == b"corrupt" {
            return Err(DecodeError::Malformed("bad header".to_string()));
        }
        self.decoded.fetch_add(1, Ordering::SeqCst);
        let shade = bytes[0];
        Ok(Bitmap::from_rgba8(1, 1, vec![shade, shade, shade, 255]).unwrap())
    }
}

/// Records `(target, bitmap address)` per paint; fails for chosen targets and
/// can hold every paint behind a gate.
pub struct RecordingPainter {
    gate: watch::Sender<bool>,
    started: AtomicUsize,
    painted: Mutex<Vec<(String, usize)>>,
    broken: Mutex<Vec<String>>,
}

impl Default for RecordingPainter {
    fn default() -> Self {
        let (gate, _) = watch::channel(true);
        Self {
            gate,
            started: AtomicUsize::new(0),
            painted: Mutex::new(Vec::new()),
            broken: Mutex::new(Vec::new()),
        }
    }
}

impl RecordingPainter {
    /// Paints block until [`RecordingPainter::unblock`].
    pub fn block(&self) {
        self.gate.send_replace(false);
    }

    pub fn unblock(&self) {
        self.gate.send_replace(true);
    }

    /// Paint calls entered so far, finished or not.
    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    pub fn break_target(&self, target: &str) {
        self.broken.lock().unwrap().push(target.to_string());
    }

    pub fn painted(&self) -> Vec<(String, usize)> {
        self.painted.lock().unwrap().clone()
    }

    pub fn painted_targets(&self) -> Vec<String> {
        self.painted().into_iter().map(|(target, _)| target).collect()
    }
}

#[async_trait]
impl Painter for RecordingPainter {
    async fn paint(&self, bitmap: Arc<Bitmap>, target: &PaintTarget) -> Result<(), PaintError> {
        self.started.fetch_add(1, Ordering::SeqCst);
        let mut gate = self.gate.subscribe();
        let _ = gate.wait_for(|open| *open).await;
        if self.broken.lock().unwrap().iter().any(|t| t == target.as_str()) {
            return Err(PaintError::Target {
                target: target.to_string(),
                reason: "surface detached".to_string(),
            });
        }
        let address = Arc::as_ptr(&bitmap) as usize;
        self.painted
            .lock()
            .unwrap()
            .push((target.to_string(), address));
        Ok(())
    }
}

/// Coordinator wired to the given fakes.
pub struct Harness {
    pub coordinator: Arc<WorkerCoordinator>,
    pub fetcher: Arc<FakeFetcher>,
    pub decoder: Arc<FakeDecoder>,
    pub painter: Arc<RecordingPainter>,
}

impl Harness {
    pub fn start(fetcher: Arc<FakeFetcher>, config: CoordinatorConfig) -> Self {
        let decoder = Arc::new(FakeDecoder::default());
        let painter = Arc::new(RecordingPainter::default());
        let coordinator = WorkerCoordinator::start(
            Collaborators::new(fetcher.clone(), decoder.clone(), painter.clone()),
            config,
        )
        .expect("coordinator should start");
        Self {
            coordinator,
            fetcher,
            decoder,
            painter,
        }
    }

    pub fn with_concurrency(fetcher: Arc<FakeFetcher>, max_concurrency: usize) -> Self {
        Self::start(
            fetcher,
            CoordinatorConfig {
                max_concurrency,
                ..CoordinatorConfig::default()
            },
        )
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators::new(
            self.fetcher.clone(),
            self.decoder.clone(),
            self.painter.clone(),
        )
    }
}

pub fn consumer(target: &str) -> Arc<ImageConsumer> {
    ImageConsumer::new(PaintTarget::new(target))
}

pub fn url(name: &str) -> String {
    format!("https://img.test/{name}.png")
}

/// Every status a consumer passes through from now on.
pub fn record_statuses(consumer: &ImageConsumer) -> Arc<Mutex<Vec<Status>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    consumer.on_status_change(move |change| sink.lock().unwrap().push(change.current));
    seen
}

/// Poll `condition` until it holds, failing the test after 5 seconds.
pub async fn wait_until(what: &str, mut condition: impl FnMut() -> bool) {
    let polled = tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(polled.is_ok(), "timed out waiting for {what}");
}

pub async fn wait_for_status(consumer: &ImageConsumer, status: Status) {
    wait_until(&format!("consumer {} to reach {status}", consumer.id()), || {
        consumer.status() == status
    })
    .await;
}

/// Whether `statuses` only move forward, restarting at `LoadStarted`.
pub fn moves_forward(statuses: &[Status]) -> bool {
    statuses
        .windows(2)
        .all(|pair| pair[1] == Status::LoadStarted || pair[1] > pair[0])
}

/// Give spawned tasks a chance to run.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(30)).await;
}
