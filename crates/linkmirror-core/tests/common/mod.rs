//! Test doubles and common utilities for architecture contract tests
//!
//! This module provides minimal test doubles that verify architectural
//! constraints without talking to a real platform.

#![allow(dead_code)]

use linkmirror_core::config::StreamConfig;
use linkmirror_core::error::{Error, Result};
use linkmirror_core::store::MemoryLinkStore;
use linkmirror_core::traits::{
    HistorySearch, IdentityResolver, IncomingPost, LineStream, LinkStore, MirrorAction,
    MirrorOutcome, StreamSource, TrackedLink,
};
use linkmirror_core::{Classifier, ConsumerEvent, LiveConsumer, UrlRegistry};
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;

pub const TRACKED: &str = "verge";
pub const PREFIX: &str = "example.com/e/";

/// Serialize a post the way the live stream delivers it
pub fn status_line(post: &IncomingPost) -> String {
    serde_json::to_string(post).expect("post serializes")
}

/// A post from the tracked account carrying `links`
pub fn tracked_post(id: u64, text: &str, links: &[&str]) -> IncomingPost {
    links
        .iter()
        .fold(IncomingPost::new(id, TRACKED, text), |post, link| {
            post.with_link(*link)
        })
}

/// A LinkStore that delegates to MemoryLinkStore and counts calls
pub struct MockLinkStore {
    inner: MemoryLinkStore,
    upsert_call_count: Arc<AtomicUsize>,
    flush_call_count: Arc<AtomicUsize>,
    /// When set, every call fails as if storage were unreachable
    unavailable: Arc<AtomicBool>,
}

impl MockLinkStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryLinkStore::new(chrono::Duration::hours(72)),
            upsert_call_count: Arc::new(AtomicUsize::new(0)),
            flush_call_count: Arc::new(AtomicUsize::new(0)),
            unavailable: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn upsert_call_count(&self) -> usize {
        self.upsert_call_count.load(Ordering::SeqCst)
    }

    pub fn flush_call_count(&self) -> usize {
        self.flush_call_count.load(Ordering::SeqCst)
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(Error::store("storage unavailable"))
        } else {
            Ok(())
        }
    }
}

#[async_trait::async_trait]
impl LinkStore for MockLinkStore {
    async fn find(&self, url: &str) -> Result<Option<TrackedLink>> {
        self.check_available()?;
        self.inner.find(url).await
    }

    async fn upsert(&self, record: &TrackedLink) -> Result<()> {
        self.check_available()?;
        self.upsert_call_count.fetch_add(1, Ordering::SeqCst);
        self.inner.upsert(record).await
    }

    async fn purge_expired(&self) -> Result<usize> {
        self.check_available()?;
        self.inner.purge_expired().await
    }

    async fn list_urls(&self) -> Result<Vec<String>> {
        self.check_available()?;
        self.inner.list_urls().await
    }

    async fn flush(&self) -> Result<()> {
        self.flush_call_count.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        self.inner.flush().await
    }

    fn retention(&self) -> chrono::Duration {
        self.inner.retention()
    }
}

/// Classifier over a fresh MockLinkStore
pub fn mock_classifier() -> (Arc<Classifier>, Arc<MockLinkStore>) {
    let store = Arc::new(MockLinkStore::new());
    let registry = Arc::new(UrlRegistry::new(store.clone()));
    (Arc::new(Classifier::new(registry, PREFIX)), store)
}

/// History search over a fixed list of posts
pub struct ScriptedHistory {
    /// Newest first
    posts: Vec<IncomingPost>,
    /// `max_id` of every call, in order
    cursors: std::sync::Mutex<Vec<Option<u64>>>,
    /// Queries received
    queries: std::sync::Mutex<Vec<String>>,
}

impl ScriptedHistory {
    pub fn new(mut posts: Vec<IncomingPost>) -> Self {
        posts.sort_by(|a, b| b.id.cmp(&a.id));
        Self {
            posts,
            cursors: std::sync::Mutex::new(Vec::new()),
            queries: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn cursors(&self) -> Vec<Option<u64>> {
        self.cursors.lock().unwrap().clone()
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl HistorySearch for ScriptedHistory {
    async fn search(
        &self,
        query: &str,
        max_id: Option<u64>,
        page_size: usize,
    ) -> Result<Vec<IncomingPost>> {
        self.cursors.lock().unwrap().push(max_id);
        self.queries.lock().unwrap().push(query.to_string());

        Ok(self
            .posts
            .iter()
            .filter(|post| max_id.is_none_or(|max| post.id <= max))
            .take(page_size)
            .cloned()
            .collect())
    }
}

/// A history search that always fails
pub struct FailingHistory;

#[async_trait::async_trait]
impl HistorySearch for FailingHistory {
    async fn search(&self, _: &str, _: Option<u64>, _: usize) -> Result<Vec<IncomingPost>> {
        Err(Error::http("connection refused"))
    }
}

/// Resolver returning a fixed id and counting calls
pub struct FixedResolver {
    id: Option<u64>,
    call_count: Arc<AtomicUsize>,
}

impl FixedResolver {
    pub fn new(id: Option<u64>) -> Self {
        Self {
            id,
            call_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl IdentityResolver for FixedResolver {
    async fn resolve(&self, _handle: &str) -> Result<Option<u64>> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        Ok(self.id)
    }
}

/// What a scripted connection does after its lines run out
pub enum AfterLines {
    /// Server closes the connection
    Close,
    /// Connection fails with a stream error
    Fail,
    /// Connection stays open, idle
    Hang,
}

/// One scripted connection
pub struct ScriptedConnection {
    pub lines: Vec<String>,
    pub after: AfterLines,
}

impl ScriptedConnection {
    pub fn new(lines: Vec<String>, after: AfterLines) -> Self {
        Self { lines, after }
    }
}

/// A StreamSource that plays back scripted connections in order
///
/// Once the script runs out, `open` fails with a stream error.
pub struct ScriptedStreamSource {
    connections: std::sync::Mutex<VecDeque<ScriptedConnection>>,
    open_call_count: Arc<AtomicUsize>,
    opened_for: std::sync::Mutex<Vec<u64>>,
}

impl ScriptedStreamSource {
    pub fn new(connections: Vec<ScriptedConnection>) -> Self {
        Self {
            connections: std::sync::Mutex::new(connections.into()),
            open_call_count: Arc::new(AtomicUsize::new(0)),
            opened_for: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// A single connection that delivers `lines` and then idles
    pub fn single(lines: Vec<String>) -> Self {
        Self::new(vec![ScriptedConnection::new(lines, AfterLines::Hang)])
    }

    pub fn open_call_count(&self) -> usize {
        self.open_call_count.load(Ordering::SeqCst)
    }

    pub fn opened_for(&self) -> Vec<u64> {
        self.opened_for.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl StreamSource for ScriptedStreamSource {
    async fn open(&self, user_id: u64) -> Result<LineStream> {
        self.open_call_count.fetch_add(1, Ordering::SeqCst);
        self.opened_for.lock().unwrap().push(user_id);

        let connection = self
            .connections
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| Error::stream("connection refused"))?;

        let lines = tokio_stream::iter(connection.lines.into_iter().map(Ok));
        let stream: LineStream = match connection.after {
            AfterLines::Close => Box::pin(lines),
            AfterLines::Fail => Box::pin(lines.chain(tokio_stream::once(Err(Error::stream(
                "connection reset by peer",
            ))))),
            AfterLines::Hang => Box::pin(lines.chain(tokio_stream::pending())),
        };
        Ok(stream)
    }
}

/// A StreamSource whose single connection is fed by the test
pub struct ControlledStreamSource {
    rx: std::sync::Mutex<Option<mpsc::UnboundedReceiver<String>>>,
}

impl ControlledStreamSource {
    pub fn new() -> (Self, mpsc::UnboundedSender<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                rx: std::sync::Mutex::new(Some(rx)),
            },
            tx,
        )
    }
}

#[async_trait::async_trait]
impl StreamSource for ControlledStreamSource {
    async fn open(&self, _user_id: u64) -> Result<LineStream> {
        let rx = self
            .rx
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| Error::stream("already connected"))?;

        let stream = tokio_stream::wrappers::UnboundedReceiverStream::new(rx).map(Ok);
        Ok(Box::pin(stream))
    }
}

/// A MirrorAction that records the ids it was asked to mirror
pub struct RecordingMirror {
    mirrored: Arc<std::sync::Mutex<Vec<String>>>,
    dry_run: bool,
    fail: Option<fn() -> Error>,
}

impl RecordingMirror {
    pub fn new() -> Self {
        Self {
            mirrored: Arc::new(std::sync::Mutex::new(Vec::new())),
            dry_run: false,
            fail: None,
        }
    }

    pub fn dry_run() -> Self {
        Self {
            dry_run: true,
            ..Self::new()
        }
    }

    pub fn failing() -> Self {
        Self::failing_with(|| Error::http("503 Service Unavailable"))
    }

    pub fn failing_with(error: fn() -> Error) -> Self {
        Self {
            fail: Some(error),
            ..Self::new()
        }
    }

    pub fn mirrored(&self) -> Vec<String> {
        self.mirrored.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.mirrored.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl MirrorAction for RecordingMirror {
    async fn mirror(&self, post_id: &str) -> Result<MirrorOutcome> {
        self.mirrored.lock().unwrap().push(post_id.to_string());
        if let Some(error) = self.fail {
            return Err(error());
        }
        if self.dry_run {
            Ok(MirrorOutcome::DryRun {
                post_id: post_id.to_string(),
            })
        } else {
            Ok(MirrorOutcome::Mirrored {
                post_id: post_id.to_string(),
            })
        }
    }

    fn provider_name(&self) -> &'static str {
        "recording"
    }
}

/// Stream settings for tests: no backoff delay
pub fn test_stream_config(max_reconnects: usize) -> StreamConfig {
    StreamConfig {
        max_reconnects,
        initial_backoff_secs: 0,
        max_backoff_secs: 0,
        event_channel_capacity: 100,
    }
}

/// Wait until an event matching `predicate` arrives, returning every event seen
pub async fn wait_for_event<F>(
    rx: &mut mpsc::Receiver<ConsumerEvent>,
    predicate: F,
) -> Vec<ConsumerEvent>
where
    F: Fn(&ConsumerEvent) -> bool,
{
    let mut seen = Vec::new();
    let result = tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(event) = rx.recv().await {
            let done = predicate(&event);
            seen.push(event);
            if done {
                return;
            }
        }
    })
    .await;

    assert!(result.is_ok(), "timed out waiting for event; saw {:?}", seen);
    seen
}

/// Collect everything left in the channel without waiting
pub fn drain_events(rx: &mut mpsc::Receiver<ConsumerEvent>) -> Vec<ConsumerEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Run `consumer` on a task until the returned sender fires
pub fn spawn_consumer(consumer: LiveConsumer) -> (oneshot::Sender<()>, JoinHandle<Result<()>>) {
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let handle = tokio::spawn(async move {
        consumer
            .listen_until(async {
                let _ = shutdown_rx.await;
            })
            .await
    });
    (shutdown_tx, handle)
}

/// Wait for a consumer task to finish, failing the test if it hangs
pub async fn join_consumer(handle: JoinHandle<Result<()>>) -> Result<()> {
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("consumer should terminate within 5 seconds")
        .expect("consumer task should not panic")
}
