//! Architectural Contract Test: Shutdown Determinism
//!
//! This test verifies that shutdown is deterministic and complete.
//!
//! Constraints verified:
//! - Consumer terminates on shutdown signal while idle on a connection
//! - Consumer terminates on shutdown signal while backing off
//! - The registry is flushed before exit
//! - A Stopped event is the last thing emitted
//!
//! If this test fails, someone has added:
//! - Reads or sleeps that ignore the shutdown signal
//! - Detached background tasks
//! - A shutdown path that skips the flush

mod common;

use common::*;
use linkmirror_core::config::StreamConfig;
use linkmirror_core::{ConsumerEvent, LiveConsumer};
use std::sync::Arc;

#[tokio::test]
async fn shutdown_signal_terminates_idle_consumer() {
    let (classifier, _store) = mock_classifier();
    let (consumer, mut rx) = LiveConsumer::new(
        TRACKED,
        Arc::new(FixedResolver::new(Some(42))),
        Arc::new(ScriptedStreamSource::single(Vec::new())),
        classifier,
        Arc::new(RecordingMirror::new()),
        test_stream_config(0),
    )
    .unwrap();

    let (shutdown_tx, handle) = spawn_consumer(consumer);
    wait_for_event(&mut rx, |e| matches!(e, ConsumerEvent::Connected { .. })).await;

    assert!(shutdown_tx.send(()).is_ok(), "shutdown signal send succeeds");
    tokio_test::assert_ok!(join_consumer(handle).await);

    let remaining = drain_events(&mut rx);
    assert!(
        matches!(remaining.last(), Some(ConsumerEvent::Stopped { .. })),
        "Stopped should be the final event: {:?}",
        remaining
    );
}

#[tokio::test]
async fn shutdown_flushes_registry() {
    let (classifier, store) = mock_classifier();
    let post = tracked_post(10, "story", &["example.com/e/a"]);
    let (consumer, mut rx) = LiveConsumer::new(
        TRACKED,
        Arc::new(FixedResolver::new(Some(42))),
        Arc::new(ScriptedStreamSource::single(vec![status_line(&post)])),
        classifier,
        Arc::new(RecordingMirror::new()),
        test_stream_config(0),
    )
    .unwrap();

    let (shutdown_tx, handle) = spawn_consumer(consumer);
    wait_for_event(&mut rx, |e| matches!(e, ConsumerEvent::PostMirrored { .. })).await;
    assert_eq!(store.flush_call_count(), 0);

    let _ = shutdown_tx.send(());
    join_consumer(handle).await.unwrap();

    assert_eq!(store.flush_call_count(), 1, "flush() must be called on shutdown");
}

#[tokio::test]
async fn shutdown_interrupts_backoff() {
    let (classifier, _store) = mock_classifier();
    let stream = StreamConfig {
        max_reconnects: 5,
        initial_backoff_secs: 3600,
        max_backoff_secs: 3600,
        event_channel_capacity: 100,
    };
    let (consumer, mut rx) = LiveConsumer::new(
        TRACKED,
        Arc::new(FixedResolver::new(Some(42))),
        Arc::new(ScriptedStreamSource::new(Vec::new())),
        classifier,
        Arc::new(RecordingMirror::new()),
        stream,
    )
    .unwrap();

    let (shutdown_tx, handle) = spawn_consumer(consumer);
    // First connect fails; the consumer is now sleeping for an hour
    wait_for_event(&mut rx, |e| matches!(e, ConsumerEvent::Disconnected { .. })).await;

    let _ = shutdown_tx.send(());
    tokio_test::assert_ok!(join_consumer(handle).await);
}

#[tokio::test]
async fn dropped_shutdown_sender_stops_consumer() {
    let (classifier, store) = mock_classifier();
    let (consumer, _rx) = LiveConsumer::new(
        TRACKED,
        Arc::new(FixedResolver::new(Some(42))),
        Arc::new(ScriptedStreamSource::single(Vec::new())),
        classifier,
        Arc::new(RecordingMirror::new()),
        test_stream_config(0),
    )
    .unwrap();

    let (shutdown_tx, handle) = spawn_consumer(consumer);
    drop(shutdown_tx);

    tokio_test::assert_ok!(join_consumer(handle).await);
    assert_eq!(store.flush_call_count(), 1);
}
