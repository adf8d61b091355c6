//! Architectural Contract Test: Registry Semantics
//!
//! This test verifies the dedup decision made for every post.
//!
//! Constraints verified:
//! - A link seen for the first time is never reported as a duplicate
//! - A link seen again is always reported as a duplicate
//! - Re-processing the same post changes nothing but the timestamp
//! - The earliest post (by numeric id) supplies the first text
//! - All candidate links of a post are recorded, even after a duplicate
//!
//! If this test fails, someone has broken the single source of truth
//! that decides what gets mirrored.

mod common;

use common::*;
use linkmirror_core::traits::{IncomingPost, LinkStore};

#[tokio::test]
async fn first_sighting_is_never_a_duplicate() {
    let (classifier, _store) = mock_classifier();
    let post = tracked_post(10, "hello", &["example.com/e/a"]);

    assert!(!classifier.classify(&post).await.unwrap());
}

#[tokio::test]
async fn second_sighting_is_always_a_duplicate() {
    let (classifier, _store) = mock_classifier();

    classifier
        .classify(&tracked_post(10, "first", &["example.com/e/a"]))
        .await
        .unwrap();
    let again = classifier
        .classify(&tracked_post(11, "second", &["example.com/e/a"]))
        .await
        .unwrap();

    assert!(again, "a link seen before must be reported as duplicate");
}

#[tokio::test]
async fn reprocessing_the_same_post_is_idempotent() {
    let (classifier, _store) = mock_classifier();
    let post = tracked_post(10, "hello", &["example.com/e/a"]);

    classifier.classify(&post).await.unwrap();
    let before = classifier
        .registry()
        .get("example.com/e/a")
        .await
        .unwrap()
        .unwrap();

    // The same post arriving again is reported as seen...
    assert!(classifier.classify(&post).await.unwrap());

    // ...but the record itself does not grow
    let after = classifier
        .registry()
        .get("example.com/e/a")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(after.post_ids, before.post_ids);
    assert_eq!(after.duplicate_count, 0);
    assert_eq!(after.first_text, before.first_text);
    assert!(after.last_update >= before.last_update);
}

#[tokio::test]
async fn first_text_follows_smallest_numeric_id() {
    let (classifier, _store) = mock_classifier();

    for (id, text) in [(5, "five"), (3, "three"), (8, "eight")] {
        classifier
            .classify(&tracked_post(id, text, &["example.com/e/a"]))
            .await
            .unwrap();
    }

    let record = classifier
        .registry()
        .get("example.com/e/a")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.first_text, "three");
    assert_eq!(record.duplicate_count, 2);
    assert_eq!(record.post_ids.len(), 3);
}

#[tokio::test]
async fn every_candidate_link_is_recorded() {
    let (classifier, _store) = mock_classifier();

    classifier
        .classify(&tracked_post(1, "a", &["example.com/e/a"]))
        .await
        .unwrap();

    // A is known, B is not; both must end up in the registry
    let post = tracked_post(2, "a and b", &["example.com/e/a", "example.com/e/b"]);
    assert!(classifier.classify(&post).await.unwrap());

    let b = classifier
        .registry()
        .get("example.com/e/b")
        .await
        .unwrap()
        .expect("second link recorded despite first being a duplicate");
    assert_eq!(b.post_ids, vec!["2".to_string()]);
}

#[tokio::test]
async fn links_outside_the_prefix_are_ignored() {
    let (classifier, store) = mock_classifier();
    let post = IncomingPost::new(1, TRACKED, "elsewhere")
        .with_link("other.example.org/x")
        .with_link("example.com/f/y");

    assert!(!classifier.classify(&post).await.unwrap());
    assert!(store.list_urls().await.unwrap().is_empty());
    assert_eq!(store.upsert_call_count(), 0);
}

#[tokio::test]
async fn storage_failure_surfaces_as_error() {
    let (classifier, store) = mock_classifier();
    store.set_unavailable(true);

    let result = classifier
        .classify(&tracked_post(1, "t", &["example.com/e/a"]))
        .await;

    assert!(result.is_err(), "storage errors must not be swallowed");
}

#[tokio::test]
async fn post_without_candidate_links_never_mutates_registry() {
    let (classifier, store) = mock_classifier();
    let post = IncomingPost::new(1, TRACKED, "just words");

    assert!(!classifier.classify(&post).await.unwrap());
    assert_eq!(store.upsert_call_count(), 0);
}
