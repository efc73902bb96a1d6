mod common;

use std::time::Duration;

use common::Harness;
use quire_core::body::{Block, Body};
use quire_core::config::SessionConfig;
use quire_core::report::ErrorKind;
use quire_core::session::{CloseDecision, Session};
use quire_core::storage::{DocumentStore, Error, FsStore, INTERNAL_DIR_NAME};
use tempfile::tempdir;

fn fast() -> SessionConfig {
    SessionConfig::default()
        .with_quiet_period(Duration::from_millis(50))
        .with_grace_delay(Duration::from_millis(10))
}

async fn open(harness: &Harness<FsStore>, id: &str) -> Session {
    Session::open(id, harness.context().with_config(fast()))
        .await
        .expect("session should open")
}

#[tokio::test]
async fn integration_create_and_open_workspace() {
    let dir = tempdir().unwrap();
    let ws_path = dir.path().join("my_integration_ws");

    let created = FsStore::create(&ws_path).await.expect("Failed to create workspace");
    assert!(created.path().join(INTERNAL_DIR_NAME).is_dir());

    let opened = FsStore::open(&ws_path).await.expect("Failed to open existing workspace");
    assert_eq!(opened.path(), created.path());

    let result = FsStore::open(dir.path().join("non_existent_ws")).await;
    assert!(matches!(result, Err(Error::DirectoryNotFound(_))));
}

#[tokio::test]
async fn edits_are_persisted_through_debounced_saves() {
    let dir = tempdir().unwrap();
    let store = FsStore::create(dir.path().join("ws")).await.unwrap();
    let doc = store.create_document("Groceries").await.unwrap();
    let harness = Harness::new(store);

    let session = open(&harness, &doc.id).await;
    assert!(harness.store.get_document(&doc.id).await.unwrap().is_open);

    session.edit_title("Weekly groceries");
    session.edit_body(Body::new(vec![Block::heading(1, "Produce"), Block::paragraph("apples")]));
    tokio::time::sleep(Duration::from_millis(300)).await;

    let stored = harness.store.get_document(&doc.id).await.unwrap();
    assert_eq!(stored.title, "Weekly groceries");
    assert_eq!(stored.text_content, "Produce\n\napples");
    assert_eq!(Body::from_structured(&stored.structured_content).unwrap(), session.body());
    assert!(!session.dirty_state().is_any());

    assert_eq!(session.request_close(), CloseDecision::Proceed);
    session.closed().await;
    assert!(!harness.store.get_document(&doc.id).await.unwrap().is_open);
}

#[tokio::test]
async fn duplicate_title_is_reverted() {
    let dir = tempdir().unwrap();
    let store = FsStore::create(dir.path().join("ws")).await.unwrap();
    store.create_document("Taken").await.unwrap();
    let doc = store.create_document("Mine").await.unwrap();
    let harness = Harness::new(store);

    let session = open(&harness, &doc.id).await;
    session.edit_title("  taken ");
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert_eq!(session.title(), "Mine");
    assert_eq!(harness.reporter.kinds(), vec![ErrorKind::Conflict]);
    assert_eq!(harness.store.get_document(&doc.id).await.unwrap().title, "Mine");
}

#[tokio::test]
async fn close_with_unsaved_edits_flushes_to_disk() {
    let dir = tempdir().unwrap();
    let store = FsStore::create(dir.path().join("ws")).await.unwrap();
    let doc = store.create_document("Draft").await.unwrap();
    let harness = Harness::new(store);

    let session = open(&harness, &doc.id).await;
    session.edit_title("Final");
    session.edit_body(Body::from_plain_text("last words"));

    assert_eq!(session.request_close(), CloseDecision::Suppressed);
    session.closed().await;
    assert_eq!(harness.window.closed(), 1);

    // A fresh store instance sees everything.
    let reopened = FsStore::open(harness.store.path()).await.unwrap();
    let stored = reopened.get_document(&doc.id).await.unwrap();
    assert_eq!(stored.title, "Final");
    assert_eq!(stored.text_content, "last words");
    assert!(!stored.is_open);
    assert!(harness.reporter.reports().is_empty());
}
