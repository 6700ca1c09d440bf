/*!
 * Session tests: intents in, events out, against an in-memory store
 */

use s3nav::core::navigator::{LargeFolderChoice, NavigationConfig, NavigationSnapshot, Status};
use s3nav::core::session::{Intent, Session, SessionEvent, SessionHandle};
use s3nav::core::{Entry, EntryKind, Location};
use s3nav::protocol::s3::{MemoryStore, S3Error, StoreOp};
use std::fs;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn config() -> NavigationConfig {
    NavigationConfig {
        large_folder_threshold: 10,
        folders_only_page_size: 5,
        first_items_page_size: 10,
        ..Default::default()
    }
}

fn settled(events: &[SessionEvent]) -> NavigationSnapshot {
    match events.last() {
        Some(SessionEvent::Snapshot(snapshot)) => snapshot.clone(),
        other => panic!("expected a snapshot last, got {:?}", other),
    }
}

async fn request(handle: &mut SessionHandle, intent: Intent) -> Vec<SessionEvent> {
    handle.send(intent).await.unwrap();
    handle.recv_until_settled().await.unwrap()
}

#[tokio::test]
async fn test_large_folder_prompt_and_load_more() {
    let store = MemoryStore::new();
    for i in 0..15 {
        store.add_object("big", format!("k{:02}", i), b"");
    }
    let (mut handle, _task) = Session::spawn(Arc::new(store), config());

    let events = request(&mut handle, Intent::Open(Location::bucket("big"))).await;
    assert!(events
        .iter()
        .any(|e| matches!(e, SessionEvent::LargeFolder(p) if p.estimate == 15)));
    let snapshot = settled(&events);
    assert!(snapshot.prompt.is_some());
    assert_eq!(snapshot.status, Status::Idle);

    let snapshot = settled(
        &request(
            &mut handle,
            Intent::Choose(LargeFolderChoice::FirstItems),
        )
        .await,
    );
    assert!(snapshot.prompt.is_none());
    assert_eq!(snapshot.entries.len(), 12);
    let more = snapshot.entries.len() - 1;
    assert_eq!(snapshot.entries[more].kind(), EntryKind::LoadMore);

    let snapshot = settled(&request(&mut handle, Intent::Select(more)).await);
    assert_eq!(snapshot.entries.len(), 16);
    assert!(snapshot.entries.iter().all(|e| e.kind() != EntryKind::LoadMore));
}

#[tokio::test]
async fn test_dismissed_prompt_keeps_previous_listing() {
    let store = MemoryStore::new();
    store.add_object("small", "a", b"");
    for i in 0..15 {
        store.add_object("big", format!("k{:02}", i), b"");
    }
    let (mut handle, _task) = Session::spawn(Arc::new(store), config());

    let before = settled(&request(&mut handle, Intent::Connect).await);
    let events = request(&mut handle, Intent::Select(0)).await;
    assert!(matches!(events[0], SessionEvent::Snapshot(_)));
    assert!(settled(&events).prompt.is_some());

    handle.send(Intent::Dismiss).await.unwrap();
    let after = settled(&handle.recv_until_settled().await.unwrap());
    assert!(after.prompt.is_none());
    assert_eq!(after.location, before.location);
    assert_eq!(after.entries, before.entries);
}

#[tokio::test]
async fn test_busy_navigator_rejects_second_selection() {
    let store = MemoryStore::new();
    store.add_object("a", "x", b"");
    store.add_object("b", "y", b"");
    let (mut handle, _task) = Session::spawn(Arc::new(store.clone()), config());
    request(&mut handle, Intent::Connect).await;

    store.set_latency(Duration::from_millis(200));
    handle.send(Intent::Select(0)).await.unwrap();
    handle.send(Intent::Select(1)).await.unwrap();

    let events = handle.recv_until_settled().await.unwrap();
    let busy = events
        .iter()
        .any(|e| matches!(e, SessionEvent::Error(message) if message.contains("in progress")));
    assert!(busy);
    assert_eq!(settled(&events).location, Location::bucket("a"));
}

#[tokio::test]
async fn test_auth_failure_disconnects() {
    let store = MemoryStore::new();
    store.add_object("b", "k", b"");
    let (mut handle, _task) = Session::spawn(Arc::new(store.clone()), config());
    request(&mut handle, Intent::Connect).await;

    store.fail_next(
        StoreOp::ListObjects,
        S3Error::Service {
            code: "InvalidAccessKeyId".to_string(),
            message: "bad key".to_string(),
        },
    );
    let events = request(&mut handle, Intent::Select(0)).await;
    let snapshot = settled(&events);
    assert!(!snapshot.connected);
    assert!(matches!(snapshot.status, Status::Error(_)));

    let snapshot = settled(&request(&mut handle, Intent::Connect).await);
    assert!(snapshot.connected);
    assert_eq!(snapshot.entries, vec![Entry::bucket("b")]);
}

#[tokio::test]
async fn test_upload_progress_precedes_report() {
    let temp = TempDir::new().unwrap();
    let sources: Vec<_> = ["a.txt", "b.txt", "c.txt"]
        .iter()
        .map(|name| {
            let path = temp.path().join(name);
            fs::write(&path, name).unwrap();
            path
        })
        .collect();

    let store = MemoryStore::new();
    store.create_bucket("drop");
    let (mut handle, _task) = Session::spawn(Arc::new(store.clone()), config());
    request(&mut handle, Intent::Open(Location::new("drop", "in/"))).await;

    handle.send(Intent::Upload(sources)).await.unwrap();
    let mut completed = Vec::new();
    let report = loop {
        match handle.next_event().await.unwrap() {
            SessionEvent::UploadProgress(progress) => completed.push(progress.completed),
            SessionEvent::UploadFinished(report) => break report,
            _ => {}
        }
    };
    assert_eq!(completed, vec![1, 2, 3]);
    assert_eq!(report.succeeded, 3);

    let snapshot = settled(&handle.recv_until_settled().await.unwrap());
    assert_eq!(snapshot.entries.len(), 4);
    assert!(store.get_object("drop", "in/b.txt").is_some());
}

#[tokio::test]
async fn test_upload_at_root_is_rejected() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("a.txt");
    fs::write(&file, b"a").unwrap();

    let (mut handle, _task) = Session::spawn(Arc::new(MemoryStore::new()), config());
    handle.send(Intent::Upload(vec![file])).await.unwrap();

    match handle.next_event().await.unwrap() {
        SessionEvent::Error(message) => assert!(message.contains("no destination")),
        other => panic!("expected an error, got {:?}", other),
    }
}
