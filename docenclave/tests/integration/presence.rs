//! Presence tracking across several clients of one store.

use docenclave::clock::{Clock, ManualClock};
use docenclave::config::PresenceConfig;
use docenclave::presence::PresenceTracker;
use docenclave::store::{InMemoryStore, OfflineStore, RemoteStore};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

async fn client(store: &InMemoryStore, clock: &Arc<ManualClock>) -> Arc<PresenceTracker> {
    let store: Arc<dyn RemoteStore> = Arc::new(store.clone());
    let clock: Arc<dyn Clock> = clock.clone();
    Arc::new(PresenceTracker::start(store, clock, PresenceConfig::default()).await)
}

#[tokio::test]
async fn test_clients_see_each_other() {
    let store = InMemoryStore::new();
    let clock = Arc::new(ManualClock::default());
    let first = client(&store, &clock).await;
    let second = client(&store, &clock).await;

    let a = first.register_active_session().await.unwrap();
    let b = second.register_active_session().await.unwrap();

    assert_ne!(a.session_id(), b.session_id());
    assert_eq!(first.active_count(), Some(2));
    assert_eq!(second.active_count(), Some(2));

    a.release().await.unwrap();
    assert_eq!(second.active_count(), Some(1));
    assert_eq!(store.presence_records().len(), 1);
}

#[tokio::test]
async fn test_stale_session_expires_and_subscribers_follow() {
    let store = InMemoryStore::new();
    let clock = Arc::new(ManualClock::default());
    let watcher = client(&store, &clock).await;
    let other = client(&store, &clock).await;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let _subscription = watcher.subscribe_active_count(move |count| {
        let _ = tx.send(count);
    });
    assert_eq!(rx.recv().await, Some(Some(0)));

    let abandoned = other.register_active_session().await.unwrap();
    let alive = watcher.register_active_session().await.unwrap();
    assert_eq!(watcher.active_count(), Some(2));

    // The abandoned client stops renewing; the live one keeps beating.
    drop(abandoned);
    clock.advance(Duration::from_secs(200));
    alive.heartbeat().await.unwrap();
    clock.advance(Duration::from_secs(150));

    assert_eq!(watcher.cleanup_stale().await.unwrap(), 1);
    assert_eq!(other.cleanup_stale().await.unwrap(), 0);

    let records = store.presence_records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].session_id, alive.session_id());

    let mut last = None;
    while last != Some(Some(1)) {
        last = rx.recv().await;
    }
    assert_eq!(watcher.active_count(), Some(1));
}

#[tokio::test]
async fn test_fresh_session_survives_cleanup() {
    let store = InMemoryStore::new();
    let clock = Arc::new(ManualClock::default());
    let tracker = client(&store, &clock).await;

    let _session = tracker.register_active_session().await.unwrap();
    clock.advance(Duration::from_secs(299));

    assert_eq!(tracker.cleanup_stale().await.unwrap(), 0);
    assert_eq!(tracker.active_count(), Some(1));
}

#[tokio::test]
async fn test_store_loss_disables_presence() {
    let store = InMemoryStore::new();
    let clock = Arc::new(ManualClock::default());
    let tracker = client(&store, &clock).await;

    store.set_online(false);
    assert!(tracker.register_active_session().await.is_none());
    assert!(!tracker.is_enabled());
    assert_eq!(tracker.active_count(), None);
    assert_eq!(tracker.cleanup_stale().await.unwrap(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_store_loss_mid_session_stops_reporting_counts() {
    let store = InMemoryStore::new();
    let clock = Arc::new(ManualClock::default());
    let tracker = client(&store, &clock).await;
    let session = tracker.register_active_session().await.unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel();
    let _subscription = tracker.subscribe_active_count(move |count| {
        let _ = tx.send(count);
    });
    assert_eq!(rx.recv().await, Some(Some(1)));

    let cleanup = tracker.spawn_cleanup(Duration::from_secs(60));
    store.set_online(false);
    tokio::time::sleep(Duration::from_secs(61)).await;

    assert_eq!(rx.recv().await, Some(None));
    assert!(!tracker.is_enabled());
    assert_eq!(tracker.active_count(), None);

    cleanup.stop();
    session.release().await.unwrap();
}

#[tokio::test]
async fn test_offline_tracker_reports_unknown() {
    let tracker = PresenceTracker::start(
        Arc::new(OfflineStore),
        Arc::new(ManualClock::default()),
        PresenceConfig::default(),
    )
    .await;

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let subscription = tracker.subscribe_active_count(move |count| sink.lock().push(count));
    assert!(!subscription.is_active());
    drop(subscription);

    assert_eq!(*seen.lock(), vec![None]);
    assert!(tracker.register_active_session().await.is_none());
}
