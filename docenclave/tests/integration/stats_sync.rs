//! Stats synchronization across clients and across restarts.

use docenclave::config::DEFAULT_STORAGE_KEY;
use docenclave::storage::{FileStorage, KeyValueStorage};
use docenclave::store::{Counter, InMemoryStore, OfflineStore, RemoteStore};
use docenclave::tools::{PDF_MERGE, ToolId};
use docenclave::{StatsSynchronizer, SyncMode};
use futures::future::join_all;
use rand::Rng;
use std::sync::Arc;
use tempfile::TempDir;

async fn connected(store: &InMemoryStore, storage: Arc<dyn KeyValueStorage>) -> StatsSynchronizer {
    let store: Arc<dyn RemoteStore> = Arc::new(store.clone());
    StatsSynchronizer::start(store, storage, DEFAULT_STORAGE_KEY).await
}

async fn offline(storage: Arc<dyn KeyValueStorage>) -> StatsSynchronizer {
    StatsSynchronizer::start(Arc::new(OfflineStore), storage, DEFAULT_STORAGE_KEY).await
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_clients_never_lose_increments() {
    let store = InMemoryStore::new();
    let dir = TempDir::new().unwrap();
    let storage: Arc<dyn KeyValueStorage> = Arc::new(FileStorage::new(dir.path()));

    let mut clients = Vec::new();
    for _ in 0..4 {
        clients.push(Arc::new(connected(&store, Arc::clone(&storage)).await));
    }

    let batches: Vec<Vec<u64>> = {
        let mut rng = rand::thread_rng();
        (0..clients.len())
            .map(|_| (0..50).map(|_| rng.gen_range(1..=5)).collect())
            .collect()
    };
    let expected: u64 = batches.iter().flatten().sum();
    let runs: u64 = batches.iter().map(|batch| batch.len() as u64).sum();

    let tasks = clients.iter().zip(batches).map(|(client, batch)| {
        let client = Arc::clone(client);
        tokio::spawn(async move {
            let tool = ToolId::from(PDF_MERGE);
            for count in batch {
                client.increment_files_processed(count).await.unwrap();
                client.increment_tools_used(1, &tool).await.unwrap();
            }
        })
    });
    for result in join_all(tasks).await {
        result.unwrap();
    }

    let remote = store.snapshot();
    assert_eq!(remote.files_downloaded, expected);
    assert_eq!(remote.tools_used, runs);
    assert_eq!(remote.tool_count(PDF_MERGE), runs);

    for client in &clients {
        assert_eq!(client.current_stats(), remote);
    }
}

#[tokio::test]
async fn test_degraded_counts_survive_restart() {
    let dir = TempDir::new().unwrap();

    {
        let storage: Arc<dyn KeyValueStorage> = Arc::new(FileStorage::new(dir.path()));
        let sync = offline(storage).await;
        assert_eq!(sync.mode(), SyncMode::Degraded);

        sync.record_visit().await.unwrap();
        sync.increment_files_processed(3).await.unwrap();
        sync.increment_tools_used(1, &ToolId::from(PDF_MERGE)).await.unwrap();
    }

    let storage: Arc<dyn KeyValueStorage> = Arc::new(FileStorage::new(dir.path()));
    let sync = offline(storage).await;
    let stats = sync.current_stats();

    assert_eq!(stats.visits, 1);
    assert_eq!(stats.files_downloaded, 3);
    assert_eq!(stats.tools_used, 1);
    assert_eq!(stats.tool_count(PDF_MERGE), 1);
}

#[tokio::test]
async fn test_corrupt_snapshot_starts_from_zero() {
    let dir = TempDir::new().unwrap();
    let storage: Arc<dyn KeyValueStorage> = Arc::new(FileStorage::new(dir.path()));
    storage.set(DEFAULT_STORAGE_KEY, "{not json").await.unwrap();

    let sync = offline(Arc::clone(&storage)).await;
    assert!(sync.current_stats().is_empty());

    sync.increment_files_processed(2).await.unwrap();
    assert_eq!(sync.current_stats().files_downloaded, 2);
}

#[tokio::test]
async fn test_offline_deltas_replay_on_reconnect() {
    let dir = TempDir::new().unwrap();
    let storage: Arc<dyn KeyValueStorage> = Arc::new(FileStorage::new(dir.path()));
    let pending_key = format!("{DEFAULT_STORAGE_KEY}.pending");

    let degraded = offline(Arc::clone(&storage)).await;
    degraded.increment_files_processed(4).await.unwrap();
    degraded.increment_tools_used(1, &ToolId::from(PDF_MERGE)).await.unwrap();
    drop(degraded);
    assert!(storage.get(&pending_key).await.unwrap().is_some());

    let store = InMemoryStore::new();
    store
        .increment(&Counter::FilesDownloaded, 10)
        .await
        .unwrap();

    let sync = connected(&store, Arc::clone(&storage)).await;
    assert_eq!(sync.mode(), SyncMode::Connected);

    let remote = store.snapshot();
    assert_eq!(remote.files_downloaded, 14);
    assert_eq!(remote.tools_used, 1);
    assert_eq!(remote.tool_count(PDF_MERGE), 1);
    assert!(storage.get(&pending_key).await.unwrap().is_none());

    // A second connection has nothing left to replay.
    let _again = connected(&store, Arc::clone(&storage)).await;
    assert_eq!(store.snapshot().files_downloaded, 14);
}

#[tokio::test]
async fn test_subscribers_see_remote_changes() {
    let store = InMemoryStore::new();
    let dir = TempDir::new().unwrap();
    let storage: Arc<dyn KeyValueStorage> = Arc::new(FileStorage::new(dir.path()));
    let reader = connected(&store, Arc::clone(&storage)).await;
    let writer = connected(&store, storage).await;

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let _subscription = reader.subscribe(move |stats| {
        let _ = tx.send(stats.files_downloaded);
    });
    assert_eq!(rx.recv().await, Some(0));

    writer.increment_files_processed(2).await.unwrap();

    let mut latest = 0;
    while latest != 2 {
        latest = rx.recv().await.unwrap();
    }
    assert_eq!(reader.current_stats().files_downloaded, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_simultaneous_reconnects_replay_offline_deltas_once() {
    let store = InMemoryStore::new();
    let dir = TempDir::new().unwrap();
    let storage: Arc<dyn KeyValueStorage> = Arc::new(FileStorage::new(dir.path()));

    let session = offline(Arc::clone(&storage)).await;
    session.increment_files_processed(2).await.unwrap();
    drop(session);

    let reconnects = (0..4).map(|_| {
        let store = store.clone();
        let storage = Arc::clone(&storage);
        tokio::spawn(async move { connected(&store, storage).await.mode() })
    });
    for mode in join_all(reconnects).await {
        assert_eq!(mode.unwrap(), SyncMode::Connected);
    }

    assert_eq!(store.snapshot().files_downloaded, 2);
    let pending = format!("{DEFAULT_STORAGE_KEY}.pending");
    assert_eq!(storage.get(&pending).await.unwrap(), None);
}
