//! Shard manager scenarios over instrumented file adapters
//!
//! - same-index loads are de-duplicated
//! - concurrent writers under a tiny cache lose nothing
//! - rebalance with injected read failures degrades without losing data
//! - rebalance with injected write failures rolls back to the old layout
//! - auto-rebalance follows reported file sizes

use futures::future::join_all;
use serde_json::json;
use shardvault_core::DistanceMetric;
use shardvault_index::{IndexedDocument, ShardSchema, DEFAULT_LANGUAGE};
use shardvault_shard::{HashRing, ManagerOptions, MovedId, ShardManager, DEFAULT_REPLICAS};
use shardvault_storage::testing::FaultyFileAdapter;
use shardvault_storage::{FileAdapter, MemoryFileAdapter};
use std::collections::BTreeMap;
use std::sync::Arc;

const MIB: u64 = 1024 * 1024;

fn schema() -> ShardSchema {
    ShardSchema::for_documents(3, DistanceMetric::Cosine, DEFAULT_LANGUAGE)
}

fn faulty() -> Arc<FaultyFileAdapter> {
    Arc::new(FaultyFileAdapter::new(Arc::new(MemoryFileAdapter::new())))
}

fn document(id: &str) -> IndexedDocument {
    IndexedDocument {
        id: id.to_string(),
        content: format!("content of {id}"),
        embedding: vec![1.0, 0.5, 0.25],
        metadata: json!({"title": id}),
    }
}

fn ids(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("note-{i:02}")).collect()
}

async fn open(fs: Arc<dyn FileAdapter>, cache_capacity: usize) -> ShardManager {
    let options = ManagerOptions {
        cache_capacity,
        ..ManagerOptions::default()
    };
    ShardManager::open(fs, "vault/.shardvault", schema(), options)
        .await
        .unwrap()
}

/// Store with `shards` shards reopened with the given cache capacity
async fn open_with_shards(fs: Arc<dyn FileAdapter>, shards: usize, cache_capacity: usize) -> ShardManager {
    let mut manager = open(fs.clone(), 3).await;
    manager.rebalance(shards).await.unwrap();
    drop(manager);
    open(fs, cache_capacity).await
}

async fn save_routed(manager: &ShardManager, ids: &[String]) {
    let mut groups: BTreeMap<usize, Vec<IndexedDocument>> = BTreeMap::new();
    for id in ids {
        groups
            .entry(manager.get_node(id).unwrap())
            .or_default()
            .push(document(id));
    }
    let tasks = groups.into_iter().map(|(idx, docs)| async move {
        let shard = manager.get_shard(idx).await?;
        shard.write().upsert_many(docs).unwrap();
        manager.persist_shard(&shard, idx).await
    });
    for result in join_all(tasks).await {
        result.unwrap();
    }
}

async fn count_all(manager: &ShardManager) -> usize {
    let mut total = 0;
    for idx in 0..manager.shard_count() {
        total += manager.get_shard(idx).await.unwrap().read().len();
    }
    total
}

#[tokio::test]
async fn concurrent_loads_of_one_shard_read_once() {
    let fs = faulty();
    let mut manager = open(fs.clone(), 3).await;
    manager.flush().await.unwrap();
    assert!(manager.cached_indices().is_empty());

    fs.set_yield_on_read(true);
    let before = fs.reads_of("vectorstore-1");
    let handles = join_all((0..8).map(|_| manager.get_shard(0))).await;
    let handles: Vec<_> = handles.into_iter().map(Result::unwrap).collect();

    assert_eq!(fs.reads_of("vectorstore-1") - before, 1);
    assert!(handles.iter().all(|h| Arc::ptr_eq(h, &handles[0])));
}

#[tokio::test]
async fn distinct_shards_load_independently() {
    let fs = faulty();
    let mut manager = open_with_shards(fs.clone(), 2, 2).await;
    manager.flush().await.unwrap();
    fs.set_yield_on_read(true);

    let (a, b) = tokio::join!(manager.get_shard(0), manager.get_shard(1));
    assert!(!Arc::ptr_eq(&a.unwrap(), &b.unwrap()));
    assert_eq!(manager.cached_indices().len(), 2);
}

#[tokio::test]
async fn concurrent_writers_with_single_slot_cache_lose_nothing() {
    let fs = faulty();
    let mut manager = open_with_shards(fs.clone(), 4, 1).await;
    fs.set_yield_on_read(true);

    let all = ids(40);
    save_routed(&manager, &all).await;
    assert!(manager.cached_indices().len() <= 1);
    manager.flush().await.unwrap();
    drop(manager);

    let reopened = open(fs, 4).await;
    assert_eq!(reopened.shard_count(), 4);
    assert_eq!(count_all(&reopened).await, 40);
    for id in &all {
        let idx = reopened.get_node(id).unwrap();
        assert!(reopened.get_shard(idx).await.unwrap().read().contains(id));
    }
}

#[tokio::test]
async fn rebalance_with_failing_destination_is_degraded_not_fatal() {
    let fs = faulty();
    let mut manager = open_with_shards(fs.clone(), 2, 2).await;
    let all = ids(40);
    save_routed(&manager, &all).await;

    let expected_failures = HashRing::with_nodes(2, DEFAULT_REPLICAS)
        .diff_moved_ids(4, all.iter().map(String::as_str))
        .unwrap()
        .into_iter()
        .filter(|mv| mv.to == 2)
        .count();
    assert!(expected_failures > 0);

    // new shard index 2 is created on disk, then every load of it fails
    fs.fail_reads("vectorstore-3");
    let report = manager.rebalance(4).await.unwrap();
    fs.clear();

    assert_eq!(report.failed_moves, expected_failures);
    assert!(report.moved > 0);
    assert_eq!(manager.shard_count(), 4);
    // failed documents stay where they were
    assert_eq!(count_all(&manager).await, 40);
}

#[tokio::test]
async fn rebalance_aborts_before_changes_when_a_shard_cannot_be_read() {
    let fs = faulty();
    let mut manager = open_with_shards(fs.clone(), 2, 2).await;
    save_routed(&manager, &ids(10)).await;
    manager.flush().await.unwrap();

    fs.fail_reads("vectorstore-2");
    assert!(manager.rebalance(3).await.is_err());
    fs.clear();

    assert_eq!(manager.shard_count(), 2);
    assert!(!fs.exists(&manager.shard_path(2)).await.unwrap());
    assert_eq!(count_all(&manager).await, 10);
}

async fn assert_routable(manager: &ShardManager, ids: &[String]) {
    for id in ids {
        let idx = manager.get_node(id).unwrap();
        assert!(
            manager.get_shard(idx).await.unwrap().read().contains(id),
            "{id} not found in shard {idx}"
        );
    }
}

fn moves_between(from: usize, to: usize, ids: &[String]) -> Vec<MovedId> {
    HashRing::with_nodes(from, DEFAULT_REPLICAS)
        .diff_moved_ids(to, ids.iter().map(String::as_str))
        .unwrap()
}

#[tokio::test]
async fn failed_shard_creation_rolls_back_grow() {
    let fs = faulty();
    let mut manager = open_with_shards(fs.clone(), 2, 2).await;
    let all = ids(40);
    save_routed(&manager, &all).await;

    // vectorstore-3 is created, vectorstore-4 cannot be
    fs.fail_writes("vectorstore-4");
    assert!(manager.rebalance(4).await.is_err());
    fs.clear();

    assert_eq!(manager.shard_count(), 2);
    assert!(!fs.exists(&manager.shard_path(2)).await.unwrap());
    assert!(manager.cached_indices().iter().all(|idx| *idx < 2));
    assert_eq!(count_all(&manager).await, 40);
    assert_routable(&manager, &all).await;
    drop(manager);

    let reopened = open(fs, 2).await;
    assert_eq!(reopened.shard_count(), 2);
    assert_eq!(count_all(&reopened).await, 40);
    assert_routable(&reopened, &all).await;
}

#[tokio::test]
async fn failed_persist_after_moves_rolls_back_grow() {
    let fs = faulty();
    let mut manager = open_with_shards(fs.clone(), 2, 2).await;
    let all = ids(40);
    save_routed(&manager, &all).await;
    assert!(moves_between(2, 4, &all).iter().any(|mv| mv.from == 1));

    // shard 1 gives documents away but cannot be rewritten
    fs.fail_writes("vectorstore-2");
    assert!(manager.rebalance(4).await.is_err());
    fs.clear();

    assert_eq!(manager.shard_count(), 2);
    assert!(!fs.exists(&manager.shard_path(2)).await.unwrap());
    assert!(!fs.exists(&manager.shard_path(3)).await.unwrap());
    assert_eq!(count_all(&manager).await, 40);
    assert_routable(&manager, &all).await;
    drop(manager);

    let reopened = open(fs, 2).await;
    assert_eq!(reopened.shard_count(), 2);
    assert_eq!(count_all(&reopened).await, 40);
    assert_routable(&reopened, &all).await;
}

#[tokio::test]
async fn failed_persist_rolls_back_shrink() {
    let fs = faulty();
    let mut manager = open_with_shards(fs.clone(), 4, 4).await;
    let all = ids(40);
    save_routed(&manager, &all).await;
    assert!(moves_between(4, 2, &all).iter().any(|mv| mv.to == 0));

    // shard 0 receives documents but cannot be rewritten
    fs.fail_writes("vectorstore-1");
    assert!(manager.rebalance(2).await.is_err());
    fs.clear();

    assert_eq!(manager.shard_count(), 4);
    for idx in 0..4 {
        assert!(fs.exists(&manager.shard_path(idx)).await.unwrap());
    }
    assert_eq!(count_all(&manager).await, 40);
    assert_routable(&manager, &all).await;
    drop(manager);

    // no document is left duplicated in a shard it does not belong to
    let reopened = open(fs, 4).await;
    assert_eq!(reopened.shard_count(), 4);
    assert_eq!(count_all(&reopened).await, 40);
    assert_routable(&reopened, &all).await;
}

#[tokio::test]
async fn rebalance_after_rollback_succeeds() {
    let fs = faulty();
    let mut manager = open_with_shards(fs.clone(), 2, 2).await;
    let all = ids(30);
    save_routed(&manager, &all).await;

    fs.fail_writes("vectorstore-3");
    assert!(manager.rebalance(3).await.is_err());
    fs.clear();

    let report = manager.rebalance(3).await.unwrap();
    assert_eq!(report.failed_moves, 0);
    assert_eq!(manager.shard_count(), 3);
    assert_eq!(count_all(&manager).await, 30);
    assert_routable(&manager, &all).await;
}

#[tokio::test]
async fn auto_rebalance_doubles_large_shards() {
    let fs = faulty();
    let mut manager = open(fs.clone(), 3).await;
    fs.set_size("vectorstore-1", 550 * MIB);

    assert_eq!(manager.plan_auto_rebalance().await.unwrap(), Some(2));
    let report = manager.auto_rebalance().await.unwrap().unwrap();
    assert_eq!((report.from_count, report.to_count), (1, 2));
    assert_eq!(manager.shard_count(), 2);
}

#[tokio::test]
async fn auto_rebalance_halves_small_shards() {
    let fs = faulty();
    let mut manager = open_with_shards(fs.clone(), 8, 3).await;
    for n in 1..=8 {
        fs.set_size(&format!("vectorstore-{n}"), 10 * MIB);
    }

    assert_eq!(manager.plan_auto_rebalance().await.unwrap(), Some(4));
    let report = manager.auto_rebalance().await.unwrap().unwrap();
    assert_eq!(report.to_count, 4);
}

#[tokio::test]
async fn auto_rebalance_respects_the_cap() {
    let fs = faulty();
    let mut manager = open_with_shards(fs.clone(), 20, 3).await;
    for n in 1..=20 {
        fs.set_size(&format!("vectorstore-{n}"), 550 * MIB);
    }
    assert_eq!(manager.plan_auto_rebalance().await.unwrap(), Some(32));

    manager.rebalance(32).await.unwrap();
    for n in 1..=32 {
        fs.set_size(&format!("vectorstore-{n}"), 550 * MIB);
    }
    assert_eq!(manager.plan_auto_rebalance().await.unwrap(), None);
}

#[tokio::test]
async fn auto_rebalance_within_thresholds_does_nothing() {
    let fs = faulty();
    let mut manager = open_with_shards(fs.clone(), 4, 3).await;
    for n in 1..=4 {
        fs.set_size(&format!("vectorstore-{n}"), 200 * MIB);
    }
    assert!(manager.auto_rebalance().await.unwrap().is_none());
    assert_eq!(manager.shard_count(), 4);
}
