//! Rebalance conservation on disk

use crate::test_utils::*;
use shardvault::VaultError;

#[tokio::test]
async fn grow_then_shrink_keeps_every_document() {
    let vault = DiskVault::new();
    let config = manual_config();
    let store = vault.open(&config).await;
    let ids = store.add_documents(chunks(60)).await.unwrap();
    assert_eq!(vault.shard_files(&config), expected_files(1));

    for target in [2, 4, 8, 3, 1] {
        let before = store.repository().shard_count().await;
        let report = store.rebalance(target).await.unwrap();
        assert_eq!((report.from_count, report.to_count), (before, target));
        assert_eq!(report.failed_moves, 0, "rebalance to {target}");

        assert_eq!(vault.shard_files(&config), expected_files(target));
        assert_eq!(store.repository().count().await.unwrap(), 60);
        for id in &ids {
            assert_eq!(&store.get_document(id).await.unwrap().id, id);
        }
    }
}

#[tokio::test]
async fn each_document_lives_in_exactly_one_shard() {
    let vault = DiskVault::new();
    let config = manual_config();
    let store = vault.open(&config).await;
    store.add_documents(chunks(40)).await.unwrap();
    store.rebalance(5).await.unwrap();

    let stats = store.stats().await.unwrap();
    assert_eq!(stats.len(), 5);
    assert_eq!(stats.iter().map(|s| s.documents).sum::<usize>(), 40);
    assert!(stats.iter().all(|s| s.file_size.is_some()));
}

#[tokio::test]
async fn rebalance_to_same_count_moves_nothing() {
    let store = memory_store(&manual_config()).await;
    store.add_documents(chunks(10)).await.unwrap();
    store.rebalance(3).await.unwrap();

    let report = store.rebalance(3).await.unwrap();
    assert!(report.is_noop());
    assert_eq!(report.moved, 0);
}

#[tokio::test]
async fn rebalance_to_zero_is_rejected() {
    let store = memory_store(&manual_config()).await;
    store.add_documents(chunks(4)).await.unwrap();

    let err = store.rebalance(0).await.unwrap_err();
    assert!(matches!(err, VaultError::Shard(_)));
    assert_eq!(store.repository().shard_count().await, 1);
    assert_eq!(store.repository().count().await.unwrap(), 4);
}

#[tokio::test]
async fn documents_added_after_rebalance_route_to_new_layout() {
    let store = memory_store(&manual_config()).await;
    let first = store.add_documents(chunks(10)).await.unwrap();
    store.rebalance(4).await.unwrap();
    let more = store
        .add_documents(
            (0..10)
                .map(|i| {
                    shardvault::NewDocument::new(
                        format!("later chunk {i}"),
                        shardvault::DocumentMetadata::for_path("notes/later.md"),
                    )
                })
                .collect(),
        )
        .await
        .unwrap();

    assert_eq!(store.repository().count().await.unwrap(), 20);
    for id in first.iter().chain(&more) {
        assert!(store.get_document(id).await.is_ok());
    }
}
