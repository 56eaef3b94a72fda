//! Reopen, config files and reset on disk

use crate::test_utils::*;
use shardvault::{StoreConfig, CONFIG_FILE_NAME};

#[tokio::test]
async fn reopened_store_finds_every_document() {
    let vault = DiskVault::new();
    let config = manual_config();
    let ids = {
        let store = vault.open(&config).await;
        store.rebalance(4).await.unwrap();
        let ids = store.add_documents(chunks(30)).await.unwrap();
        store.flush().await.unwrap();
        ids
    };

    let store = vault.open(&config).await;
    assert_eq!(store.repository().shard_count().await, 4);
    assert_eq!(store.repository().count().await.unwrap(), 30);
    for id in &ids {
        assert_eq!(&store.get_document(id).await.unwrap().id, id);
    }
}

#[tokio::test]
async fn writes_reach_disk_without_flush() {
    let vault = DiskVault::new();
    let config = manual_config();
    let ids = {
        let store = vault.open(&config).await;
        store.rebalance(2).await.unwrap();
        store.add_documents(chunks(12)).await.unwrap()
    };

    let store = vault.open(&config).await;
    for id in &ids {
        assert!(store.get_document(id).await.is_ok());
    }
}

#[tokio::test]
async fn small_cache_still_persists_every_shard() {
    let vault = DiskVault::new();
    let config = StoreConfig {
        cache_capacity: 1,
        ..manual_config()
    };
    let store = vault.open(&config).await;
    store.rebalance(6).await.unwrap();
    let ids = store.add_documents(chunks(48)).await.unwrap();
    drop(store);

    let store = vault.open(&config).await;
    assert_eq!(store.repository().count().await.unwrap(), 48);
    for id in &ids {
        assert!(store.get_document(id).await.is_ok());
    }
}

#[tokio::test]
async fn config_file_drives_the_store() {
    let vault = DiskVault::new();
    let path = vault.root.path().join(CONFIG_FILE_NAME);
    std::fs::write(
        &path,
        "dir = \"index\"\ncache_capacity = 2\nauto_rebalance = false\nsimilarity_threshold = 0.9\n",
    )
    .unwrap();
    let config = StoreConfig::from_file(&path).unwrap();

    let store = vault.open(&config).await;
    store.add_documents(chunks(5)).await.unwrap();
    assert_eq!(store.repository().similarity_threshold(), 0.9);
    assert!(vault.root.path().join("index").join("vectorstore-1").exists());
    assert_eq!(vault.shard_files(&config), expected_files(1));
}

#[tokio::test]
async fn reset_removes_shard_files() {
    let vault = DiskVault::new();
    let config = manual_config();
    let store = vault.open(&config).await;
    store.add_documents(chunks(20)).await.unwrap();
    store.rebalance(4).await.unwrap();
    assert_eq!(vault.shard_files(&config).len(), 4);

    store.reset().await.unwrap();
    assert_eq!(vault.shard_files(&config), expected_files(1));
    assert_eq!(store.repository().count().await.unwrap(), 0);

    let ids = store.add_documents(chunks(3)).await.unwrap();
    assert_eq!(ids.len(), 3);
    assert_eq!(store.repository().count().await.unwrap(), 3);
}

#[tokio::test]
async fn stats_report_sizes_and_residency() {
    let vault = DiskVault::new();
    let config = manual_config();
    let store = vault.open(&config).await;
    store.rebalance(2).await.unwrap();
    store.add_documents(chunks(10)).await.unwrap();
    store.flush().await.unwrap();

    let stats = store.stats().await.unwrap();
    assert_eq!(stats.len(), 2);
    assert!(stats.iter().all(|s| s.file_size.unwrap_or(0) > 0));
    assert_eq!(stats.iter().map(|s| s.documents).sum::<usize>(), 10);
}
