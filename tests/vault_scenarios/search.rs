//! Scatter-gather ranking against a brute-force scan

use crate::test_utils::*;
use shardvault::{MetadataFilter, SearchOptions, VaultError};

/// Ids of the `k` best documents by brute force, ties by id
fn brute_force_top_k(docs: &[(String, Vec<f32>)], query: &[f32], k: usize) -> Vec<String> {
    let mut scored: Vec<(f32, &String)> = docs.iter().map(|(id, e)| (cosine(query, e), id)).collect();
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap().then_with(|| a.1.cmp(b.1)));
    scored.into_iter().take(k).map(|(_, id)| id.clone()).collect()
}

#[tokio::test]
async fn merged_results_match_brute_force() {
    let store = memory_store(&manual_config()).await;
    let docs = chunks(80);
    let texts: Vec<String> = docs.iter().map(|d| d.content.clone()).collect();
    let ids = store.add_documents(docs).await.unwrap();
    store.rebalance(4).await.unwrap();

    let corpus: Vec<(String, Vec<f32>)> = ids
        .iter()
        .cloned()
        .zip(texts.iter().map(|t| embedding_of(t)))
        .collect();

    for (q, k) in [(1u64, 1usize), (2, 5), (3, 10), (4, 25)] {
        let query = seeded_vector(DIMENSION, q);
        let hits = store
            .similarity_search_by_vector(&query, &SearchOptions::new(k).with_lambda(-1.0))
            .await
            .unwrap();
        let got: Vec<String> = hits.iter().map(|h| h.document.id.clone()).collect();
        assert_eq!(got, brute_force_top_k(&corpus, &query, k), "query {q}, k {k}");
        assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
    }
}

#[tokio::test]
async fn larger_fetch_k_does_not_change_similarity_ranking() {
    let store = memory_store(&manual_config()).await;
    store.add_documents(chunks(50)).await.unwrap();
    store.rebalance(3).await.unwrap();
    let query = seeded_vector(DIMENSION, 99);

    let base = SearchOptions::new(6).with_lambda(-1.0);
    let narrow = store.similarity_search_by_vector(&query, &base).await.unwrap();
    let wide = store
        .similarity_search_by_vector(&query, &base.clone().with_fetch_k(20))
        .await
        .unwrap();
    assert_eq!(narrow, wide);
}

#[tokio::test]
async fn threshold_drops_weak_matches() {
    let store = memory_store(&manual_config()).await;
    store.add_documents(chunks(30)).await.unwrap();
    store.rebalance(2).await.unwrap();
    let query = seeded_vector(DIMENSION, 7);

    let hits = store
        .similarity_search_by_vector(&query, &SearchOptions::new(30).with_lambda(0.5))
        .await
        .unwrap();
    assert!(hits.iter().all(|h| h.score >= 0.5));
    assert!(hits.len() < 30);
}

#[tokio::test]
async fn tag_filter_applies_in_every_shard() {
    let store = memory_store(&manual_config()).await;
    store.add_documents(chunks(40)).await.unwrap();
    store.rebalance(4).await.unwrap();

    let options = SearchOptions::new(40)
        .with_lambda(-1.0)
        .with_filter(MetadataFilter::new().eq("tags", "even"));
    let hits = store
        .similarity_search_by_vector(&seeded_vector(DIMENSION, 3), &options)
        .await
        .unwrap();
    assert_eq!(hits.len(), 20);
    assert!(hits.iter().all(|h| h.document.metadata.tags == vec!["even".to_string()]));
}

#[tokio::test]
async fn path_substring_filter() {
    let store = memory_store(&manual_config()).await;
    store.add_documents(chunks(25)).await.unwrap();
    store.rebalance(2).await.unwrap();

    let options = SearchOptions::new(25)
        .with_lambda(-1.0)
        .with_filter(MetadataFilter::new().contains("path", "note-3"));
    let hits = store
        .similarity_search_by_vector(&seeded_vector(DIMENSION, 5), &options)
        .await
        .unwrap();
    assert_eq!(hits.len(), 5);
    assert!(hits.iter().all(|h| h.document.metadata.path == "notes/note-3.md"));
}

#[tokio::test]
async fn substring_filter_on_number_field_is_rejected() {
    let store = memory_store(&manual_config()).await;
    store.add_documents(chunks(3)).await.unwrap();

    let options = SearchOptions::new(3).with_filter(MetadataFilter::new().contains("created_at", "17"));
    let err = store
        .similarity_search_by_vector(&seeded_vector(DIMENSION, 1), &options)
        .await
        .unwrap_err();
    assert!(matches!(err, VaultError::InvalidFilter { .. }));
}

#[tokio::test]
async fn mmr_returns_at_most_k_from_the_candidate_pool() {
    let store = memory_store(&manual_config()).await;
    store.add_documents(chunks(30)).await.unwrap();
    store.rebalance(3).await.unwrap();

    let options = SearchOptions::new(4).with_fetch_k(10).with_lambda(-1.0).mmr(0.5);
    let hits = store
        .similarity_search_by_vector(&seeded_vector(DIMENSION, 11), &options)
        .await
        .unwrap();
    assert_eq!(hits.len(), 4);
    let mut ids: Vec<_> = hits.iter().map(|h| h.document.id.clone()).collect();
    ids.dedup();
    assert_eq!(ids.len(), 4);
}

#[tokio::test]
async fn text_query_embeds_through_the_provider() {
    let store = memory_store(&manual_config()).await;
    let docs = chunks(12);
    let target = docs[7].content.clone();
    store.add_documents(docs).await.unwrap();
    store.rebalance(3).await.unwrap();

    // querying with a document's own text ranks it first (cosine 1.0)
    let hits = store
        .similarity_search(&target, &SearchOptions::new(1))
        .await
        .unwrap();
    assert_eq!(hits[0].document.content, target);
    assert!((hits[0].score - 1.0).abs() < 1e-5);
}
