//! Integration tests for parent/child ingestion and retrieval.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{KeyedEmbedder, OfflineEmbedder, SlowParentStore, fixture};
use mentor_memory::{
    HashingEmbeddingProvider, HierarchicalRetriever, MaxParents, MemoryError, NewDocument,
    InMemoryVectorIndex, ParentStore, RecursiveSplitter, VectorIndex,
};

fn hashing() -> Arc<HashingEmbeddingProvider> {
    Arc::new(HashingEmbeddingProvider::default())
}

async fn assert_referential_integrity(index: &dyn VectorIndex, store: &dyn ParentStore) {
    let known = store.all_ids().await;
    for parent_id in index.parent_ids().await {
        assert!(known.contains(&parent_id), "index references missing parent {parent_id}");
    }
}

#[tokio::test]
async fn single_document_is_retrieved_whole() {
    let f = fixture(hashing(), 2000, 400);
    f.index.initialize_empty("Initialisering", vec![0.0; 256]).await.unwrap();

    let text = "The sky is blue. Water is wet.";
    let report = f.retriever.add_documents(&[NewDocument::new(text)]).await.unwrap();
    assert_eq!(report.parent_ids.len(), 1);
    assert!(report.child_count >= 1);

    let parents = f.retriever.retrieve("what color is the sky", 1).await.unwrap();
    assert_eq!(parents.len(), 1);
    assert_eq!(parents[0].id, report.parent_ids[0]);
    assert_eq!(parents[0].text, text);
}

#[tokio::test]
async fn identical_content_gets_distinct_ids() {
    let f = fixture(hashing(), 2000, 400);
    let doc = NewDocument::new("I went for a long walk by the sea.");

    let first = f.retriever.add_documents(&[doc.clone()]).await.unwrap();
    let second = f.retriever.add_documents(&[doc]).await.unwrap();

    assert_eq!(first.parent_ids.len(), 1);
    assert_eq!(second.parent_ids.len(), 1);
    assert_ne!(first.parent_ids[0], second.parent_ids[0]);
    assert_eq!(f.store.len().await, 2);
}

#[tokio::test]
async fn metadata_is_copied_to_every_parent() {
    let f = fixture(hashing(), 60, 20);
    let text = "First paragraph about work and meetings.\n\n\
                Second paragraph about family dinners.\n\n\
                Third paragraph about running in the rain.";
    let doc = NewDocument::new(text).with_metadata("source", "journal.txt");

    let report = f.retriever.add_documents(&[doc]).await.unwrap();
    assert!(report.parent_ids.len() > 1);
    for id in &report.parent_ids {
        let parent = f.store.get(id).await.unwrap();
        assert!(parent.text.chars().count() <= 60);
        assert_eq!(parent.metadata.get("source").map(String::as_str), Some("journal.txt"));
    }
    assert!(report.child_count >= report.parent_ids.len());
    assert_referential_integrity(f.index.as_ref(), f.store.as_ref()).await;
}

#[tokio::test]
async fn children_of_one_parent_are_deduplicated() {
    let f = fixture(hashing(), 2000, 30);
    let text = "sea sea sea waves. sea sea sand and waves. sea waves and the wind. sea again.";
    let report = f.retriever.add_documents(&[NewDocument::new(text)]).await.unwrap();
    assert_eq!(report.parent_ids.len(), 1);
    assert!(report.child_count > 1);

    let parents = f.retriever.retrieve("sea waves", 4).await.unwrap();
    assert_eq!(parents.len(), 1);
    assert_eq!(parents[0].id, report.parent_ids[0]);
}

#[tokio::test]
async fn retrieval_is_bounded_by_k() {
    let f = fixture(hashing(), 2000, 400);
    let docs: Vec<NewDocument> = (0..6)
        .map(|i| NewDocument::new(format!("Entry {i}: today I thought about my garden.")))
        .collect();
    f.retriever.add_documents(&docs).await.unwrap();

    for k in [1, 2, 4] {
        let parents = f.retriever.retrieve("garden", k).await.unwrap();
        assert!(parents.len() <= k);
        assert!(!parents.is_empty());
    }
}

#[tokio::test]
async fn empty_memory_returns_nothing() {
    let f = fixture(hashing(), 2000, 400);
    f.index.initialize_empty("Initialisering", vec![0.0; 256]).await.unwrap();
    assert!(f.retriever.retrieve("anything", 4).await.unwrap().is_empty());
}

#[tokio::test]
async fn best_matching_parent_comes_first() {
    let embedder = KeyedEmbedder::new(4)
        .with("apples", vec![1.0, 0.0, 0.0, 0.0])
        .with("boats", vec![0.0, 1.0, 0.0, 0.0])
        .with("fruit question", vec![0.9, 0.1, 0.0, 0.0]);
    let f = fixture(Arc::new(embedder), 2000, 400);
    f.retriever
        .add_documents(&[NewDocument::new("boats"), NewDocument::new("apples")])
        .await
        .unwrap();

    let scored = f.retriever.retrieve_scored("fruit question", 2).await.unwrap();
    assert_eq!(scored.len(), 2);
    assert_eq!(scored[0].document.text, "apples");
    assert!(scored[0].score > scored[1].score);
}

#[tokio::test]
async fn missing_parent_is_reported_as_corrupt_index() {
    let f = fixture(hashing(), 2000, 400);
    let report =
        f.retriever.add_documents(&[NewDocument::new("A note about the lake.")]).await.unwrap();
    f.store.remove(&report.parent_ids[0]).await.unwrap();

    let err = f.retriever.retrieve("lake", 1).await.unwrap_err();
    match err {
        MemoryError::CorruptIndex { parent_id, .. } => assert_eq!(parent_id, report.parent_ids[0]),
        other => panic!("expected CorruptIndex, got {other:?}"),
    }
}

#[tokio::test]
async fn embedding_failure_writes_nothing() {
    let f = fixture(Arc::new(OfflineEmbedder), 2000, 400);
    let err = f.retriever.add_documents(&[NewDocument::new("hello")]).await.unwrap_err();
    assert!(matches!(err, MemoryError::ProviderFailure { .. }));
    assert_eq!(f.store.len().await, 0);
    assert!(f.index.is_empty().await);
}

#[tokio::test]
async fn dimension_mismatch_rolls_back_parents() {
    let f = fixture(hashing(), 2000, 400);
    f.retriever.add_documents(&[NewDocument::new("first entry")]).await.unwrap();

    let narrow = HierarchicalRetriever::builder()
        .embedding_provider(Arc::new(HashingEmbeddingProvider::new(8)))
        .vector_index(f.index.clone())
        .parent_store(f.store.clone())
        .build()
        .unwrap();
    let err = narrow.add_documents(&[NewDocument::new("second entry")]).await.unwrap_err();

    assert!(matches!(err, MemoryError::DimensionMismatch { expected: 256, actual: 8 }));
    assert_eq!(f.store.len().await, 1);
    assert_referential_integrity(f.index.as_ref(), f.store.as_ref()).await;
}

#[tokio::test]
async fn max_parents_evicts_oldest_with_children() {
    let f = fixture(hashing(), 2000, 400);
    let retriever = HierarchicalRetriever::builder()
        .parent_splitter(Arc::new(RecursiveSplitter::new(2000).unwrap()))
        .embedding_provider(hashing())
        .vector_index(f.index.clone())
        .parent_store(f.store.clone())
        .eviction_policy(Arc::new(MaxParents(2)))
        .build()
        .unwrap();

    let mut ids = Vec::new();
    for text in ["monday notes", "tuesday notes", "wednesday notes"] {
        let report = retriever.add_documents(&[NewDocument::new(text)]).await.unwrap();
        ids.extend(report.parent_ids);
    }

    assert_eq!(f.store.len().await, 2);
    assert!(!f.store.all_ids().await.contains(&ids[0]));
    assert!(!f.index.parent_ids().await.contains(&ids[0]));
    assert_referential_integrity(f.index.as_ref(), f.store.as_ref()).await;

    let parents = retriever.retrieve("monday", 3).await.unwrap();
    assert!(parents.iter().all(|p| p.text != "monday notes"));
}

#[tokio::test]
async fn retrieval_is_not_broken_by_concurrent_eviction() {
    let store = Arc::new(SlowParentStore::new(Duration::from_millis(50)));
    let index = Arc::new(InMemoryVectorIndex::new());
    let retriever = HierarchicalRetriever::builder()
        .embedding_provider(hashing())
        .vector_index(index.clone())
        .parent_store(store.clone())
        .eviction_policy(Arc::new(MaxParents(1)))
        .build()
        .unwrap();
    retriever.add_documents(&[NewDocument::new("monday notes")]).await.unwrap();

    let tuesday = [NewDocument::new("tuesday notes")];
    let (retrieved, ingested) =
        tokio::join!(retriever.retrieve("monday", 1), retriever.add_documents(&tuesday));

    let parents = retrieved.unwrap();
    assert_eq!(parents.len(), 1);
    assert_eq!(parents[0].text, "monday notes");

    let report = ingested.unwrap();
    assert_eq!(report.evicted.len(), 1);
    assert_eq!(store.len().await, 1);
    assert_referential_integrity(index.as_ref(), store.as_ref()).await;
}
