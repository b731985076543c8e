//! Property tests for in-memory vector store search ordering.

use pdfqa_rag::document::Chunk;
use pdfqa_rag::inmemory::InMemoryVectorStore;
use pdfqa_rag::vectorstore::{StoredChunk, VectorStore};
use proptest::prelude::*;

/// Generate a non-zero L2-normalized embedding of the given dimension.
fn arb_normalized_embedding(dim: usize) -> impl Strategy<Value = Vec<f32>> {
    proptest::collection::vec(-1.0f32..1.0f32, dim).prop_filter_map("non-zero embedding", |mut v| {
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm < 1e-8 {
            return None;
        }
        for val in &mut v {
            *val /= norm;
        }
        Some(v)
    })
}

/// Generate an embedded chunk.
fn arb_entry(dim: usize) -> impl Strategy<Value = StoredChunk> {
    ("[a-z ]{5,30}", 1u32..20, arb_normalized_embedding(dim)).prop_map(|(text, page, embedding)| {
        StoredChunk { chunk: Chunk::new(text).with_source("doc.pdf").with_page(page), embedding }
    })
}

/// Searching returns at most `top_k` hits, ordered by descending cosine similarity.
mod prop_inmemory_search_ordering {
    use super::*;

    const DIM: usize = 16;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn results_ordered_descending_and_bounded_by_top_k(
            entries in proptest::collection::vec(arb_entry(DIM), 1..20),
            query in arb_normalized_embedding(DIM),
            top_k in 1usize..25,
        ) {
            let stored = entries.len();
            let rt = tokio::runtime::Runtime::new().unwrap();
            let results = rt.block_on(async {
                let store = InMemoryVectorStore::new();
                store.insert(entries).await.unwrap();
                store.search(&query, top_k).await.unwrap()
            });

            prop_assert!(results.len() <= top_k);
            prop_assert_eq!(results.len(), top_k.min(stored));

            for window in results.windows(2) {
                prop_assert!(
                    window[0].score >= window[1].score,
                    "results not in descending order: {} < {}",
                    window[0].score,
                    window[1].score,
                );
            }
        }

        #[test]
        fn inserted_texts_are_reported_as_present(
            entries in proptest::collection::vec(arb_entry(DIM), 1..10),
        ) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            rt.block_on(async {
                let store = InMemoryVectorStore::new();
                store.insert(entries.clone()).await.unwrap();
                for entry in &entries {
                    assert!(store.contains_text(&entry.chunk.text).await.unwrap());
                }
                assert!(!store.contains_text("NOT STORED").await.unwrap());
                assert_eq!(store.len().await, entries.len());
            });
        }
    }
}

#[tokio::test]
async fn equal_scores_keep_insertion_order() {
    let store = InMemoryVectorStore::new();
    store
        .insert(vec![
            StoredChunk { chunk: Chunk::new("first"), embedding: vec![1.0, 0.0] },
            StoredChunk { chunk: Chunk::new("second"), embedding: vec![2.0, 0.0] },
            StoredChunk { chunk: Chunk::new("third"), embedding: vec![0.0, 1.0] },
        ])
        .await
        .unwrap();

    let hits = store.search(&[1.0, 0.0], 3).await.unwrap();
    let texts: Vec<&str> = hits.iter().map(|h| h.entry.chunk.text.as_str()).collect();
    assert_eq!(texts, vec!["first", "second", "third"]);
}
