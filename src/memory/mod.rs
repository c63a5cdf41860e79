//! Long-term vector memory.
//!
//! Every chat turn (outside deep-research mode) is stored as a
//! `User: …\nAI: …` blob with a local embedding. Context mode recalls the
//! most similar blobs and feeds them back into the prompt. When embeddings
//! are disabled, recall degrades to BM25 keyword search over the same table.

mod embeddings;
mod store;

pub use embeddings::{EmbeddingProvider, FastEmbedProvider, cosine_similarity, normalize_embedding};
pub use store::{MemoryRecord, MemoryStore};

use anyhow::Result;
use chrono::Utc;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::MemoryConfig;

pub struct MemoryManager {
    store: MemoryStore,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
}

impl MemoryManager {
    /// Open the memory store and load the configured embedding provider.
    pub fn new(db_path: &Path, config: &MemoryConfig, cache_dir: Option<&str>) -> Result<Self> {
        let store = MemoryStore::open(db_path)?;

        let embedder: Option<Arc<dyn EmbeddingProvider>> =
            match config.embedding_provider.as_str() {
                "none" => None,
                "local" => {
                    info!("Loading embedding model: {}", config.embedding_model);
                    Some(Arc::new(FastEmbedProvider::new_with_cache_dir(
                        Some(&config.embedding_model),
                        cache_dir,
                    )?))
                }
                other => {
                    anyhow::bail!(
                        "Unknown embedding provider: '{}' (expected 'local' or 'none')",
                        other
                    )
                }
            };

        Ok(Self { store, embedder })
    }

    /// Build a manager around an existing store (used in tests).
    pub fn with_store(store: MemoryStore, embedder: Option<Arc<dyn EmbeddingProvider>>) -> Self {
        Self { store, embedder }
    }

    pub fn has_embeddings(&self) -> bool {
        self.embedder.is_some()
    }

    pub fn count(&self) -> usize {
        self.store.count().unwrap_or(0)
    }

    /// Store one chat interaction.
    pub async fn remember(&self, user_input: &str, ai_response: &str) -> Result<()> {
        let content = format!("User: {}\nAI: {}", user_input, ai_response);

        let embedding = match &self.embedder {
            Some(embedder) => embedder.embed(&content).await?,
            None => Vec::new(),
        };

        let record = MemoryRecord {
            id: format!("mem_{}", Uuid::new_v4().as_simple()),
            content,
            embedding,
            created_at: Utc::now().to_rfc3339(),
        };

        self.store.insert(&record)?;
        debug!("Stored memory {}", record.id);
        Ok(())
    }

    /// Recall the most relevant past interactions as a bulleted context
    /// block. Never fails a chat turn: errors degrade to an empty context.
    pub async fn recall(&self, query: &str, limit: usize) -> String {
        match self.recall_inner(query, limit).await {
            Ok(contents) => contents
                .iter()
                .map(|c| format!("- {}\n", c))
                .collect::<String>(),
            Err(e) => {
                warn!("Memory recall failed: {}", e);
                String::new()
            }
        }
    }

    async fn recall_inner(&self, query: &str, limit: usize) -> Result<Vec<String>> {
        match &self.embedder {
            Some(embedder) => {
                let query_embedding = embedder.embed(query).await?;
                let candidates = self.store.embeddings()?;

                let mut scored: Vec<(String, f32)> = candidates
                    .into_iter()
                    .map(|(id, embedding)| {
                        let score = cosine_similarity(&query_embedding, &embedding);
                        (id, score)
                    })
                    .collect();

                scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
                scored.truncate(limit);

                let ids: Vec<String> = scored.into_iter().map(|(id, _)| id).collect();
                self.store.contents_by_ids(&ids)
            }
            None => self.store.search_bm25(query, limit),
        }
    }

    /// Delete all stored memories.
    pub fn wipe(&self) -> Result<()> {
        self.store.clear()?;
        info!("Vector memory wiped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    /// Deterministic embedder: maps known phrases onto fixed unit vectors so
    /// similarity ordering is predictable without a model download.
    struct StubEmbedder;

    #[async_trait]
    impl EmbeddingProvider for StubEmbedder {
        fn id(&self) -> &str {
            "stub"
        }

        fn model(&self) -> &str {
            "stub"
        }

        fn dimensions(&self) -> usize {
            3
        }

        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            let vec = if text.contains("dog") {
                vec![1.0, 0.0, 0.0]
            } else if text.contains("weather") {
                vec![0.0, 1.0, 0.0]
            } else {
                vec![0.0, 0.0, 1.0]
            };
            Ok(vec)
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            let mut out = Vec::new();
            for t in texts {
                out.push(self.embed(t).await?);
            }
            Ok(out)
        }
    }

    fn manager_with_stub() -> MemoryManager {
        MemoryManager::with_store(
            MemoryStore::open_in_memory().unwrap(),
            Some(Arc::new(StubEmbedder)),
        )
    }

    #[tokio::test]
    async fn remember_then_recall_by_similarity() {
        let memory = manager_with_stub();

        memory
            .remember("my dog is named Max", "Noted, your dog is Max.")
            .await
            .unwrap();
        memory
            .remember("what's the weather like", "Sunny today.")
            .await
            .unwrap();

        let context = memory.recall("tell me about my dog", 1).await;
        assert!(context.contains("Max"));
        assert!(!context.contains("Sunny"));
    }

    #[tokio::test]
    async fn recall_formats_as_bullets() {
        let memory = manager_with_stub();
        memory.remember("my dog is Max", "ok").await.unwrap();

        let context = memory.recall("dog", 2).await;
        assert!(context.starts_with("- User: my dog is Max"));
    }

    #[tokio::test]
    async fn recall_empty_store_is_empty_string() {
        let memory = manager_with_stub();
        assert_eq!(memory.recall("anything", 2).await, "");
    }

    #[tokio::test]
    async fn keyword_fallback_without_embedder() {
        let memory = MemoryManager::with_store(MemoryStore::open_in_memory().unwrap(), None);
        assert!(!memory.has_embeddings());

        memory
            .remember("I work at a bakery", "Nice, fresh bread!")
            .await
            .unwrap();

        let context = memory.recall("bakery", 2).await;
        assert!(context.contains("bakery"));
    }

    #[tokio::test]
    async fn wipe_clears_everything() {
        let memory = manager_with_stub();
        memory.remember("my dog is Max", "ok").await.unwrap();
        assert_eq!(memory.count(), 1);

        memory.wipe().unwrap();
        assert_eq!(memory.count(), 0);
        assert_eq!(memory.recall("dog", 2).await, "");
    }
}
