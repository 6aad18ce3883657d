//! Query-time retrieval: embed, search the index, keep confident matches.
//!
//! Distances are raw squared L2 values in the embedding space of the
//! provider. They are not normalised, so the threshold passed to
//! [`RetrievalEngine::search`] is an absolute cutoff that must be re-tuned
//! whenever the provider or model changes.


use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, info};

use crate::embeddings::EmbeddingProvider;
use crate::index::VectorIndex;
use crate::knowledge_base::Passage;
use crate::{AssistError, Result};

/// A knowledge base match: the passage text and its squared L2 distance
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub text: String,
    pub distance: f32,
}

impl SearchHit {
    /// `1 - distance`. For display only: not a probability, and negative once
    /// the distance exceeds 1.
    #[inline]
    pub fn confidence(&self) -> f32 {
        1.0 - self.distance
    }
}

#[derive(Debug)]
struct Snapshot {
    index: VectorIndex,
    texts: Vec<String>,
}

/// Retrieval engine over one embedding provider.
///
/// Starts uninitialized; [`build_index`](Self::build_index) makes it ready.
/// Rebuilding constructs a complete new snapshot before publishing it, so
/// concurrent searches see either the old or the new index, never a partial
/// one.
#[derive(Debug)]
pub struct RetrievalEngine {
    provider: Arc<dyn EmbeddingProvider>,
    snapshot: RwLock<Option<Arc<Snapshot>>>,
}

impl RetrievalEngine {
    #[inline]
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            provider,
            snapshot: RwLock::new(None),
        }
    }

    #[inline]
    pub fn provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.provider
    }

    #[inline]
    pub fn is_ready(&self) -> bool {
        self.snapshot.read().is_some()
    }

    /// Number of indexed passages, zero before the first build
    #[inline]
    pub fn len(&self) -> usize {
        self.snapshot.read().as_ref().map_or(0, |s| s.texts.len())
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Embed every passage and replace the current index. A failed build
    /// leaves the previous index in place.
    #[inline]
    pub fn build_index(&self, passages: &[Passage]) -> Result<()> {
        if passages.is_empty() {
            return Err(AssistError::EmptyIndex);
        }

        let texts: Vec<String> = passages
            .iter()
            .map(|p| p.combined_text().to_string())
            .collect();

        debug!(
            "Embedding {} passages with {}",
            texts.len(),
            self.provider.id()
        );
        let vectors = self.provider.encode_batch(&texts)?;

        if vectors.len() != texts.len() {
            return Err(AssistError::ModelUnavailable(format!(
                "provider returned {} vectors for {} passages",
                vectors.len(),
                texts.len()
            )));
        }

        let index = VectorIndex::from_vectors(&vectors)?;
        let dimension = index.dimension();
        let snapshot = Arc::new(Snapshot { index, texts });

        *self.snapshot.write() = Some(snapshot);

        info!(
            "Built retrieval index with {} passages ({} dimensions)",
            passages.len(),
            dimension
        );
        Ok(())
    }

    /// The nearest `k` passages whose distance is strictly below `threshold`,
    /// closest first. An empty result means no confident match.
    #[inline]
    pub fn search(&self, query: &str, k: usize, threshold: f32) -> Result<Vec<SearchHit>> {
        let snapshot = self
            .snapshot
            .read()
            .as_ref()
            .map(Arc::clone)
            .ok_or(AssistError::EngineNotReady)?;

        let query_vector = self.provider.encode_one(query)?;
        let neighbors = snapshot.index.search(&query_vector, k)?;
        let candidates = neighbors.len();

        let hits: Vec<SearchHit> = neighbors
            .into_iter()
            .filter(|n| n.distance < threshold)
            .filter_map(|n| {
                snapshot.texts.get(n.position).map(|text| SearchHit {
                    text: text.clone(),
                    distance: n.distance,
                })
            })
            .collect();

        debug!(
            "Query matched {} of {} candidates below threshold {}",
            hits.len(),
            candidates,
            threshold
        );
        Ok(hits)
    }
}
