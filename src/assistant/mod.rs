//! Query boundary: internal retrieval first, external search when nothing in
//! the knowledge base is close enough.

#[cfg(test)]
mod tests;

use std::sync::Arc;
use tracing::{info, warn};

use crate::config::{Config, RetrievalConfig};
use crate::fallback::ExternalSearch;
use crate::retrieval::{RetrievalEngine, SearchHit};
use crate::{AssistError, Result};

/// Outcome of one support query
#[derive(Debug, Clone, PartialEq)]
pub enum Answer {
    /// Confident knowledge base matches, closest first
    Internal(Vec<SearchHit>),
    /// No confident match; references from the external source
    External(Vec<String>),
}

impl Answer {
    #[inline]
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::Internal(_))
    }
}

pub struct SupportAssistant {
    engine: Arc<RetrievalEngine>,
    fallback: Arc<dyn ExternalSearch>,
    retrieval: RetrievalConfig,
    external_results: usize,
}

impl SupportAssistant {
    #[inline]
    pub fn new(
        engine: Arc<RetrievalEngine>,
        fallback: Arc<dyn ExternalSearch>,
        config: &Config,
    ) -> Self {
        Self {
            engine,
            fallback,
            retrieval: config.retrieval.clone(),
            external_results: config.external_search.num_results as usize,
        }
    }

    #[inline]
    pub fn engine(&self) -> &Arc<RetrievalEngine> {
        &self.engine
    }

    /// Answer with the configured `top_k` and threshold.
    #[inline]
    pub fn answer(&self, query: &str) -> Result<Answer> {
        self.answer_with(query, self.retrieval.top_k, self.retrieval.threshold)
    }

    /// Answer with per-call `k` and threshold.
    #[inline]
    pub fn answer_with(&self, query: &str, k: usize, threshold: f32) -> Result<Answer> {
        let query = query.trim();
        if query.is_empty() {
            return Err(AssistError::InvalidQuery("query is empty".to_string()));
        }

        let hits = self.engine.search(query, k, threshold)?;
        if !hits.is_empty() {
            info!("Answered from knowledge base with {} matches", hits.len());
            return Ok(Answer::Internal(hits));
        }

        warn!("No confident match below threshold {}; using external search", threshold);
        Ok(Answer::External(
            self.fallback.search(query, self.external_results),
        ))
    }
}
