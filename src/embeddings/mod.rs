// Embedding providers: text to fixed-dimensionality dense vectors

pub mod hashing;
pub mod ollama;


pub use hashing::HashingEmbedder;
pub use ollama::OllamaEmbedder;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::{EmbeddingConfig, ProviderKind};
use crate::{AssistError, Result};

/// Deterministic mapping from text to a dense vector.
///
/// Every vector produced by one provider has the same length. Failures to
/// load or run the underlying model surface as [`AssistError::ModelUnavailable`].
pub trait EmbeddingProvider: Send + Sync + fmt::Debug {
    /// Identifier of the provider and model, e.g. `ollama:all-minilm:latest@localhost:11434`
    fn id(&self) -> &str;

    /// Encode a batch of texts, one vector per input in input order.
    fn encode_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Encode a single text. Equivalent to `encode_batch(&[text])[0]`.
    #[inline]
    fn encode_one(&self, text: &str) -> Result<Vec<f32>> {
        self.encode_batch(&[text.to_string()])?
            .pop()
            .ok_or_else(|| AssistError::ModelUnavailable("provider returned no vector".to_string()))
    }
}

/// Load the provider described by `config`, verifying that the model is usable.
#[inline]
pub fn load_provider(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    match config.provider {
        ProviderKind::Ollama => {
            let embedder = OllamaEmbedder::load(config)?;
            Ok(Arc::new(embedder))
        }
        ProviderKind::Hashing => {
            let embedder = HashingEmbedder::new(config.dimension as usize)?;
            Ok(Arc::new(embedder))
        }
    }
}

/// Loaded providers keyed by identifier. Loading the same identifier twice
/// hands back the instance created the first time.
#[derive(Default)]
pub struct ProviderCache {
    providers: HashMap<String, Arc<dyn EmbeddingProvider>>,
}

impl ProviderCache {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn get_or_load(&mut self, config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
        self.get_or_load_with(&config.provider_id(), || load_provider(config))
    }

    /// Return the cached provider for `id`, calling `loader` only on a miss.
    /// A failed load is not cached.
    #[inline]
    pub fn get_or_load_with<F>(&mut self, id: &str, loader: F) -> Result<Arc<dyn EmbeddingProvider>>
    where
        F: FnOnce() -> Result<Arc<dyn EmbeddingProvider>>,
    {
        if let Some(provider) = self.providers.get(id) {
            debug!("Reusing loaded embedding provider {}", id);
            return Ok(Arc::clone(provider));
        }

        let provider = loader()?;
        info!("Loaded embedding provider {}", provider.id());
        self.providers.insert(id.to_string(), Arc::clone(&provider));
        Ok(provider)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl fmt::Debug for ProviderCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderCache")
            .field("providers", &self.providers.keys().collect::<Vec<_>>())
            .finish()
    }
}
