
use tracing::debug;

use super::EmbeddingProvider;
use crate::{AssistError, Result};

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Offline bag-of-words embedder using the hashing trick.
///
/// Text is lowercased and split on non-alphanumeric characters; each token is
/// hashed (FNV-1a) into one of `dimension` buckets with a sign taken from the
/// top hash bit, and the resulting vector is scaled to unit length. Texts with
/// the same multiset of tokens embed to the same vector, so punctuation and
/// case never change a distance. Squared L2 distances between unit vectors
/// fall in `[0, 4]`.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    id: String,
    dimension: usize,
}

impl HashingEmbedder {
    #[inline]
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(AssistError::ModelUnavailable(
                "hashing embedder needs a non-zero dimension".to_string(),
            ));
        }

        Ok(Self {
            id: format!("hashing:{dimension}"),
            dimension,
        })
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0_f32; self.dimension];

        for token in tokenize(text) {
            let hash = fnv1a(token.as_bytes());
            let bucket = (hash % self.dimension as u64) as usize;
            let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }

        vector
    }
}

impl EmbeddingProvider for HashingEmbedder {
    #[inline]
    fn id(&self) -> &str {
        &self.id
    }

    #[inline]
    fn encode_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        debug!("Hashing {} texts into {} dimensions", texts.len(), self.dimension);
        Ok(texts.iter().map(|text| self.embed(text)).collect())
    }

    #[inline]
    fn encode_one(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed(text))
    }
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
}

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |hash, byte| {
        (hash ^ u64::from(*byte)).wrapping_mul(FNV_PRIME)
    })
}
