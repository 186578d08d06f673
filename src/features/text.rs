//! Free-text encoding.
//!
//! The regressor only sees text through the `TextEmbedder` trait, so any encoder
//! with a fixed output width and a stable identifier can be dropped in. The
//! bundled implementation is a feature-hashing encoder: word unigrams and padded
//! character trigrams are hashed (FNV-1a) into `dim` signed buckets and the
//! result is L2-normalized. It needs no training and no model download, and the
//! identifier alone is enough to rebuild it at serving time.
//!
//! Normalization happens before encoding and is shared by training and serving:
//! missing text becomes `""` and everything is lower-cased. `""` encodes to the
//! all-zero vector.

use rayon::prelude::*;

use crate::domain::TextBlock;
use crate::error::AppError;

/// Identifier prefix for the hashing encoder; the suffix is the width.
pub const HASHING_EMBEDDER_PREFIX: &str = "hashing-trigram-v1:";

/// Width of the hashing encoder when none is requested explicitly.
pub const DEFAULT_EMBED_DIM: usize = 384;

/// Maps a description to a fixed-width dense vector.
///
/// Implementations must be pure functions of the input text and safe to call
/// from many threads at once.
pub trait TextEmbedder: Send + Sync {
    /// Stable name persisted with the model bundle.
    fn identifier(&self) -> String;

    /// Output width.
    fn dim(&self) -> usize;

    /// Encode already-normalized text.
    fn encode(&self, text: &str) -> TextBlock;

    /// Batch form; must equal calling `encode` per item.
    fn encode_batch(&self, texts: &[&str]) -> Vec<TextBlock> {
        texts.iter().map(|t| self.encode(t)).collect()
    }
}

/// Lower-case the description, treating a missing one as the empty string.
pub fn normalize_description(text: Option<&str>) -> String {
    text.unwrap_or("").to_lowercase()
}

/// Normalize then encode.
pub fn embed_description(embedder: &dyn TextEmbedder, text: Option<&str>) -> TextBlock {
    embedder.encode(&normalize_description(text))
}

/// Signed feature-hashing encoder over words and character trigrams.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashingEmbedder {
    dim: usize,
}

impl HashingEmbedder {
    pub fn new(dim: usize) -> Result<Self, AppError> {
        if dim == 0 {
            return Err(AppError::config("Embedding dimension must be > 0."));
        }
        Ok(Self { dim })
    }

    fn add_token(&self, token: &str, out: &mut [f64]) {
        let h = fnv1a(token.as_bytes());
        let bucket = (h % self.dim as u64) as usize;
        // The top bit picks the sign so collisions tend to cancel rather than pile up.
        let sign = if h >> 63 == 0 { 1.0 } else { -1.0 };
        out[bucket] += sign;
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self { dim: DEFAULT_EMBED_DIM }
    }
}

impl TextEmbedder for HashingEmbedder {
    fn identifier(&self) -> String {
        format!("{HASHING_EMBEDDER_PREFIX}{}", self.dim)
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn encode(&self, text: &str) -> TextBlock {
        let mut out = vec![0.0; self.dim];

        for word in text.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()) {
            self.add_token(&format!("w:{word}"), &mut out);

            let padded: Vec<char> = std::iter::once('^')
                .chain(word.chars())
                .chain(std::iter::once('$'))
                .collect();
            for tri in padded.windows(3) {
                let gram: String = tri.iter().collect();
                self.add_token(&format!("c:{gram}"), &mut out);
            }
        }

        let norm = out.iter().map(|v| v * v).sum::<f64>().sqrt();
        if norm > 0.0 {
            for v in &mut out {
                *v /= norm;
            }
        }
        TextBlock(out)
    }

    fn encode_batch(&self, texts: &[&str]) -> Vec<TextBlock> {
        texts.par_iter().map(|t| self.encode(t)).collect()
    }
}

/// Rebuild an embedder from the identifier stored in a bundle.
pub fn embedder_from_identifier(identifier: &str) -> Result<Box<dyn TextEmbedder>, AppError> {
    let id = identifier.trim();
    let Some(dim) = id.strip_prefix(HASHING_EMBEDDER_PREFIX) else {
        return Err(AppError::load(format!("Unknown text embedder identifier '{id}'.")));
    };
    let dim: usize = dim
        .parse()
        .map_err(|e| AppError::load(format!("Invalid embedder width in '{id}': {e}")))?;
    let embedder = HashingEmbedder::new(dim).map_err(|e| AppError::load(e.to_string()))?;
    Ok(Box::new(embedder))
}

fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    bytes.iter().fold(OFFSET, |h, b| (h ^ u64::from(*b)).wrapping_mul(PRIME))
}
