use sha2::{Digest, Sha256};

use crate::error::ServiceError;

pub const DEFAULT_EMBEDDING_DIM: usize = 384;

/// Produces embedding vectors for SEMANTIC comparisons.
pub trait EmbeddingProvider: Send + Sync {
    fn embed(&self, text: &str) -> Result<Vec<f32>, ServiceError>;

    fn name(&self) -> &str;
}

/// Deterministic in-process embedder built from hashed word and bigram features.
#[derive(Debug, Clone, Copy)]
pub struct LocalHashEmbedder {
    dimensions: usize,
}

impl LocalHashEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }
}

impl Default for LocalHashEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_EMBEDDING_DIM)
    }
}

impl EmbeddingProvider for LocalHashEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, ServiceError> {
        Ok(embed_text_local(text, self.dimensions))
    }

    fn name(&self) -> &str {
        "local-sha256-v1"
    }
}

pub fn normalize_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<&str>>().join(" ")
}

/// Feature-hashed embedding: each word and adjacent word pair adds a signed, weighted unit to
/// the dimension picked by its SHA-256 digest, and the result is scaled to unit length.
pub fn embed_text_local(payload: &str, dimensions: usize) -> Vec<f32> {
    let dims = dimensions.max(8);
    let mut vector = vec![0_f32; dims];

    for feature in text_features(payload) {
        let (index, weight) = feature_slot(&feature, dims);
        vector[index] += weight;
    }

    normalize_vector(&mut vector);
    vector
}

/// Dimension and signed weight for one feature, taken from its SHA-256 digest.
fn feature_slot(feature: &str, dims: usize) -> (usize, f32) {
    let digest = Sha256::digest(feature.as_bytes());
    let mut bucket = [0_u8; 8];
    bucket.copy_from_slice(&digest[..8]);
    let index = (u64::from_le_bytes(bucket) % dims as u64) as usize;
    let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
    (index, sign * (1.0 + f32::from(digest[9]) / 255.0))
}

/// Cosine similarity in [-1, 1]; `None` when the vectors cannot be compared.
pub fn cosine_similarity(left: &[f32], right: &[f32]) -> Option<f64> {
    if left.len() != right.len() || left.is_empty() {
        return None;
    }

    let mut dot = 0.0_f64;
    let mut left_norm = 0.0_f64;
    let mut right_norm = 0.0_f64;
    for (left_value, right_value) in left.iter().zip(right.iter()) {
        let (l, r) = (f64::from(*left_value), f64::from(*right_value));
        dot += l * r;
        left_norm += l * l;
        right_norm += r * r;
    }

    if left_norm <= 0.0 || right_norm <= 0.0 {
        return None;
    }
    Some((dot / (left_norm.sqrt() * right_norm.sqrt())).clamp(-1.0, 1.0))
}

/// Lowercased alphanumeric words (`w:`) and adjacent word pairs (`b:`).
fn text_features(payload: &str) -> Vec<String> {
    let words = payload
        .split_whitespace()
        .map(|raw| {
            raw.chars()
                .filter(|character| character.is_alphanumeric())
                .flat_map(char::to_lowercase)
                .collect::<String>()
        })
        .filter(|word| !word.is_empty())
        .collect::<Vec<String>>();

    let pairs = words
        .windows(2)
        .map(|pair| format!("b:{}_{}", pair[0], pair[1]));
    words
        .iter()
        .map(|word| format!("w:{word}"))
        .chain(pairs)
        .collect()
}

fn normalize_vector(values: &mut [f32]) {
    let norm = values
        .iter()
        .map(|value| f64::from(*value).powi(2))
        .sum::<f64>()
        .sqrt();
    if norm > 0.0 {
        values
            .iter_mut()
            .for_each(|value| *value = (f64::from(*value) / norm) as f32);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_embeddings_are_deterministic_and_normalized() {
        let first = embed_text_local("Acme Corporation Ltd", 64);
        let second = embed_text_local("acme corporation ltd.", 64);
        assert_eq!(first, second);

        let norm = first.iter().map(|v| f64::from(*v).powi(2)).sum::<f64>();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn cosine_similarity_handles_degenerate_vectors() {
        assert_eq!(cosine_similarity(&[], &[]), None);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0]), None);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), None);

        let same = cosine_similarity(&[3.0, 4.0], &[6.0, 8.0]).expect("comparable");
        assert!((same - 1.0).abs() < 1e-9);
        let opposite = cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]).expect("comparable");
        assert!((opposite + 1.0).abs() < 1e-9);
    }

    #[test]
    fn feature_slots_are_fixed_by_sha256() {
        assert_eq!(text_features("Net  30"), vec!["w:net", "w:30", "b:net_30"]);

        let cases = [
            ("w:net", 102, 1.529_411_8),
            ("w:30", 221, 1.203_921_6),
            ("b:net_30", 43, -1.611_764_7),
        ];
        for (feature, expected_index, expected_weight) in cases {
            let (index, weight) = feature_slot(feature, DEFAULT_EMBEDDING_DIM);
            assert_eq!(index, expected_index, "{feature}");
            assert!((weight - expected_weight).abs() < 1e-5, "{feature}: {weight}");
        }
    }

    #[test]
    fn empty_payload_embeds_to_zero_vector() {
        let vector = LocalHashEmbedder::new(16).embed("   ").expect("local embed");
        assert_eq!(vector.len(), 16);
        assert!(vector.iter().all(|value| *value == 0.0));
    }
}
