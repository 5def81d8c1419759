//! Embedding capability boundary.
//!
//! Providers turn text into fixed-length unit vectors. The rest of the
//! engine only sees the [`EmbeddingProvider`] trait.

pub mod provider;
pub mod providers;

pub use provider::{create_provider, EmbeddingProvider};

use ragdex_core::{AppError, AppResult};

/// Scale `vector` to unit length in place.
///
/// Returns `false` (leaving the vector untouched) when the norm is zero or
/// any component is non-finite.
pub fn l2_normalize(vector: &mut [f32]) -> bool {
    if vector.iter().any(|v| !v.is_finite()) {
        return false;
    }

    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm == 0.0 || !norm.is_finite() {
        return false;
    }

    for v in vector.iter_mut() {
        *v /= norm;
    }
    true
}

/// Embed `texts` in slices of `batch_size`, preserving order.
///
/// Fails with `EmbeddingUnavailable` if the provider returns a different
/// number of vectors than it was given texts.
pub async fn embed_in_batches(
    provider: &dyn EmbeddingProvider,
    texts: &[String],
    batch_size: usize,
) -> AppResult<Vec<Vec<f32>>> {
    if texts.is_empty() {
        return Ok(Vec::new());
    }

    let batch_size = batch_size.max(1);
    let mut embeddings = Vec::with_capacity(texts.len());

    for (i, batch) in texts.chunks(batch_size).enumerate() {
        let vectors = provider.embed_batch(batch).await?;
        if vectors.len() != batch.len() {
            return Err(AppError::EmbeddingUnavailable(format!(
                "Provider '{}' returned {} vectors for {} texts",
                provider.provider_name(),
                vectors.len(),
                batch.len()
            )));
        }

        tracing::debug!(
            "Embedded batch {} ({} texts) with {}/{}",
            i + 1,
            batch.len(),
            provider.provider_name(),
            provider.model_name()
        );
        embeddings.extend(vectors);
    }

    Ok(embeddings)
}

#[cfg(test)]
mod tests {
    use super::providers::trigram::TrigramProvider;
    use super::*;
    use async_trait::async_trait;

    #[derive(Debug)]
    struct ShortProvider;

    #[async_trait]
    impl EmbeddingProvider for ShortProvider {
        fn provider_name(&self) -> &str {
            "short"
        }

        fn model_name(&self) -> &str {
            "short-v1"
        }

        fn dimensions(&self) -> usize {
            2
        }

        async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
            // Drops the last vector of every batch
            Ok(texts.iter().skip(1).map(|_| vec![1.0, 0.0]).collect())
        }
    }

    #[test]
    fn test_l2_normalize() {
        let mut v = vec![3.0, 4.0];
        assert!(l2_normalize(&mut v));
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_l2_normalize_rejects_degenerate() {
        let mut zero = vec![0.0, 0.0];
        assert!(!l2_normalize(&mut zero));

        let mut nan = vec![1.0, f32::NAN];
        assert!(!l2_normalize(&mut nan));
        assert!(nan[0] == 1.0);

        let mut inf = vec![f32::INFINITY, 1.0];
        assert!(!l2_normalize(&mut inf));
    }

    #[tokio::test]
    async fn test_embed_in_batches_preserves_order() {
        let provider = TrigramProvider::new(64);
        let texts: Vec<String> = (0..10).map(|i| format!("document number {}", i)).collect();

        let batched = embed_in_batches(&provider, &texts, 3).await.unwrap();
        let whole = provider.embed_batch(&texts).await.unwrap();

        assert_eq!(batched.len(), 10);
        assert_eq!(batched, whole);
    }

    #[tokio::test]
    async fn test_embed_in_batches_count_mismatch() {
        let texts = vec!["a".to_string(), "b".to_string()];
        let result = embed_in_batches(&ShortProvider, &texts, 64).await;
        assert!(matches!(result, Err(AppError::EmbeddingUnavailable(_))));
    }
}
