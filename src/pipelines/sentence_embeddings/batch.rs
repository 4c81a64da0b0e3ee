use std::convert::TryFrom;

use tch::{Device, Kind, Tensor};

use crate::SimilarityError;

/// # Token embeddings and attention mask for a batch of sentences
///
/// Holds the output of a transformer for `N` sentences padded to `L` positions:
/// - `token_embeddings`: (N, L, D) floating point tensor
/// - `attention_mask`: (N, L) tensor with 1 for real tokens and 0 for padding
///
/// Shapes and mask values are checked on construction, so that a batch that exists
/// can always be pooled.
#[derive(Debug)]
pub struct TokenEmbeddingBatch {
    token_embeddings: Tensor,
    attention_mask: Tensor,
}

impl TokenEmbeddingBatch {
    /// Build a new `TokenEmbeddingBatch` from tensors.
    ///
    /// # Arguments
    ///
    /// * `token_embeddings` - (N, L, D) tensor of per-token hidden states
    /// * `attention_mask` - (N, L) tensor with values in {0, 1}
    ///
    /// # Example
    ///
    /// ```no_run
    /// use sbert_similarity::pipelines::sentence_embeddings::TokenEmbeddingBatch;
    /// use tch::{Device, Kind, Tensor};
    ///
    /// # fn main() -> Result<(), sbert_similarity::SimilarityError> {
    /// let token_embeddings = Tensor::rand([2, 8, 16], (Kind::Float, Device::Cpu));
    /// let attention_mask = Tensor::ones([2, 8], (Kind::Int64, Device::Cpu));
    /// let batch = TokenEmbeddingBatch::new(token_embeddings, attention_mask)?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(
        token_embeddings: Tensor,
        attention_mask: Tensor,
    ) -> Result<TokenEmbeddingBatch, SimilarityError> {
        if token_embeddings.dim() != 3 {
            return Err(SimilarityError::ShapeMismatch(format!(
                "token embeddings must have 3 dimensions (sentences, positions, features), got shape {:?}",
                token_embeddings.size()
            )));
        }
        if attention_mask.dim() != 2 {
            return Err(SimilarityError::ShapeMismatch(format!(
                "attention mask must have 2 dimensions (sentences, positions), got shape {:?}",
                attention_mask.size()
            )));
        }
        let embeddings_shape = token_embeddings.size();
        let mask_shape = attention_mask.size();
        if embeddings_shape[..2] != mask_shape[..] {
            return Err(SimilarityError::ShapeMismatch(format!(
                "token embeddings shape {:?} and attention mask shape {:?} disagree on (sentences, positions)",
                embeddings_shape, mask_shape
            )));
        }

        let invalid_mask_values = i64::try_from(
            attention_mask
                .ne(0i64)
                .logical_and(&attention_mask.ne(1i64))
                .sum(Kind::Int64),
        )?;
        if invalid_mask_values > 0 {
            return Err(SimilarityError::ValueError(format!(
                "attention mask must only contain 0 or 1, found {} other values",
                invalid_mask_values
            )));
        }

        Ok(TokenEmbeddingBatch {
            token_embeddings,
            attention_mask,
        })
    }

    /// Build a new `TokenEmbeddingBatch` from nested vectors.
    ///
    /// Every sentence must have the same number of positions, every position the same
    /// number of features, and the mask must have one row per sentence of matching length.
    ///
    /// # Arguments
    ///
    /// * `token_embeddings` - per sentence, per position embedding vectors
    /// * `attention_mask` - per sentence, per position mask values
    pub fn from_vecs(
        token_embeddings: &[Vec<Vec<f32>>],
        attention_mask: &[Vec<i64>],
    ) -> Result<TokenEmbeddingBatch, SimilarityError> {
        let num_sentences = token_embeddings.len();
        if attention_mask.len() != num_sentences {
            return Err(SimilarityError::ShapeMismatch(format!(
                "{} sentences of token embeddings but {} attention mask rows",
                num_sentences,
                attention_mask.len()
            )));
        }

        let sequence_length = token_embeddings.first().map_or(0, |sentence| sentence.len());
        let embedding_dim = token_embeddings
            .first()
            .and_then(|sentence| sentence.first())
            .map_or(0, |token| token.len());

        let mut flat_embeddings =
            Vec::with_capacity(num_sentences * sequence_length * embedding_dim);
        for (sentence_idx, (sentence, mask_row)) in
            token_embeddings.iter().zip(attention_mask).enumerate()
        {
            if sentence.len() != sequence_length || mask_row.len() != sequence_length {
                return Err(SimilarityError::ShapeMismatch(format!(
                    "sentence {} has {} positions and {} mask values, expected {}",
                    sentence_idx,
                    sentence.len(),
                    mask_row.len(),
                    sequence_length
                )));
            }
            for (position, token) in sentence.iter().enumerate() {
                if token.len() != embedding_dim {
                    return Err(SimilarityError::ShapeMismatch(format!(
                        "token {} of sentence {} has dimension {}, expected {}",
                        position,
                        sentence_idx,
                        token.len(),
                        embedding_dim
                    )));
                }
                flat_embeddings.extend_from_slice(token);
            }
        }
        let flat_mask = attention_mask.concat();

        let token_embeddings = Tensor::from_slice(&flat_embeddings).view([
            num_sentences as i64,
            sequence_length as i64,
            embedding_dim as i64,
        ]);
        let attention_mask =
            Tensor::from_slice(&flat_mask).view([num_sentences as i64, sequence_length as i64]);

        TokenEmbeddingBatch::new(token_embeddings, attention_mask)
    }

    /// (N, L, D) token embeddings
    pub fn token_embeddings(&self) -> &Tensor {
        &self.token_embeddings
    }

    /// (N, L) attention mask
    pub fn attention_mask(&self) -> &Tensor {
        &self.attention_mask
    }

    /// Number of sentences (N)
    pub fn num_sentences(&self) -> i64 {
        self.token_embeddings.size()[0]
    }

    /// Number of token positions, including padding (L)
    pub fn sequence_length(&self) -> i64 {
        self.token_embeddings.size()[1]
    }

    /// Token embedding dimension (D)
    pub fn embedding_dim(&self) -> i64 {
        self.token_embeddings.size()[2]
    }

    /// Copies the batch to the given device.
    pub fn to(&self, device: Device) -> TokenEmbeddingBatch {
        TokenEmbeddingBatch {
            token_embeddings: self.token_embeddings.to(device),
            attention_mask: self.attention_mask.to(device),
        }
    }
}

/// # Producer of token embeddings for a list of sentences
///
/// Tokenization, padding and transformer inference happen behind this trait. The
/// implementor is responsible for padding every sentence of the batch to the same
/// number of positions and for marking padded positions with 0 in the attention mask.
pub trait TokenEmbeddingSource {
    /// Tokenizes and encodes the inputs, returning their per-token hidden states.
    fn embed<S>(&self, inputs: &[S]) -> Result<TokenEmbeddingBatch, SimilarityError>
    where
        S: AsRef<str> + Sync;
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn rejects_sentence_count_mismatch() {
        let token_embeddings = Tensor::zeros([3, 4, 2], (Kind::Float, Device::Cpu));
        let attention_mask = Tensor::ones([2, 4], (Kind::Int64, Device::Cpu));

        let result = TokenEmbeddingBatch::new(token_embeddings, attention_mask);
        assert!(matches!(result, Err(SimilarityError::ShapeMismatch(_))));
    }

    #[test]
    fn rejects_position_count_mismatch() {
        let token_embeddings = Tensor::zeros([2, 4, 2], (Kind::Float, Device::Cpu));
        let attention_mask = Tensor::ones([2, 5], (Kind::Int64, Device::Cpu));

        let result = TokenEmbeddingBatch::new(token_embeddings, attention_mask);
        assert!(matches!(result, Err(SimilarityError::ShapeMismatch(_))));
    }

    #[test]
    fn rejects_wrong_rank() {
        let token_embeddings = Tensor::zeros([2, 4], (Kind::Float, Device::Cpu));
        let attention_mask = Tensor::ones([2, 4], (Kind::Int64, Device::Cpu));

        let result = TokenEmbeddingBatch::new(token_embeddings, attention_mask);
        assert!(matches!(result, Err(SimilarityError::ShapeMismatch(_))));
    }

    #[test]
    fn rejects_non_binary_mask() {
        let token_embeddings = Tensor::zeros([1, 3, 2], (Kind::Float, Device::Cpu));
        let attention_mask = Tensor::from_slice(&[1i64, 2, 0]).view([1, 3]);

        let result = TokenEmbeddingBatch::new(token_embeddings, attention_mask);
        assert!(matches!(result, Err(SimilarityError::ValueError(_))));
    }

    #[test]
    fn rejects_ragged_vectors() {
        let token_embeddings = vec![
            vec![vec![1.0, 2.0], vec![3.0, 4.0]],
            vec![vec![1.0, 2.0]],
        ];
        let attention_mask = vec![vec![1, 1], vec![1, 0]];

        let result = TokenEmbeddingBatch::from_vecs(&token_embeddings, &attention_mask);
        assert!(matches!(result, Err(SimilarityError::ShapeMismatch(_))));

        let token_embeddings = vec![vec![vec![1.0, 2.0], vec![3.0]]];
        let attention_mask = vec![vec![1, 1]];
        let result = TokenEmbeddingBatch::from_vecs(&token_embeddings, &attention_mask);
        assert!(matches!(result, Err(SimilarityError::ShapeMismatch(_))));
    }

    #[test]
    fn builds_from_vecs() -> anyhow::Result<()> {
        let token_embeddings = vec![
            vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]],
            vec![vec![7.0, 8.0, 9.0], vec![0.0, 0.0, 0.0]],
        ];
        let attention_mask = vec![vec![1, 1], vec![1, 0]];

        let batch = TokenEmbeddingBatch::from_vecs(&token_embeddings, &attention_mask)?;

        assert_eq!(batch.num_sentences(), 2);
        assert_eq!(batch.sequence_length(), 2);
        assert_eq!(batch.embedding_dim(), 3);
        assert_eq!(batch.token_embeddings().double_value(&[1, 0, 2]), 9.0);
        assert_eq!(batch.attention_mask().int64_value(&[1, 1]), 0);
        Ok(())
    }

    #[test]
    fn builds_empty_batch() -> anyhow::Result<()> {
        let batch = TokenEmbeddingBatch::from_vecs(&[], &[])?;
        assert_eq!(batch.num_sentences(), 0);
        Ok(())
    }
}
