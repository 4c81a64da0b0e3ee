use std::convert::TryFrom;

use serde::{Deserialize, Serialize};
use tch::{Kind, Tensor};

use crate::pipelines::sentence_embeddings::similarity::unit_rows;
use crate::pipelines::sentence_embeddings::TokenEmbeddingBatch;
use crate::{Config, SimilarityError};

/// Lower bound applied to the number of valid tokens before dividing, so that sentences
/// without any valid token pool to a zero vector instead of NaN.
pub const MIN_TOKEN_COUNT: f64 = 1e-9;

/// Value written at padded positions before max-pooling.
const MAX_POOLING_PADDING_VALUE: f64 = -1e9;

/// Configuration for [`Pooling`](Pooling) layer.
///
/// Follows the layout of the `1_Pooling/config.json` file shipped with
/// Sentence-Transformers models. Modes that are not present in the file are disabled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolingConfig {
    /// Dimensions for the word embeddings. When set, incoming token embeddings must match.
    #[serde(default)]
    pub word_embedding_dimension: Option<i64>,
    /// Use the first token (CLS token) as text representations
    #[serde(default)]
    pub pooling_mode_cls_token: bool,
    /// Use max in each dimension over all tokens
    #[serde(default)]
    pub pooling_mode_max_tokens: bool,
    /// Perform mean-pooling
    #[serde(default)]
    pub pooling_mode_mean_tokens: bool,
    /// Perform mean-pooling, but divide by sqrt(input_length)
    #[serde(default)]
    pub pooling_mode_mean_sqrt_len_tokens: bool,
}

impl Config for PoolingConfig {}

impl Default for PoolingConfig {
    fn default() -> PoolingConfig {
        PoolingConfig {
            word_embedding_dimension: None,
            pooling_mode_cls_token: false,
            pooling_mode_max_tokens: false,
            pooling_mode_mean_tokens: true,
            pooling_mode_mean_sqrt_len_tokens: false,
        }
    }
}

impl PoolingConfig {
    /// Number of enabled pooling modes. The pooled vector is the concatenation of one
    /// vector per mode.
    pub fn num_modes(&self) -> i64 {
        [
            self.pooling_mode_cls_token,
            self.pooling_mode_max_tokens,
            self.pooling_mode_mean_tokens,
            self.pooling_mode_mean_sqrt_len_tokens,
        ]
        .iter()
        .filter(|enabled| **enabled)
        .count() as i64
    }

    pub fn validate(self) -> Result<Self, SimilarityError> {
        if self.num_modes() == 0 {
            return Err(SimilarityError::InvalidConfigurationError(
                "At least one pooling mode must be enabled".to_string(),
            ));
        }
        if let Some(dimension) = self.word_embedding_dimension {
            if dimension <= 0 {
                return Err(SimilarityError::InvalidConfigurationError(format!(
                    "word_embedding_dimension must be positive, got {}",
                    dimension
                )));
            }
        }
        Ok(self)
    }
}

/// Performs pooling (max or mean) on the token embeddings.
///
/// Using pooling, it generates from a variable sized sentence a fixed sized sentence
/// embedding. You can concatenate multiple poolings together.
///
/// Padded positions (mask value 0) never contribute to the output. Accumulation is done
/// in double precision and the output tensor is of kind `Kind::Double`.
#[derive(Debug)]
pub struct Pooling {
    conf: PoolingConfig,
}

impl Pooling {
    pub fn new(conf: PoolingConfig) -> Result<Pooling, SimilarityError> {
        Ok(Pooling {
            conf: conf.validate()?,
        })
    }

    pub fn config(&self) -> &PoolingConfig {
        &self.conf
    }

    /// Output dimension for token embeddings of dimension `word_embedding_dimension`
    pub fn output_dim(&self, word_embedding_dimension: i64) -> i64 {
        word_embedding_dimension * self.conf.num_modes()
    }

    /// Pools a batch of token embeddings into one vector per sentence.
    ///
    /// # Arguments
    ///
    /// * `batch` - `TokenEmbeddingBatch` with (N, L, D) embeddings and (N, L) mask
    ///
    /// # Returns
    ///
    /// * `Tensor` of shape (N, D * number of enabled modes)
    pub fn forward(&self, batch: &TokenEmbeddingBatch) -> Result<Tensor, SimilarityError> {
        let (num_sentences, sequence_length, embedding_dim) = (
            batch.num_sentences(),
            batch.sequence_length(),
            batch.embedding_dim(),
        );
        if let Some(expected_dim) = self.conf.word_embedding_dimension {
            if expected_dim != embedding_dim {
                return Err(SimilarityError::ShapeMismatch(format!(
                    "pooling layer expects embeddings of dimension {}, got {}",
                    expected_dim, embedding_dim
                )));
            }
        }

        let token_embeddings = batch.token_embeddings().to_kind(Kind::Double);
        let input_mask_expanded = batch
            .attention_mask()
            .unsqueeze(-1)
            .expand_as(&token_embeddings)
            .to_kind(Kind::Double);
        let token_counts = batch
            .attention_mask()
            .sum_dim_intlist([1i64].as_slice(), true, Kind::Double);

        if tracing::enabled!(tracing::Level::DEBUG) {
            let empty_sentences = i64::try_from(token_counts.eq(0.0).sum(Kind::Int64))?;
            tracing::debug!(
                num_sentences,
                sequence_length,
                embedding_dim,
                empty_sentences,
                "pooling token embeddings"
            );
        }

        let mut output_vectors = Vec::new();

        if self.conf.pooling_mode_cls_token {
            let cls_token = if sequence_length > 0 {
                // First token, regardless of the mask
                token_embeddings.select(1, 0)
            } else {
                token_embeddings.sum_dim_intlist([1i64].as_slice(), false, Kind::Double)
            };
            output_vectors.push(cls_token);
        }

        if self.conf.pooling_mode_max_tokens {
            let max_over_time = if sequence_length > 0 {
                let has_tokens = token_counts.gt(0.0).to_kind(Kind::Double);
                token_embeddings
                    .masked_fill(&input_mask_expanded.eq(0.0), MAX_POOLING_PADDING_VALUE)
                    .max_dim(1, false)
                    .0
                    * has_tokens
            } else {
                token_embeddings.sum_dim_intlist([1i64].as_slice(), false, Kind::Double)
            };
            output_vectors.push(max_over_time);
        }

        if self.conf.pooling_mode_mean_tokens || self.conf.pooling_mode_mean_sqrt_len_tokens {
            let sum_embeddings = (&token_embeddings * &input_mask_expanded).sum_dim_intlist(
                [1i64].as_slice(),
                false,
                Kind::Double,
            );
            let sum_mask = input_mask_expanded
                .sum_dim_intlist([1i64].as_slice(), false, Kind::Double)
                .clamp_min(MIN_TOKEN_COUNT);

            if self.conf.pooling_mode_mean_tokens {
                output_vectors.push(&sum_embeddings / &sum_mask);
            }
            if self.conf.pooling_mode_mean_sqrt_len_tokens {
                output_vectors.push(sum_embeddings / sum_mask.sqrt());
            }
        }

        Ok(Tensor::cat(&output_vectors, 1))
    }
}

/// L2-normalizes each row of a (N, D) tensor. Rows with a zero norm stay zero.
pub fn normalize_embeddings(embeddings: &Tensor) -> Tensor {
    unit_rows(embeddings)
}
