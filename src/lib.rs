//! # Sentence similarity from transformer token embeddings
//!
//! Reduces the per-token hidden states of a transformer to one fixed-length vector per
//! sentence and computes the dense pairwise cosine similarity matrix of a batch of
//! sentences. Tokenization and transformer inference are left to the caller (for example
//! [rust-bert](https://github.com/guillaume-be/rust-bert) or any other libtorch model);
//! this crate consumes their output:
//!
//! - a `(N, L, D)` tensor of token embeddings,
//! - a `(N, L)` attention mask with 1 for real tokens and 0 for padding.
//!
//! ```no_run
//! use sbert_similarity::pipelines::sentence_embeddings::{
//!     SentenceSimilarityConfig, SentenceSimilarityModel, TokenEmbeddingBatch,
//! };
//!
//! # fn main() -> anyhow::Result<()> {
//! let model = SentenceSimilarityModel::new(SentenceSimilarityConfig::default())?;
//!
//! let token_embeddings = vec![
//!     vec![vec![0.1, 0.4, -0.2], vec![0.3, 0.2, 0.0], vec![0.0, 0.0, 0.0]],
//!     vec![vec![0.2, 0.3, -0.1], vec![0.2, 0.2, 0.1], vec![0.5, -0.3, 0.2]],
//! ];
//! let attention_mask = vec![vec![1, 1, 0], vec![1, 1, 1]];
//! let batch = TokenEmbeddingBatch::from_vecs(&token_embeddings, &attention_mask)?;
//!
//! let output = model.forward(&batch)?;
//! let score = output.similarity.get(0, 1);
//! # Ok(())
//! # }
//! ```
//!
//! ## Numeric behaviour
//!
//! - Mean pooling divides by the number of valid tokens, clamped to `1e-9`: a sentence
//!   whose mask is all zeros pools to a zero vector.
//! - Similarities are computed in double precision, clamped to `[-1, 1]`, and the matrix
//!   is exactly symmetric.
//! - A zero vector has a similarity of 0.0 with every sentence, itself included. These
//!   sentences can be listed with `SentenceSimilarityOutput::degenerate_sentences`.
//!
//! ## Loading libtorch
//!
//! The `download-libtorch` feature (enabled by default) fetches a CPU build of libtorch
//! at build time. Disable default features and set `LIBTORCH` to use a local install.

pub mod common;
pub mod pipelines;

pub use common::error::SimilarityError;
pub use common::Config;
