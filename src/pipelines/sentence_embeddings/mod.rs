//! # Sentence Similarity pipeline
//!
//! Reduces the token embeddings produced by a transformer to one vector per sentence and
//! compares every sentence of a batch with every other one using cosine similarity. The
//! resulting matrix can be used for clustering, duplicate detection, paraphrase mining or
//! re-ranking.
//!
//! Pooling follows [Sentence-Transformers][sbert]: padded positions are excluded using the
//! attention mask, and a sentence without any valid token pools to a zero vector. The
//! pooling configuration of a model from the [Hugging Face Hub][sbert-hub] can be read
//! from its `modules.json` and `1_Pooling/config.json` files.
//!
//! [sbert]: https://sbert.net/
//! [sbert-hub]: https://huggingface.co/sentence-transformers/
//!
//! Basic usage is as follows:
//!
//! ```no_run
//! use sbert_similarity::pipelines::sentence_embeddings::{
//!     SentenceSimilarityBuilder, TokenEmbeddingBatch,
//! };
//! use tch::{Device, Kind, Tensor};
//!
//! # fn main() -> anyhow::Result<()> {
//! let model = SentenceSimilarityBuilder::local("local/path/to/bert-base-nli-mean-tokens")
//!     .with_device(Device::cuda_if_available())
//!     .create_model()?;
//!
//! // Output of the transformer: (sentences, positions, features) and (sentences, positions)
//! let token_embeddings = Tensor::rand([7, 128, 768], (Kind::Float, Device::Cpu));
//! let attention_mask = Tensor::ones([7, 128], (Kind::Int64, Device::Cpu));
//! let batch = TokenEmbeddingBatch::new(token_embeddings, attention_mask)?;
//!
//! let similarity = model.similarity(&batch)?;
//! let pairs = similarity.most_similar_pairs(3);
//! # Ok(())
//! # }
//! ```

mod batch;
pub mod builder;
mod config;
pub mod layers;
mod pipeline;
mod similarity;

pub use batch::{TokenEmbeddingBatch, TokenEmbeddingSource};
pub use builder::SentenceSimilarityBuilder;
pub use config::{
    SentenceEmbeddingsModuleConfig, SentenceEmbeddingsModuleType, SentenceEmbeddingsModulesConfig,
    SentenceSimilarityConfig,
};
pub use pipeline::{SentenceSimilarityModel, SentenceSimilarityOutput};
pub use similarity::{cosine_similarity_matrix, zero_norm_rows, ScoredPair, SimilarityMatrix};

/// Length = embedding dimension
pub type SentenceVector = Vec<f64>;
