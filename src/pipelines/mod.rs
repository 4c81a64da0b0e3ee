//! # Ready-to-use pipelines
//!
//! #### Sentence similarity
//! Pool token embeddings into sentence vectors and compute the pairwise cosine similarity
//! matrix of a batch, see [`sentence_embeddings`](sentence_embeddings).

pub mod sentence_embeddings;
