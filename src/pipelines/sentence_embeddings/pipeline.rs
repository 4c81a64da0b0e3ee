use std::convert::TryFrom;

use tch::{Device, Kind, Tensor};

use crate::pipelines::sentence_embeddings::layers::{normalize_embeddings, Pooling};
use crate::pipelines::sentence_embeddings::similarity::{cosine_similarity_matrix, zero_norm_rows};
use crate::pipelines::sentence_embeddings::{
    SentenceSimilarityConfig, SentenceVector, SimilarityMatrix, TokenEmbeddingBatch,
    TokenEmbeddingSource,
};
use crate::SimilarityError;

/// # SentenceSimilarityModel to compare the sentences of a batch
///
/// It is made of the following blocks:
/// - `pooling`: Pooling layer reducing token embeddings to one vector per sentence
/// - `normalization` _(optional)_: Embeddings normalization
/// - cosine similarity between every pair of sentence vectors
///
/// The transformer producing the token embeddings is provided by the caller, either as a
/// ready `TokenEmbeddingBatch` or as a `TokenEmbeddingSource`.
#[derive(Debug)]
pub struct SentenceSimilarityModel {
    pooling_layer: Pooling,
    normalize_embeddings: bool,
    device: Device,
}

impl SentenceSimilarityModel {
    /// Build a new `SentenceSimilarityModel`
    ///
    /// # Arguments
    ///
    /// * `config` - `SentenceSimilarityConfig` object containing the pooling configuration and device placement (CPU/GPU)
    ///
    /// # Example
    ///
    /// ```no_run
    /// use sbert_similarity::pipelines::sentence_embeddings::{
    ///     SentenceSimilarityConfig, SentenceSimilarityModel,
    /// };
    ///
    /// # fn main() -> Result<(), sbert_similarity::SimilarityError> {
    /// let model = SentenceSimilarityModel::new(SentenceSimilarityConfig::default())?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(config: SentenceSimilarityConfig) -> Result<Self, SimilarityError> {
        let SentenceSimilarityConfig {
            pooling_config,
            normalize_embeddings,
            device,
        } = config;

        Ok(Self {
            pooling_layer: Pooling::new(pooling_config)?,
            normalize_embeddings,
            device,
        })
    }

    pub fn get_pooling_layer(&self) -> &Pooling {
        &self.pooling_layer
    }

    /// Pools the token embeddings into sentence vectors, outputs a (N, D) `Tensor`.
    pub fn pool(&self, batch: &TokenEmbeddingBatch) -> Result<Tensor, SimilarityError> {
        let batch = batch.to(self.device);
        let pooled = tch::no_grad(|| self.pooling_layer.forward(&batch))?;
        if self.normalize_embeddings {
            Ok(normalize_embeddings(&pooled))
        } else {
            Ok(pooled)
        }
    }

    /// Pools the token embeddings into one `SentenceVector` per sentence.
    pub fn encode(
        &self,
        batch: &TokenEmbeddingBatch,
    ) -> Result<Vec<SentenceVector>, SimilarityError> {
        let pooled = self.pool(batch)?;
        tensor_to_vectors(&pooled)
    }

    /// Computes the pairwise cosine similarity matrix of the sentences of the batch.
    pub fn similarity(
        &self,
        batch: &TokenEmbeddingBatch,
    ) -> Result<SimilarityMatrix, SimilarityError> {
        Ok(self.forward(batch)?.similarity)
    }

    /// Pools the batch and computes the similarity matrix, keeping the sentence vectors.
    pub fn forward(
        &self,
        batch: &TokenEmbeddingBatch,
    ) -> Result<SentenceSimilarityOutput, SimilarityError> {
        let sentence_vectors = self.pool(batch)?;
        let scores = tch::no_grad(|| cosine_similarity_matrix(&sentence_vectors))?;
        let similarity = SimilarityMatrix::try_from(&scores)?;

        tracing::debug!(
            num_sentences = similarity.len(),
            "computed sentence similarity matrix"
        );

        Ok(SentenceSimilarityOutput {
            sentence_vectors,
            similarity,
        })
    }

    /// Encodes the inputs with the given `TokenEmbeddingSource` and compares them.
    ///
    /// # Arguments
    ///
    /// * `source` - producer of token embeddings (tokenizer and transformer)
    /// * `inputs` - sentences to compare
    pub fn compute<T, S>(
        &self,
        source: &T,
        inputs: &[S],
    ) -> Result<SentenceSimilarityOutput, SimilarityError>
    where
        T: TokenEmbeddingSource,
        S: AsRef<str> + Sync,
    {
        let batch = source.embed(inputs)?;
        if batch.num_sentences() != inputs.len() as i64 {
            return Err(SimilarityError::ShapeMismatch(format!(
                "token embedding source returned {} sentences for {} inputs",
                batch.num_sentences(),
                inputs.len()
            )));
        }
        self.forward(&batch)
    }
}

fn tensor_to_vectors(sentence_vectors: &Tensor) -> Result<Vec<SentenceVector>, SimilarityError> {
    let size = sentence_vectors.size();
    let (num_sentences, embedding_dim) = (size[0] as usize, size[1] as usize);
    let values = Vec::<f64>::try_from(
        sentence_vectors
            .to_kind(Kind::Double)
            .to_device(Device::Cpu)
            .contiguous()
            .view([-1]),
    )?;
    Ok((0..num_sentences)
        .map(|i| values[i * embedding_dim..(i + 1) * embedding_dim].to_vec())
        .collect())
}

/// Container for the SentenceSimilarity model output.
#[derive(Debug)]
pub struct SentenceSimilarityOutput {
    /// (N, D) pooled sentence vectors, of kind `Kind::Double`
    pub sentence_vectors: Tensor,
    /// (N, N) cosine similarity matrix
    pub similarity: SimilarityMatrix,
}

impl SentenceSimilarityOutput {
    /// Sentence vectors as plain vectors.
    pub fn sentence_vectors(&self) -> Result<Vec<SentenceVector>, SimilarityError> {
        tensor_to_vectors(&self.sentence_vectors)
    }

    /// Indices of the sentences whose vector has a zero norm (e.g. an all-padding mask).
    /// Their similarity to every sentence, themselves included, is 0.0.
    pub fn degenerate_sentences(&self) -> Result<Vec<usize>, SimilarityError> {
        zero_norm_rows(&self.sentence_vectors)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    #[ignore] // no need to run, compilation is enough to verify it is Send
    fn test() {
        let config = SentenceSimilarityConfig::default();
        let _: Box<dyn Send> = Box::new(SentenceSimilarityModel::new(config));
    }
}
