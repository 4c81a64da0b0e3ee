use std::cmp::Reverse;
use std::convert::TryFrom;

use ordered_float::OrderedFloat;
use tch::{Device, Kind, Tensor};

use crate::SimilarityError;

/// Computes the full pairwise cosine similarity matrix of a set of sentence vectors.
///
/// Every row is compared against all `N` vectors, itself included. The computation runs in
/// double precision and the result is clamped to `[-1, 1]`. A vector with a zero norm has a
/// similarity of 0.0 with every vector, itself included. The returned matrix is exactly
/// symmetric.
///
/// # Arguments
///
/// * `sentence_vectors` - (N, D) tensor of sentence vectors
///
/// # Returns
///
/// * (N, N) `Tensor` of kind `Kind::Double`
///
/// # Example
///
/// ```no_run
/// use sbert_similarity::pipelines::sentence_embeddings::cosine_similarity_matrix;
/// use tch::Tensor;
///
/// # fn main() -> Result<(), sbert_similarity::SimilarityError> {
/// let sentence_vectors = Tensor::from_slice(&[1.0f64, 0.0, 0.0, 1.0, 2.0, 0.0]).view([3, 2]);
/// let scores = cosine_similarity_matrix(&sentence_vectors)?;
/// # Ok(())
/// # }
/// ```
pub fn cosine_similarity_matrix(sentence_vectors: &Tensor) -> Result<Tensor, SimilarityError> {
    if sentence_vectors.dim() != 2 {
        return Err(SimilarityError::ShapeMismatch(format!(
            "sentence vectors must have 2 dimensions (sentences, features), got shape {:?}",
            sentence_vectors.size()
        )));
    }

    let unit_vectors = unit_rows(&sentence_vectors.to_kind(Kind::Double));

    let scores = unit_vectors.matmul(&unit_vectors.transpose(0, 1));
    let scores = (&scores + scores.transpose(0, 1)) / 2.0;
    Ok(scores.clamp(-1.0, 1.0))
}

/// Divides every row of a (N, D) tensor by its largest absolute value.
///
/// Returns the rescaled rows, whose entries lie in `[-1, 1]` with at least one at +/-1, and
/// the (N, 1) scales. Rows of zeros keep a scale of 0 and stay zero.
fn max_abs_scaled(vectors: &Tensor) -> (Tensor, Tensor) {
    let size = vectors.size();
    let row_max = if size[1] > 0 {
        vectors.abs().amax([1i64].as_slice(), true)
    } else {
        Tensor::zeros([size[0], 1], (vectors.kind(), vectors.device()))
    };
    let divisor = row_max.where_self(&row_max.gt(0.0), &row_max.ones_like());
    (vectors / divisor, row_max)
}

/// L2-normalizes the rows of a (N, D) floating point tensor without overflow or underflow
/// of the intermediate squares. Rows of zeros stay zero.
pub(crate) fn unit_rows(vectors: &Tensor) -> Tensor {
    let (scaled, _) = max_abs_scaled(vectors);
    // Non-zero rescaled rows have a norm in [1, sqrt(D)].
    let norms = scaled
        .linalg_norm(2.0, [1i64].as_slice(), true, scaled.kind())
        .clamp_min(1.0);
    scaled / norms
}

/// Indices of the rows of a (N, D) tensor with a zero L2 norm, i.e. rows of zeros.
pub fn zero_norm_rows(sentence_vectors: &Tensor) -> Result<Vec<usize>, SimilarityError> {
    if sentence_vectors.dim() != 2 {
        return Err(SimilarityError::ShapeMismatch(format!(
            "sentence vectors must have 2 dimensions (sentences, features), got shape {:?}",
            sentence_vectors.size()
        )));
    }
    let (_, row_max) = max_abs_scaled(&sentence_vectors.to_kind(Kind::Double));
    let row_max = Vec::<f64>::try_from(row_max.view([-1]).to_device(Device::Cpu))?;
    Ok(row_max
        .iter()
        .enumerate()
        .filter(|(_, value)| **value == 0.0)
        .map(|(index, _)| index)
        .collect())
}

/// Pair of sentences with their similarity score, `first < second`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredPair {
    pub first: usize,
    pub second: usize,
    pub score: f64,
}

/// # Dense N x N cosine similarity matrix
///
/// Row-major, values in `[-1, 1]`, `get(i, j) == get(j, i)`.
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityMatrix {
    size: usize,
    scores: Vec<f64>,
}

impl SimilarityMatrix {
    /// Computes the similarity matrix of a (N, D) tensor of sentence vectors.
    pub fn from_sentence_vectors(sentence_vectors: &Tensor) -> Result<Self, SimilarityError> {
        Self::try_from(&cosine_similarity_matrix(sentence_vectors)?)
    }

    /// Number of sentences (N)
    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Similarity between sentences `i` and `j`, `None` if either is out of range.
    pub fn get(&self, i: usize, j: usize) -> Option<f64> {
        if i < self.size && j < self.size {
            Some(self.scores[i * self.size + j])
        } else {
            None
        }
    }

    /// Similarities between sentence `i` and every sentence of the batch.
    pub fn row(&self, i: usize) -> Option<&[f64]> {
        if i < self.size {
            Some(&self.scores[i * self.size..(i + 1) * self.size])
        } else {
            None
        }
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f64]> + '_ {
        (0..self.size).map(move |i| &self.scores[i * self.size..(i + 1) * self.size])
    }

    pub fn to_vec(&self) -> Vec<Vec<f64>> {
        self.rows().map(|row| row.to_vec()).collect()
    }

    /// Ranks the other sentences of the batch by decreasing similarity to sentence `i`.
    ///
    /// # Arguments
    ///
    /// * `i` - index of the query sentence
    /// * `top_k` - maximum number of neighbours to return
    ///
    /// # Returns
    ///
    /// * `Vec<(usize, f64)>` of (sentence index, score), ties broken by lowest index
    pub fn most_similar(
        &self,
        i: usize,
        top_k: usize,
    ) -> Result<Vec<(usize, f64)>, SimilarityError> {
        let row = self.row(i).ok_or_else(|| {
            SimilarityError::ValueError(format!(
                "sentence index {} out of range for a batch of {} sentences",
                i, self.size
            ))
        })?;

        let mut neighbours = row
            .iter()
            .copied()
            .enumerate()
            .filter(|(j, _)| *j != i)
            .collect::<Vec<(usize, f64)>>();
        neighbours.sort_by_key(|(j, score)| (Reverse(OrderedFloat(*score)), *j));
        neighbours.truncate(top_k);
        Ok(neighbours)
    }

    /// Ranks every distinct pair of sentences of the batch by decreasing similarity
    /// (paraphrase mining).
    ///
    /// # Arguments
    ///
    /// * `top_k` - maximum number of pairs to return
    pub fn most_similar_pairs(&self, top_k: usize) -> Vec<ScoredPair> {
        let mut pairs = Vec::with_capacity(self.size * self.size.saturating_sub(1) / 2);
        for first in 0..self.size {
            for second in first + 1..self.size {
                pairs.push(ScoredPair {
                    first,
                    second,
                    score: self.scores[first * self.size + second],
                });
            }
        }
        pairs.sort_by_key(|pair| (Reverse(OrderedFloat(pair.score)), pair.first, pair.second));
        pairs.truncate(top_k);
        pairs
    }
}

impl TryFrom<&Tensor> for SimilarityMatrix {
    type Error = SimilarityError;

    fn try_from(scores: &Tensor) -> Result<Self, Self::Error> {
        let shape = scores.size();
        if shape.len() != 2 || shape[0] != shape[1] {
            return Err(SimilarityError::ShapeMismatch(format!(
                "similarity matrix must be square, got shape {:?}",
                shape
            )));
        }
        let scores_flat = scores
            .to_kind(Kind::Double)
            .to_device(Device::Cpu)
            .contiguous()
            .view([-1]);

        Ok(SimilarityMatrix {
            size: shape[0] as usize,
            scores: Vec::<f64>::try_from(scores_flat)?,
        })
    }
}
