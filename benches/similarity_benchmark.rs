#[macro_use]
extern crate criterion;

use criterion::{black_box, Criterion};
use sbert_similarity::pipelines::sentence_embeddings::{
    cosine_similarity_matrix, SentenceSimilarityConfig, SentenceSimilarityModel,
    TokenEmbeddingBatch,
};
use std::time::{Duration, Instant};
use tch::kind::Kind;
use tch::{Device, Tensor};

fn similarity_matrix(iters: u64, sentence_vectors: &Tensor) -> Duration {
    let mut duration = Duration::new(0, 0);
    for _i in 0..iters {
        let start = Instant::now();
        let _ = cosine_similarity_matrix(sentence_vectors).unwrap();
        duration = duration.checked_add(start.elapsed()).unwrap();
    }
    duration
}

fn pooling_and_similarity(
    iters: u64,
    model: &SentenceSimilarityModel,
    batch: &TokenEmbeddingBatch,
) -> Duration {
    let mut duration = Duration::new(0, 0);
    for _i in 0..iters {
        let start = Instant::now();
        let _ = model.similarity(batch).unwrap();
        duration = duration.checked_add(start.elapsed()).unwrap();
    }
    duration
}

fn bench_similarity(c: &mut Criterion) {
    //    Set-up batch of 32 sentences, 128 positions, BERT-base hidden size
    let token_embeddings = Tensor::rand([32, 128, 768], (Kind::Float, Device::Cpu));
    let attention_mask = Tensor::ones([32, 128], (Kind::Int64, Device::Cpu));
    let batch = TokenEmbeddingBatch::new(token_embeddings, attention_mask).unwrap();
    let model = SentenceSimilarityModel::new(SentenceSimilarityConfig::default()).unwrap();
    let sentence_vectors = model.pool(&batch).unwrap();

    c.bench_function("Similarity matrix", |b| {
        b.iter_custom(|iters| black_box(similarity_matrix(iters, &sentence_vectors)))
    });
    c.bench_function("Pooling and similarity", |b| {
        b.iter_custom(|iters| black_box(pooling_and_similarity(iters, &model, &batch)))
    });
}

criterion_group! {
name = benches;
config = Criterion::default().sample_size(100);
targets = bench_similarity
}

criterion_main!(benches);
