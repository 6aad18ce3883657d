use criterion::{Criterion, criterion_group, criterion_main};
use kb_assist::embeddings::{EmbeddingProvider, HashingEmbedder};
use kb_assist::index::VectorIndex;
use std::hint::black_box;

const DIMENSION: usize = 384;
const ENTRIES: usize = 5_000;

fn synthetic_notes() -> Vec<String> {
    let topics = ["transport", "hana", "memory", "dump", "lock", "spool", "kernel", "upgrade"];
    (0..ENTRIES)
        .map(|i| {
            format!(
                "Note {i}: {} {} issue in system {}",
                topics[i % topics.len()],
                topics[(i / 7) % topics.len()],
                i % 97
            )
        })
        .collect()
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let embedder = HashingEmbedder::new(DIMENSION).expect("valid dimension");
    let vectors = embedder
        .encode_batch(&synthetic_notes())
        .expect("hashing never fails");
    let index = VectorIndex::from_vectors(&vectors).expect("index builds");
    let query = embedder
        .encode_one("transport stuck in import queue")
        .expect("hashing never fails");

    c.bench_function("flat_l2_search_top3", |b| {
        b.iter(|| index.search(black_box(&query), black_box(3)))
    });

    c.bench_function("hashing_encode_query", |b| {
        b.iter(|| embedder.encode_one(black_box("HANA out of memory during delta merge")))
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
