use criterion::{black_box, criterion_group, criterion_main, Criterion};

use pals_rust::align::{AlignOpt, Filter, Pals, Strand};
use pals_rust::index::kmer::KmerIndex;
use pals_rust::io::morass::{Morass, Spool};

fn make_reference(len: usize, seed: u32) -> Vec<u8> {
    let bases = [b'A', b'C', b'G', b'T'];
    let mut seq = Vec::with_capacity(len);
    let mut x: u32 = seed;
    for _ in 0..len {
        x = x.wrapping_mul(1_103_515_245).wrapping_add(12_345);
        seq.push(bases[(x >> 16) as usize % 4]);
    }
    seq
}

/// 随机序列中每隔一段复制一份前面的片段，并点突变约 2%
fn make_repetitive(len: usize) -> Vec<u8> {
    let mut seq = make_reference(len, 42);
    let mut pos = 2_000;
    while pos + 1_000 < len {
        let src = pos - 1_500;
        let copy: Vec<u8> = seq[src..src + 800].to_vec();
        seq[pos..pos + 800].copy_from_slice(&copy);
        for i in (pos..pos + 800).step_by(50) {
            seq[i] = if seq[i] == b'A' { b'C' } else { b'A' };
        }
        pos += 3_000;
    }
    seq
}

fn opt() -> AlignOpt {
    AlignOpt {
        min_hit_length: 400,
        min_identity: 0.94,
        ..AlignOpt::default()
    }
}

fn bench_kmer_index(c: &mut Criterion) {
    let reference = make_reference(100_000, 42);
    c.bench_function("kmer_index_100kb_k10", |b| {
        b.iter(|| black_box(KmerIndex::build(black_box(&reference), 10).unwrap()));
    });
}

fn bench_filter(c: &mut Criterion) {
    let seq = make_repetitive(50_000);
    let params = opt().resolve(seq.len()).unwrap();
    let index = KmerIndex::build(&seq, params.filter.word_size).unwrap();
    let filter = Filter::new(&index, seq.len(), params.filter);

    c.bench_function("filter_self_50kb", |b| {
        b.iter(|| {
            let mut spool = Morass::new(1 << 16);
            let n = filter.filter(black_box(&seq), true, false, &mut spool).unwrap();
            spool.clean_up().unwrap();
            black_box(n)
        });
    });
}

fn bench_pipeline(c: &mut Criterion) {
    let seq = make_repetitive(50_000);
    let params = opt().resolve(seq.len()).unwrap();
    let pals = Pals::new(&seq, None, params).unwrap();

    c.bench_function("pals_self_forward_50kb", |b| {
        b.iter(|| black_box(pals.align(Strand::Forward).unwrap()));
    });
}

criterion_group!(benches, bench_kmer_index, bench_filter, bench_pipeline);
criterion_main!(benches);
