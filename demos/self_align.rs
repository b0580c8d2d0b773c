//! 演示如何在 library 模式下使用 pals-rust 寻找序列内部的重复。
//!
//! 运行方式：
//! ```bash
//! cargo run --example self_align
//! ```

use pals_rust::align::{AlignOpt, Pals, Strand};
use pals_rust::util::dna;

fn main() -> anyhow::Result<()> {
    // 1. 构造一条带有正向串联重复和反向重复的序列
    let mut x: u32 = 2024;
    let mut seq: Vec<u8> = (0..3_000)
        .map(|_| {
            x = x.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            b"ACGT"[(x >> 16) as usize % 4]
        })
        .collect();
    let repeat = seq[200..700].to_vec();
    seq[1_200..1_700].copy_from_slice(&repeat);
    seq[2_300..2_800].copy_from_slice(&dna::revcomp(&repeat));
    println!("序列长度: {} bp", seq.len());

    // 2. 推导参数
    let opt = AlignOpt {
        min_hit_length: 300,
        min_identity: 0.9,
        ..AlignOpt::default()
    };
    let params = opt.resolve(seq.len())?;
    println!(
        "k = {}, max_error = {}, tube_offset = {}",
        params.filter.word_size, params.filter.max_error, params.filter.tube_offset
    );

    // 3. 自比对两条链
    let pals = Pals::new(&seq, None, params)?;
    let (fwd, rev) = pals.align_both()?;

    for (strand, hits) in [(Strand::Forward, &fwd), (Strand::Reverse, &rev)] {
        for h in hits.iter() {
            println!(
                "{} target {}..{}  query {}..{}  score {}  error {:.3}",
                strand.symbol(),
                h.abpos,
                h.aepos,
                h.bbpos,
                h.bepos,
                h.score,
                h.error
            );
        }
    }
    println!("\n共 {} 条正向、{} 条反向命中", fwd.len(), rev.len());
    Ok(())
}
