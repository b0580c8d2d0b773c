//! k-mer 索引
//!
//! 对目标序列中每个只含有效碱基的 k-mer 记录其起始位置。索引采用计数排序：
//! `finger[kmer]..finger[kmer + 1]` 为该 k-mer 在 `positions` 中的区间，
//! 区间内的位置按升序排列。

use crate::error::{PalsError, PalsResult};
use crate::util::dna;

pub const MIN_KMER_LEN: usize = 1;
/// finger 表大小为 4^k + 1，k = 14 时约 1 GiB
pub const MAX_KMER_LEN: usize = 14;

#[derive(Debug)]
pub struct KmerIndex {
    k: usize,
    finger: Vec<u32>,
    positions: Vec<u32>,
}

/// 依次回调 `seq[start..end]` 内每个有效 k-mer 的 `(起始位置, 2-bit 编码)`；
/// 遇到无效碱基时重新开始计数。
fn scan_kmers<F>(seq: &[u8], start: usize, end: usize, k: usize, mut f: F) -> PalsResult<()>
where
    F: FnMut(usize, u32) -> PalsResult<()>,
{
    let mask: u32 = if k >= 16 { u32::MAX } else { (1u32 << (2 * k)) - 1 };
    let mut kmer = 0u32;
    let mut run = 0usize;
    for (i, &b) in seq[start..end].iter().enumerate() {
        match dna::encode(b) {
            Some(c) => {
                kmer = ((kmer << 2) | c as u32) & mask;
                run += 1;
                if run >= k {
                    f(start + i + 1 - k, kmer)?;
                }
            }
            None => {
                kmer = 0;
                run = 0;
            }
        }
    }
    Ok(())
}

/// 索引占用的字节数估计
pub fn index_bytes(k: usize, seq_len: usize) -> usize {
    let fingers = (1usize << (2 * k)) + 1;
    (fingers + seq_len) * std::mem::size_of::<u32>()
}

impl KmerIndex {
    pub fn build(seq: &[u8], k: usize) -> PalsResult<Self> {
        if !(MIN_KMER_LEN..=MAX_KMER_LEN).contains(&k) {
            return Err(PalsError::Config(format!(
                "k-mer length {k} outside supported range {MIN_KMER_LEN}..={MAX_KMER_LEN}"
            )));
        }
        if seq.len() > u32::MAX as usize {
            return Err(PalsError::Config(format!("sequence of length {} too long to index", seq.len())));
        }

        // 第一遍：计数
        let buckets = 1usize << (2 * k);
        let mut finger = vec![0u32; buckets + 1];
        scan_kmers(seq, 0, seq.len(), k, |_, kmer| {
            finger[kmer as usize + 1] += 1;
            Ok(())
        })?;
        for i in 1..finger.len() {
            finger[i] += finger[i - 1];
        }

        // 第二遍：按序填入位置，桶内自然升序
        let mut positions = vec![0u32; finger[buckets] as usize];
        let mut next: Vec<u32> = finger[..buckets].to_vec();
        scan_kmers(seq, 0, seq.len(), k, |pos, kmer| {
            let slot = &mut next[kmer as usize];
            positions[*slot as usize] = pos as u32;
            *slot += 1;
            Ok(())
        })?;

        Ok(Self { k, finger, positions })
    }

    pub fn word_length(&self) -> usize {
        self.k
    }

    /// 索引中 k-mer 出现的总次数
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// 某个 k-mer 在目标序列中的全部起始位置（升序）
    pub fn positions_of(&self, kmer: u32) -> &[u32] {
        let k = kmer as usize;
        if k + 1 >= self.finger.len() {
            return &[];
        }
        &self.positions[self.finger[k] as usize..self.finger[k + 1] as usize]
    }

    /// 枚举 `seq[start..end]` 中的有效 k-mer；回调出错时立即中止并返回该错误
    pub fn for_each_kmer<F>(&self, seq: &[u8], start: usize, end: usize, f: F) -> PalsResult<()>
    where
        F: FnMut(usize, u32) -> PalsResult<()>,
    {
        if start > end || end > seq.len() {
            return Err(PalsError::Range(format!(
                "k-mer range {start}..{end} invalid for sequence of length {}",
                seq.len()
            )));
        }
        scan_kmers(seq, start, end, self.k, f)
    }
}
