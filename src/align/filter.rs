//! q-gram 过滤
//!
//! 把比对矩阵按对角线切成宽度为 `tube_offset` 的条带（tube），相邻 tube 重叠
//! `max_error` 条对角线。查询序列从左到右扫描，统计落入每个 tube 的公共 k-mer；
//! 根据 Ukkonen 引理，任何长度 ≥ `min_match`、错误数 ≤ `max_error` 的比对
//! 至少共享 [`min_words_per_filter_hit`] 个 k-mer，因此计数达到该阈值的 tube
//! 区段作为候选命中输出。

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use super::params::FilterParams;
use crate::error::{PalsError, PalsResult};
use crate::index::kmer::KmerIndex;
use crate::io::morass::Spool;

/// Ukkonen 下界：长度 `hit_len`、至多 `max_err` 个错误的比对中至少共享的 k-mer 数
pub fn min_words_per_filter_hit(hit_len: usize, k: usize, max_err: usize) -> isize {
    hit_len as isize + 1 - (k * (max_err + 1)) as isize
}

/// 候选命中：查询区间 `[q_from, q_to)` 与所在 tube 的对角线编号
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterHit {
    pub q_from: usize,
    pub q_to: usize,
    pub diag_index: isize,
}

impl Ord for FilterHit {
    fn cmp(&self, other: &Self) -> Ordering {
        self.q_from
            .cmp(&other.q_from)
            .then(self.diag_index.cmp(&other.diag_index))
            .then(self.q_to.cmp(&other.q_to))
    }
}

impl PartialOrd for FilterHit {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct TubeState {
    q_lo: usize,
    q_hi: usize,
    count: usize,
}

pub struct Filter<'a> {
    index: &'a KmerIndex,
    target_len: usize,
    params: FilterParams,
}

/// 一次过滤扫描的可变状态
struct TubePass<'p, S> {
    index: &'p KmerIndex,
    spool: &'p mut S,
    tubes: Vec<TubeState>,
    target_len: usize,
    k: usize,
    offset: usize,
    max_error: usize,
    min_kmers: usize,
    max_kmer_dist: usize,
    skip_upper: bool,
    ticker: usize,
    hits: usize,
}

impl<'p, S: Spool<FilterHit>> TubePass<'p, S> {
    fn add_hit(&mut self, tube: usize, lo: usize, hi: usize) -> PalsResult<()> {
        self.hits += 1;
        self.spool.push(FilterHit {
            q_from: lo,
            q_to: hi + self.k,
            diag_index: self.target_len as isize - (tube * self.offset) as isize,
        })
    }

    fn hit_tube(&mut self, tube: usize, q: usize) -> PalsResult<()> {
        let cap = self.tubes.len();
        let ts = self.tubes[tube % cap];
        if ts.count == 0 {
            self.tubes[tube % cap] = TubeState { q_lo: q, q_hi: q, count: 1 };
            return Ok(());
        }
        if q - ts.q_hi > self.max_kmer_dist {
            if ts.count >= self.min_kmers {
                self.add_hit(tube, ts.q_lo, ts.q_hi)?;
            }
            self.tubes[tube % cap] = TubeState { q_lo: q, q_hi: q, count: 1 };
            return Ok(());
        }
        let slot = &mut self.tubes[tube % cap];
        slot.count += 1;
        slot.q_hi = q;
        Ok(())
    }

    fn common_kmer(&mut self, q: usize, kmer: u32) -> PalsResult<()> {
        let index = self.index;
        let cap = self.tubes.len();
        for &t in index.positions_of(kmer) {
            let t = t as usize;
            if self.skip_upper && t >= q {
                continue;
            }
            let d = self.target_len - t + q;
            let tube = d / self.offset;
            self.hit_tube(tube, q)?;
            if d % self.offset < self.max_error {
                let prev = if tube == 0 { cap - 1 } else { tube - 1 };
                self.hit_tube(prev, q)?;
            }
        }
        self.ticker -= 1;
        if self.ticker == 0 {
            self.tube_end(q)?;
            self.ticker = self.offset;
        }
        Ok(())
    }

    /// 对角线 `T - (T-1) + q` 所在的 tube 已不会再被命中，输出并清空
    fn tube_end(&mut self, q: usize) -> PalsResult<()> {
        let tube = (q + 1) / self.offset;
        let cap = self.tubes.len();
        let ts = self.tubes[tube % cap];
        if ts.count >= self.min_kmers {
            self.add_hit(tube, ts.q_lo, ts.q_hi)?;
        }
        self.tubes[tube % cap].count = 0;
        Ok(())
    }

    fn finish(&mut self, q_len: usize) -> PalsResult<()> {
        self.tube_end(q_len - 1)?;
        let off = self.offset as isize;
        let from = ((q_len as isize - off) / off).max(0) as usize;
        let to = (self.target_len + q_len - 1 + self.offset) / self.offset;
        let cap = self.tubes.len();
        for tube in from..=to {
            let ts = self.tubes[tube % cap];
            if ts.count >= self.min_kmers {
                self.add_hit(tube, ts.q_lo, ts.q_hi)?;
                self.tubes[tube % cap].count = 0;
            }
        }
        Ok(())
    }
}

impl<'a> Filter<'a> {
    pub fn new(index: &'a KmerIndex, target_len: usize, params: FilterParams) -> Self {
        Self { index, target_len, params }
    }

    /// 扫描查询序列，把候选命中写入 `spool` 并 finalise；返回命中数。
    ///
    /// 自比对且非互补时只保留目标坐标小于查询坐标的 k-mer 对（主对角线一侧）。
    pub fn filter<S: Spool<FilterHit>>(
        &self,
        query: &[u8],
        self_align: bool,
        complement: bool,
        spool: &mut S,
    ) -> PalsResult<usize> {
        let p = &self.params;
        let k = self.index.word_length();
        if p.tube_offset < p.max_error || p.tube_offset == 0 {
            return Err(PalsError::Config(format!(
                "tube offset {} must be positive and at least max error {}",
                p.tube_offset, p.max_error
            )));
        }
        let min_kmers = min_words_per_filter_hit(p.min_match, k, p.max_error);
        if min_kmers < 1 {
            return Err(PalsError::Config(format!(
                "no k-mers guaranteed for hits of length {} with {} errors at k = {k}",
                p.min_match, p.max_error
            )));
        }

        let tube_width = p.tube_offset + p.max_error;
        let capacity = (self.target_len + tube_width - 1) / p.tube_offset + 1;
        let mut pass = TubePass {
            index: self.index,
            spool,
            tubes: vec![TubeState::default(); capacity],
            target_len: self.target_len,
            k,
            offset: p.tube_offset,
            max_error: p.max_error,
            min_kmers: min_kmers as usize,
            max_kmer_dist: p.min_match - k,
            skip_upper: self_align && !complement,
            ticker: tube_width,
            hits: 0,
        };

        if !query.is_empty() {
            self.index
                .for_each_kmer(query, 0, query.len(), |q, kmer| pass.common_kmer(q, kmer))?;
            pass.finish(query.len())?;
        }
        let hits = pass.hits;
        pass.spool.finalise()?;
        Ok(hits)
    }
}
