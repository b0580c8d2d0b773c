//! 带状 X-drop 动态规划
//!
//! 对每个梯形，从中线所在行出发分别向前、向后做带状延伸：
//! 前向找到得分最高的终点，再从终点反向回溯出起点。带宽随行推进动态收缩，
//! 低于当前最高分 `block_cost`（反向时为 `xfactor`）的格子被剪除。
//! 得到的局部比对若足够长、错误率足够低即输出，并把已被它覆盖的后续梯形标记掉；
//! 中线上下两侧剩余的部分递归处理。

use std::sync::atomic::{AtomicBool, Ordering};

use log::debug;
use rayon::prelude::*;

use super::hit::{dedup_hits, DPHit};
use super::trapezoid::Trapezoid;
use crate::error::{PalsError, PalsResult};
use crate::util::dna;

/// 打分参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Costs {
    /// 插入/删除允许的最大间隔，同时用于梯形切分
    pub max_igap: isize,
    pub diff_cost: isize,
    pub same_cost: isize,
    pub match_cost: isize,
    pub block_cost: isize,
    pub rmatch_cost: f64,
}

impl Costs {
    pub fn new(max_igap: isize, diff_cost: isize, same_cost: isize) -> Self {
        Self {
            max_igap,
            diff_cost,
            same_cost,
            match_cost: diff_cost + same_cost,
            block_cost: diff_cost * max_igap,
            rmatch_cost: diff_cost as f64 + 1.0,
        }
    }
}

impl Default for Costs {
    fn default() -> Self {
        Self::new(5, 3, 1)
    }
}

/// 动态增长的得分行，按 `origin` 与方向 `step` 把对角坐标映射为下标
#[derive(Debug, Default)]
struct BandVec {
    origin: isize,
    step: isize,
    cells: Vec<isize>,
}

const BAND_SLACK: usize = 32;

impl BandVec {
    fn reset(&mut self, origin: isize, step: isize) {
        self.origin = origin;
        self.step = step;
    }

    #[inline]
    fn slot(&self, j: isize) -> usize {
        let s = (j - self.origin) * self.step;
        debug_assert!(s >= 0, "band access behind origin");
        s as usize
    }

    #[inline]
    fn get(&self, j: isize) -> isize {
        self.cells[self.slot(j)]
    }

    #[inline]
    fn set(&mut self, j: isize, v: isize) {
        let s = self.slot(j);
        if s >= self.cells.len() {
            self.cells.resize((s + 1) * 3 / 2 + BAND_SLACK, 0);
        }
        self.cells[s] = v;
    }
}

/// 交替使用的两行
#[derive(Debug, Default)]
struct BandPair {
    rows: [BandVec; 2],
    cur: usize,
}

impl BandPair {
    fn start(&mut self, origin: isize, step: isize) -> &mut BandVec {
        self.cur = 0;
        let row = &mut self.rows[0];
        row.reset(origin, step);
        row
    }

    /// 切换到下一行，返回 (上一行, 新行)
    fn advance(&mut self, origin: isize, step: isize) -> (&BandVec, &mut BandVec) {
        let prev = self.cur;
        self.cur ^= 1;
        let (a, b) = self.rows.split_at_mut(1);
        let (prev_row, row) = if prev == 0 { (&a[0], &mut b[0]) } else { (&b[0], &mut a[0]) };
        row.reset(origin, step);
        (prev_row, row)
    }
}

/// 一次延伸的结果：端点 `(a, b)`（目标, 查询）、得分与经过的对角线范围（查询 - 目标）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Extension {
    a: isize,
    b: isize,
    score: isize,
    low: isize,
    high: isize,
}

impl Extension {
    /// 中线带整段落在目标之外时不做延伸，停在最近的目标边界上
    fn anchored(a: isize, b: isize) -> Self {
        Self {
            a,
            b,
            score: 0,
            low: b - a,
            high: b - a,
        }
    }
}

pub struct Aligner<'a> {
    target: &'a [u8],
    query: &'a [u8],
    word_size: usize,
    min_hit_length: usize,
    min_id: f64,
    costs: Costs,
}

struct Kernel<'k> {
    target: &'k [u8],
    query: &'k [u8],
    costs: Costs,
    min_len: isize,
    max_diff: f64,
    traps: &'k [Trapezoid],
    covered: &'k [AtomicBool],
    slot: usize,
    bands: BandPair,
    hits: Vec<DPHit>,
}

impl<'a> Aligner<'a> {
    pub fn new(target: &'a [u8], query: &'a [u8], word_size: usize, min_hit_length: usize, min_id: f64) -> Self {
        Self {
            target,
            query,
            word_size,
            min_hit_length,
            min_id,
            costs: Costs::default(),
        }
    }

    pub fn with_costs(mut self, costs: Costs) -> Self {
        self.costs = costs;
        self
    }

    fn kernel<'k>(&'k self, traps: &'k [Trapezoid], covered: &'k [AtomicBool]) -> Kernel<'k> {
        Kernel {
            target: self.target,
            query: self.query,
            costs: self.costs,
            min_len: self.min_hit_length as isize,
            max_diff: 1.0 - self.min_id,
            traps,
            covered,
            slot: 0,
            bands: BandPair::default(),
            hits: Vec::new(),
        }
    }

    fn wanted(&self, covered: &[AtomicBool], i: usize, t: &Trapezoid) -> bool {
        !covered[i].load(Ordering::Relaxed) && t.top - t.bottom >= self.word_size as isize
    }

    /// 依次比对每个梯形（按 `bottom` 升序给出），返回去重后的命中
    pub fn align_traps(&self, traps: &[Trapezoid]) -> PalsResult<Vec<DPHit>> {
        let covered: Vec<AtomicBool> = traps.iter().map(|_| AtomicBool::new(false)).collect();
        let mut kernel = self.kernel(traps, &covered);
        for (i, t) in traps.iter().enumerate() {
            if !self.wanted(&covered, i, t) {
                continue;
            }
            kernel.slot = i;
            kernel.align_recursion(*t)?;
        }
        let mut hits = kernel.hits;
        let raw = hits.len();
        dedup_hits(&mut hits);
        debug!("dp: {} trapezoids, {raw} raw hits, {} after dedup", traps.len(), hits.len());
        Ok(hits)
    }

    /// 并行版本：每个工作线程持有自己的得分行；覆盖标记原子共享，
    /// 因此被跳过的梯形集合可能与顺序版本不同，去重后的结果通常一致。
    pub fn align_traps_par(&self, traps: &[Trapezoid]) -> PalsResult<Vec<DPHit>> {
        let covered: Vec<AtomicBool> = traps.iter().map(|_| AtomicBool::new(false)).collect();
        let parts: Vec<Vec<DPHit>> = traps
            .par_iter()
            .enumerate()
            .map_init(
                || self.kernel(traps, &covered),
                |kernel, (i, t)| -> PalsResult<Vec<DPHit>> {
                    if !self.wanted(&covered, i, t) {
                        return Ok(Vec::new());
                    }
                    kernel.slot = i;
                    kernel.align_recursion(*t)?;
                    Ok(std::mem::take(&mut kernel.hits))
                },
            )
            .collect::<PalsResult<_>>()?;
        let mut hits: Vec<DPHit> = parts.into_iter().flatten().collect();
        let raw = hits.len();
        dedup_hits(&mut hits);
        debug!("dp (parallel): {} trapezoids, {raw} raw hits, {} after dedup", traps.len(), hits.len());
        Ok(hits)
    }
}

impl<'k> Kernel<'k> {
    fn align_recursion(&mut self, t: Trapezoid) -> PalsResult<()> {
        let c = self.costs;
        let mid = (t.bottom + t.top) / 2;
        let fwd = self.trace_forward(mid, mid - t.right, mid - t.left);

        // 反向回溯没有回到中线以下且得分不足时，放宽 X-drop 重试
        let mut x = 1;
        let mut rev = self.trace_reverse(fwd.b, fwd.a, fwd.a, mid + c.max_igap, c.block_cost + 2 * x * c.diff_cost);
        loop {
            x += 1;
            if !(rev.b > mid + x * c.max_igap && rev.score < fwd.score) {
                break;
            }
            rev = self.trace_reverse(fwd.b, fwd.a, fwd.a, mid + c.max_igap, c.block_cost + 2 * x * c.diff_cost);
        }

        let mut low_trap = t;
        low_trap.top = rev.b - c.max_igap;
        let mut high_trap = t;
        high_trap.bottom = fwd.b + c.max_igap;

        if fwd.b - rev.b >= self.min_len && fwd.a - rev.a >= self.min_len {
            let indel = ((rev.a - rev.b) - (fwd.a - fwd.b)).abs();
            let error = 1.0 / c.rmatch_cost - (rev.score - indel) as f64 / (c.rmatch_cost * (fwd.b - rev.b) as f64);
            if error <= self.max_diff {
                self.mark_covered(rev.low, rev.high, fwd.b);
                self.emit(&rev, &fwd, error)?;
            }
        }

        if low_trap.top - low_trap.bottom > self.min_len && low_trap.top < t.top - c.max_igap {
            self.align_recursion(low_trap)?;
        }
        if high_trap.top - high_trap.bottom > self.min_len {
            self.align_recursion(high_trap)?;
        }
        Ok(())
    }

    /// 当前梯形之后、被新命中几乎完全覆盖（面积比 > 0.99）的梯形无需再比对
    fn mark_covered(&self, low: isize, high: isize, bepos: isize) {
        for (i, tr) in self.traps.iter().enumerate().skip(self.slot + 1) {
            if tr.bottom >= bepos {
                break;
            }
            let ca = tr.left.max(low);
            let cb = tr.right.min(high);
            if ca > cb {
                continue;
            }
            let width = (cb - ca + 1) as f64 / (tr.right - tr.left + 1) as f64;
            let rows = if tr.top > bepos { bepos - tr.bottom + 1 } else { tr.top - tr.bottom + 1 };
            let height = rows as f64 / (tr.top - tr.bottom + 1) as f64;
            if width * height > 0.99 {
                self.covered[i].store(true, Ordering::Relaxed);
            }
        }
    }

    fn emit(&mut self, start: &Extension, end: &Extension, error: f64) -> PalsResult<()> {
        if end.a < start.a || end.b < start.b {
            return Err(PalsError::Data(format!(
                "negative alignment length: target {}..{}, query {}..{}",
                start.a, end.a, start.b, end.b
            )));
        }
        self.hits.push(DPHit {
            abpos: start.a as usize,
            bbpos: start.b as usize,
            aepos: end.a as usize,
            bepos: end.b as usize,
            low_diagonal: -start.high,
            high_diagonal: -start.low,
            score: start.score,
            error,
        });
        Ok(())
    }

    /// 从查询第 `mid` 行、目标列 `[lo, hi]` 出发向右下延伸，返回得分最高的终点
    fn trace_forward(&mut self, mid: isize, mut lo: isize, mut hi: isize) -> Extension {
        let target = self.target;
        let query = self.query;
        let c = self.costs;
        let t_len = target.len() as isize;
        let q_len = query.len() as isize;

        lo = lo.max(0);
        hi = hi.min(t_len);
        if lo > hi {
            return Extension::anchored(hi.max(0), mid);
        }
        let mut j;
        {
            let row = self.bands.start(lo, 1);
            j = lo;
            while j <= hi {
                row.set(j, 0);
                j += 1;
            }
            hi = (hi + c.max_igap).min(t_len);
            while j <= hi {
                let v = row.get(j - 1) - c.diff_cost;
                row.set(j, v);
                j += 1;
            }
        }

        let mut max_score = 0;
        let mut max_right = mid - lo;
        let mut max_left = mid - hi;
        let mut max_i = mid;
        let mut max_j = lo;

        let mut i = mid;
        while lo <= hi && i < q_len {
            let (prev, row) = self.bands.advance(lo, 1);
            let qi = query[i as usize];

            let mut score = prev.get(lo);
            let mut cost = score - c.diff_cost;
            row.set(lo, cost);
            j = lo + 1;
            while j <= hi {
                let temp = cost;
                cost = score;
                score = prev.get(j);
                if dna::same_base(qi, target[(j - 1) as usize]) {
                    cost += c.match_cost;
                }
                cost = cost.max(score).max(temp) - c.diff_cost;
                row.set(j, cost);
                if cost >= max_score {
                    max_score = cost;
                    max_i = i + 1;
                    max_j = j;
                }
                j += 1;
            }

            // 右边界之外沿目标方向继续延伸，直到得分跌出 block_cost
            if j <= t_len {
                if dna::same_base(qi, target[(j - 1) as usize]) {
                    score += c.match_cost;
                }
                score = score.max(cost) - c.diff_cost;
                row.set(j, score);
                if score > max_score {
                    max_score = score;
                    max_i = i + 1;
                    max_j = j;
                }
                j += 1;
                while j <= t_len {
                    score -= c.diff_cost;
                    if score < max_score - c.block_cost {
                        break;
                    }
                    row.set(j, score);
                    j += 1;
                }
            }
            hi = j - 1;

            while lo <= hi && row.get(lo) < max_score - c.block_cost {
                lo += 1;
            }
            while lo <= hi && row.get(hi) < max_score - c.block_cost {
                hi -= 1;
            }

            max_right = max_right.max(i + 1 - lo);
            max_left = max_left.min(i + 1 - hi);
            i += 1;
        }

        Extension {
            a: max_j,
            b: max_i,
            score: max_score,
            low: max_left,
            high: max_right,
        }
    }

    /// 从查询第 `top` 行、目标列 `[lo, hi]` 出发向左上延伸，返回得分最高的起点。
    ///
    /// 查询坐标在 `bottom` 之上的行用 `xfactor` 作为剪除阈值，其余行用 `block_cost`。
    fn trace_reverse(&mut self, top: isize, mut lo: isize, mut hi: isize, bottom: isize, xfactor: isize) -> Extension {
        let target = self.target;
        let query = self.query;
        let c = self.costs;
        let t_len = target.len() as isize;

        lo = lo.max(0);
        hi = hi.min(t_len);
        if lo > hi {
            return Extension::anchored(hi.max(0), top);
        }
        let mut j;
        {
            let row = self.bands.start(hi, -1);
            j = hi;
            while j >= lo {
                row.set(j, 0);
                j -= 1;
            }
            lo = (lo - c.max_igap).max(0);
            while j >= lo {
                let v = row.get(j + 1) - c.diff_cost;
                row.set(j, v);
                j -= 1;
            }
        }

        let mut max_score = 0;
        let mut max_right = top - lo;
        let mut max_left = top - hi;
        let mut min_i = top;
        let mut min_j = hi;

        let mut i = top - 1;
        while lo <= hi && i >= 0 {
            let xdrop = if i > bottom { xfactor } else { c.block_cost };
            let (prev, row) = self.bands.advance(hi, -1);
            let qi = query[i as usize];

            let mut score = prev.get(hi);
            let mut cost = score - c.diff_cost;
            row.set(hi, cost);
            j = hi - 1;
            while j >= lo {
                let temp = cost;
                cost = score;
                score = prev.get(j);
                if dna::same_base(qi, target[j as usize]) {
                    cost += c.match_cost;
                }
                cost = cost.max(score).max(temp) - c.diff_cost;
                row.set(j, cost);
                if cost >= max_score {
                    max_score = cost;
                    min_i = i;
                    min_j = j;
                }
                j -= 1;
            }

            if j >= 0 {
                if dna::same_base(qi, target[j as usize]) {
                    score += c.match_cost;
                }
                score = score.max(cost) - c.diff_cost;
                row.set(j, score);
                if score > max_score {
                    max_score = score;
                    min_i = i;
                    min_j = j;
                }
                j -= 1;
                while j >= 0 {
                    score -= c.diff_cost;
                    if score < max_score - xdrop {
                        break;
                    }
                    row.set(j, score);
                    j -= 1;
                }
            }
            lo = j + 1;

            while lo <= hi && row.get(lo) < max_score - xdrop {
                lo += 1;
            }
            while lo <= hi && row.get(hi) < max_score - xdrop {
                hi -= 1;
            }

            max_right = max_right.max(i - lo);
            max_left = max_left.min(i - hi);
            i -= 1;
        }

        Extension {
            a: min_j,
            b: min_i,
            score: max_score,
            low: max_left,
            high: max_right,
        }
    }
}
