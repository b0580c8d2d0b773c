//! 过滤命中合并为梯形
//!
//! 按查询起点升序处理过滤命中，维护一条按对角线从左到右排列的开放梯形链表。
//! 链表用下标数组实现（节点池 + 空闲下标栈），末尾是一个哨兵节点。
//! 命中上移超出某个梯形的 `top` 后，该梯形被关闭。全部命中处理完后，
//! 在查询、目标两个方向上按无效碱基长串切分梯形，最后按 `bottom` 排序。

use log::debug;

use super::filter::FilterHit;
use super::params::FilterParams;
use super::trapezoid::Trapezoid;
use crate::util::dna;

/// 相邻梯形的对角线间距不超过该值时合并
const DIAGONAL_PADDING: isize = 2;

#[derive(Debug, Clone, Copy)]
struct Node {
    trap: Trapezoid,
    next: Option<usize>,
}

pub struct Merger<'a> {
    target: &'a [u8],
    query: &'a [u8],
    bin_width: isize,
    left_padding: isize,
    bottom_padding: isize,
    max_error: isize,
    max_igap: isize,
    self_comparison: bool,

    nodes: Vec<Node>,
    free: Vec<usize>,
    head: usize,
    closed: Vec<Trapezoid>,
}

impl<'a> Merger<'a> {
    pub fn new(
        target: &'a [u8],
        query: &'a [u8],
        params: &FilterParams,
        max_igap: usize,
        self_comparison: bool,
    ) -> Self {
        let bin_width = (params.tube_offset + params.max_error) as isize - 1;
        let left_padding = DIAGONAL_PADDING + bin_width;
        let q_len = query.len() as isize;
        let sentinel = Node {
            trap: Trapezoid {
                top: q_len + 1,
                bottom: -1,
                left: q_len + 1 + left_padding,
                right: q_len + 1,
            },
            next: None,
        };
        Self {
            target,
            query,
            bin_width,
            left_padding,
            bottom_padding: params.word_size as isize + 2,
            max_error: params.max_error as isize,
            max_igap: max_igap as isize,
            self_comparison,
            nodes: vec![sentinel],
            free: Vec::new(),
            head: 0,
            closed: Vec::new(),
        }
    }

    fn alloc(&mut self, trap: Trapezoid, next: usize) -> usize {
        let node = Node { trap, next: Some(next) };
        match self.free.pop() {
            Some(i) => {
                self.nodes[i] = node;
                i
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        }
    }

    /// 从链表中摘除 `cur`（其前驱为 `prev`），返回其后继
    fn unlink(&mut self, prev: Option<usize>, cur: usize) -> usize {
        // 哨兵永远不会被摘除，因此非哨兵节点一定有后继
        let next = self.nodes[cur].next.unwrap_or(cur);
        match prev {
            Some(p) => self.nodes[p].next = Some(next),
            None => self.head = next,
        }
        self.free.push(cur);
        next
    }

    fn is_sentinel(&self, i: usize) -> bool {
        self.nodes[i].next.is_none()
    }

    /// 按查询起点升序逐个喂入过滤命中
    pub fn merge_filter_hit(&mut self, hit: &FilterHit) {
        let left = -hit.diag_index;
        if self.self_comparison && left <= self.max_error {
            return;
        }
        let top = hit.q_to as isize;
        let bottom = hit.q_from as isize;

        let mut prev: Option<usize> = None;
        let mut cur = self.head;
        loop {
            let b = self.nodes[cur].trap;
            let sentinel = self.is_sentinel(cur);

            if !sentinel && bottom - self.bottom_padding > b.top {
                // 该梯形已在当前命中之下，关闭
                self.closed.push(b);
                cur = self.unlink(prev, cur);
                continue;
            }
            if !sentinel && left - DIAGONAL_PADDING > b.right {
                prev = Some(cur);
                cur = self.nodes[cur].next.unwrap_or(cur);
                continue;
            }
            if !sentinel && left + self.left_padding >= b.left {
                self.grow(prev, cur, left, top);
                return;
            }

            let trap = Trapezoid { top, bottom, left, right: left + self.bin_width };
            let node = self.alloc(trap, cur);
            match prev {
                Some(p) => self.nodes[p].next = Some(node),
                None => self.head = node,
            }
            return;
        }
    }

    /// 命中落在 `cur` 的对角线范围内：扩展它，并尝试与左、右邻居融合
    fn grow(&mut self, prev: Option<usize>, cur: usize, left: isize, top: isize) {
        {
            let b = &mut self.nodes[cur].trap;
            b.right = b.right.max(left + self.bin_width);
            b.left = b.left.min(left);
            b.top = b.top.max(top);
        }
        let b = self.nodes[cur].trap;

        if let Some(p) = prev {
            let f = &mut self.nodes[p].trap;
            if f.right + DIAGONAL_PADDING >= b.left {
                f.right = b.right;
                f.bottom = f.bottom.min(b.bottom);
                f.top = f.top.max(b.top);
                self.unlink(prev, cur);
                return;
            }
        }
        if let Some(n) = self.nodes[cur].next {
            if !self.is_sentinel(n) && self.nodes[n].trap.left - DIAGONAL_PADDING <= b.right {
                let t = self.nodes[n].trap;
                let b = &mut self.nodes[cur].trap;
                b.right = t.right;
                b.bottom = b.bottom.min(t.bottom);
                b.top = b.top.max(t.top);
                self.unlink(Some(cur), n);
            }
        }
    }

    /// 关闭所有开放梯形，按无效碱基切分，并按 `(bottom, left)` 升序返回
    pub fn finalise_merge(mut self) -> Vec<Trapezoid> {
        let mut cur = self.head;
        while !self.is_sentinel(cur) {
            self.closed.push(self.nodes[cur].trap);
            cur = self.nodes[cur].next.unwrap_or(cur);
        }
        let merged = std::mem::take(&mut self.closed);
        let n = merged.len();
        let clipped = self.clip_vertical(merged);
        let mut traps = self.clip_horizontal(clipped);
        traps.retain(|t| !t.is_degenerate());
        traps.sort_by_key(|t| (t.bottom, t.left));
        debug!("merger: {n} trapezoids before clipping, {} after", traps.len());
        traps
    }

    /// 查询方向：长度 ≥ max_igap 的无效碱基串把梯形切成上下两段
    fn clip_vertical(&self, traps: Vec<Trapezoid>) -> Vec<Trapezoid> {
        let q_len = self.query.len() as isize;
        let mut out = Vec::with_capacity(traps.len());
        for mut base in traps {
            let mut lag = (base.bottom - self.max_igap).max(0);
            let last = (base.top + self.max_igap).min(q_len);
            let mut pos = lag;
            while pos < last {
                if dna::is_valid(self.query[pos as usize]) {
                    if pos - lag >= self.max_igap {
                        if lag - base.bottom > 0 {
                            let mut head = base;
                            head.top = lag;
                            out.push(head);
                        }
                        base.bottom = pos;
                    }
                    lag = pos + 1;
                }
                pos += 1;
            }
            if pos - lag >= self.max_igap {
                base.top = lag;
            }
            out.push(base);
        }
        out
    }

    /// 目标方向：同样按无效碱基串切分，并把每段裁到对应的目标窗口
    fn clip_horizontal(&self, traps: Vec<Trapezoid>) -> Vec<Trapezoid> {
        let t_len = self.target.len() as isize;
        let mut out = Vec::with_capacity(traps.len());
        for mut base in traps {
            if base.top - base.bottom < self.bottom_padding - 2 {
                out.push(base);
                continue;
            }
            let a_bottom = base.bottom - base.right;
            let a_top = base.top - base.left;
            let mut lag = (a_bottom - self.max_igap).max(0);
            let last = (a_top + self.max_igap).min(t_len);
            let mut lag_clip = a_bottom;
            let mut pos = lag;
            while pos < last {
                if dna::is_valid(self.target[pos as usize]) {
                    if pos - lag >= self.max_igap {
                        if lag > lag_clip {
                            let mut head = base;
                            head.clip(lag, lag_clip);
                            out.push(head);
                        }
                        lag_clip = pos;
                    }
                    lag = pos + 1;
                }
                pos += 1;
            }
            if lag > lag_clip {
                base.clip(lag, lag_clip);
            }
            out.push(base);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::testutil::{de_bruijn, lcg};

    fn params() -> FilterParams {
        FilterParams { word_size: 6, min_match: 50, max_error: 4, tube_offset: 32 }
    }

    fn hit(q_from: usize, q_to: usize, diag_index: isize) -> FilterHit {
        FilterHit { q_from, q_to, diag_index }
    }

    fn trap(top: isize, bottom: isize, left: isize, right: isize) -> Trapezoid {
        Trapezoid { top, bottom, left, right }
    }

    fn scenario_hits() -> Vec<FilterHit> {
        vec![
            hit(0, 163, 32),
            hit(141, 247, 64),
            hit(237, 433, 1120),
            hit(241, 347, 96),
            hit(341, 452, 128),
            hit(447, 565, 1952),
            hit(542, 628, 1984),
            hit(627, 814, 2592),
            hit(786, 898, 2624),
            hit(868, 939, 2880),
            hit(938, 997, 3040),
            hit(938, 1024, 3072),
        ]
    }

    #[test]
    fn de_bruijn_scenario() {
        let target = de_bruijn(6);
        let query = de_bruijn(5);
        let mut m = Merger::new(&target, &query, &params(), 5, false);
        for h in scenario_hits() {
            m.merge_filter_hit(&h);
        }
        let traps = m.finalise_merge();
        assert_eq!(
            traps,
            vec![
                trap(452, 0, -128, 3),
                trap(433, 237, -1120, -1085),
                trap(628, 447, -1984, -1917),
                trap(898, 627, -2624, -2557),
                trap(939, 868, -2880, -2845),
                trap(1024, 938, -3072, -3005),
            ]
        );
        let height: isize = traps.iter().map(|t| t.top - t.bottom).sum();
        let width: isize = traps.iter().map(|t| t.right - t.left).sum();
        assert_eq!((height, width), (1257, 402));

        for (i, a) in traps.iter().enumerate() {
            for b in &traps[i + 1..] {
                assert!(a.bottom <= b.bottom);
                assert!(!a.overlaps(b));
            }
        }
    }

    #[test]
    fn growing_trapezoid_fuses_right_neighbour() {
        let target = lcg(400, 3);
        let query = lcg(200, 4);
        let mut m = Merger::new(&target, &query, &params(), 5, false);
        m.merge_filter_hit(&hit(0, 100, 0));
        m.merge_filter_hit(&hit(10, 110, -38));
        m.merge_filter_hit(&hit(20, 130, -5));
        assert_eq!(m.finalise_merge(), vec![trap(130, 0, 0, 73)]);
    }

    #[test]
    fn one_fuse_per_hit() {
        let target = lcg(400, 3);
        let query = lcg(200, 4);
        let mut m = Merger::new(&target, &query, &params(), 5, false);
        m.merge_filter_hit(&hit(0, 100, 0));
        m.merge_filter_hit(&hit(10, 120, -100));
        m.merge_filter_hit(&hit(20, 130, -50));
        m.merge_filter_hit(&hit(30, 140, -20));
        // 第四个命中扩展 [0, 35] 并吞并 [50, 85]；[100, 135] 距离仍超过填充宽度，不再级联
        assert_eq!(
            m.finalise_merge(),
            vec![trap(140, 0, 0, 85), trap(120, 10, 100, 135)]
        );
    }

    #[test]
    fn trapezoids_below_the_sweep_are_closed() {
        let target = lcg(400, 3);
        let query = lcg(400, 4);
        let mut m = Merger::new(&target, &query, &params(), 5, false);
        m.merge_filter_hit(&hit(0, 100, 0));
        m.merge_filter_hit(&hit(200, 300, 0));
        assert_eq!(m.closed.len(), 1);
        // 关闭的节点被回收复用
        assert_eq!(m.nodes.len(), 2);
        assert_eq!(m.finalise_merge(), vec![trap(100, 0, 0, 35), trap(300, 200, 0, 35)]);
    }

    #[test]
    fn self_comparison_drops_main_diagonal() {
        let s = lcg(400, 9);
        let mut m = Merger::new(&s, &s, &params(), 5, true);
        m.merge_filter_hit(&hit(10, 100, -3));
        assert!(m.finalise_merge().is_empty());

        let mut m = Merger::new(&s, &s, &params(), 5, true);
        m.merge_filter_hit(&hit(10, 100, -40));
        assert_eq!(m.finalise_merge(), vec![trap(100, 10, 40, 75)]);
    }

    #[test]
    fn query_n_run_splits_vertically() {
        let target = lcg(300, 1);
        let mut query = lcg(200, 2);
        query[90..100].fill(b'N');
        let mut m = Merger::new(&target, &query, &params(), 5, false);
        m.merge_filter_hit(&hit(20, 180, 0));
        assert_eq!(m.finalise_merge(), vec![trap(90, 20, 0, 35), trap(180, 100, 0, 35)]);
    }

    #[test]
    fn target_n_run_splits_horizontally() {
        let mut target = lcg(300, 1);
        target[100..110].fill(b'N');
        let query = lcg(200, 2);
        let mut m = Merger::new(&target, &query, &params(), 5, false);
        m.merge_filter_hit(&hit(20, 180, 0));
        assert_eq!(m.finalise_merge(), vec![trap(135, 20, 0, 35), trap(180, 110, 0, 35)]);
    }
}
