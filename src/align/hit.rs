/// 一条局部比对命中。
///
/// `a*` 为目标坐标，`b*` 为查询坐标，区间半开；
/// 对角线按 `目标坐标 - 查询坐标` 记录。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DPHit {
    pub abpos: usize,
    pub bbpos: usize,
    pub aepos: usize,
    pub bepos: usize,
    pub low_diagonal: isize,
    pub high_diagonal: isize,
    pub score: isize,
    /// 估计的错误率
    pub error: f64,
}

impl DPHit {
    pub fn target_len(&self) -> usize {
        self.aepos - self.abpos
    }

    pub fn query_len(&self) -> usize {
        self.bepos - self.bbpos
    }
}

/// 去除起点相同或终点相同的重复命中，只保留得分最高者（同分取先出现的）
pub fn dedup_hits(hits: &mut Vec<DPHit>) {
    hits.sort_by_key(|h| (h.abpos, h.bbpos));
    suppress_runs(hits, |h| (h.abpos, h.bbpos));
    hits.sort_by_key(|h| (h.aepos, h.bepos));
    suppress_runs(hits, |h| (h.aepos, h.bepos));
    hits.retain(|h| h.score >= 0);
}

fn suppress_runs<K, F>(hits: &mut [DPHit], key: F)
where
    K: Eq,
    F: Fn(&DPHit) -> K,
{
    let mut start = 0;
    while start < hits.len() {
        let k = key(&hits[start]);
        let mut end = start + 1;
        while end < hits.len() && key(&hits[end]) == k {
            end += 1;
        }
        let mut best = start;
        for m in start + 1..end {
            if hits[m].score > hits[best].score {
                best = m;
            }
        }
        for (m, h) in hits[start..end].iter_mut().enumerate() {
            if start + m != best {
                h.score = -1;
            }
        }
        start = end;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn h(abpos: usize, bbpos: usize, aepos: usize, bepos: usize, score: isize) -> DPHit {
        DPHit {
            abpos,
            bbpos,
            aepos,
            bepos,
            low_diagonal: 0,
            high_diagonal: 0,
            score,
            error: 0.0,
        }
    }

    #[test]
    fn keeps_best_per_start_and_end() {
        let mut hits = vec![
            h(10, 10, 100, 100, 50),
            h(10, 10, 120, 118, 70),
            h(5, 3, 120, 118, 60),
            h(200, 150, 300, 250, 40),
        ];
        dedup_hits(&mut hits);
        assert_eq!(hits, vec![h(10, 10, 120, 118, 70), h(200, 150, 300, 250, 40)]);
    }

    #[test]
    fn ties_keep_first_and_dedup_is_idempotent() {
        let mut hits = vec![h(0, 0, 50, 50, 30), h(0, 0, 60, 60, 30), h(70, 70, 90, 90, 5)];
        dedup_hits(&mut hits);
        assert_eq!(hits, vec![h(0, 0, 50, 50, 30), h(70, 70, 90, 90, 5)]);
        let again = {
            let mut v = hits.clone();
            dedup_hits(&mut v);
            v
        };
        assert_eq!(again, hits);
    }
}
