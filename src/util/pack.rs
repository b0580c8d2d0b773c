use log::warn;

use crate::error::{PalsError, PalsResult};

/// 相邻 contig 之间插入的 N 间隔长度。
///
/// 间隔远长于比对允许的最大 gap，过滤阶段和剪裁阶段都会在这里断开，
/// 因此比对不会跨越两个 contig。
pub const SPACER_LEN: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contig {
    pub name: String,
    pub len: usize,
    /// 在拼接序列中的起始位置
    pub offset: usize,
}

/// 多条序列拼接成的一条工作序列
#[derive(Debug, Clone, Default)]
pub struct Packed {
    pub seq: Vec<u8>,
    pub contigs: Vec<Contig>,
}

/// 映射回某条 contig 的半开区间 `[from, to)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Feature {
    pub contig: usize,
    pub from: usize,
    pub to: usize,
}

impl Packed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, seq: &[u8]) {
        if !self.contigs.is_empty() {
            self.seq.resize(self.seq.len() + SPACER_LEN, b'N');
        }
        self.contigs.push(Contig {
            name: name.into(),
            len: seq.len(),
            offset: self.seq.len(),
        });
        self.seq.extend_from_slice(seq);
    }

    pub fn len(&self) -> usize {
        self.seq.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seq.is_empty()
    }

    pub fn name(&self, contig: usize) -> &str {
        self.contigs.get(contig).map_or("", |c| c.name.as_str())
    }

    /// 二分查找包含 `pos` 的 contig；落在间隔或末尾之后时返回其后第一条 contig 的下标
    fn locate(&self, pos: usize) -> Result<usize, usize> {
        let mut lo = 0usize;
        let mut hi = self.contigs.len();
        while lo < hi {
            let mid = (lo + hi) / 2;
            let c = &self.contigs[mid];
            if pos < c.offset {
                hi = mid;
            } else if pos >= c.offset + c.len {
                lo = mid + 1;
            } else {
                return Ok(mid);
            }
        }
        Err(lo)
    }

    /// 把拼接坐标下的 `[from, to)` 映射到所在 contig。
    ///
    /// 越界端点被钳制到 contig 边界并记录警告；长度为负时报错。
    pub fn feature(&self, from: usize, to: usize) -> PalsResult<Feature> {
        if to < from {
            return Err(PalsError::Data(format!("negative feature length: from {from} to {to}")));
        }
        if self.contigs.is_empty() {
            return Err(PalsError::Data("no contigs to map features onto".into()));
        }
        let idx = match self.locate(from) {
            Ok(i) => i,
            Err(i) => {
                let i = i.min(self.contigs.len() - 1);
                warn!("feature start {from} outside any contig, assigned to {}", self.contigs[i].name);
                i
            }
        };
        let c = &self.contigs[idx];
        let end = c.offset + c.len;
        let lf = from.clamp(c.offset, end);
        let lt = to.clamp(c.offset, end);
        if lf != from || lt != to {
            warn!(
                "clamped feature [{from}, {to}) to [{lf}, {lt}) on {} (len {})",
                c.name, c.len
            );
        }
        if lt < lf {
            return Err(PalsError::Data(format!("negative feature length on {}: from {lf} to {lt}", c.name)));
        }
        Ok(Feature {
            contig: idx,
            from: lf - c.offset,
            to: lt - c.offset,
        })
    }
}

/// 反向互补坐标系下的区间换回正向坐标：`[len - to, len - from)`
pub fn mirror(len: usize, from: usize, to: usize) -> (usize, usize) {
    (len.saturating_sub(to), len.saturating_sub(from))
}
