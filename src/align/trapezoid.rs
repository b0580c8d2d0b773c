/// 比对矩阵中的一块梯形区域。
///
/// `bottom..top` 为查询坐标范围；`left..=right` 为对角线范围，
/// 对角线定义为 `查询坐标 - 目标坐标`。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trapezoid {
    pub top: isize,
    pub bottom: isize,
    pub left: isize,
    pub right: isize,
}

impl Trapezoid {
    /// 把梯形裁到目标坐标窗口 `[lag_clip, lag)` 内；每一步使用前一步更新后的值
    pub(crate) fn clip(&mut self, lag: isize, lag_clip: isize) {
        self.bottom = self.bottom.max(lag_clip + self.left);
        self.top = self.top.min(lag + self.right);
        self.left = self.left.max(self.bottom - lag);
        self.right = self.right.min(self.top - lag_clip);
    }

    pub(crate) fn is_degenerate(&self) -> bool {
        self.top <= self.bottom || self.right < self.left
    }

    /// 查询区间与对角线区间同时相交
    pub fn overlaps(&self, other: &Trapezoid) -> bool {
        self.bottom < other.top
            && other.bottom < self.top
            && self.left <= other.right
            && other.left <= self.right
    }
}
