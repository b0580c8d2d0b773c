use log::{debug, warn};

use super::filter::min_words_per_filter_hit;
use crate::error::{PalsError, PalsResult};
use crate::index::kmer::{index_bytes, MAX_KMER_LEN};

/// 允许的最小 k-mer 长度
pub const MIN_WORD_LENGTH: usize = 4;
/// 每个过滤命中至少需要保证的公共 k-mer 数
pub const MIN_WORDS_PER_FILTER_HIT: isize = 4;
/// 理想情况下每个 k-mer 在目标序列中的平均出现次数上限
pub const MAX_AVG_INDEX_LIST_LENGTH: f64 = 10.0;
/// tube 偏移 = 最大错误数 + 该值
pub const TUBE_OFFSET_DELTA: usize = 32;

/// 过滤参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterParams {
    /// k-mer 长度
    pub word_size: usize,
    /// 期望检测的最短比对长度
    pub min_match: usize,
    /// 该长度内允许的最大错误数
    pub max_error: usize,
    /// 相邻 tube 起点之间的对角线距离
    pub tube_offset: usize,
}

impl FilterParams {
    /// 根据目标长度、最短命中长度和最低一致度推导过滤参数。
    ///
    /// 选择使平均索引列表长度不超过 [`MAX_AVG_INDEX_LIST_LENGTH`] 的最小 k，
    /// 并要求 Ukkonen 下界不小于 [`MIN_WORDS_PER_FILTER_HIT`]。
    /// `max_mem` 给出时，索引占用超过它即报错。
    pub fn optimise(
        min_hit_len: usize,
        min_id: f64,
        target_len: usize,
        max_mem: Option<usize>,
    ) -> PalsResult<Self> {
        if !(0.0..=1.0).contains(&min_id) {
            return Err(PalsError::Config(format!("identity {min_id} outside [0, 1]")));
        }
        if min_hit_len <= MIN_WORD_LENGTH {
            return Err(PalsError::Config(format!(
                "minimum hit length {min_hit_len} must exceed {MIN_WORD_LENGTH}"
            )));
        }

        let max_error = (min_hit_len as f64 * (1.0 - min_id)).floor() as usize;
        let tube_offset = max_error + TUBE_OFFSET_DELTA;

        let mut word_size = MIN_WORD_LENGTH;
        while word_size < MAX_KMER_LEN
            && target_len as f64 / 4f64.powi(word_size as i32) > MAX_AVG_INDEX_LIST_LENGTH
        {
            word_size += 1;
        }
        if word_size == MAX_KMER_LEN && target_len as f64 / 4f64.powi(word_size as i32) > MAX_AVG_INDEX_LIST_LENGTH {
            warn!("target of length {target_len} exceeds the preferred index density at k = {word_size}");
        }

        let words = min_words_per_filter_hit(min_hit_len, word_size, max_error);
        if words < MIN_WORDS_PER_FILTER_HIT {
            return Err(PalsError::Config(format!(
                "hit length {min_hit_len} at identity {min_id} guarantees only {words} shared {word_size}-mers, need {MIN_WORDS_PER_FILTER_HIT}"
            )));
        }
        if let Some(limit) = max_mem {
            let need = index_bytes(word_size, target_len);
            if need > limit {
                return Err(PalsError::Config(format!(
                    "index needs {need} bytes, above the memory limit of {limit}"
                )));
            }
        }

        debug!("filter params: k={word_size} max_error={max_error} tube_offset={tube_offset} min_words={words}");
        Ok(Self {
            word_size,
            min_match: min_hit_len,
            max_error,
            tube_offset,
        })
    }

    /// 检查手工指定的参数组合
    pub fn validate(&self) -> PalsResult<()> {
        if !(MIN_WORD_LENGTH..=MAX_KMER_LEN).contains(&self.word_size) {
            return Err(PalsError::Config(format!(
                "word size {} outside {MIN_WORD_LENGTH}..={MAX_KMER_LEN}",
                self.word_size
            )));
        }
        if self.tube_offset == 0 || self.tube_offset < self.max_error {
            return Err(PalsError::Config(format!(
                "tube offset {} must be positive and at least max error {}",
                self.tube_offset, self.max_error
            )));
        }
        if min_words_per_filter_hit(self.min_match, self.word_size, self.max_error) < 1 {
            return Err(PalsError::Config(format!(
                "hits of length {} with {} errors share no {}-mers",
                self.min_match, self.max_error, self.word_size
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_for_a_megabase_target() {
        let p = FilterParams::optimise(400, 0.94, 1_000_000, None).unwrap();
        assert_eq!(p.word_size, 9);
        assert_eq!(p.max_error, 24);
        assert_eq!(p.tube_offset, 56);
        assert_eq!(p.min_match, 400);
        p.validate().unwrap();
    }

    #[test]
    fn small_targets_use_short_words() {
        let p = FilterParams::optimise(50, 0.9, 4096, None).unwrap();
        assert_eq!(p.word_size, 5);
        // 50 * (1 - 0.9) 在浮点下略小于 5
        assert_eq!(p.max_error, 4);
        let p = FilterParams::optimise(50, 0.9, 100, None).unwrap();
        assert_eq!(p.word_size, MIN_WORD_LENGTH);
    }

    #[test]
    fn rejects_bad_inputs() {
        assert!(matches!(FilterParams::optimise(400, 1.5, 1000, None), Err(PalsError::Config(_))));
        assert!(matches!(FilterParams::optimise(4, 0.9, 1000, None), Err(PalsError::Config(_))));
        // 一致度太低，Ukkonen 下界不足
        assert!(matches!(FilterParams::optimise(50, 0.5, 1000, None), Err(PalsError::Config(_))));
        assert!(matches!(
            FilterParams::optimise(400, 0.94, 1_000_000, Some(1024)),
            Err(PalsError::Config(_))
        ));
    }

    #[test]
    fn validate_catches_overrides() {
        let p = FilterParams { word_size: 6, min_match: 50, max_error: 4, tube_offset: 3 };
        assert!(p.validate().is_err());
        let p = FilterParams { word_size: 20, min_match: 50, max_error: 4, tube_offset: 32 };
        assert!(p.validate().is_err());
        let p = FilterParams { word_size: 6, min_match: 50, max_error: 4, tube_offset: 32 };
        assert!(p.validate().is_ok());
    }
}
