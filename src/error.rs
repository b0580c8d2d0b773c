//! 错误类型
//!
//! 库内核统一返回 [`PalsResult`]；命令行层再包成 `anyhow::Error`。

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PalsError {
    /// 参数不合法：tube 偏移小于最大错误数、k 超出索引范围、命中长度过短等
    #[error("configuration error: {0}")]
    Config(String),

    /// k-mer 枚举区间越界
    #[error("index range error: {0}")]
    Range(String),

    /// 比对或坐标映射得到负长度
    #[error("data error: {0}")]
    Data(String),

    /// spool 的状态误用（finalise 之前 pull，或之后 push）
    #[error("spool error: {0}")]
    Spool(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("spool codec error: {0}")]
    Codec(#[from] bincode::Error),
}

pub type PalsResult<T> = Result<T, PalsError>;
