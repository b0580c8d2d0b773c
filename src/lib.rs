//! # pals-rust
//!
//! 受 PALS（Pairwise Aligner for Long Sequences）启发的 Rust 版局部比对器，
//! 用于在长 DNA 序列之间或单条序列内部寻找高一致度的重复片段。
//!
//! 比对按链分为三个阶段：
//!
//! - **过滤**：k-mer 索引 + 对角线 tube 计数，依据 Ukkonen 引理给出候选区域
//! - **合并**：候选命中合并为梯形，并按 N 等无效碱基长串切分
//! - **动态规划**：梯形内带状 X-drop 延伸，输出满足长度与一致度要求的局部比对
//!
//! ## 快速示例
//!
//! ```rust,no_run
//! use pals_rust::align::{AlignOpt, Pals, Strand};
//!
//! let target = b"ACGTACGTAGCTGATCGTAGGATTACA".repeat(40);
//! let opt = AlignOpt { min_hit_length: 100, min_identity: 0.9, ..AlignOpt::default() };
//! let params = opt.resolve(target.len()).unwrap();
//!
//! // 不给查询序列即为自比对
//! let pals = Pals::new(&target, None, params).unwrap();
//! for hit in pals.align(Strand::Forward).unwrap() {
//!     println!("{}..{} ~ {}..{}", hit.abpos, hit.aepos, hit.bbpos, hit.bepos);
//! }
//! ```
//!
//! ## 模块说明
//!
//! - [`io`]：FASTA 解析、GFF 输出、有序暂存（外排序）
//! - [`index`]：k-mer 索引
//! - [`align`]：过滤、梯形合并、动态规划与整体流程
//! - [`util`]：碱基编码、反向互补、多序列拼接与坐标映射

pub mod error;
pub mod io;
pub mod index;
pub mod util;
pub mod align;

pub use error::{PalsError, PalsResult};
