pub mod dp;
pub mod filter;
pub mod hit;
pub mod merge;
pub mod params;
pub mod trapezoid;

use std::borrow::Cow;
use std::io::Write;

use anyhow::Result;
use log::{info, warn};

use crate::error::PalsResult;
use crate::index::kmer::KmerIndex;
use crate::io::fasta;
use crate::io::gff::GffWriter;
use crate::io::morass::{Morass, Spool, DEFAULT_CHUNK};
use crate::util::dna;
use crate::util::pack::{mirror, Packed};

pub use dp::{Aligner, Costs};
pub use filter::{Filter, FilterHit};
pub use hit::DPHit;
pub use merge::Merger;
pub use params::FilterParams;
pub use trapezoid::Trapezoid;

/// 命令行可调的比对选项；未指定的过滤参数由 [`FilterParams::optimise`] 推导
#[derive(Debug, Clone)]
pub struct AlignOpt {
    pub min_hit_length: usize,
    pub min_identity: f64,
    pub word_size: Option<usize>,
    pub tube_offset: Option<usize>,
    pub max_error: Option<usize>,
    pub max_mem: Option<usize>,
    pub threads: usize,
    pub forward_only: bool,
    pub spool_chunk: usize,
}

impl Default for AlignOpt {
    fn default() -> Self {
        Self {
            min_hit_length: 400,
            min_identity: 0.94,
            word_size: None,
            tube_offset: None,
            max_error: None,
            max_mem: None,
            threads: 1,
            forward_only: false,
            spool_chunk: DEFAULT_CHUNK,
        }
    }
}

/// 一次比对运行所需的全部参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PalsParams {
    pub filter: FilterParams,
    pub min_hit_length: usize,
    pub min_identity: f64,
    pub costs: Costs,
    pub spool_chunk: usize,
    pub parallel_dp: bool,
}

impl AlignOpt {
    pub fn resolve(&self, target_len: usize) -> PalsResult<PalsParams> {
        let mut filter =
            FilterParams::optimise(self.min_hit_length, self.min_identity, target_len, self.max_mem)?;
        let overridden = self.word_size.is_some() || self.tube_offset.is_some() || self.max_error.is_some();
        if let Some(k) = self.word_size {
            filter.word_size = k;
        }
        if let Some(e) = self.max_error {
            filter.max_error = e;
            filter.tube_offset = e + params::TUBE_OFFSET_DELTA;
        }
        if let Some(off) = self.tube_offset {
            filter.tube_offset = off;
        }
        if overridden {
            filter.validate()?;
            warn!("using user filter parameters: {filter:?}");
        }
        Ok(PalsParams {
            filter,
            min_hit_length: self.min_hit_length,
            min_identity: self.min_identity,
            costs: Costs::default(),
            spool_chunk: self.spool_chunk,
            parallel_dp: self.threads > 1,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strand {
    Forward,
    Reverse,
}

impl Strand {
    pub fn symbol(self) -> char {
        match self {
            Strand::Forward => '+',
            Strand::Reverse => '-',
        }
    }
}

/// 目标序列及其 k-mer 索引；查询为空时做自比对
pub struct Pals<'a> {
    target: &'a [u8],
    query: &'a [u8],
    self_compare: bool,
    index: KmerIndex,
    params: PalsParams,
}

impl<'a> Pals<'a> {
    pub fn new(target: &'a [u8], query: Option<&'a [u8]>, params: PalsParams) -> PalsResult<Self> {
        let index = KmerIndex::build(target, params.filter.word_size)?;
        info!(
            "indexed target: {} bp, {} {}-mers",
            target.len(),
            index.len(),
            index.word_length()
        );
        Ok(Self {
            target,
            query: query.unwrap_or(target),
            self_compare: query.is_none(),
            index,
            params,
        })
    }

    pub fn is_self_comparison(&self) -> bool {
        self.self_compare
    }

    /// 对一条链做 过滤 → 合并 → 动态规划。
    ///
    /// 反向链在查询的反向互补序列上进行，返回的查询坐标也在该坐标系下。
    pub fn align(&self, strand: Strand) -> PalsResult<Vec<DPHit>> {
        let p = &self.params;
        let complement = strand == Strand::Reverse;
        let working: Cow<'_, [u8]> = if complement {
            Cow::Owned(dna::revcomp(self.query))
        } else {
            Cow::Borrowed(self.query)
        };

        let mut spool = Morass::new(p.spool_chunk);
        let filter = Filter::new(&self.index, self.target.len(), p.filter);
        let n_filter = filter.filter(&working, self.self_compare, complement, &mut spool)?;

        let mut merger = Merger::new(
            self.target,
            &working,
            &p.filter,
            p.costs.max_igap as usize,
            self.self_compare && !complement,
        );
        while let Some(hit) = spool.pull()? {
            merger.merge_filter_hit(&hit);
        }
        spool.clean_up()?;
        let traps = merger.finalise_merge();

        let aligner = Aligner::new(
            self.target,
            &working,
            self.index.word_length(),
            p.min_hit_length,
            p.min_identity,
        )
        .with_costs(p.costs);
        let hits = if p.parallel_dp {
            aligner.align_traps_par(&traps)?
        } else {
            aligner.align_traps(&traps)?
        };

        info!(
            "strand {}: {n_filter} filter hits, {} trapezoids, {} alignments",
            strand.symbol(),
            traps.len(),
            hits.len()
        );
        Ok(hits)
    }

    /// 两条链同时比对
    pub fn align_both(&self) -> PalsResult<(Vec<DPHit>, Vec<DPHit>)> {
        let (fwd, rev) = rayon::join(|| self.align(Strand::Forward), || self.align(Strand::Reverse));
        Ok((fwd?, rev?))
    }
}

fn write_strand<W: Write>(
    gff: &mut GffWriter<W>,
    target: &Packed,
    query: &Packed,
    hits: &[DPHit],
    strand: Strand,
) -> Result<()> {
    for h in hits {
        let tf = target.feature(h.abpos, h.aepos)?;
        let (from, to) = match strand {
            Strand::Forward => (h.bbpos, h.bepos),
            Strand::Reverse => mirror(query.len(), h.bbpos, h.bepos),
        };
        let qf = query.feature(from, to)?;
        gff.write_hit(target.name(tf.contig), &tf, query.name(qf.contig), &qf, h, strand)?;
    }
    Ok(())
}

/// 读取 FASTA、比对并写出 GFF。`query_path` 为空时在目标内部寻找重复。
pub fn align_files(target_path: &str, query_path: Option<&str>, out_path: Option<&str>, opt: &AlignOpt) -> Result<()> {
    let target = fasta::read_packed(target_path)?;
    let query = query_path.map(fasta::read_packed).transpose()?;
    let params = opt.resolve(target.len())?;
    info!(
        "k={} max_error={} tube_offset={} min_length={} min_identity={}",
        params.filter.word_size,
        params.filter.max_error,
        params.filter.tube_offset,
        params.min_hit_length,
        params.min_identity
    );

    let pals = Pals::new(&target.seq, query.as_ref().map(|q| q.seq.as_slice()), params)?;
    let (fwd, rev) = if opt.forward_only {
        (pals.align(Strand::Forward)?, Vec::new())
    } else {
        pals.align_both()?
    };

    let out: Box<dyn Write> = match out_path {
        Some(p) => Box::new(std::io::BufWriter::new(
            std::fs::File::create(p).map_err(|e| anyhow::anyhow!("cannot create output '{}': {}", p, e))?,
        )),
        None => Box::new(std::io::BufWriter::new(std::io::stdout())),
    };
    let mut gff = GffWriter::new(out)?;
    let query_ref = query.as_ref().unwrap_or(&target);
    write_strand(&mut gff, &target, query_ref, &fwd, Strand::Forward)?;
    write_strand(&mut gff, &target, query_ref, &rev, Strand::Reverse)?;
    gff.into_inner().flush()?;

    info!("wrote {} forward and {} reverse hits", fwd.len(), rev.len());
    Ok(())
}
