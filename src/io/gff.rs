//! GFF 输出
//!
//! 每条命中一行，目标区间放在前 5 列，查询区间写进属性列的 `Target`。
//! 坐标为 1-based 闭区间。

use std::io::Write;

use crate::align::hit::DPHit;
use crate::align::Strand;
use crate::util::pack::Feature;

pub struct GffWriter<W: Write> {
    out: W,
}

impl<W: Write> GffWriter<W> {
    pub fn new(mut out: W) -> std::io::Result<Self> {
        writeln!(out, "##gff-version 2")?;
        writeln!(out, "##source-version {} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))?;
        writeln!(out, "##date {}", chrono::Utc::now().format("%Y-%m-%d"))?;
        Ok(Self { out })
    }

    pub fn write_hit(
        &mut self,
        target_name: &str,
        target: &Feature,
        query_name: &str,
        query: &Feature,
        hit: &DPHit,
        strand: Strand,
    ) -> std::io::Result<()> {
        writeln!(
            self.out,
            "{}\tpals\thit\t{}\t{}\t{}\t{}\t.\tTarget {} {} {}; maxe {:.2}",
            target_name,
            target.from + 1,
            target.to,
            hit.score,
            strand.symbol(),
            query_name,
            query.from + 1,
            query.to,
            hit.error,
        )
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_header_and_hit_line() {
        let mut w = GffWriter::new(Vec::new()).unwrap();
        let hit = DPHit {
            abpos: 200,
            bbpos: 130,
            aepos: 450,
            bepos: 380,
            low_diagonal: 63,
            high_diagonal: 76,
            score: 250,
            error: 0.0,
        };
        let t = Feature { contig: 0, from: 200, to: 450 };
        let q = Feature { contig: 0, from: 120, to: 370 };
        w.write_hit("chrA", &t, "chrB", &q, &hit, Strand::Reverse).unwrap();
        let text = String::from_utf8(w.into_inner()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "##gff-version 2");
        assert!(lines[2].starts_with("##date "));
        assert_eq!(lines[3], "chrA\tpals\thit\t201\t450\t250\t-\t.\tTarget chrB 121 370; maxe 0.00");
    }
}
