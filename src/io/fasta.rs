use anyhow::{Context, Result};
use std::io::BufRead;

use crate::util::pack::Packed;

#[derive(Debug, Clone)]
pub struct FastaRecord {
    pub id: String,
    pub desc: Option<String>,
    pub seq: Vec<u8>,
}

/// Byte-oriented FASTA reader. Sequence bytes are kept as-is apart from
/// upper-casing; whitespace inside sequence lines is dropped.
pub struct FastaReader<R: BufRead> {
    reader: R,
    line: Vec<u8>,
    done: bool,
    peek_header: Option<Vec<u8>>,
}

fn parse_header(raw: &[u8]) -> (String, Option<String>) {
    let header = String::from_utf8_lossy(raw);
    let header = header.trim();
    let mut parts = header.splitn(2, char::is_whitespace);
    let id = parts.next().unwrap_or("").to_string();
    let desc = parts
        .next()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());
    (id, desc)
}

impl<R: BufRead> FastaReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: Vec::new(),
            done: false,
            peek_header: None,
        }
    }

    fn read_line(&mut self) -> Result<bool> {
        self.line.clear();
        let n = self.reader.read_until(b'\n', &mut self.line)?;
        if n == 0 {
            self.done = true;
        }
        Ok(n > 0)
    }

    pub fn next_record(&mut self) -> Result<Option<FastaRecord>> {
        if self.done && self.peek_header.is_none() {
            return Ok(None);
        }

        let header = match self.peek_header.take() {
            Some(h) => h,
            None => loop {
                if !self.read_line()? {
                    return Ok(None);
                }
                if self.line.first() == Some(&b'>') {
                    break self.line[1..].to_vec();
                }
            },
        };
        let (id, desc) = parse_header(&header);

        let mut seq = Vec::new();
        while self.read_line()? {
            if self.line.first() == Some(&b'>') {
                self.peek_header = Some(self.line[1..].to_vec());
                break;
            }
            seq.extend(
                self.line
                    .iter()
                    .filter(|b| !b.is_ascii_whitespace())
                    .map(u8::to_ascii_uppercase),
            );
        }

        Ok(Some(FastaRecord { id, desc, seq }))
    }
}

impl<R: BufRead> Iterator for FastaReader<R> {
    type Item = Result<FastaRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}

/// Read every record of a FASTA file into one packed sequence.
pub fn read_packed(path: &str) -> Result<Packed> {
    let fh = std::fs::File::open(path).with_context(|| format!("cannot open FASTA '{path}'"))?;
    let reader = FastaReader::new(std::io::BufReader::new(fh));
    let mut packed = Packed::new();
    for rec in reader {
        let rec = rec.with_context(|| format!("malformed FASTA '{path}'"))?;
        packed.push(rec.id, &rec.seq);
    }
    if packed.contigs.is_empty() {
        anyhow::bail!("FASTA file '{}' contains no sequences", path);
    }
    if packed.contigs.iter().all(|c| c.len == 0) {
        anyhow::bail!("FASTA file '{}' contains only empty sequences", path);
    }
    Ok(packed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};

    #[test]
    fn parse_simple_fasta() {
        let data = b">chr1 first\nACgTNN\n>chr2\nAAA\n";
        let mut r = FastaReader::new(Cursor::new(&data[..]));

        let r1 = r.next_record().unwrap().unwrap();
        assert_eq!(r1.id, "chr1");
        assert_eq!(r1.desc.as_deref(), Some("first"));
        assert_eq!(r1.seq, b"ACGTNN");

        let r2 = r.next_record().unwrap().unwrap();
        assert_eq!(r2.id, "chr2");
        assert_eq!(r2.desc, None);
        assert_eq!(r2.seq, b"AAA");

        assert!(r.next_record().unwrap().is_none());
    }

    #[test]
    fn parse_fasta_with_crlf_and_whitespace() {
        let data = b"\n>chr1 desc\r\nAC g t n\r\n acgt\r\n>chr2 \r\n N N N \r\n";
        let records: Vec<FastaRecord> = FastaReader::new(Cursor::new(&data[..]))
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].desc.as_deref(), Some("desc"));
        assert_eq!(records[0].seq, b"ACGTNACGT");
        assert_eq!(records[1].id, "chr2");
        assert_eq!(records[1].seq, b"NNN");
    }

    #[test]
    fn last_record_without_newline() {
        let data = b">a\nAC\n>b\nGT";
        let records: Vec<FastaRecord> = FastaReader::new(Cursor::new(&data[..]))
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(records[1].seq, b"GT");
    }

    #[test]
    fn packs_a_file() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, ">x\nACGT\n>y\nGGCC").unwrap();
        let packed = read_packed(f.path().to_str().unwrap()).unwrap();
        assert_eq!(packed.contigs.len(), 2);
        assert_eq!(packed.name(1), "y");
        assert!(read_packed("/nonexistent/file.fa").is_err());

        let mut empty = tempfile::NamedTempFile::new().unwrap();
        writeln!(empty, "no header here").unwrap();
        assert!(read_packed(empty.path().to_str().unwrap()).is_err());
    }
}
