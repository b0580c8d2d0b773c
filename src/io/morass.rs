//! 有序暂存（spool）
//!
//! 过滤阶段产生的命中先写入 spool，合并阶段再按查询起点升序取出。
//! [`Morass`] 在内存中缓存一批元素，满后排序写成临时文件中的一个有序段，
//! `finalise` 之后通过小顶堆做多路归并。

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Seek, SeekFrom};

use log::debug;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{PalsError, PalsResult};

/// 默认每段缓存的元素个数
pub const DEFAULT_CHUNK: usize = 1 << 16;

pub trait Spool<T> {
    fn push(&mut self, item: T) -> PalsResult<()>;
    /// 结束写入，之后才能 `pull`
    fn finalise(&mut self) -> PalsResult<()>;
    fn pull(&mut self) -> PalsResult<Option<T>>;
    /// 已写入的元素总数
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    /// 释放缓存与临时文件，恢复为可重新写入的空状态
    fn clean_up(&mut self) -> PalsResult<()>;
}

struct Run {
    reader: BufReader<File>,
    remaining: usize,
}

impl Run {
    fn next<T: DeserializeOwned>(&mut self) -> PalsResult<Option<T>> {
        if self.remaining == 0 {
            return Ok(None);
        }
        self.remaining -= 1;
        Ok(Some(bincode::deserialize_from(&mut self.reader)?))
    }
}

pub struct Morass<T> {
    chunk_size: usize,
    buffer: Vec<T>,
    runs: Vec<Run>,
    heap: BinaryHeap<Reverse<(T, usize)>>,
    memory: std::vec::IntoIter<T>,
    len: usize,
    finalised: bool,
}

impl<T> Morass<T>
where
    T: Ord + Serialize + DeserializeOwned,
{
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            buffer: Vec::new(),
            runs: Vec::new(),
            heap: BinaryHeap::new(),
            memory: Vec::new().into_iter(),
            len: 0,
            finalised: false,
        }
    }

    /// 已溢出到磁盘的有序段数
    pub fn spilled_runs(&self) -> usize {
        self.runs.len()
    }

    fn spill(&mut self) -> PalsResult<()> {
        self.buffer.sort();
        let n = self.buffer.len();
        let mut w = BufWriter::new(tempfile::tempfile()?);
        for item in self.buffer.drain(..) {
            bincode::serialize_into(&mut w, &item)?;
        }
        let mut file = w.into_inner().map_err(|e| PalsError::Io(e.into_error()))?;
        file.seek(SeekFrom::Start(0))?;
        debug!("spool: spilled run {} with {n} items", self.runs.len());
        self.runs.push(Run {
            reader: BufReader::new(file),
            remaining: n,
        });
        Ok(())
    }
}

impl<T> Spool<T> for Morass<T>
where
    T: Ord + Serialize + DeserializeOwned,
{
    fn push(&mut self, item: T) -> PalsResult<()> {
        if self.finalised {
            return Err(PalsError::Spool("push after finalise".into()));
        }
        self.buffer.push(item);
        self.len += 1;
        if self.buffer.len() >= self.chunk_size {
            self.spill()?;
        }
        Ok(())
    }

    fn finalise(&mut self) -> PalsResult<()> {
        if self.finalised {
            return Ok(());
        }
        self.finalised = true;
        if self.runs.is_empty() {
            self.buffer.sort();
            self.memory = std::mem::take(&mut self.buffer).into_iter();
            return Ok(());
        }
        if !self.buffer.is_empty() {
            self.spill()?;
        }
        for i in 0..self.runs.len() {
            if let Some(item) = self.runs[i].next()? {
                self.heap.push(Reverse((item, i)));
            }
        }
        Ok(())
    }

    fn pull(&mut self) -> PalsResult<Option<T>> {
        if !self.finalised {
            return Err(PalsError::Spool("pull before finalise".into()));
        }
        if self.runs.is_empty() {
            return Ok(self.memory.next());
        }
        let Some(Reverse((item, run))) = self.heap.pop() else {
            return Ok(None);
        };
        if let Some(next) = self.runs[run].next()? {
            self.heap.push(Reverse((next, run)));
        }
        Ok(Some(item))
    }

    fn len(&self) -> usize {
        self.len
    }

    fn clean_up(&mut self) -> PalsResult<()> {
        // 临时文件随 File 析构删除
        self.runs.clear();
        self.heap.clear();
        self.buffer.clear();
        self.memory = Vec::new().into_iter();
        self.len = 0;
        self.finalised = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(m: &mut Morass<u64>) -> Vec<u64> {
        let mut out = Vec::new();
        while let Some(v) = m.pull().unwrap() {
            out.push(v);
        }
        out
    }

    fn scrambled(n: u64) -> Vec<u64> {
        (0..n).map(|i| (i * 7919) % n).collect()
    }

    #[test]
    fn in_memory_sorting() {
        let mut m = Morass::new(1000);
        for v in scrambled(100) {
            m.push(v).unwrap();
        }
        m.finalise().unwrap();
        assert_eq!(m.spilled_runs(), 0);
        assert_eq!(m.len(), 100);
        assert_eq!(drain(&mut m), (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn spilled_runs_merge_in_order() {
        let mut m = Morass::new(16);
        for v in scrambled(101) {
            m.push(v).unwrap();
        }
        m.finalise().unwrap();
        assert_eq!(m.spilled_runs(), 7);
        assert_eq!(drain(&mut m), (0..101).collect::<Vec<_>>());
        assert!(m.pull().unwrap().is_none());
    }

    #[test]
    fn misuse_is_reported() {
        let mut m: Morass<u64> = Morass::new(4);
        assert!(matches!(m.pull(), Err(PalsError::Spool(_))));
        m.push(3).unwrap();
        m.finalise().unwrap();
        assert!(matches!(m.push(1), Err(PalsError::Spool(_))));
    }

    #[test]
    fn clean_up_allows_reuse() {
        let mut m = Morass::new(2);
        for v in [5u64, 1, 4] {
            m.push(v).unwrap();
        }
        m.finalise().unwrap();
        assert_eq!(m.pull().unwrap(), Some(1));
        m.clean_up().unwrap();
        assert!(m.is_empty());
        m.push(9).unwrap();
        m.push(8).unwrap();
        m.finalise().unwrap();
        assert_eq!(drain(&mut m), vec![8, 9]);
    }
}
