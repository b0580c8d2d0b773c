/// 碱基编码表：A/C/G/T（U 视同 T，大小写均可）编码为 0..4，其余字节为 -1
static CODES: [i8; 256] = build_codes();

const fn build_codes() -> [i8; 256] {
    let mut t = [-1i8; 256];
    t[b'A' as usize] = 0;
    t[b'a' as usize] = 0;
    t[b'C' as usize] = 1;
    t[b'c' as usize] = 1;
    t[b'G' as usize] = 2;
    t[b'g' as usize] = 2;
    t[b'T' as usize] = 3;
    t[b't' as usize] = 3;
    t[b'U' as usize] = 3;
    t[b'u' as usize] = 3;
    t
}

/// 2-bit 编码；N、IUPAC 简并码及其它字节返回 `None`
#[inline]
pub fn encode(b: u8) -> Option<u8> {
    let c = CODES[b as usize];
    if c < 0 {
        None
    } else {
        Some(c as u8)
    }
}

#[inline]
pub fn is_valid(b: u8) -> bool {
    CODES[b as usize] >= 0
}

/// 两个碱基均有效且相同（忽略大小写）时为真；N 与任何碱基（包括 N）都不匹配
#[inline]
pub fn same_base(a: u8, b: u8) -> bool {
    let x = CODES[a as usize];
    x >= 0 && x == CODES[b as usize]
}

/// 互补碱基，保留大小写；无效字节映射为 N
#[inline]
pub fn complement(base: u8) -> u8 {
    let c = match base.to_ascii_uppercase() {
        b'A' => b'T',
        b'C' => b'G',
        b'G' => b'C',
        b'T' | b'U' => b'A',
        _ => return b'N',
    };
    if base.is_ascii_lowercase() {
        c.to_ascii_lowercase()
    } else {
        c
    }
}

pub fn revcomp(seq: &[u8]) -> Vec<u8> {
    seq.iter().rev().map(|&b| complement(b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoding_is_case_insensitive() {
        assert_eq!(encode(b'A'), Some(0));
        assert_eq!(encode(b'c'), Some(1));
        assert_eq!(encode(b'G'), Some(2));
        assert_eq!(encode(b'u'), Some(3));
        assert_eq!(encode(b'N'), None);
        assert_eq!(encode(b'R'), None);
        assert!(!is_valid(b'-'));
    }

    #[test]
    fn n_never_matches() {
        assert!(same_base(b'a', b'A'));
        assert!(!same_base(b'A', b'C'));
        assert!(!same_base(b'N', b'N'));
        assert!(!same_base(b'n', b'A'));
    }

    #[test]
    fn revcomp_keeps_case_and_masks_unknown() {
        assert_eq!(revcomp(b"ACGTN"), b"NACGT");
        assert_eq!(revcomp(b"aacR"), b"Ngtt");
        assert_eq!(revcomp(&revcomp(b"GATTACA")), b"GATTACA");
    }
}
