//! 测试用序列生成器

/// 线性同余伪随机序列（与 benches 中的 `make_reference` 相同）
pub(crate) fn lcg(n: usize, seed: u32) -> Vec<u8> {
    let bases = b"ACGT";
    let mut x = seed;
    (0..n)
        .map(|_| {
            x = x.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            bases[(x >> 16) as usize % 4]
        })
        .collect()
}

/// 字母表 {a,c,g,t} 上 n 阶 De Bruijn 序列（字典序最小），长度 4^n
pub(crate) fn de_bruijn(n: usize) -> Vec<u8> {
    fn db(t: usize, p: usize, n: usize, a: &mut Vec<u8>, out: &mut Vec<u8>) {
        if t > n {
            if n % p == 0 {
                out.extend_from_slice(&a[1..=p]);
            }
        } else {
            a[t] = a[t - p];
            db(t + 1, p, n, a, out);
            for j in a[t - p] + 1..4 {
                a[t] = j;
                db(t + 1, t, n, a, out);
            }
        }
    }
    let mut a = vec![0u8; n + 1];
    let mut out = Vec::with_capacity(1 << (2 * n));
    db(1, 1, n, &mut a, &mut out);
    out.iter().map(|&s| b"acgt"[s as usize]).collect()
}

/// 把碱基替换为另一个碱基（A→C→G→T→A）
pub(crate) fn shift(b: u8) -> u8 {
    match b {
        b'A' => b'C',
        b'C' => b'G',
        b'G' => b'T',
        _ => b'A',
    }
}

#[test]
fn de_bruijn_prefixes() {
    let t = de_bruijn(6);
    assert_eq!(t.len(), 4096);
    assert_eq!(&t[..40], b"aaaaaacaaaaagaaaaataaaaccaaaacgaaaactaaa");
    let q = de_bruijn(5);
    assert_eq!(q.len(), 1024);
    assert_eq!(&q[..40], b"aaaaacaaaagaaaataaaccaaacgaaactaaagcaaag");
}
