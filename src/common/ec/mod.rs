mod block;
mod galois;
mod rectifier;

pub use block::Block;
use galois::G;

use super::metadata::{ECLevel, Version};

// Error correction codewords
//------------------------------------------------------------------------------

/// Generator polynomial of the given degree, highest degree first, without the monic term.
fn generator_poly(degree: usize) -> Vec<G> {
    let mut res = vec![G(0); degree];
    res[degree - 1] = G(1);
    let mut root = G(1);
    for _ in 0..degree {
        for j in 0..degree {
            res[j] *= root;
            if j + 1 < degree {
                let next = res[j + 1];
                res[j] += next;
            }
        }
        root *= G(2);
    }
    res
}

/// Reed-Solomon remainder of `data` for `ec_len` error correction codewords.
pub fn ecc_per_block(data: &[u8], ec_len: usize) -> Vec<u8> {
    let gen = generator_poly(ec_len);
    let mut rem = vec![G(0); ec_len];
    for &b in data {
        let factor = G(b) + rem[0];
        rem.remove(0);
        rem.push(G(0));
        rem.iter_mut().zip(gen.iter()).for_each(|(r, &g)| *r += g * factor);
    }
    rem.into_iter().map(u8::from).collect()
}

/// Splits data codewords into blocks and computes their error correction codewords.
pub fn ecc(data: &[u8], ver: Version, ecl: ECLevel) -> Vec<Block> {
    debug_assert!(data.len() == ver.data_codewords(ecl), "Data length mismatch");
    let ec_len = ver.ecc_per_block(ecl);
    let mut offset = 0;
    ver.data_codewords_per_block(ecl)
        .into_iter()
        .map(|dlen| {
            let blk = Block::new(&data[offset..offset + dlen], dlen + ec_len);
            offset += dlen;
            blk
        })
        .collect()
}

/// Interleaves data codewords of all blocks followed by their ecc codewords.
pub fn interleave(blocks: &[Block]) -> Vec<u8> {
    let total = blocks.iter().map(Block::len).sum();
    let max_dlen = blocks.iter().map(Block::data_len).max().unwrap_or(0);
    let ec_len = blocks.first().map_or(0, Block::ec_len);
    let mut res = Vec::with_capacity(total);
    for i in 0..max_dlen {
        blocks.iter().filter(|b| i < b.data_len()).for_each(|b| res.push(b.data()[i]));
    }
    for i in 0..ec_len {
        blocks.iter().for_each(|b| res.push(b.ecc()[i]));
    }
    res
}

/// Inverse of [`interleave`], reassembles blocks from the raw codeword stream.
pub fn deinterleave(codewords: &[u8], ver: Version, ecl: ECLevel) -> Vec<Block> {
    let dlens = ver.data_codewords_per_block(ecl);
    let ec_len = ver.ecc_per_block(ecl);
    let max_dlen = dlens.iter().copied().max().unwrap_or(0);
    let mut raw: Vec<Vec<u8>> = dlens.iter().map(|d| Vec::with_capacity(d + ec_len)).collect();
    let mut iter = codewords.iter();
    for i in 0..max_dlen {
        for (blk, &dlen) in raw.iter_mut().zip(dlens.iter()) {
            if i < dlen {
                blk.push(iter.next().copied().unwrap_or(0));
            }
        }
    }
    for _ in 0..ec_len {
        for blk in raw.iter_mut() {
            blk.push(iter.next().copied().unwrap_or(0));
        }
    }
    raw.iter().zip(dlens).map(|(r, dlen)| Block::with_encoded(r, dlen)).collect()
}

#[cfg(test)]
mod ec_tests {
    use super::{deinterleave, ecc, ecc_per_block, interleave};
    use crate::common::metadata::{ECLevel, Version};

    #[test]
    fn test_poly_mod_1() {
        let res = ecc_per_block(b" [\x0bx\xd1r\xdcMC@\xec\x11\xec\x11\xec\x11", 10);
        assert_eq!(&*res, b"\xc4#'w\xeb\xd7\xe7\xe2]\x17");
    }

    #[test]
    fn test_poly_mod_2() {
        let res = ecc_per_block(b" [\x0bx\xd1r\xdcMC@\xec\x11\xec", 13);
        assert_eq!(&*res, b"\xa8H\x16R\xd96\x9c\x00.\x0f\xb4z\x10");
    }

    #[test]
    fn test_poly_mod_3() {
        let res = ecc_per_block(b"CUF\x86W&U\xc2w2\x06\x12\x06g&", 18);
        assert_eq!(&*res, b"\xd5\xc7\x0b-s\xf7\xf1\xdf\xe5\xf8\x9au\x9aoV\xa1o'");
    }

    #[test]
    fn test_interleave_roundtrip() {
        let ver = Version::new(5).unwrap();
        let ecl = ECLevel::Q;
        let data: Vec<u8> = (0..ver.data_codewords(ecl)).map(|i| i as u8).collect();
        let blocks = ecc(&data, ver, ecl);
        assert_eq!(blocks.len(), 4);
        let stream = interleave(&blocks);
        assert_eq!(stream.len(), ver.total_codewords());
        assert_eq!(&stream[..4], &[0, 15, 30, 46]);
        let back = deinterleave(&stream, ver, ecl);
        assert_eq!(back, blocks);
    }
}
