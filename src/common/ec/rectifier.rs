use super::{
    galois::{eval_poly, G},
    Block,
};
use crate::common::error::{QRError, QRResult};

// Rectifier
//------------------------------------------------------------------------------

impl Block {
    /// Corrects up to `ec_len / 2` erroneous codewords in place and returns the data part.
    pub fn rectify(&mut self) -> QRResult<&[u8]> {
        let synd = match self.syndromes() {
            None => return Ok(self.data()),
            Some(s) => s,
        };

        // Error locator polynomial
        let (sig, err_cnt) = berlekamp_massey(&synd);
        if err_cnt * 2 > self.ec_len() {
            return Err(QRError::TooManyError);
        }

        let err_loc = self.chien_search(&sig[..=err_cnt]);
        if err_loc.len() != err_cnt {
            return Err(QRError::TooManyError);
        }

        // Sigma derivative
        let mut dsig = vec![G(0); sig.len()];
        for i in (1..sig.len()).step_by(2) {
            dsig[i - 1] = sig[i];
        }

        // Error evaluator
        let omg = omega(&synd, &sig);

        // Error magnitude via Forney, first consecutive root is α^0
        let len = self.len();
        for pos in err_loc {
            let pow = len - 1 - pos;
            let x = G::gen_pow(pow);
            let xinv = G::gen_pow(255 - pow);
            let den = eval_poly(dsig.iter(), xinv);
            if den.is_zero() {
                return Err(QRError::TooManyError);
            }
            let mag = x * eval_poly(omg.iter(), xinv) / den;
            self.data[pos] ^= mag.0;
        }

        match self.syndromes() {
            None => Ok(self.data()),
            Some(_) => Err(QRError::TooManyError),
        }
    }

    /// Syndromes of the received block, `None` when all are zero.
    fn syndromes(&self) -> Option<Vec<G>> {
        let gdata: Vec<G> = self.data.iter().rev().map(|&b| G(b)).collect();
        let synd: Vec<G> =
            (0..self.ec_len()).map(|i| eval_poly(gdata.iter(), G::gen_pow(i))).collect();
        if synd.iter().all(|s| s.is_zero()) {
            None
        } else {
            Some(synd)
        }
    }

    /// Codeword positions whose locators are roots of sigma.
    fn chien_search(&self, sig: &[G]) -> Vec<usize> {
        let len = self.len();
        (0..len)
            .filter(|&pos| {
                let pow = len - 1 - pos;
                eval_poly(sig.iter(), G::gen_pow(255 - pow)).is_zero()
            })
            .collect()
    }
}

// Sigma polynomial and the number of errors it locates
fn berlekamp_massey(synd: &[G]) -> (Vec<G>, usize) {
    let n = synd.len();
    let mut cx = vec![G(0); n + 1];
    let mut bx = vec![G(0); n + 1];
    cx[0] = G(1);
    bx[0] = G(1);
    let mut l = 0usize;
    let mut m = 1usize;
    let mut b = G(1);

    for k in 0..n {
        // Discrepancy
        let mut d = synd[k];
        for i in 1..=l {
            d += cx[i] * synd[k - i];
        }

        if d.is_zero() {
            m += 1;
            continue;
        }

        let tx = cx.clone();
        let scale = d / b;
        for i in 0..=n - m {
            cx[i + m] += scale * bx[i];
        }

        if 2 * l <= k {
            l = k + 1 - l;
            bx = tx;
            b = d;
            m = 1;
        } else {
            m += 1;
        }
    }
    (cx, l)
}

// Error evaluator polynomial: synd * sigma mod x^n
fn omega(synd: &[G], sig: &[G]) -> Vec<G> {
    let n = synd.len();
    let mut omg = vec![G(0); n];
    for (i, o) in omg.iter_mut().enumerate() {
        for j in 0..=i.min(sig.len() - 1) {
            *o += synd[i - j] * sig[j];
        }
    }
    omg
}

#[cfg(test)]
mod ec_rectifier_tests {
    use super::Block;
    use test_case::test_case;

    #[test_case(&[32, 91, 11, 45, 89, 123, 77, 44, 56, 99, 202], &[32, 91, 11, 45, 89, 46, 77, 44, 56, 99, 202])]
    #[test_case(&[32, 91, 11, 45, 89, 123, 77, 44, 56, 99, 202], &[32, 91, 11, 45, 89, 46, 77, 44, 56, 99, 249])]
    fn test_rectifier(data: &[u8], bad: &[u8]) {
        let mut blk = Block::new(data, 15);
        blk.data[..11].copy_from_slice(bad);
        let rect = blk.rectify().unwrap();
        assert_eq!(rect, data, "Rectified {rect:?}, Original data {data:?}");
    }

    #[test]
    fn test_rectifier_ecc_region() {
        let data = b"error correction";
        let mut blk = Block::new(data, 26);
        blk.data[17] ^= 0xFF;
        blk.data[20] ^= 0x01;
        blk.data[0] ^= 0x80;
        assert_eq!(blk.rectify().unwrap(), data);
    }

    #[test]
    fn test_rectifier_clean_block() {
        let data = [1, 2, 3, 4, 5];
        let mut blk = Block::new(&data, 12);
        assert_eq!(blk.rectify().unwrap(), &data);
    }

    #[test_case(&[32, 91, 11, 45, 89, 123, 77, 44, 56, 99, 202], &[138, 91, 161, 45, 243, 46, 231, 44, 146, 99, 202])]
    fn test_rectifier_fail(data: &[u8], bad: &[u8]) {
        let mut blk = Block::new(data, 15);
        blk.data[..11].copy_from_slice(bad);
        let res = blk.rectify().map(|d| d.to_vec());
        assert_ne!(res, Ok(data.to_vec()));
    }
}
