use std::ops::{Add, AddAssign, Div, Mul, MulAssign, Sub};

// Galois field GF(256) with primitive polynomial x^8 + x^4 + x^3 + x^2 + 1
//------------------------------------------------------------------------------

#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub struct G(pub u8);

impl G {
    /// Generator α raised to `pow`.
    pub fn gen_pow(pow: usize) -> Self {
        G(EXP_TABLE[pow % 255])
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl From<G> for u8 {
    fn from(g: G) -> Self {
        g.0
    }
}

impl Add for G {
    type Output = Self;
    #[allow(clippy::suspicious_arithmetic_impl)]
    fn add(self, rhs: Self) -> Self::Output {
        G(self.0 ^ rhs.0)
    }
}

impl AddAssign for G {
    #[allow(clippy::suspicious_op_assign_impl)]
    fn add_assign(&mut self, rhs: Self) {
        self.0 ^= rhs.0;
    }
}

impl Sub for G {
    type Output = Self;
    #[allow(clippy::suspicious_arithmetic_impl)]
    fn sub(self, rhs: Self) -> Self::Output {
        G(self.0 ^ rhs.0)
    }
}

impl Mul for G {
    type Output = Self;
    fn mul(self, rhs: Self) -> Self::Output {
        if self.is_zero() || rhs.is_zero() {
            return G(0);
        }
        let pow = LOG_TABLE[self.0 as usize] as usize + LOG_TABLE[rhs.0 as usize] as usize;
        G(EXP_TABLE[pow % 255])
    }
}

impl MulAssign for G {
    fn mul_assign(&mut self, rhs: Self) {
        *self = *self * rhs;
    }
}

impl Div for G {
    type Output = Self;
    fn div(self, rhs: Self) -> Self::Output {
        debug_assert!(!rhs.is_zero(), "Division by zero in GF(256)");
        if self.is_zero() {
            return G(0);
        }
        let pow = 255 + LOG_TABLE[self.0 as usize] as usize - LOG_TABLE[rhs.0 as usize] as usize;
        G(EXP_TABLE[pow % 255])
    }
}

/// Evaluates a polynomial given lowest degree coefficient first.
pub fn eval_poly<'a>(poly: impl Iterator<Item = &'a G>, x: G) -> G {
    let mut res = G(0);
    let mut xpow = G(1);
    for &coeff in poly {
        res += coeff * xpow;
        xpow *= x;
    }
    res
}

// Tables
//------------------------------------------------------------------------------

const fn build_tables() -> ([u8; 256], [u8; 256]) {
    let mut exp = [0u8; 256];
    let mut log = [0u8; 256];
    let mut x: u16 = 1;
    let mut i = 0;
    while i < 255 {
        exp[i] = x as u8;
        log[x as usize] = i as u8;
        x <<= 1;
        if x & 0x100 != 0 {
            x ^= 0x11D;
        }
        i += 1;
    }
    exp[255] = exp[0];
    (exp, log)
}

const TABLES: ([u8; 256], [u8; 256]) = build_tables();

pub const EXP_TABLE: [u8; 256] = TABLES.0;

pub const LOG_TABLE: [u8; 256] = TABLES.1;
