use std::fmt::{Display, Formatter};
use std::ops::{Deref, Not};
use std::str::FromStr;

use super::error::QRError;

// Module color
//------------------------------------------------------------------------------

#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum Color {
    Light,
    Dark,
}

impl Not for Color {
    type Output = Self;
    fn not(self) -> Self::Output {
        match self {
            Self::Light => Self::Dark,
            Self::Dark => Self::Light,
        }
    }
}

impl From<bool> for Color {
    fn from(dark: bool) -> Self {
        if dark {
            Self::Dark
        } else {
            Self::Light
        }
    }
}

// Error correction level
//------------------------------------------------------------------------------

#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, PartialOrd, Ord)]
pub enum ECLevel {
    L = 0,
    M = 1,
    Q = 2,
    H = 3,
}

impl ECLevel {
    /// Two bit indicator stored in the format information.
    pub const fn format_bits(self) -> u16 {
        match self {
            Self::L => 0b01,
            Self::M => 0b00,
            Self::Q => 0b11,
            Self::H => 0b10,
        }
    }

    pub const fn from_format_bits(bits: u16) -> Self {
        match bits & 0b11 {
            0b01 => Self::L,
            0b00 => Self::M,
            0b11 => Self::Q,
            _ => Self::H,
        }
    }
}

impl FromStr for ECLevel {
    type Err = QRError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "L" => Ok(Self::L),
            "M" => Ok(Self::M),
            "Q" => Ok(Self::Q),
            "H" => Ok(Self::H),
            _ => Err(QRError::InvalidECLevel),
        }
    }
}

impl Display for ECLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::L => "L",
            Self::M => "M",
            Self::Q => "Q",
            Self::H => "H",
        };
        f.write_str(s)
    }
}

// Version
//------------------------------------------------------------------------------

#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, PartialOrd, Ord)]
pub struct Version(u8);

impl Deref for Version {
    type Target = u8;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Display for Version {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Version {
    pub const MIN: Version = Version(1);
    pub const MAX: Version = Version(40);

    pub fn new(v: u8) -> Result<Self, QRError> {
        match v {
            1..=40 => Ok(Self(v)),
            _ => Err(QRError::InvalidVersion),
        }
    }

    /// Version whose symbol is `width` modules wide, if any.
    pub fn from_width(width: usize) -> Option<Self> {
        if width < 21 || width > 177 || (width - 17) % 4 != 0 {
            return None;
        }
        Some(Self(((width - 17) / 4) as u8))
    }

    pub const fn width(self) -> usize {
        self.0 as usize * 4 + 17
    }

    /// Centre coordinates of alignment patterns along one axis.
    pub fn alignment_pattern(self) -> Vec<usize> {
        let v = self.0 as usize;
        if v == 1 {
            return Vec::new();
        }
        let count = v / 7 + 2;
        let step = if v == 32 { 26 } else { (v * 4 + count * 2 + 1) / (count * 2 - 2) * 2 };
        let mut res: Vec<usize> = (0..count - 1).map(|i| self.width() - 7 - i * step).collect();
        res.push(6);
        res.reverse();
        res
    }

    /// Number of modules available for codewords and remainder bits.
    pub const fn raw_modules(self) -> usize {
        let v = self.0 as usize;
        let mut res = (16 * v + 128) * v + 64;
        if v >= 2 {
            let count = v / 7 + 2;
            res -= (25 * count - 10) * count - 55;
            if v >= 7 {
                res -= 36;
            }
        }
        res
    }

    pub const fn total_codewords(self) -> usize {
        self.raw_modules() >> 3
    }

    pub const fn ecc_per_block(self, ecl: ECLevel) -> usize {
        ECC_PER_BLOCK[ecl as usize][self.0 as usize - 1]
    }

    pub const fn block_count(self, ecl: ECLevel) -> usize {
        BLOCK_COUNT[ecl as usize][self.0 as usize - 1]
    }

    pub const fn data_codewords(self, ecl: ECLevel) -> usize {
        self.total_codewords() - self.ecc_per_block(ecl) * self.block_count(ecl)
    }

    pub const fn data_bit_capacity(self, ecl: ECLevel) -> usize {
        self.data_codewords(ecl) << 3
    }

    /// Data codeword count of every block, short blocks first.
    pub fn data_codewords_per_block(self, ecl: ECLevel) -> Vec<usize> {
        let blk_cnt = self.block_count(ecl);
        let total = self.total_codewords();
        let ec_len = self.ecc_per_block(ecl);
        let short_len = total / blk_cnt - ec_len;
        let long_cnt = total % blk_cnt;
        (0..blk_cnt).map(|i| if i < blk_cnt - long_cnt { short_len } else { short_len + 1 }).collect()
    }

    /// 18 bit version information for versions 7 and above.
    pub fn version_info(self) -> u32 {
        debug_assert!(self.0 >= 7, "Version info is only present from version 7");
        let v = self.0 as u32;
        let mut rem = v;
        for _ in 0..12 {
            rem = (rem << 1) ^ ((rem >> 11) * 0x1F25);
        }
        (v << 12) | (rem & 0xFFF)
    }
}

// Format info
//------------------------------------------------------------------------------

pub const FORMAT_MASK: u16 = 0x5412;

/// 15 bit format information with the BCH remainder appended and the mask applied.
pub fn format_info(ecl: ECLevel, mask: u8) -> u16 {
    let data = (ecl.format_bits() << 3) | mask as u16;
    let mut rem = data;
    for _ in 0..10 {
        rem = (rem << 1) ^ ((rem >> 9) * 0x537);
    }
    ((data << 10) | (rem & 0x3FF)) ^ FORMAT_MASK
}

/// Closest valid format info to the read bits, tolerating at most 3 bit errors.
pub fn rectify_format_info(bits: u16) -> Option<(ECLevel, u8)> {
    let mut best: Option<(u32, ECLevel, u8)> = None;
    for ecl in [ECLevel::L, ECLevel::M, ECLevel::Q, ECLevel::H] {
        for mask in 0..8 {
            let dist = (format_info(ecl, mask) ^ bits).count_ones();
            if best.map_or(true, |(d, ..)| dist < d) {
                best = Some((dist, ecl, mask));
            }
        }
    }
    best.filter(|(d, ..)| *d <= 3).map(|(_, ecl, mask)| (ecl, mask))
}

/// Closest valid version info to the read bits, tolerating at most 3 bit errors.
pub fn rectify_version_info(bits: u32) -> Option<Version> {
    (7..=40)
        .map(Version)
        .map(|v| ((v.version_info() ^ bits).count_ones(), v))
        .min_by_key(|(d, _)| *d)
        .filter(|(d, _)| *d <= 3)
        .map(|(_, v)| v)
}

// Block tables
//------------------------------------------------------------------------------

const ECC_PER_BLOCK: [[usize; 40]; 4] = [
    [
        7, 10, 15, 20, 26, 18, 20, 24, 30, 18, 20, 24, 26, 30, 22, 24, 28, 30, 28, 28, 28, 28, 30,
        30, 26, 28, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30,
    ],
    [
        10, 16, 26, 18, 24, 16, 18, 22, 22, 26, 30, 22, 22, 24, 24, 28, 28, 26, 26, 26, 26, 28, 28,
        28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28,
    ],
    [
        13, 22, 18, 26, 18, 24, 18, 22, 20, 24, 28, 26, 24, 20, 30, 24, 28, 28, 26, 30, 28, 30, 30,
        30, 30, 28, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30,
    ],
    [
        17, 28, 22, 16, 22, 28, 26, 26, 24, 28, 24, 28, 22, 24, 24, 30, 28, 28, 26, 28, 30, 24, 30,
        30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30,
    ],
];

const BLOCK_COUNT: [[usize; 40]; 4] = [
    [
        1, 1, 1, 1, 1, 2, 2, 2, 2, 4, 4, 4, 4, 4, 6, 6, 6, 6, 7, 8, 8, 9, 9, 10, 12, 12, 12, 13, 14,
        15, 16, 17, 18, 19, 19, 20, 21, 22, 24, 25,
    ],
    [
        1, 1, 1, 2, 2, 4, 4, 4, 5, 5, 5, 8, 9, 9, 10, 10, 11, 13, 14, 16, 17, 17, 18, 20, 21, 23, 25,
        26, 28, 29, 31, 33, 35, 37, 38, 40, 43, 45, 47, 49,
    ],
    [
        1, 1, 2, 2, 4, 4, 6, 6, 8, 8, 8, 10, 12, 16, 12, 17, 16, 18, 21, 20, 23, 23, 25, 27, 29, 34,
        34, 35, 38, 40, 43, 45, 48, 51, 53, 56, 59, 62, 65, 68,
    ],
    [
        1, 1, 2, 4, 4, 4, 5, 6, 8, 8, 11, 11, 16, 16, 18, 16, 19, 21, 25, 25, 25, 34, 30, 32, 35, 37,
        40, 42, 45, 48, 51, 54, 57, 60, 63, 66, 70, 74, 77, 81,
    ],
];
