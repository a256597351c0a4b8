use encoding_rs::Encoding;

use super::{
    bitstream::BitStream,
    error::{QRError, QRResult},
    metadata::{ECLevel, Version},
};

// Mode
//------------------------------------------------------------------------------

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Mode {
    Numeric,
    Alphanumeric,
    Byte,
}

const ALPHANUMERIC_CHARSET: &[u8; 45] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ $%*+-./:";

pub static PADDING_CODEWORDS: [u8; 2] = [0b1110_1100, 0b0001_0001];

fn alphanumeric_value(b: u8) -> Option<u32> {
    ALPHANUMERIC_CHARSET.iter().position(|&c| c == b).map(|p| p as u32)
}

impl Mode {
    /// Most compact single mode able to represent all of `data`.
    pub fn of(data: &[u8]) -> Self {
        if data.iter().all(u8::is_ascii_digit) {
            Self::Numeric
        } else if data.iter().all(|&b| alphanumeric_value(b).is_some()) {
            Self::Alphanumeric
        } else {
            Self::Byte
        }
    }

    pub const fn indicator(self) -> u32 {
        match self {
            Self::Numeric => 0b0001,
            Self::Alphanumeric => 0b0010,
            Self::Byte => 0b0100,
        }
    }

    pub fn char_count_bits(self, ver: Version) -> usize {
        let bits = match self {
            Self::Numeric => [10, 12, 14],
            Self::Alphanumeric => [9, 11, 13],
            Self::Byte => [8, 16, 16],
        };
        bits[version_band(ver)]
    }

    /// Bit length of `len` characters encoded in this mode, headers excluded.
    pub const fn encoded_len(self, len: usize) -> usize {
        match self {
            Self::Numeric => 10 * (len / 3) + [0, 4, 7][len % 3],
            Self::Alphanumeric => 11 * (len / 2) + 6 * (len % 2),
            Self::Byte => 8 * len,
        }
    }

    fn push_data(self, data: &[u8], bs: &mut BitStream) {
        match self {
            Self::Numeric => data.chunks(3).for_each(|chunk| {
                let val = chunk.iter().fold(0, |acc, &d| acc * 10 + (d - b'0') as u32);
                bs.push_bits(val, [0, 4, 7, 10][chunk.len()]);
            }),
            Self::Alphanumeric => data.chunks(2).for_each(|chunk| {
                let val = chunk.iter().fold(0, |acc, &b| acc * 45 + alphanumeric_value(b).unwrap_or(0));
                bs.push_bits(val, [0, 6, 11][chunk.len()]);
            }),
            Self::Byte => bs.extend(data),
        }
    }
}

fn version_band(ver: Version) -> usize {
    match *ver {
        1..=9 => 0,
        10..=26 => 1,
        _ => 2,
    }
}

// Encoder
//------------------------------------------------------------------------------

/// Encodes data into the data codewords of the smallest version that fits.
pub fn encode(data: &[u8], ecl: ECLevel) -> QRResult<(Vec<u8>, Version)> {
    if data.is_empty() {
        return Err(QRError::EmptyData);
    }
    let mode = Mode::of(data);
    let ver = find_min_version(data.len(), mode, ecl).ok_or(QRError::DataTooLong)?;
    Ok((encode_with_version(data, mode, ver, ecl), ver))
}

pub fn find_min_version(len: usize, mode: Mode, ecl: ECLevel) -> Option<Version> {
    (1..=40).filter_map(|v| Version::new(v).ok()).find(|&ver| {
        let cc_bits = mode.char_count_bits(ver);
        len < (1 << cc_bits)
            && 4 + cc_bits + mode.encoded_len(len) <= ver.data_bit_capacity(ecl)
    })
}

pub fn encode_with_version(data: &[u8], mode: Mode, ver: Version, ecl: ECLevel) -> Vec<u8> {
    let cap = ver.data_bit_capacity(ecl);
    let mut bs = BitStream::new(cap);

    bs.push_bits(mode.indicator(), 4);
    bs.push_bits(data.len() as u32, mode.char_count_bits(ver));
    mode.push_data(data, &mut bs);
    debug_assert!(bs.len() <= cap, "Encoded data exceeds capacity: {} > {cap}", bs.len());

    // Terminator and byte alignment
    let term = (cap - bs.len()).min(4);
    bs.push_bits(0, term);
    let pad = (8 - (bs.len() & 7)) & 7;
    bs.push_bits(0, pad);

    for &pc in PADDING_CODEWORDS.iter().cycle() {
        if bs.len() >= cap {
            break;
        }
        bs.push_bits(pc as u32, 8);
    }
    bs.into_bytes()
}

// Decoder
//------------------------------------------------------------------------------

/// Accumulates decoded bytes per charset and converts them to text on flush.
struct TextSink {
    out: String,
    pending: Vec<u8>,
    charset: Option<&'static Encoding>,
}

impl TextSink {
    fn new() -> Self {
        Self { out: String::new(), pending: Vec::new(), charset: None }
    }

    fn flush(&mut self) -> QRResult<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let text = match self.charset {
            Some(enc) => enc
                .decode_without_bom_handling_and_without_replacement(&self.pending)
                .ok_or(QRError::InvalidUTF8Sequence)?
                .into_owned(),
            None => match std::str::from_utf8(&self.pending) {
                Ok(s) => s.to_owned(),
                Err(_) => encoding_rs::WINDOWS_1252.decode_without_bom_handling(&self.pending).0.into_owned(),
            },
        };
        self.out.push_str(&text);
        self.pending.clear();
        Ok(())
    }

    fn set_charset(&mut self, charset: &'static Encoding) -> QRResult<()> {
        self.flush()?;
        self.charset = Some(charset);
        Ok(())
    }

    fn push_kanji(&mut self, sjis: &[u8]) -> QRResult<()> {
        self.flush()?;
        let text = encoding_rs::SHIFT_JIS
            .decode_without_bom_handling_and_without_replacement(sjis)
            .ok_or(QRError::InvalidChar)?;
        self.out.push_str(&text);
        Ok(())
    }

    fn finish(mut self) -> QRResult<String> {
        self.flush()?;
        Ok(self.out)
    }
}

fn eci_charset(value: u32) -> QRResult<&'static Encoding> {
    use encoding_rs::*;

    let enc = match value {
        1 | 3 => WINDOWS_1252,
        4 => ISO_8859_2,
        5 => ISO_8859_3,
        6 => ISO_8859_4,
        7 => ISO_8859_5,
        8 => ISO_8859_6,
        9 => ISO_8859_7,
        10 => ISO_8859_8,
        11 => WINDOWS_1254,
        12 => ISO_8859_10,
        13 => WINDOWS_874,
        15 => ISO_8859_13,
        16 => ISO_8859_14,
        17 => ISO_8859_15,
        18 => ISO_8859_16,
        20 => SHIFT_JIS,
        21 => WINDOWS_1250,
        22 => WINDOWS_1251,
        23 => WINDOWS_1252,
        24 => WINDOWS_1256,
        26 => UTF_8,
        28 => BIG5,
        29 => GB18030,
        30 => EUC_KR,
        _ => return Err(QRError::UnsupportedCharset),
    };
    Ok(enc)
}

/// Decodes the segments contained in rectified data codewords.
pub fn decode(data: &[u8], ver: Version) -> QRResult<String> {
    let mut bs = BitStream::from_bytes(data);
    let mut sink = TextSink::new();
    let band = version_band(ver);
    let take = |bs: &mut BitStream, n: usize| bs.take_bits(n).ok_or(QRError::CorruptedData);

    while bs.remaining() >= 4 {
        match take(&mut bs, 4)? {
            0b0000 => break,
            0b0001 => {
                let mut cnt = take(&mut bs, [10, 12, 14][band])? as usize;
                while cnt > 0 {
                    let digits = cnt.min(3);
                    let val = take(&mut bs, [0, 4, 7, 10][digits])?;
                    if val >= [1, 10, 100, 1000][digits] {
                        return Err(QRError::InvalidChar);
                    }
                    let s = format!("{val:0digits$}");
                    sink.pending.extend_from_slice(s.as_bytes());
                    cnt -= digits;
                }
            }
            0b0010 => {
                let mut cnt = take(&mut bs, [9, 11, 13][band])? as usize;
                while cnt > 0 {
                    let chars = cnt.min(2);
                    let mut val = take(&mut bs, [0, 6, 11][chars])? as usize;
                    if val >= [1, 45, 45 * 45][chars] {
                        return Err(QRError::InvalidChar);
                    }
                    if chars == 2 {
                        sink.pending.push(ALPHANUMERIC_CHARSET[val / 45]);
                        val %= 45;
                    }
                    sink.pending.push(ALPHANUMERIC_CHARSET[val]);
                    cnt -= chars;
                }
            }
            0b0100 => {
                let cnt = take(&mut bs, [8, 16, 16][band])?;
                for _ in 0..cnt {
                    sink.pending.push(take(&mut bs, 8)? as u8);
                }
            }
            0b1000 => {
                let cnt = take(&mut bs, [8, 10, 12][band])?;
                let mut sjis = Vec::with_capacity(cnt as usize * 2);
                for _ in 0..cnt {
                    let val = take(&mut bs, 13)?;
                    let mut word = ((val / 0xC0) << 8) | (val % 0xC0);
                    word += if word + 0x8140 <= 0x9FFC { 0x8140 } else { 0xC140 };
                    sjis.extend_from_slice(&[(word >> 8) as u8, word as u8]);
                }
                sink.push_kanji(&sjis)?;
            }
            0b0111 => {
                let first = take(&mut bs, 8)?;
                let val = if first & 0x80 == 0 {
                    first
                } else if first & 0xC0 == 0x80 {
                    ((first & 0x3F) << 8) | take(&mut bs, 8)?
                } else if first & 0xE0 == 0xC0 {
                    ((first & 0x1F) << 16) | take(&mut bs, 16)?
                } else {
                    return Err(QRError::UnsupportedCharset);
                };
                sink.set_charset(eci_charset(val)?)?;
            }
            // Structured append header
            0b0011 => {
                take(&mut bs, 16)?;
            }
            // FNC1 in first position
            0b0101 => {}
            // FNC1 in second position
            0b1001 => {
                take(&mut bs, 8)?;
            }
            _ => return Err(QRError::InvalidMode),
        }
    }
    sink.finish()
}
