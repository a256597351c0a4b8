// Bit stream
//------------------------------------------------------------------------------

/// Growable MSB-first bit buffer used both to assemble encoded data and to read it back.
#[derive(Debug, Clone, Default)]
pub struct BitStream {
    data: Vec<u8>,
    // Bit length
    len: usize,
    // Read cursor in bits
    cursor: usize,
}

impl BitStream {
    pub fn new(capacity: usize) -> Self {
        Self { data: Vec::with_capacity((capacity + 7) >> 3), len: 0, cursor: 0 }
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self { data: bytes.to_vec(), len: bytes.len() << 3, cursor: 0 }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    pub fn push(&mut self, bit: bool) {
        let offset = self.len & 7;
        if offset == 0 {
            self.data.push(0);
        }
        if bit {
            let pos = self.len >> 3;
            self.data[pos] |= 0b1000_0000 >> offset;
        }
        self.len += 1;
    }

    /// Appends the lowest `size` bits of `bits`, most significant first.
    pub fn push_bits(&mut self, bits: u32, size: usize) {
        debug_assert!(size <= 32, "Bit count exceeds 32: {size}");
        debug_assert!(
            size == 32 || bits >> size == 0,
            "Bit count shouldn't exceed bit length: Length {size}, Bits {bits}"
        );
        for i in (0..size).rev() {
            self.push((bits >> i) & 1 == 1);
        }
    }

    /// Appends whole bytes. Fast path when the stream is byte aligned.
    pub fn extend(&mut self, bytes: &[u8]) {
        if self.len & 7 == 0 {
            self.data.extend_from_slice(bytes);
            self.len += bytes.len() << 3;
        } else {
            bytes.iter().for_each(|b| self.push_bits(*b as u32, 8));
        }
    }

    pub fn remaining(&self) -> usize {
        self.len - self.cursor
    }

    /// Reads the next `size` bits, or `None` if the stream runs short.
    pub fn take_bits(&mut self, size: usize) -> Option<u32> {
        debug_assert!(size <= 32, "Bit count exceeds 32: {size}");
        if self.remaining() < size {
            return None;
        }
        let mut res = 0u32;
        for _ in 0..size {
            let bit = (self.data[self.cursor >> 3] >> (7 - (self.cursor & 7))) & 1;
            res = (res << 1) | bit as u32;
            self.cursor += 1;
        }
        Some(res)
    }
}

#[cfg(test)]
mod bit_stream_tests {

    use super::BitStream;

    #[test]
    fn test_len() {
        let mut bs = BitStream::new(152);
        assert_eq!(bs.len(), 0);
        bs.push_bits(0, 0);
        assert_eq!(bs.len(), 0);
        bs.push_bits(0b1000, 4);
        assert_eq!(bs.len(), 4);
        bs.push_bits(0b1000, 8);
        assert_eq!(bs.len(), 12);
        bs.push_bits(0b1000, 4);
        assert_eq!(bs.len(), 16);
        bs.push_bits(0b1111111, 7);
        assert_eq!(bs.len(), 23);
    }

    #[test]
    fn test_push() {
        let mut bs = BitStream::new(2);
        bs.push(false);
        assert_eq!(bs.clone().into_bytes(), [0b00000000]);
        bs.push(true);
        assert_eq!(bs.into_bytes(), [0b01000000]);
    }

    #[test]
    fn test_push_bits_across_bytes() {
        let mut bs = BitStream::new(24);
        bs.push_bits(0b101, 3);
        bs.push_bits(0b1100_0011_11, 10);
        assert_eq!(bs.len(), 13);
        assert_eq!(bs.into_bytes(), [0b1011_1000, 0b0111_1000]);
    }

    #[test]
    fn test_extend_unaligned() {
        let mut bs = BitStream::new(20);
        bs.push_bits(0b1111, 4);
        bs.extend(&[0xA5]);
        assert_eq!(bs.len(), 12);
        assert_eq!(bs.into_bytes(), [0xFA, 0x50]);
    }

    #[test]
    fn test_take_bits() {
        let mut bs = BitStream::from_bytes(&[0b1101_0010, 0b0011_0100]);
        assert_eq!(bs.take_bits(4), Some(0b1101));
        assert_eq!(bs.take_bits(6), Some(0b0010_00));
        assert_eq!(bs.remaining(), 6);
        assert_eq!(bs.take_bits(7), None);
        assert_eq!(bs.take_bits(6), Some(0b11_0100));
        assert_eq!(bs.take_bits(0), Some(0));
    }
}
