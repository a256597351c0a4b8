use super::ecc_per_block;

// Codeword block
//------------------------------------------------------------------------------

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Block {
    pub(super) data: Vec<u8>,
    // Data length
    pub(super) dlen: usize,
}

impl Block {
    /// Builds a block of total length `len` from data codewords, appending their ecc.
    pub fn new(raw: &[u8], len: usize) -> Self {
        debug_assert!(len > raw.len(), "Block length must exceed data length");
        let dlen = raw.len();
        let mut data = Vec::with_capacity(len);
        data.extend_from_slice(raw);
        data.extend(ecc_per_block(raw, len - dlen));
        Self { data, dlen }
    }

    pub fn with_encoded(encoded: &[u8], dlen: usize) -> Self {
        Self { data: encoded.to_vec(), dlen }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn ec_len(&self) -> usize {
        self.data.len() - self.dlen
    }

    pub fn data_len(&self) -> usize {
        self.dlen
    }

    pub fn data(&self) -> &[u8] {
        &self.data[..self.dlen]
    }

    pub fn ecc(&self) -> &[u8] {
        &self.data[self.dlen..]
    }
}
