mod qr;

pub use qr::{Module, QR};
pub(crate) use qr::{format_info_coords, version_info_coords};

use tracing::debug;

use crate::common::{
    codec::encode,
    ec::{ecc, interleave},
    error::{QRError, QRResult},
    mask::{apply_best_mask, MaskPattern},
    metadata::ECLevel,
};

pub struct QRBuilder<'a> {
    data: &'a [u8],
    ec_level: ECLevel,
    mask: Option<MaskPattern>,
}

impl<'a> QRBuilder<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, ec_level: ECLevel::M, mask: None }
    }

    pub fn data(&mut self, data: &'a [u8]) -> &mut Self {
        self.data = data;
        self
    }

    pub fn ec_level(&mut self, ec_level: ECLevel) -> &mut Self {
        self.ec_level = ec_level;
        self
    }

    /// Forces a mask pattern instead of picking the lowest penalty one.
    pub fn mask(&mut self, mask: MaskPattern) -> &mut Self {
        self.mask = Some(mask);
        self
    }

    pub fn metadata(&self) -> String {
        match self.mask {
            Some(m) => format!("{{ Ec level: {}, Mask: {} }}", self.ec_level, *m),
            None => format!("{{ Ec level: {}, Mask: Auto }}", self.ec_level),
        }
    }
}

impl QRBuilder<'_> {
    pub fn build(&self) -> QRResult<QR> {
        debug!(len = self.data.len(), "Generating QR {}", self.metadata());
        if self.data.is_empty() {
            return Err(QRError::EmptyData);
        }

        let (encoded, ver) = encode(self.data, self.ec_level)?;
        debug!(version = *ver, "Encoded data");

        // Compute error correction codewords & interleave
        let blocks = ecc(&encoded, ver, self.ec_level);
        let payload = interleave(&blocks);

        let mut qr = QR::new(ver, self.ec_level);
        qr.draw_all_function_patterns();
        qr.draw_encoding_region(&payload);

        let mask = match self.mask {
            Some(m) => {
                qr.apply_mask(m);
                m
            }
            None => apply_best_mask(&mut qr),
        };
        debug!(mask = *mask, "QR built");

        Ok(qr)
    }
}
