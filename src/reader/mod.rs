mod binarize;
mod finder;
mod prepare;
mod symbol;
mod utils;

use image::DynamicImage;
use tracing::debug;

use crate::common::{
    codec::decode,
    ec::deinterleave,
    error::{QRError, QRResult},
    metadata::{ECLevel, Version},
};
use binarize::{BinaryImage, Strategy};
use finder::locate_finders;
use symbol::{group_finders, locate_symbol, FinderGroup};

/// Payload recovered from an image together with the symbol parameters it was read with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    pub data: String,
    pub version: Version,
    pub ec_level: ECLevel,
}

pub struct QRReader;

impl QRReader {
    /// Decodes the first QR symbol found in encoded image bytes (PNG, JPEG, GIF, ...).
    pub fn read(bytes: &[u8]) -> QRResult<Decoded> {
        if bytes.is_empty() {
            return Err(QRError::InvalidImage);
        }
        let img = image::load_from_memory(bytes).map_err(|_| QRError::InvalidImage)?;
        Self::read_image(&img)
    }

    pub fn read_image(img: &DynamicImage) -> QRResult<Decoded> {
        let gray = prepare::prepare(img);
        debug!(w = gray.width(), h = gray.height(), "Prepared image");

        let mut last_err = QRError::SymbolNotFound;
        for strategy in Strategy::ALL {
            let mut bin = BinaryImage::binarize(&gray, strategy);
            let finders = locate_finders(&mut bin);
            let groups = group_finders(&finders);
            debug!(?strategy, finders = finders.len(), groups = groups.len(), "Located finders");

            for group in groups {
                match decode_group(&mut bin, &group) {
                    Ok(decoded) => {
                        debug!(version = *decoded.version, ec_level = %decoded.ec_level, "Decoded symbol");
                        return Ok(decoded);
                    }
                    Err(e) => {
                        debug!(?strategy, error = %e, "Finder group rejected");
                        last_err = e;
                    }
                }
            }
        }

        Err(last_err)
    }
}

// Tries the version read from the version info first, then the estimate and its neighbours
fn decode_group(img: &mut BinaryImage, group: &FinderGroup) -> QRResult<Decoded> {
    let est = group.estimate_version();
    let mut candidates = Vec::with_capacity(4);

    if *est >= 6 {
        if let Ok(ver) = locate_symbol(img, group, est)?.read_version_info() {
            candidates.push(ver);
        }
    }
    for v in [*est, *est + 1, *est - 1] {
        match Version::new(v) {
            Ok(ver) if !candidates.contains(&ver) => candidates.push(ver),
            _ => {}
        }
    }

    let mut last_err = QRError::SymbolNotFound;
    for ver in candidates {
        match decode_with_version(img, group, ver) {
            Ok(decoded) => return Ok(decoded),
            Err(e) => last_err = e,
        }
    }
    Err(last_err)
}

fn decode_with_version(img: &mut BinaryImage, group: &FinderGroup, ver: Version) -> QRResult<Decoded> {
    let sym = locate_symbol(img, group, ver)?;
    let (ecl, mask) = sym.read_format_info()?;
    debug!(version = *sym.version(), ec_level = %ecl, mask = *mask, "Read format info");

    let codewords = sym.extract_codewords(ecl, mask);
    let mut data = Vec::with_capacity(ver.data_codewords(ecl));
    for mut blk in deinterleave(&codewords, ver, ecl) {
        data.extend_from_slice(blk.rectify()?);
    }

    let text = decode(&data, ver)?;
    Ok(Decoded { data: text, version: ver, ec_level: ecl })
}

#[cfg(test)]
mod reader_tests {
    use image::{imageops, DynamicImage, GrayImage, Luma, Rgba, RgbaImage};
    use test_case::test_case;

    use super::QRReader;
    use crate::builder::{QRBuilder, QR};
    use crate::common::{error::QRError, metadata::ECLevel};

    fn to_image(qr: &QR, scale: u32, dark: u8, light: u8) -> GrayImage {
        let w = qr.width() as u32;
        GrayImage::from_fn((w + 8) * scale, (w + 8) * scale, |x, y| {
            let (c, r) = ((x / scale) as i64 - 4, (y / scale) as i64 - 4);
            let inside = (0..w as i64).contains(&r) && (0..w as i64).contains(&c);
            Luma([if inside && qr.is_dark(r as usize, c as usize) { dark } else { light }])
        })
    }

    #[test_case("Hello, world!", ECLevel::L, 4)]
    #[test_case("HELLO WORLD 123", ECLevel::M, 3)]
    #[test_case("0123456789012345678901234567890", ECLevel::Q, 2)]
    #[test_case("Ünïcödé ✓ payload", ECLevel::H, 5 ; "unicode")]
    #[test_case("{\"key\": [1, 2, 3],\n \"nested\": {\"a\": null}}", ECLevel::M, 3 ; "json")]
    #[test_case(&"long payload spanning several blocks ".repeat(12), ECLevel::H, 2 ; "multi block")]
    #[test_case(&"x".repeat(1200), ECLevel::L, 1 ; "large version single pixel modules")]
    fn test_read_roundtrip(data: &str, ecl: ECLevel, scale: u32) {
        let qr = QRBuilder::new(data.as_bytes()).ec_level(ecl).build().unwrap();
        let img = DynamicImage::ImageLuma8(to_image(&qr, scale, 0, 255));
        let decoded = QRReader::read_image(&img).unwrap();
        assert_eq!(decoded.data, data);
        assert_eq!(decoded.version, qr.version());
        assert_eq!(decoded.ec_level, ecl);
    }

    #[test]
    fn test_read_rotated() {
        let qr = QRBuilder::new(b"rotated symbol").build().unwrap();
        let img = imageops::rotate90(&to_image(&qr, 4, 0, 255));
        let decoded = QRReader::read_image(&DynamicImage::ImageLuma8(img)).unwrap();
        assert_eq!(decoded.data, "rotated symbol");
    }

    #[test]
    fn test_read_inverted() {
        let qr = QRBuilder::new(b"light on dark").build().unwrap();
        let img = to_image(&qr, 4, 230, 20);
        let decoded = QRReader::read_image(&DynamicImage::ImageLuma8(img)).unwrap();
        assert_eq!(decoded.data, "light on dark");
    }

    #[test]
    fn test_read_low_contrast_colors() {
        let qr = QRBuilder::new(b"navy on cream").ec_level(ECLevel::Q).build().unwrap();
        let img = to_image(&qr, 3, 60, 200);
        let decoded = QRReader::read_image(&DynamicImage::ImageLuma8(img)).unwrap();
        assert_eq!(decoded.data, "navy on cream");
    }

    #[test]
    fn test_read_transparent_background() {
        let qr = QRBuilder::new(b"alpha").build().unwrap();
        let gray = to_image(&qr, 4, 0, 255);
        let img = RgbaImage::from_fn(gray.width(), gray.height(), |x, y| {
            if gray.get_pixel(x, y)[0] == 0 {
                Rgba([0, 0, 0, 255])
            } else {
                Rgba([0, 0, 0, 0])
            }
        });
        let decoded = QRReader::read_image(&DynamicImage::ImageRgba8(img)).unwrap();
        assert_eq!(decoded.data, "alpha");
    }

    #[test]
    fn test_read_damaged() {
        let qr = QRBuilder::new(b"survives damage").ec_level(ECLevel::H).build().unwrap();
        let mut img = to_image(&qr, 4, 0, 255);
        // Blot out a patch in the middle of the data region
        let mid = img.width() / 2;
        for y in mid - 6..mid + 6 {
            for x in mid - 6..mid + 6 {
                img.put_pixel(x, y, Luma([255]));
            }
        }
        let decoded = QRReader::read_image(&DynamicImage::ImageLuma8(img)).unwrap();
        assert_eq!(decoded.data, "survives damage");
    }

    #[test]
    fn test_read_invalid_bytes() {
        assert_eq!(QRReader::read(b""), Err(QRError::InvalidImage));
        assert_eq!(QRReader::read(b"definitely not an image"), Err(QRError::InvalidImage));
    }

    #[test]
    fn test_read_blank_image() {
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(200, 200, Luma([255])));
        assert!(QRReader::read_image(&img).is_err());
    }
}
