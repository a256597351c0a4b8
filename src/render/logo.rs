use std::io::Cursor;

use base64::{engine::general_purpose::STANDARD, Engine};
use image::{imageops::FilterType, DynamicImage, ImageFormat, ImageReader};

use super::RenderError;

/// Largest accepted logo file, in decoded bytes.
pub const MAX_LOGO_BYTES: usize = 512 * 1024;

// Caps the decoded pixel dimensions so a tiny file can't expand into a huge buffer
const MAX_LOGO_DIMENSION: u32 = 4096;

/// Decoded logo image composited at the centre of the symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct Logo {
    image: DynamicImage,
}

impl Logo {
    /// Accepts raw base64 or a `data:<mime>;base64,<payload>` URI.
    pub fn from_base64(input: &str) -> Result<Self, RenderError> {
        let input = input.trim();
        let payload = match input.strip_prefix("data:") {
            Some(rest) => rest.split_once(',').map(|(_, data)| data).unwrap_or(rest),
            None => input,
        };
        let bytes = STANDARD
            .decode(payload.trim())
            .map_err(|e| RenderError::InvalidLogo(format!("base64: {e}")))?;
        Self::from_bytes(&bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, RenderError> {
        if bytes.len() > MAX_LOGO_BYTES {
            return Err(RenderError::LogoTooLarge(bytes.len()));
        }

        let reader = || {
            ImageReader::new(Cursor::new(bytes))
                .with_guessed_format()
                .map_err(|e| RenderError::InvalidLogo(e.to_string()))
        };
        let (w, h) = reader()?.into_dimensions().map_err(|e| RenderError::InvalidLogo(e.to_string()))?;
        if w == 0 || h == 0 || w > MAX_LOGO_DIMENSION || h > MAX_LOGO_DIMENSION {
            return Err(RenderError::InvalidLogo(format!("unsupported dimensions {w}x{h}")));
        }

        let image = reader()?.decode().map_err(|e| RenderError::InvalidLogo(e.to_string()))?;
        Ok(Self { image })
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.image.width(), self.image.height())
    }

    /// Logo scaled to fit a `side` x `side` box, aspect preserved.
    pub fn fitted(&self, side: u32) -> DynamicImage {
        let side = side.max(1);
        self.image.resize(side, side, FilterType::Lanczos3)
    }

    /// PNG encoding of the logo fitted to `side`, used where the logo is embedded by reference.
    pub(crate) fn fitted_png(&self, side: u32) -> Result<Vec<u8>, RenderError> {
        let mut buf = Cursor::new(Vec::new());
        self.fitted(side)
            .to_rgba8()
            .write_to(&mut buf, ImageFormat::Png)
            .map_err(|e| RenderError::Encode(e.to_string()))?;
        Ok(buf.into_inner())
    }
}

#[cfg(test)]
mod logo_tests {
    use std::io::Cursor;

    use base64::{engine::general_purpose::STANDARD, Engine};
    use image::{ImageFormat, Rgba, RgbaImage};

    use super::{Logo, MAX_LOGO_BYTES};
    use crate::render::RenderError;

    fn png(w: u32, h: u32) -> Vec<u8> {
        let img = RgbaImage::from_pixel(w, h, Rgba([200, 30, 30, 255]));
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    #[test]
    fn test_from_base64() {
        let encoded = STANDARD.encode(png(40, 20));
        let logo = Logo::from_base64(&encoded).unwrap();
        assert_eq!(logo.dimensions(), (40, 20));

        let uri = format!("data:image/png;base64,{encoded}");
        assert_eq!(Logo::from_base64(&uri).unwrap(), logo);
    }

    #[test]
    fn test_fitted_preserves_aspect() {
        let logo = Logo::from_bytes(&png(40, 20)).unwrap();
        let fitted = logo.fitted(10);
        assert_eq!((fitted.width(), fitted.height()), (10, 5));
    }

    #[test]
    fn test_invalid_logo() {
        assert!(matches!(Logo::from_base64("!!not base64!!"), Err(RenderError::InvalidLogo(_))));
        let garbage = STANDARD.encode(b"plain text, not an image");
        assert!(matches!(Logo::from_base64(&garbage), Err(RenderError::InvalidLogo(_))));
    }

    #[test]
    fn test_logo_too_large() {
        let bytes = vec![0u8; MAX_LOGO_BYTES + 1];
        assert_eq!(Logo::from_bytes(&bytes), Err(RenderError::LogoTooLarge(MAX_LOGO_BYTES + 1)));
    }
}
