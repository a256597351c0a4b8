//! Styled rendering of a built [`QR`] into PNG, SVG or PDF bytes.
//!
//! Every backend consumes the same layout: a list of [`Shape`]s in module units plus an
//! optional [`LogoPlacement`], so the three formats agree on geometry and styling.

mod color;
mod layout;
mod logo;
mod pdf;
mod raster;
mod svg;

use std::{fmt, str::FromStr};

use base64::{engine::general_purpose::STANDARD, Engine};
use thiserror::Error;
use tracing::debug;

use crate::builder::QR;

pub use color::Rgba;
pub use layout::QUIET_ZONE;
pub use logo::{Logo, MAX_LOGO_BYTES};

pub(crate) use layout::{layout, LogoPlacement, Shape};

pub const MIN_SIZE: u32 = 64;
pub const MAX_SIZE: u32 = 4096;
pub const MIN_LOGO_SIZE: u8 = 5;
pub const MAX_LOGO_SIZE: u8 = 40;

// Error
//------------------------------------------------------------------------------

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RenderError {
    #[error("Invalid hex color: {0:?}")]
    InvalidColor(String),
    #[error("Size {0} is outside {MIN_SIZE}..={MAX_SIZE}")]
    InvalidSize(u32),
    #[error("Logo size {0}% is outside {MIN_LOGO_SIZE}..={MAX_LOGO_SIZE}")]
    InvalidLogoSize(u8),
    #[error("Unsupported output format: {0:?}")]
    UnsupportedFormat(String),
    #[error("Unsupported module style: {0:?}")]
    UnsupportedStyle(String),
    #[error("Logo is {0} bytes, the limit is {MAX_LOGO_BYTES}")]
    LogoTooLarge(usize),
    #[error("Invalid logo: {0}")]
    InvalidLogo(String),
    #[error("Image encoding failed: {0}")]
    Encode(String),
}

// Output format
//------------------------------------------------------------------------------

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputFormat {
    #[default]
    Png,
    Svg,
    Pdf,
}

impl OutputFormat {
    pub fn mime(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Svg => "image/svg+xml",
            Self::Pdf => "application/pdf",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Svg => "svg",
            Self::Pdf => "pdf",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = RenderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "png" => Ok(Self::Png),
            "svg" => Ok(Self::Svg),
            "pdf" => Ok(Self::Pdf),
            _ => Err(RenderError::UnsupportedFormat(s.to_string())),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

// Module style
//------------------------------------------------------------------------------

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModuleStyle {
    #[default]
    Square,
    Rounded,
    Dots,
}

impl FromStr for ModuleStyle {
    type Err = RenderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "square" => Ok(Self::Square),
            "rounded" => Ok(Self::Rounded),
            "dots" => Ok(Self::Dots),
            _ => Err(RenderError::UnsupportedStyle(s.to_string())),
        }
    }
}

impl fmt::Display for ModuleStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Square => "square",
            Self::Rounded => "rounded",
            Self::Dots => "dots",
        };
        f.write_str(s)
    }
}

// Options
//------------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct RenderOptions {
    pub format: OutputFormat,
    /// Edge length in pixels (PNG) or user units (SVG, PDF).
    pub size: u32,
    pub fg: Rgba,
    pub bg: Rgba,
    pub style: ModuleStyle,
    pub logo: Option<Logo>,
    /// Logo edge as a percentage of the symbol edge.
    pub logo_size: u8,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            format: OutputFormat::Png,
            size: 256,
            fg: Rgba::BLACK,
            bg: Rgba::WHITE,
            style: ModuleStyle::Square,
            logo: None,
            logo_size: 20,
        }
    }
}

impl RenderOptions {
    pub fn validate(&self) -> Result<(), RenderError> {
        if !(MIN_SIZE..=MAX_SIZE).contains(&self.size) {
            return Err(RenderError::InvalidSize(self.size));
        }
        if !(MIN_LOGO_SIZE..=MAX_LOGO_SIZE).contains(&self.logo_size) {
            return Err(RenderError::InvalidLogoSize(self.logo_size));
        }
        Ok(())
    }
}

// Render
//------------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub bytes: Vec<u8>,
    pub format: OutputFormat,
}

impl Rendered {
    pub fn mime(&self) -> &'static str {
        self.format.mime()
    }

    /// `data:<mime>;base64,<payload>`
    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime(), STANDARD.encode(&self.bytes))
    }
}

/// Renders the symbol with the given options. Output is a pure function of its inputs.
pub fn render(qr: &QR, opts: &RenderOptions) -> Result<Rendered, RenderError> {
    opts.validate()?;

    let shapes = layout(qr, opts.style);
    let logo = opts.logo.as_ref().map(|_| LogoPlacement::new(qr.width(), opts.logo_size));
    debug!(
        format = %opts.format,
        style = %opts.style,
        size = opts.size,
        shapes = shapes.len(),
        logo = logo.is_some(),
        "Rendering symbol"
    );

    let bytes = match opts.format {
        OutputFormat::Png => raster::render_png(qr.width(), &shapes, logo.as_ref(), opts)?,
        OutputFormat::Svg => svg::render_svg(qr.width(), &shapes, logo.as_ref(), opts)?,
        OutputFormat::Pdf => pdf::render_pdf(qr.width(), &shapes, logo.as_ref(), opts),
    };
    Ok(Rendered { bytes, format: opts.format })
}

#[cfg(test)]
mod render_tests {
    use test_case::test_case;

    use super::{render, ModuleStyle, OutputFormat, RenderError, RenderOptions, Rgba};
    use crate::builder::QRBuilder;

    #[test_case("png", OutputFormat::Png)]
    #[test_case("SVG", OutputFormat::Svg)]
    #[test_case(" pdf ", OutputFormat::Pdf)]
    fn test_parse_format(s: &str, exp: OutputFormat) {
        assert_eq!(s.parse::<OutputFormat>(), Ok(exp));
    }

    #[test_case("square", ModuleStyle::Square)]
    #[test_case("Rounded", ModuleStyle::Rounded)]
    #[test_case("dots", ModuleStyle::Dots)]
    fn test_parse_style(s: &str, exp: ModuleStyle) {
        assert_eq!(s.parse::<ModuleStyle>(), Ok(exp));
    }

    #[test]
    fn test_parse_unknown() {
        assert_eq!("gif".parse::<OutputFormat>(), Err(RenderError::UnsupportedFormat("gif".into())));
        assert_eq!("hex".parse::<ModuleStyle>(), Err(RenderError::UnsupportedStyle("hex".into())));
    }

    #[test_case(63, false)]
    #[test_case(64, true)]
    #[test_case(4096, true)]
    #[test_case(4097, false)]
    fn test_size_bounds(size: u32, ok: bool) {
        let opts = RenderOptions { size, ..Default::default() };
        assert_eq!(opts.validate().is_ok(), ok);
    }

    #[test_case(4, false)]
    #[test_case(5, true)]
    #[test_case(40, true)]
    #[test_case(41, false)]
    fn test_logo_size_bounds(logo_size: u8, ok: bool) {
        let opts = RenderOptions { logo_size, ..Default::default() };
        assert_eq!(opts.validate().is_ok(), ok);
    }

    #[test]
    fn test_render_rejects_invalid_size() {
        let qr = QRBuilder::new(b"size").build().unwrap();
        let opts = RenderOptions { size: 10, ..Default::default() };
        assert_eq!(render(&qr, &opts), Err(RenderError::InvalidSize(10)));
    }

    #[test_case(OutputFormat::Png, ModuleStyle::Square)]
    #[test_case(OutputFormat::Svg, ModuleStyle::Rounded)]
    #[test_case(OutputFormat::Pdf, ModuleStyle::Dots)]
    fn test_render_deterministic(format: OutputFormat, style: ModuleStyle) {
        let qr = QRBuilder::new(b"same input same bytes").build().unwrap();
        let opts = RenderOptions { format, style, fg: Rgba::opaque(20, 40, 90), ..Default::default() };
        assert_eq!(render(&qr, &opts).unwrap(), render(&qr, &opts).unwrap());
    }

    #[test]
    fn test_data_uri() {
        let qr = QRBuilder::new(b"uri").build().unwrap();
        let opts = RenderOptions { format: OutputFormat::Svg, ..Default::default() };
        let out = render(&qr, &opts).unwrap();
        assert_eq!(out.mime(), "image/svg+xml");
        assert!(out.data_uri().starts_with("data:image/svg+xml;base64,PHN2Zy"));
    }
}
