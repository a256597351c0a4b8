//! # qrkit
//!
//! QR code generation and reading with Reed-Solomon error correction, styled PNG, SVG and
//! PDF rendering, and a transport independent service layer with tracked short links.
//!
//! ## Features
//!
//! - **Encoding**: byte mode symbols, smallest fitting version, lowest penalty mask
//! - **Reading**: binarization, finder detection, perspective sampling and error correction
//! - **Rendering**: square, rounded or dot modules, RGBA colors and a centered logo
//! - **Service**: validation, batches, templates, share URLs, rate limits and tracked links
//!
//! ## Quick Start
//!
//! ```rust
//! use qrkit::{render::{render, OutputFormat, RenderOptions}, ECLevel, QRBuilder};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let qr = QRBuilder::new(b"Hello, World!").ec_level(ECLevel::Q).build()?;
//!
//! let opts = RenderOptions { format: OutputFormat::Svg, size: 512, ..Default::default() };
//! let svg = render(&qr, &opts)?;
//! assert!(svg.bytes.starts_with(b"<svg"));
//! # Ok(())
//! # }
//! ```
//!
//! ### Reading a QR Code
//!
//! ```rust
//! use qrkit::{reader::QRReader, render::{render, RenderOptions}, QRBuilder};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let qr = QRBuilder::new("día 1".as_bytes()).build()?;
//! let png = render(&qr, &RenderOptions::default())?;
//!
//! let decoded = QRReader::read(&png.bytes)?;
//! assert_eq!(decoded.data, "día 1");
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Correction Levels
//! - **L (Low)**: ~7% error correction
//! - **M (Medium)**: ~15% error correction
//! - **Q (Quartile)**: ~25% error correction
//! - **H (High)**: ~30% error correction, forced whenever a logo covers the symbol

#![allow(clippy::items_after_test_module)]

pub mod builder;
pub(crate) mod common;
pub mod reader;
pub mod render;
pub mod service;

pub use builder::{QRBuilder, QR};
pub use common::error::{QRError, QRResult};
pub use common::mask::MaskPattern;
pub use common::metadata::{ECLevel, Version};
