use thiserror::Error;

// Error
//------------------------------------------------------------------------------

#[derive(Debug, Error, PartialEq, Eq, Copy, Clone)]
pub enum QRError {
    // QR builder
    #[error("Empty data")]
    EmptyData,
    #[error("Data too long for any version at this error correction level")]
    DataTooLong,
    #[error("Invalid version")]
    InvalidVersion,
    #[error("Invalid error correction level")]
    InvalidECLevel,

    // QR reader
    #[error("Image could not be decoded")]
    InvalidImage,
    #[error("Cannot compute homography")]
    SingularMatrix,
    #[error("Projected point is at infinity")]
    PointAtInfinity,
    #[error("Symbol not found")]
    SymbolNotFound,
    #[error("Too many errors to correct successfully")]
    TooManyError,
    #[error("Invalid format info detected")]
    InvalidFormatInfo,
    #[error("Invalid version info detected")]
    InvalidVersionInfo,
    #[error("Invalid segment mode")]
    InvalidMode,
    #[error("Invalid character")]
    InvalidChar,
    #[error("Segment data ends prematurely")]
    CorruptedData,
    #[error("Unsupported character set")]
    UnsupportedCharset,
    #[error("Invalid character sequence for the declared charset")]
    InvalidUTF8Sequence,
}

pub type QRResult<T> = Result<T, QRError>;
