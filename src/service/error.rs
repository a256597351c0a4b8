use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::common::error::QRError;
use crate::render::RenderError;

// Service error
//------------------------------------------------------------------------------

/// Failure of a service operation, carrying the status and machine readable code a
/// transport reports to its caller.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error("{message}")]
    Validation { code: &'static str, message: String },
    #[error("{0}")]
    NotFound(String),
    #[error("{message}")]
    Conflict { code: &'static str, message: String },
    #[error("{0}")]
    Gone(String),
    #[error("Rate limit exceeded, retry in {retry_after_secs}s")]
    RateLimited { limit: u64, remaining: u64, retry_after_secs: u64 },
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl ServiceError {
    pub fn validation(code: &'static str, message: impl Into<String>) -> Self {
        Self::Validation { code, message: message.into() }
    }

    pub fn status(&self) -> u16 {
        match self {
            Self::Validation { code: "NO_QR_FOUND", .. } => 422,
            Self::Validation { .. } => 400,
            Self::NotFound(_) => 404,
            Self::Conflict { .. } => 409,
            Self::Gone(_) => 410,
            Self::RateLimited { .. } => 429,
            Self::Internal(_) => 500,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation { code, .. } | Self::Conflict { code, .. } => *code,
            Self::NotFound(_) => "NOT_FOUND",
            Self::Gone(_) => "EXPIRED",
            Self::RateLimited { .. } => "RATE_LIMIT_EXCEEDED",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// JSON error body.
    pub fn to_api_error(&self) -> ApiError {
        let (retry_after_secs, limit, remaining) = match *self {
            Self::RateLimited { limit, remaining, retry_after_secs } => {
                (Some(retry_after_secs), Some(limit), Some(remaining))
            }
            _ => (None, None, None),
        };
        // Internal details stay in the logs
        let error = match self {
            Self::Internal(_) => "Internal server error".to_string(),
            e => e.to_string(),
        };
        ApiError { error, code: self.code().to_string(), status: self.status(), retry_after_secs, limit, remaining }
    }
}

impl From<QRError> for ServiceError {
    fn from(e: QRError) -> Self {
        match e {
            QRError::EmptyData => Self::validation("EMPTY_DATA", "Data field cannot be empty"),
            QRError::DataTooLong => Self::validation("DATA_TOO_LONG", e.to_string()),
            QRError::InvalidECLevel => Self::validation("INVALID_EC_LEVEL", "Error correction must be one of L, M, Q, H"),
            QRError::InvalidImage => Self::validation("INVALID_IMAGE", "Failed to load image"),
            QRError::InvalidVersion => Self::Internal(e.to_string()),
            _ => Self::validation("NO_QR_FOUND", "No QR code found in image"),
        }
    }
}

impl From<RenderError> for ServiceError {
    fn from(e: RenderError) -> Self {
        let code = match e {
            RenderError::InvalidColor(_) => "INVALID_COLOR",
            RenderError::InvalidSize(_) => "INVALID_SIZE",
            RenderError::InvalidLogoSize(_) => "INVALID_LOGO_SIZE",
            RenderError::UnsupportedFormat(_) => "INVALID_FORMAT",
            RenderError::UnsupportedStyle(_) => "INVALID_STYLE",
            RenderError::LogoTooLarge(_) => "LOGO_TOO_LARGE",
            RenderError::InvalidLogo(_) => "INVALID_LOGO",
            RenderError::Encode(_) => return Self::Internal(e.to_string()),
        };
        Self::validation(code, e.to_string())
    }
}

impl From<rusqlite::Error> for ServiceError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Internal(format!("database: {e}"))
    }
}

// Error body
//------------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    pub error: String,
    pub code: String,
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining: Option<u64>,
}

impl From<ServiceError> for ApiError {
    fn from(e: ServiceError) -> Self {
        e.to_api_error()
    }
}
