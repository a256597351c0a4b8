//! Request and response bodies of the service operations.

use serde::{Deserialize, Serialize};

use super::rate_limit::RateLimitStatus;

fn default_format() -> String {
    "png".to_string()
}

fn default_size() -> u32 {
    256
}

fn default_fg_color() -> String {
    "#000000".to_string()
}

fn default_bg_color() -> String {
    "#FFFFFF".to_string()
}

fn default_error_correction() -> String {
    "M".to_string()
}

fn default_style() -> String {
    "square".to_string()
}

fn default_logo_size() -> u8 {
    20
}

// Generation
//------------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub data: String,
    #[serde(default = "default_format")]
    pub format: String,
    #[serde(default = "default_size")]
    pub size: u32,
    #[serde(default = "default_fg_color")]
    pub fg_color: String,
    #[serde(default = "default_bg_color")]
    pub bg_color: String,
    #[serde(default = "default_error_correction")]
    pub error_correction: String,
    #[serde(default = "default_style")]
    pub style: String,
    /// Base64 image or data URI. Forces error correction H.
    #[serde(default)]
    pub logo: Option<String>,
    #[serde(default = "default_logo_size")]
    pub logo_size: u8,
}

impl GenerateRequest {
    /// Request for `data` with every other field at its default.
    pub fn new(data: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            format: default_format(),
            size: default_size(),
            fg_color: default_fg_color(),
            bg_color: default_bg_color(),
            error_correction: default_error_correction(),
            style: default_style(),
            logo: None,
            logo_size: default_logo_size(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchRequest {
    pub items: Vec<GenerateRequest>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QrResponse {
    /// `data:<mime>;base64,<payload>`
    pub image_base64: String,
    pub share_url: String,
    pub format: String,
    pub size: u32,
    pub data: String,
    #[serde(skip)]
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchResponse {
    pub items: Vec<QrResponse>,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecodeResponse {
    pub data: String,
    pub format: String,
}

/// Query of a share URL. Absent fields take their defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewQuery {
    pub data: String,
    pub size: Option<u32>,
    pub fg: Option<String>,
    pub bg: Option<String>,
    pub format: Option<String>,
    pub style: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewResponse {
    pub bytes: Vec<u8>,
    pub mime: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
}

/// Response of a rate limited operation, with the budget left for the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Gated<T> {
    #[serde(flatten)]
    pub value: T,
    #[serde(skip)]
    pub rate_limit: RateLimitStatus,
}

// Tracked codes
//------------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTrackedRequest {
    pub target_url: String,
    #[serde(default = "default_format")]
    pub format: String,
    #[serde(default = "default_size")]
    pub size: u32,
    #[serde(default = "default_fg_color")]
    pub fg_color: String,
    #[serde(default = "default_bg_color")]
    pub bg_color: String,
    #[serde(default = "default_error_correction")]
    pub error_correction: String,
    #[serde(default = "default_style")]
    pub style: String,
    /// Custom short code, generated when absent.
    #[serde(default)]
    pub short_code: Option<String>,
    /// RFC 3339 timestamp after which the short URL answers with `EXPIRED`.
    #[serde(default)]
    pub expires_at: Option<String>,
}

impl CreateTrackedRequest {
    pub fn new(target_url: impl Into<String>) -> Self {
        Self {
            target_url: target_url.into(),
            format: default_format(),
            size: default_size(),
            fg_color: default_fg_color(),
            bg_color: default_bg_color(),
            error_correction: default_error_correction(),
            style: default_style(),
            short_code: None,
            expires_at: None,
        }
    }

    pub(crate) fn render_fields(&self, data: &str) -> GenerateRequest {
        GenerateRequest {
            data: data.to_string(),
            format: self.format.clone(),
            size: self.size,
            fg_color: self.fg_color.clone(),
            bg_color: self.bg_color.clone(),
            error_correction: self.error_correction.clone(),
            style: self.style.clone(),
            logo: None,
            logo_size: default_logo_size(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackedResponse {
    pub id: String,
    pub qr_id: String,
    pub short_code: String,
    pub short_url: String,
    pub target_url: String,
    pub manage_token: String,
    pub manage_url: String,
    pub scan_count: u64,
    pub expires_at: Option<String>,
    pub created_at: String,
    pub qr: QrResponse,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanEvent {
    pub id: String,
    pub scanned_at: String,
    pub user_agent: Option<String>,
    pub referrer: Option<String>,
}

/// Request metadata recorded with a scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanMeta {
    pub user_agent: Option<String>,
    pub referrer: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackedStats {
    pub id: String,
    pub short_code: String,
    pub target_url: String,
    pub scan_count: u64,
    pub expires_at: Option<String>,
    pub created_at: String,
    pub recent_scans: Vec<ScanEvent>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteResponse {
    pub deleted: bool,
    pub id: String,
}
