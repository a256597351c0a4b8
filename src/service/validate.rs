use time::{format_description::well_known::Rfc3339, OffsetDateTime};

use crate::common::metadata::ECLevel;
use crate::render::{Logo, ModuleStyle, OutputFormat, RenderOptions, Rgba};

use super::error::{ServiceError, ServiceResult};
use super::models::GenerateRequest;

pub const MAX_BATCH: usize = 50;

/// Fully parsed generation request, ready to encode and render.
#[derive(Debug, Clone, PartialEq)]
pub struct Generation {
    pub payload: String,
    pub ec_level: ECLevel,
    pub opts: RenderOptions,
}

pub fn generation(req: &GenerateRequest) -> ServiceResult<Generation> {
    if req.data.is_empty() {
        return Err(ServiceError::validation("EMPTY_DATA", "Data field cannot be empty"));
    }

    let format: OutputFormat = req.format.parse().map_err(|_| {
        ServiceError::validation("INVALID_FORMAT", "Unsupported format. Use 'png', 'svg', or 'pdf'")
    })?;
    let style: ModuleStyle = req
        .style
        .parse()
        .map_err(|_| ServiceError::validation("INVALID_STYLE", "Unsupported style. Use 'square', 'rounded', or 'dots'"))?;
    let fg = color(&req.fg_color, "INVALID_FG_COLOR")?;
    let bg = color(&req.bg_color, "INVALID_BG_COLOR")?;
    let ec_level: ECLevel = req.error_correction.parse()?;

    let logo = req.logo.as_deref().map(Logo::from_base64).transpose()?;
    // Logos hide modules, so they always get the strongest correction
    let ec_level = if logo.is_some() { ECLevel::H } else { ec_level };

    let opts = RenderOptions { format, size: req.size, fg, bg, style, logo, logo_size: req.logo_size };
    opts.validate()?;

    Ok(Generation { payload: req.data.clone(), ec_level, opts })
}

fn color(hex: &str, code: &'static str) -> ServiceResult<Rgba> {
    hex.parse().map_err(|_| ServiceError::validation(code, format!("Invalid hex color '{hex}', expected #RRGGBB or #RRGGBBAA")))
}

pub fn batch_len(len: usize) -> ServiceResult<()> {
    match len {
        0 => Err(ServiceError::validation("EMPTY_BATCH", "Items array cannot be empty")),
        n if n > MAX_BATCH => {
            Err(ServiceError::validation("BATCH_TOO_LARGE", format!("Maximum {MAX_BATCH} items per batch")))
        }
        _ => Ok(()),
    }
}

pub fn target_url(url: &str) -> ServiceResult<()> {
    if url.is_empty() {
        return Err(ServiceError::validation("EMPTY_TARGET_URL", "target_url cannot be empty"));
    }
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(ServiceError::validation("INVALID_URL", "target_url must start with http:// or https://"));
    }
    Ok(())
}

pub fn short_code(code: &str) -> ServiceResult<()> {
    if !(3..=32).contains(&code.len()) {
        return Err(ServiceError::validation("INVALID_SHORT_CODE", "short_code must be 3-32 characters"));
    }
    if !code.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_') {
        return Err(ServiceError::validation(
            "INVALID_SHORT_CODE",
            "short_code must be alphanumeric, hyphens, or underscores",
        ));
    }
    Ok(())
}

/// Parses an RFC 3339 expiry that must lie after `now`.
pub fn expiry(raw: &str, now: OffsetDateTime) -> ServiceResult<OffsetDateTime> {
    let at = OffsetDateTime::parse(raw.trim(), &Rfc3339)
        .map_err(|_| ServiceError::validation("INVALID_EXPIRY", "expires_at must be an RFC 3339 timestamp"))?;
    if at <= now {
        return Err(ServiceError::validation("INVALID_EXPIRY", "expires_at must be in the future"));
    }
    Ok(at)
}

#[cfg(test)]
mod validate_tests {
    use test_case::test_case;
    use time::{macros::datetime, Duration};

    use super::{batch_len, expiry, generation, short_code, target_url};
    use crate::common::metadata::ECLevel;
    use crate::render::{ModuleStyle, OutputFormat};
    use crate::service::models::GenerateRequest;

    fn req_with(f: impl FnOnce(&mut GenerateRequest)) -> GenerateRequest {
        let mut req = GenerateRequest::new("payload");
        f(&mut req);
        req
    }

    #[test]
    fn test_generation_defaults() {
        let gen = generation(&GenerateRequest::new("payload")).unwrap();
        assert_eq!(gen.ec_level, ECLevel::M);
        assert_eq!(gen.opts.format, OutputFormat::Png);
        assert_eq!(gen.opts.style, ModuleStyle::Square);
        assert_eq!(gen.opts.size, 256);
    }

    #[test_case(req_with(|r| r.data.clear()), "EMPTY_DATA" ; "empty data")]
    #[test_case(req_with(|r| r.size = 63), "INVALID_SIZE" ; "size too small")]
    #[test_case(req_with(|r| r.size = 4097), "INVALID_SIZE" ; "size too large")]
    #[test_case(req_with(|r| r.format = "gif".into()), "INVALID_FORMAT" ; "unknown format")]
    #[test_case(req_with(|r| r.style = "hex".into()), "INVALID_STYLE" ; "unknown style")]
    #[test_case(req_with(|r| r.fg_color = "black".into()), "INVALID_FG_COLOR" ; "named fg")]
    #[test_case(req_with(|r| r.bg_color = "#12345".into()), "INVALID_BG_COLOR" ; "short bg")]
    #[test_case(req_with(|r| r.error_correction = "X".into()), "INVALID_EC_LEVEL" ; "unknown ec")]
    #[test_case(req_with(|r| r.logo_size = 41), "INVALID_LOGO_SIZE" ; "logo too big")]
    #[test_case(req_with(|r| r.logo = Some("%%%".into())), "INVALID_LOGO" ; "bad logo")]
    fn test_generation_errors(req: GenerateRequest, code: &str) {
        assert_eq!(generation(&req).unwrap_err().code(), code);
    }

    #[test_case(64, true)]
    #[test_case(4096, true)]
    fn test_generation_size_bounds(size: u32, ok: bool) {
        assert_eq!(generation(&req_with(|r| r.size = size)).is_ok(), ok);
    }

    #[test_case(0, Some("EMPTY_BATCH"))]
    #[test_case(1, None)]
    #[test_case(50, None)]
    #[test_case(51, Some("BATCH_TOO_LARGE"))]
    fn test_batch_len(len: usize, code: Option<&str>) {
        assert_eq!(batch_len(len).err().map(|e| e.code()), code);
    }

    #[test_case("https://example.com", None)]
    #[test_case("http://example.com/a?b=c", None)]
    #[test_case("", Some("EMPTY_TARGET_URL"))]
    #[test_case("ftp://example.com", Some("INVALID_URL"))]
    fn test_target_url(url: &str, code: Option<&str>) {
        assert_eq!(target_url(url).err().map(|e| e.code()), code);
    }

    #[test_case("abc", true)]
    #[test_case("my_promo-2024", true)]
    #[test_case("ab", false)]
    #[test_case(&"x".repeat(33), false ; "too long")]
    #[test_case("has space", false)]
    #[test_case("ünï", false ; "non ascii")]
    fn test_short_code(code: &str, ok: bool) {
        assert_eq!(short_code(code).is_ok(), ok);
    }

    #[test]
    fn test_expiry() {
        let now = datetime!(2030-01-01 00:00 UTC);
        assert_eq!(expiry("2030-01-02T00:00:00Z", now).unwrap(), now + Duration::days(1));
        assert_eq!(expiry("2029-12-31T23:59:59Z", now).unwrap_err().code(), "INVALID_EXPIRY");
        assert_eq!(expiry("tomorrow", now).unwrap_err().code(), "INVALID_EXPIRY");
    }
}
