//! Transport independent operations of the QR service: stateless generation and decoding,
//! templates, share URL views and the tracked short link lifecycle.
//!
//! Gated operations take a caller key (typically the client IP) and consume from that
//! caller's fixed-window budget before any validation or work happens.

mod config;
mod error;
mod models;
mod rate_limit;
mod sqlite;
mod template;
mod tracked;
mod validate;

use std::time::Instant;

use base64::{engine::general_purpose::STANDARD, Engine};
use rayon::prelude::*;
use serde_json::Value;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

use crate::builder::QRBuilder;
use crate::common::metadata::ECLevel;
use crate::reader::QRReader;
use crate::render::{render, RenderOptions, Rgba, MAX_SIZE, MIN_SIZE};

pub use config::Config;
pub use error::{ApiError, ServiceError, ServiceResult};
pub use models::{
    BatchRequest, BatchResponse, CreateTrackedRequest, DecodeResponse, DeleteResponse, GenerateRequest, Gated,
    HealthResponse, QrResponse, ScanEvent, ScanMeta, TrackedResponse, TrackedStats, ViewQuery, ViewResponse,
};
pub use rate_limit::{RateLimitStatus, RateLimiter};
pub use template::{Template, TemplateRender};
pub use sqlite::SqliteStore;
pub use tracked::{MemoryStore, TrackedStore};

use tracked::{code_taken, format_time, new_token, random_hex, Record};
use validate::Generation;

// Attempts at drawing an unused random short code
const SHORT_CODE_ATTEMPTS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bucket {
    General,
    TrackedCreate,
}

pub struct QrService {
    config: Config,
    limiter: RateLimiter,
    store: TrackedStore,
    started: Instant,
}

impl QrService {
    /// Builds the service, opening the SQLite store when `database_path` is set.
    pub fn new(config: Config) -> ServiceResult<Self> {
        let store = match &config.database_path {
            Some(path) => TrackedStore::open(path, config.recent_scans_cap)?,
            None => TrackedStore::in_memory(config.recent_scans_cap),
        };
        Ok(Self { limiter: RateLimiter::new(config.rate_limit_window), store, started: Instant::now(), config })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn gate(&self, caller: &str, bucket: Bucket) -> ServiceResult<RateLimitStatus> {
        let (key, limit) = match bucket {
            Bucket::General => (format!("ip:{caller}"), self.config.rate_limit_per_window),
            Bucket::TrackedCreate => (format!("tracked:{caller}"), self.config.tracked_create_limit),
        };
        let status = self.limiter.check(&key, limit)?;
        if !status.allowed {
            warn!(key, limit, retry_after = status.reset_secs, "Rate limit exceeded");
        }
        status.into_result()
    }

    // Stateless generation
    //--------------------------------------------------------------------------

    pub fn generate(&self, caller: &str, req: &GenerateRequest) -> ServiceResult<Gated<QrResponse>> {
        let rate_limit = self.gate(caller, Bucket::General)?;
        let gen = validate::generation(req)?;
        let value = self.render_generation(&gen)?;
        Ok(Gated { value, rate_limit })
    }

    /// Renders every item of the batch in parallel. Any invalid item rejects the whole batch.
    pub fn batch(&self, caller: &str, req: &BatchRequest) -> ServiceResult<Gated<BatchResponse>> {
        let rate_limit = self.gate(caller, Bucket::General)?;
        validate::batch_len(req.items.len())?;

        let gens = req
            .items
            .iter()
            .enumerate()
            .map(|(i, item)| validate::generation(item).map_err(|e| prefix_item(i, e)))
            .collect::<ServiceResult<Vec<_>>>()?;

        let items = gens
            .par_iter()
            .enumerate()
            .map(|(i, gen)| self.render_generation(gen).map_err(|e| prefix_item(i, e)))
            .collect::<ServiceResult<Vec<_>>>()?;
        debug!(total = items.len(), "Rendered batch");

        Ok(Gated { value: BatchResponse { total: items.len(), items }, rate_limit })
    }

    pub fn template(&self, caller: &str, kind: &str, fields: &Value) -> ServiceResult<Gated<QrResponse>> {
        let rate_limit = self.gate(caller, Bucket::General)?;
        let template = Template::from_fields(kind, fields)?;
        let render_fields: TemplateRender = serde_json::from_value(fields.clone())
            .map_err(|e| ServiceError::validation("INVALID_FIELD", e.to_string()))?;

        let mut req = GenerateRequest::new(template.payload());
        req.format = render_fields.format;
        req.size = render_fields.size;
        req.style = render_fields.style;

        let gen = validate::generation(&req)?;
        let value = self.render_generation(&gen)?;
        Ok(Gated { value, rate_limit })
    }

    pub fn decode(&self, caller: &str, image: &[u8]) -> ServiceResult<Gated<DecodeResponse>> {
        let rate_limit = self.gate(caller, Bucket::General)?;
        let decoded = QRReader::read(image)?;
        debug!(version = *decoded.version, ec_level = %decoded.ec_level, "Decoded upload");
        Ok(Gated { value: DecodeResponse { data: decoded.data, format: "qr".to_string() }, rate_limit })
    }

    /// Re-renders a share URL. Out of range sizes are clamped and unparsable options fall
    /// back to their defaults, only the payload itself must be valid.
    pub fn view(&self, query: &ViewQuery) -> ServiceResult<ViewResponse> {
        let bytes = STANDARD
            .decode(query.data.trim())
            .map_err(|_| ServiceError::validation("INVALID_DATA", "Invalid base64 data"))?;
        let payload =
            String::from_utf8(bytes).map_err(|_| ServiceError::validation("INVALID_DATA", "Invalid UTF-8 data"))?;

        let lenient_color = |hex: Option<&String>, default: Rgba| hex.and_then(|h| h.parse().ok()).unwrap_or(default);
        let opts = RenderOptions {
            format: query.format.as_deref().and_then(|f| f.parse().ok()).unwrap_or_default(),
            size: query.size.unwrap_or(256).clamp(MIN_SIZE, MAX_SIZE),
            fg: lenient_color(query.fg.as_ref(), Rgba::BLACK),
            bg: lenient_color(query.bg.as_ref(), Rgba::WHITE),
            style: query.style.as_deref().and_then(|s| s.parse().ok()).unwrap_or_default(),
            ..Default::default()
        };

        let gen = Generation { payload, ec_level: ECLevel::M, opts };
        let resp = self.render_generation(&gen)?;
        Ok(ViewResponse { mime: gen.opts.format.mime(), bytes: resp.bytes })
    }

    fn render_generation(&self, gen: &Generation) -> ServiceResult<QrResponse> {
        let qr = QRBuilder::new(gen.payload.as_bytes()).ec_level(gen.ec_level).build()?;
        let rendered = render(&qr, &gen.opts)?;

        Ok(QrResponse {
            image_base64: rendered.data_uri(),
            share_url: self.share_url(&gen.payload, &gen.opts),
            format: gen.opts.format.to_string(),
            size: gen.opts.size,
            data: gen.payload.clone(),
            bytes: rendered.bytes,
        })
    }

    /// Stateless URL that re-derives the image from its query string.
    pub fn share_url(&self, payload: &str, opts: &RenderOptions) -> String {
        let hex = |c: Rgba| c.to_string().trim_start_matches('#').to_string();
        format!(
            "{}/qr/view?data={}&size={}&fg={}&bg={}&format={}&style={}",
            self.config.base_url,
            urlencoding::encode(&STANDARD.encode(payload.as_bytes())),
            opts.size,
            hex(opts.fg),
            hex(opts.bg),
            opts.format,
            opts.style,
        )
    }

    // Tracked links
    //--------------------------------------------------------------------------

    pub fn create_tracked(&self, caller: &str, req: &CreateTrackedRequest) -> ServiceResult<Gated<TrackedResponse>> {
        let rate_limit = self.gate(caller, Bucket::TrackedCreate)?;
        let now = OffsetDateTime::now_utc();

        validate::target_url(&req.target_url)?;
        if let Some(code) = &req.short_code {
            validate::short_code(code)?;
        }
        let expires_at = req.expires_at.as_deref().map(|raw| validate::expiry(raw, now)).transpose()?;
        // Render options are checked before a code is bound, the payload is filled in below
        validate::generation(&req.render_fields("-"))?;

        let short_code = match &req.short_code {
            Some(code) if self.store.is_code_taken(code)? => return Err(code_taken(code)),
            Some(code) => code.clone(),
            None => self.free_short_code()?,
        };

        let short_url = format!("{}/r/{short_code}", self.config.base_url);
        let gen = validate::generation(&req.render_fields(&short_url))?;
        let mut qr = self.render_generation(&gen)?;
        qr.share_url = short_url.clone();

        let id = random_hex::<16>();
        let token = new_token();
        let record = Record::new(id.clone(), short_code.clone(), req.target_url.clone(), &token, now, expires_at);
        self.store.insert(record)?;
        info!(id, short_code, expires = expires_at.is_some(), "Created tracked QR");

        let value = TrackedResponse {
            manage_url: format!("{}/api/v1/qr/tracked/{id}?key={token}", self.config.base_url),
            qr_id: random_hex::<16>(),
            id,
            short_code,
            short_url,
            target_url: req.target_url.clone(),
            manage_token: token,
            scan_count: 0,
            expires_at: expires_at.map(format_time),
            created_at: format_time(now),
            qr,
        };
        Ok(Gated { value, rate_limit })
    }

    fn free_short_code(&self) -> ServiceResult<String> {
        for _ in 0..SHORT_CODE_ATTEMPTS {
            let code = random_hex::<4>();
            if !self.store.is_code_taken(&code)? {
                return Ok(code);
            }
        }
        Err(ServiceError::Internal("could not allocate a free short code".into()))
    }

    pub fn tracked_stats(&self, id: &str, token: &str) -> ServiceResult<TrackedStats> {
        self.store.stats(id, token, OffsetDateTime::now_utc())
    }

    pub fn delete_tracked(&self, id: &str, token: &str) -> ServiceResult<DeleteResponse> {
        self.store.delete(id, token)
    }

    /// Resolves a short code to its target, recording the scan.
    pub fn redirect(&self, code: &str, meta: ScanMeta) -> ServiceResult<String> {
        self.store.redirect(code, meta, OffsetDateTime::now_utc())
    }

    pub fn purge_expired(&self) -> ServiceResult<usize> {
        self.store.purge_expired(OffsetDateTime::now_utc())
    }

    pub fn prune_rate_limits(&self) -> ServiceResult<usize> {
        self.limiter.prune_stale()
    }

    pub fn health(&self) -> HealthResponse {
        HealthResponse {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: self.started.elapsed().as_secs(),
        }
    }
}

fn prefix_item(i: usize, e: ServiceError) -> ServiceError {
    match e {
        ServiceError::Validation { code, message } => {
            ServiceError::Validation { code, message: format!("items[{i}]: {message}") }
        }
        e => e,
    }
}
