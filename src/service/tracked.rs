use std::{
    collections::{HashMap, VecDeque},
    path::Path,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use rand::Rng;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use tracing::info;

use super::error::{ServiceError, ServiceResult};
use super::models::{DeleteResponse, ScanEvent, ScanMeta, TrackedStats};
use super::sqlite::SqliteStore;

const TOKEN_PREFIX: &str = "qrt_";

// Identifiers
//------------------------------------------------------------------------------

/// Lowercase hex of `N` random bytes.
pub fn random_hex<const N: usize>() -> String {
    let bytes: [u8; N] = rand::rng().random();
    hex(&bytes)
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Fresh manage token, `qrt_` followed by 32 hex characters.
pub fn new_token() -> String {
    format!("{TOKEN_PREFIX}{}", random_hex::<16>())
}

fn digest(token: &str) -> [u8; 32] {
    Sha256::digest(token.as_bytes()).into()
}

/// Hex SHA-256 of a manage token, the form persisted by the SQLite store.
pub fn token_hash(token: &str) -> String {
    hex(&digest(token))
}

/// Compares a presented token against a stored hex digest in constant time.
pub fn token_hash_matches(stored: &str, token: &str) -> bool {
    token_hash(token).as_bytes().ct_eq(stored.as_bytes()).into()
}

pub fn format_time(t: OffsetDateTime) -> String {
    // RFC 3339 formatting only fails for years outside 0..=9999
    t.format(&Rfc3339).unwrap_or_else(|_| t.unix_timestamp().to_string())
}

pub fn parse_time(s: &str) -> ServiceResult<OffsetDateTime> {
    OffsetDateTime::parse(s, &Rfc3339).map_err(|e| ServiceError::Internal(format!("stored timestamp '{s}': {e}")))
}

pub fn is_expired(expires_at: Option<OffsetDateTime>, now: OffsetDateTime) -> bool {
    expires_at.is_some_and(|at| now >= at)
}

pub fn not_found() -> ServiceError {
    ServiceError::NotFound("Tracked QR code not found or invalid token".into())
}

pub fn short_url_not_found() -> ServiceError {
    ServiceError::NotFound("Short URL not found".into())
}

pub fn expired() -> ServiceError {
    ServiceError::Gone("This short URL has expired".into())
}

pub fn code_taken(code: &str) -> ServiceError {
    ServiceError::Conflict { code: "SHORT_CODE_TAKEN", message: format!("Short code '{code}' is already taken") }
}

// Record
//------------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Record {
    pub id: String,
    pub short_code: String,
    pub target_url: String,
    pub(super) token_digest: [u8; 32],
    pub created_at: OffsetDateTime,
    pub expires_at: Option<OffsetDateTime>,
    pub scan_count: u64,
    pub recent_scans: VecDeque<ScanEvent>,
}

impl Record {
    pub fn new(
        id: String,
        short_code: String,
        target_url: String,
        token: &str,
        created_at: OffsetDateTime,
        expires_at: Option<OffsetDateTime>,
    ) -> Self {
        Self {
            id,
            short_code,
            target_url,
            token_digest: digest(token),
            created_at,
            expires_at,
            scan_count: 0,
            recent_scans: VecDeque::new(),
        }
    }

    pub(super) fn token_hash(&self) -> String {
        hex(&self.token_digest)
    }

    fn token_matches(&self, token: &str) -> bool {
        digest(token).ct_eq(&self.token_digest).into()
    }

    fn stats(&self) -> TrackedStats {
        TrackedStats {
            id: self.id.clone(),
            short_code: self.short_code.clone(),
            target_url: self.target_url.clone(),
            scan_count: self.scan_count,
            expires_at: self.expires_at.map(format_time),
            created_at: format_time(self.created_at),
            recent_scans: self.recent_scans.iter().cloned().collect(),
        }
    }
}

// Store
//------------------------------------------------------------------------------

/// Tracked link records, kept in memory or persisted to SQLite.
#[derive(Debug)]
pub enum TrackedStore {
    Memory(MemoryStore),
    Sqlite(SqliteStore),
}

impl TrackedStore {
    pub fn in_memory(scans_cap: usize) -> Self {
        Self::Memory(MemoryStore::new(scans_cap))
    }

    /// Opens (creating if needed) the SQLite database at `path`.
    pub fn open(path: impl AsRef<Path>, scans_cap: usize) -> ServiceResult<Self> {
        Ok(Self::Sqlite(SqliteStore::open(path, scans_cap)?))
    }

    pub fn len(&self) -> ServiceResult<usize> {
        match self {
            Self::Memory(s) => s.len(),
            Self::Sqlite(s) => s.len(),
        }
    }

    pub fn is_empty(&self) -> ServiceResult<bool> {
        Ok(self.len()? == 0)
    }

    pub fn is_code_taken(&self, code: &str) -> ServiceResult<bool> {
        match self {
            Self::Memory(s) => s.is_code_taken(code),
            Self::Sqlite(s) => s.is_code_taken(code),
        }
    }

    /// Adds the record unless its short code is already bound.
    pub fn insert(&self, record: Record) -> ServiceResult<()> {
        match self {
            Self::Memory(s) => s.insert(record),
            Self::Sqlite(s) => s.insert(&record),
        }
    }

    pub fn stats(&self, id: &str, token: &str, now: OffsetDateTime) -> ServiceResult<TrackedStats> {
        match self {
            Self::Memory(s) => s.stats(id, token, now),
            Self::Sqlite(s) => s.stats(id, token, now),
        }
    }

    pub fn delete(&self, id: &str, token: &str) -> ServiceResult<DeleteResponse> {
        match self {
            Self::Memory(s) => s.delete(id, token),
            Self::Sqlite(s) => s.delete(id, token),
        }
    }

    /// Records a scan of `code` and returns the target to redirect to.
    pub fn redirect(&self, code: &str, meta: ScanMeta, now: OffsetDateTime) -> ServiceResult<String> {
        match self {
            Self::Memory(s) => s.redirect(code, meta, now),
            Self::Sqlite(s) => s.redirect(code, meta, now),
        }
    }

    /// Removes every expired record, returning how many were dropped.
    pub fn purge_expired(&self, now: OffsetDateTime) -> ServiceResult<usize> {
        match self {
            Self::Memory(s) => s.purge_expired(now),
            Self::Sqlite(s) => s.purge_expired(now),
        }
    }
}

// Memory store
//------------------------------------------------------------------------------

#[derive(Debug, Default)]
struct Inner {
    by_id: HashMap<String, Record>,
    // Short code to record id
    by_code: HashMap<String, String>,
}

/// In-memory records, indexed by id and short code under one lock.
#[derive(Debug)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
    scans_cap: usize,
}

impl MemoryStore {
    pub fn new(scans_cap: usize) -> Self {
        Self { inner: RwLock::new(Inner::default()), scans_cap }
    }

    fn read(&self) -> ServiceResult<RwLockReadGuard<'_, Inner>> {
        self.inner.read().map_err(|_| ServiceError::Internal("tracked store lock poisoned".into()))
    }

    fn write(&self) -> ServiceResult<RwLockWriteGuard<'_, Inner>> {
        self.inner.write().map_err(|_| ServiceError::Internal("tracked store lock poisoned".into()))
    }

    fn len(&self) -> ServiceResult<usize> {
        Ok(self.read()?.by_id.len())
    }

    fn is_code_taken(&self, code: &str) -> ServiceResult<bool> {
        Ok(self.read()?.by_code.contains_key(code))
    }

    fn insert(&self, record: Record) -> ServiceResult<()> {
        let mut inner = self.write()?;
        if inner.by_code.contains_key(&record.short_code) {
            return Err(code_taken(&record.short_code));
        }
        inner.by_code.insert(record.short_code.clone(), record.id.clone());
        inner.by_id.insert(record.id.clone(), record);
        Ok(())
    }

    fn stats(&self, id: &str, token: &str, now: OffsetDateTime) -> ServiceResult<TrackedStats> {
        let inner = self.read()?;
        match inner.by_id.get(id) {
            Some(rec) if rec.token_matches(token) && !is_expired(rec.expires_at, now) => Ok(rec.stats()),
            _ => Err(not_found()),
        }
    }

    fn delete(&self, id: &str, token: &str) -> ServiceResult<DeleteResponse> {
        let mut inner = self.write()?;
        if !inner.by_id.get(id).is_some_and(|rec| rec.token_matches(token)) {
            return Err(not_found());
        }
        if let Some(rec) = inner.by_id.remove(id) {
            inner.by_code.remove(&rec.short_code);
            info!(id, short_code = %rec.short_code, "Deleted tracked QR");
        }
        Ok(DeleteResponse { deleted: true, id: id.to_string() })
    }

    fn redirect(&self, code: &str, meta: ScanMeta, now: OffsetDateTime) -> ServiceResult<String> {
        let mut inner = self.write()?;
        let Inner { by_id, by_code } = &mut *inner;

        let rec = by_code.get(code).and_then(|id| by_id.get_mut(id)).ok_or_else(short_url_not_found)?;
        if is_expired(rec.expires_at, now) {
            return Err(expired());
        }

        rec.scan_count += 1;
        rec.recent_scans.push_front(ScanEvent {
            id: random_hex::<16>(),
            scanned_at: format_time(now),
            user_agent: meta.user_agent,
            referrer: meta.referrer,
        });
        rec.recent_scans.truncate(self.scans_cap);
        Ok(rec.target_url.clone())
    }

    fn purge_expired(&self, now: OffsetDateTime) -> ServiceResult<usize> {
        let mut inner = self.write()?;
        let expired: Vec<(String, String)> = inner
            .by_id
            .values()
            .filter(|rec| is_expired(rec.expires_at, now))
            .map(|rec| (rec.id.clone(), rec.short_code.clone()))
            .collect();

        for (id, code) in &expired {
            inner.by_id.remove(id);
            inner.by_code.remove(code);
        }
        if !expired.is_empty() {
            info!(count = expired.len(), "Purged expired tracked QR codes");
        }
        Ok(expired.len())
    }
}

#[cfg(test)]
mod tracked_tests {
    use test_case::test_case;
    use time::{macros::datetime, Duration, OffsetDateTime};

    use super::{new_token, random_hex, token_hash, token_hash_matches, Record, TrackedStore};
    use crate::service::models::ScanMeta;
    use crate::service::sqlite::SqliteStore;

    const NOW: OffsetDateTime = datetime!(2030-06-01 12:00 UTC);

    enum Backend {
        Memory,
        Sqlite,
    }

    fn store(backend: Backend, cap: usize) -> TrackedStore {
        match backend {
            Backend::Memory => TrackedStore::in_memory(cap),
            Backend::Sqlite => TrackedStore::Sqlite(SqliteStore::open_in_memory(cap).unwrap()),
        }
    }

    fn record(id: &str, code: &str, token: &str, expires_at: Option<OffsetDateTime>) -> Record {
        Record::new(id.into(), code.into(), "https://example.com".into(), token, NOW, expires_at)
    }

    #[test]
    fn test_identifiers() {
        let token = new_token();
        assert!(token.starts_with("qrt_"));
        assert_eq!(token.len(), 36);
        assert!(token[4..].bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase()));
        assert_eq!(random_hex::<4>().len(), 8);
        assert_ne!(new_token(), token);
    }

    #[test]
    fn test_token_hash() {
        let hash = token_hash("qrt_abc");
        assert_eq!(hash.len(), 64);
        assert_eq!(record("1", "c", "qrt_abc", None).token_hash(), hash);
        assert!(token_hash_matches(&hash, "qrt_abc"));
        assert!(!token_hash_matches(&hash, "qrt_abd"));
        assert!(!token_hash_matches(&hash[..63], "qrt_abc"));
    }

    #[test_case(Backend::Memory ; "memory")]
    #[test_case(Backend::Sqlite ; "sqlite")]
    fn test_duplicate_code(backend: Backend) {
        let store = store(backend, 100);
        store.insert(record("1", "promo", "t1", None)).unwrap();
        let err = store.insert(record("2", "promo", "t2", None)).unwrap_err();
        assert_eq!(err.code(), "SHORT_CODE_TAKEN");
        assert_eq!(store.len().unwrap(), 1);
        assert!(store.is_code_taken("promo").unwrap());
        assert!(!store.is_code_taken("other").unwrap());
    }

    #[test_case(Backend::Memory ; "memory")]
    #[test_case(Backend::Sqlite ; "sqlite")]
    fn test_stats_requires_token(backend: Backend) {
        let store = store(backend, 100);
        store.insert(record("1", "promo", "right", Some(NOW + Duration::days(1)))).unwrap();
        let stats = store.stats("1", "right", NOW).unwrap();
        assert_eq!(stats.short_code, "promo");
        assert_eq!(stats.created_at, "2030-06-01T12:00:00Z");
        assert_eq!(stats.expires_at.as_deref(), Some("2030-06-02T12:00:00Z"));
        assert_eq!(store.stats("1", "wrong", NOW).unwrap_err(), store.stats("2", "right", NOW).unwrap_err());
    }

    #[test_case(Backend::Memory ; "memory")]
    #[test_case(Backend::Sqlite ; "sqlite")]
    fn test_redirect_records_scans(backend: Backend) {
        let store = store(backend, 3);
        store.insert(record("1", "promo", "t", None)).unwrap();
        for i in 0..5 {
            let meta = ScanMeta { user_agent: Some(format!("agent-{i}")), referrer: Some("https://ref.example".into()) };
            assert_eq!(store.redirect("promo", meta, NOW + Duration::seconds(i)).unwrap(), "https://example.com");
        }

        let stats = store.stats("1", "t", NOW).unwrap();
        assert_eq!(stats.scan_count, 5);
        let agents: Vec<_> = stats.recent_scans.iter().map(|s| s.user_agent.clone().unwrap()).collect();
        assert_eq!(agents, ["agent-4", "agent-3", "agent-2"]);
        assert_eq!(stats.recent_scans[0].scanned_at, "2030-06-01T12:00:04Z");
        assert_eq!(stats.recent_scans[0].referrer.as_deref(), Some("https://ref.example"));
    }

    #[test_case(Backend::Memory ; "memory")]
    #[test_case(Backend::Sqlite ; "sqlite")]
    fn test_concurrent_redirects(backend: Backend) {
        const THREADS: usize = 8;
        const SCANS: usize = 100;
        const CAP: usize = 100;

        let store = store(backend, CAP);
        store.insert(record("1", "promo", "t", None)).unwrap();
        std::thread::scope(|s| {
            for _ in 0..THREADS {
                s.spawn(|| {
                    for _ in 0..SCANS {
                        store.redirect("promo", ScanMeta::default(), NOW).unwrap();
                    }
                });
            }
        });

        let stats = store.stats("1", "t", NOW).unwrap();
        assert_eq!(stats.scan_count, (THREADS * SCANS) as u64);
        assert_eq!(stats.recent_scans.len(), CAP.min(THREADS * SCANS));
    }

    #[test_case(Backend::Memory ; "memory")]
    #[test_case(Backend::Sqlite ; "sqlite")]
    fn test_redirect_unknown_and_expired(backend: Backend) {
        let store = store(backend, 100);
        store.insert(record("1", "soon", "t", Some(NOW + Duration::hours(1)))).unwrap();
        assert_eq!(store.redirect("nope", ScanMeta::default(), NOW).unwrap_err().status(), 404);
        assert!(store.redirect("soon", ScanMeta::default(), NOW).is_ok());

        let later = NOW + Duration::hours(2);
        assert_eq!(store.redirect("soon", ScanMeta::default(), later).unwrap_err().status(), 410);
        assert_eq!(store.stats("1", "t", later).unwrap_err().status(), 404);
    }

    #[test_case(Backend::Memory ; "memory")]
    #[test_case(Backend::Sqlite ; "sqlite")]
    fn test_delete(backend: Backend) {
        let store = store(backend, 100);
        store.insert(record("1", "promo", "t", None)).unwrap();
        store.redirect("promo", ScanMeta::default(), NOW).unwrap();
        assert_eq!(store.delete("1", "wrong").unwrap_err().status(), 404);

        let resp = store.delete("1", "t").unwrap();
        assert!(resp.deleted);
        assert_eq!(store.delete("1", "t").unwrap_err().status(), 404);
        assert!(!store.is_code_taken("promo").unwrap());
        assert!(store.is_empty().unwrap());
    }

    #[test_case(Backend::Memory ; "memory")]
    #[test_case(Backend::Sqlite ; "sqlite")]
    fn test_purge_expired(backend: Backend) {
        let store = store(backend, 100);
        store.insert(record("1", "old", "t", Some(NOW + Duration::minutes(1)))).unwrap();
        store.insert(record("2", "new", "t", Some(NOW + Duration::days(1)))).unwrap();
        store.insert(record("3", "forever", "t", None)).unwrap();

        assert_eq!(store.purge_expired(NOW + Duration::hours(1)).unwrap(), 1);
        assert_eq!(store.len().unwrap(), 2);
        assert!(!store.is_code_taken("old").unwrap());
        assert!(store.is_code_taken("new").unwrap());
    }
}
