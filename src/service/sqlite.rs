//! SQLite persistence for tracked links.
//!
//! Records live in `tracked_qr` with a unique short code, scans in `scan_events`. Each
//! record keeps at most `scans_cap` scan rows, trimmed oldest first on every redirect.

use std::{
    path::Path,
    sync::{Mutex, MutexGuard},
};

use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use time::OffsetDateTime;
use tracing::{debug, info};

use super::error::{ServiceError, ServiceResult};
use super::models::{DeleteResponse, ScanEvent, ScanMeta, TrackedStats};
use super::tracked::{
    code_taken, expired, format_time, is_expired, not_found, parse_time, random_hex, short_url_not_found,
    token_hash_matches, Record,
};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS tracked_qr (
        id TEXT PRIMARY KEY,
        short_code TEXT NOT NULL UNIQUE,
        target_url TEXT NOT NULL,
        manage_token_hash TEXT NOT NULL,
        scan_count INTEGER NOT NULL DEFAULT 0,
        expires_at TEXT,
        created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS scan_events (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        id TEXT NOT NULL UNIQUE,
        tracked_qr_id TEXT NOT NULL,
        scanned_at TEXT NOT NULL,
        user_agent TEXT,
        referrer TEXT,
        FOREIGN KEY (tracked_qr_id) REFERENCES tracked_qr(id) ON DELETE CASCADE
    );

    CREATE INDEX IF NOT EXISTS idx_tracked_qr_expires ON tracked_qr(expires_at);
    CREATE INDEX IF NOT EXISTS idx_scan_events_tracked ON scan_events(tracked_qr_id, seq);
"#;

#[derive(Debug)]
pub struct SqliteStore {
    conn: Mutex<Connection>,
    scans_cap: usize,
}

struct Row {
    short_code: String,
    target_url: String,
    token_hash: String,
    scan_count: i64,
    expires_at: Option<String>,
    created_at: String,
}

impl Row {
    const COLUMNS: &'static str = "short_code, target_url, manage_token_hash, scan_count, expires_at, created_at";

    fn from_sql(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            short_code: row.get(0)?,
            target_url: row.get(1)?,
            token_hash: row.get(2)?,
            scan_count: row.get(3)?,
            expires_at: row.get(4)?,
            created_at: row.get(5)?,
        })
    }

    fn expires_at(&self) -> ServiceResult<Option<OffsetDateTime>> {
        self.expires_at.as_deref().map(parse_time).transpose()
    }
}

impl SqliteStore {
    /// Opens the database at `path`, creating the file and schema when missing.
    pub fn open(path: impl AsRef<Path>, scans_cap: usize) -> ServiceResult<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))?;
        info!(path = %path.display(), "Opened tracked QR database");
        Self::init(conn, scans_cap)
    }

    pub fn open_in_memory(scans_cap: usize) -> ServiceResult<Self> {
        Self::init(Connection::open_in_memory()?, scans_cap)
    }

    fn init(conn: Connection, scans_cap: usize) -> ServiceResult<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn: Mutex::new(conn), scans_cap })
    }

    fn conn(&self) -> ServiceResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| ServiceError::Internal("tracked database lock poisoned".into()))
    }

    fn select(conn: &Connection, id: &str) -> ServiceResult<Option<Row>> {
        let sql = format!("SELECT {} FROM tracked_qr WHERE id = ?1", Row::COLUMNS);
        Ok(conn.query_row(&sql, params![id], Row::from_sql).optional()?)
    }

    pub fn len(&self) -> ServiceResult<usize> {
        let count: i64 = self.conn()?.query_row("SELECT COUNT(*) FROM tracked_qr", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn is_code_taken(&self, code: &str) -> ServiceResult<bool> {
        let taken = self.conn()?.query_row(
            "SELECT EXISTS(SELECT 1 FROM tracked_qr WHERE short_code = ?1)",
            params![code],
            |row| row.get(0),
        )?;
        Ok(taken)
    }

    pub fn insert(&self, record: &Record) -> ServiceResult<()> {
        let res = self.conn()?.execute(
            "INSERT INTO tracked_qr (id, short_code, target_url, manage_token_hash, scan_count, expires_at, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                record.id,
                record.short_code,
                record.target_url,
                record.token_hash(),
                record.scan_count as i64,
                record.expires_at.map(format_time),
                format_time(record.created_at),
            ],
        );
        match res {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                Err(code_taken(&record.short_code))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn stats(&self, id: &str, token: &str, now: OffsetDateTime) -> ServiceResult<TrackedStats> {
        let conn = self.conn()?;
        let row = match Self::select(&conn, id)? {
            Some(row) if token_hash_matches(&row.token_hash, token) => row,
            _ => return Err(not_found()),
        };
        let expires_at = row.expires_at()?;
        if is_expired(expires_at, now) {
            return Err(not_found());
        }

        let mut stmt = conn.prepare(
            "SELECT id, scanned_at, user_agent, referrer FROM scan_events
             WHERE tracked_qr_id = ?1 ORDER BY seq DESC LIMIT ?2",
        )?;
        let recent_scans = stmt
            .query_map(params![id, self.scans_cap as i64], |row| {
                Ok(ScanEvent {
                    id: row.get(0)?,
                    scanned_at: row.get(1)?,
                    user_agent: row.get(2)?,
                    referrer: row.get(3)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(TrackedStats {
            id: id.to_string(),
            short_code: row.short_code,
            target_url: row.target_url,
            scan_count: row.scan_count as u64,
            expires_at: expires_at.map(format_time),
            created_at: row.created_at,
            recent_scans,
        })
    }

    pub fn delete(&self, id: &str, token: &str) -> ServiceResult<DeleteResponse> {
        let conn = self.conn()?;
        let row = match Self::select(&conn, id)? {
            Some(row) if token_hash_matches(&row.token_hash, token) => row,
            _ => return Err(not_found()),
        };
        conn.execute("DELETE FROM tracked_qr WHERE id = ?1", params![id])?;
        info!(id, short_code = %row.short_code, "Deleted tracked QR");
        Ok(DeleteResponse { deleted: true, id: id.to_string() })
    }

    pub fn redirect(&self, code: &str, meta: ScanMeta, now: OffsetDateTime) -> ServiceResult<String> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let (id, target_url, expires_at): (String, String, Option<String>) = tx
            .query_row(
                "SELECT id, target_url, expires_at FROM tracked_qr WHERE short_code = ?1",
                params![code],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?
            .ok_or_else(short_url_not_found)?;
        if is_expired(expires_at.as_deref().map(parse_time).transpose()?, now) {
            return Err(expired());
        }

        tx.execute("UPDATE tracked_qr SET scan_count = scan_count + 1 WHERE id = ?1", params![id])?;
        tx.execute(
            "INSERT INTO scan_events (id, tracked_qr_id, scanned_at, user_agent, referrer)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![random_hex::<16>(), id, format_time(now), meta.user_agent, meta.referrer],
        )?;
        let trimmed = tx.execute(
            "DELETE FROM scan_events WHERE tracked_qr_id = ?1 AND seq NOT IN (
                SELECT seq FROM scan_events WHERE tracked_qr_id = ?1 ORDER BY seq DESC LIMIT ?2
             )",
            params![id, self.scans_cap as i64],
        )?;
        tx.commit()?;

        if trimmed > 0 {
            debug!(id, trimmed, "Trimmed scan events");
        }
        Ok(target_url)
    }

    pub fn purge_expired(&self, now: OffsetDateTime) -> ServiceResult<usize> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let rows: Vec<(String, String)> = tx
            .prepare("SELECT id, expires_at FROM tracked_qr WHERE expires_at IS NOT NULL")?
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<_>>()?;

        let mut purged = 0;
        for (id, expires_at) in rows {
            if is_expired(Some(parse_time(&expires_at)?), now) {
                purged += tx.execute("DELETE FROM tracked_qr WHERE id = ?1", params![id])?;
            }
        }
        tx.commit()?;

        if purged > 0 {
            info!(count = purged, "Purged expired tracked QR codes");
        }
        Ok(purged)
    }
}
