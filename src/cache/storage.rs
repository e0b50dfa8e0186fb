//! SQLite-backed store of sandbox analysis results
//!
//! One row per artifact in table `hashes`, keyed uniquely by uppercase SHA-1.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, NaiveDateTime, Utc};
use log::{debug, warn};
use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::client::models::time;
use crate::client::models::{AnalysisResult, Digest, RiskLevel};
use crate::error::CacheError;

/// Layout of SQLite's `CURRENT_TIMESTAMP`
const SQLITE_LAYOUT: &str = "%Y-%m-%d %H:%M:%S";

type Result<T> = std::result::Result<T, CacheError>;

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS hashes (
        type TEXT NOT NULL,
        md5 TEXT NOT NULL,
        sha1 TEXT NOT NULL UNIQUE,
        sha256 TEXT NOT NULL,
        arguments TEXT,
        AnalysisCompletionDateTime TEXT NOT NULL,
        RiskLevel INTEGER,
        DetectionNames TEXT,
        ThreatTypes TEXT,
        TrueFileType TEXT,
        updated TIMESTAMP DEFAULT CURRENT_TIMESTAMP NOT NULL
    );

    CREATE UNIQUE INDEX IF NOT EXISTS hash_idx ON hashes (sha1);
"#;

const COLUMNS: &str = "type, md5, sha1, sha256, arguments, AnalysisCompletionDateTime, \
                       RiskLevel, DetectionNames, ThreatTypes, TrueFileType, updated";

const UPSERT: &str = "INSERT INTO hashes (type, md5, sha1, sha256, arguments, \
    AnalysisCompletionDateTime, RiskLevel, DetectionNames, ThreatTypes, TrueFileType, updated) \
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11) \
    ON CONFLICT (sha1) DO UPDATE SET \
    type = excluded.type, md5 = excluded.md5, sha256 = excluded.sha256, \
    arguments = excluded.arguments, \
    AnalysisCompletionDateTime = excluded.AnalysisCompletionDateTime, \
    RiskLevel = excluded.RiskLevel, DetectionNames = excluded.DetectionNames, \
    ThreatTypes = excluded.ThreatTypes, TrueFileType = excluded.TrueFileType, \
    updated = excluded.updated";

const REPLACE: &str = "INSERT OR REPLACE INTO hashes (type, md5, sha1, sha256, arguments, \
    AnalysisCompletionDateTime, RiskLevel, DetectionNames, ThreatTypes, TrueFileType, updated) \
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)";

/// A cached analysis and the time it was last written
#[derive(Debug, Clone, PartialEq)]
pub struct CachedResult {
    pub result: AnalysisResult,
    pub updated: DateTime<Utc>,
}

/// Persistent result cache.
///
/// The connection sits behind a mutex, so one cache can be shared by
/// concurrent tasks without further locking.
pub struct ResultCache {
    conn: Mutex<Connection>,
}

impl ResultCache {
    /// Open or create the cache database at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                CacheError::Io(format!("Failed to create {}: {}", parent.display(), e))
            })?;
        }
        debug!("Opening result cache {}", path.display());
        Self::init(Connection::open(path)?)
    }

    /// Cache that lives only as long as this value.
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        // A panic mid-statement leaves no Rust-side state to repair
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Insert or overwrite the row for `result.digest.sha1`.
    pub fn add(&self, result: &AnalysisResult) -> Result<()> {
        let row = RowValues::of(result);
        let conn = self.conn();
        match row.write(&conn, UPSERT) {
            Err(err) if is_dialect_error(&err) => {
                warn!("Upsert not supported ({}), falling back to INSERT OR REPLACE", err);
                row.write(&conn, REPLACE)?;
            }
            other => {
                other?;
            }
        }
        debug!("Cached analysis for {}", row.sha1);
        Ok(())
    }

    /// Point lookup by SHA-1, case-insensitive.
    pub fn query(&self, sha1: &str) -> Result<Option<CachedResult>> {
        let conn = self.conn();
        let raw = conn
            .query_row(
                &format!("SELECT {} FROM hashes WHERE sha1 = ?1", COLUMNS),
                [sha1.to_uppercase()],
                RawRow::from_row,
            )
            .optional()?;
        raw.map(RawRow::into_cached).transpose()
    }

    /// Remove the row for `sha1`, if any.
    pub fn delete(&self, sha1: &str) -> Result<bool> {
        let deleted = self
            .conn()
            .execute("DELETE FROM hashes WHERE sha1 = ?1", [sha1.to_uppercase()])?;
        Ok(deleted > 0)
    }

    /// Delete every row last written before `before`. Returns the number removed.
    pub fn cleanup(&self, before: DateTime<Utc>) -> Result<usize> {
        let cutoff = before.format(SQLITE_LAYOUT).to_string();
        // julianday() reads both the SQLite and the ISO layouts
        let deleted = self.conn().execute(
            "DELETE FROM hashes WHERE julianday(updated) < julianday(?1)",
            [cutoff],
        )?;
        debug!("Cache cleanup removed {} rows", deleted);
        Ok(deleted)
    }

    /// Pass every row to `callback`, stopping at its first error.
    ///
    /// Rows are read up front, so the callback may use this cache.
    pub fn iterate<F, E>(&self, mut callback: F) -> Result<()>
    where
        F: FnMut(CachedResult) -> std::result::Result<(), E>,
        E: std::fmt::Display,
    {
        let rows: Vec<RawRow> = {
            let conn = self.conn();
            let mut stmt = conn.prepare(&format!("SELECT {} FROM hashes", COLUMNS))?;
            let mapped = stmt.query_map([], RawRow::from_row)?;
            mapped.collect::<std::result::Result<_, _>>()?
        };
        for raw in rows {
            callback(raw.into_cached()?).map_err(|e| CacheError::Callback(e.to_string()))?;
        }
        Ok(())
    }

    pub fn count(&self) -> Result<usize> {
        let count: i64 = self
            .conn()
            .query_row("SELECT COUNT(*) FROM hashes", [], |r| r.get(0))?;
        Ok(count as usize)
    }
}

/// Column values of one `hashes` row, as written by [`ResultCache::add`]
struct RowValues {
    kind: String,
    md5: String,
    sha1: String,
    sha256: String,
    arguments: String,
    completion: String,
    risk_level: i64,
    detection_names: String,
    threat_types: String,
    true_file_type: String,
    updated: String,
}

impl RowValues {
    fn of(result: &AnalysisResult) -> Self {
        Self {
            kind: result.kind.clone(),
            md5: result.digest.md5.to_uppercase(),
            sha1: result.digest.sha1.to_uppercase(),
            sha256: result.digest.sha256.to_uppercase(),
            arguments: result.arguments.clone(),
            completion: result
                .analysis_completion_date_time
                .as_ref()
                .map(time::format)
                .unwrap_or_default(),
            risk_level: result.risk_level.as_i64(),
            detection_names: result.detection_names.join(","),
            threat_types: result.threat_types.join(","),
            true_file_type: result.true_file_type.clone(),
            updated: Utc::now().format(SQLITE_LAYOUT).to_string(),
        }
    }

    /// Run `statement` (`UPSERT` or `REPLACE`) with this row bound.
    fn write(&self, conn: &Connection, statement: &str) -> rusqlite::Result<usize> {
        conn.execute(
            statement,
            params![
                self.kind,
                self.md5,
                self.sha1,
                self.sha256,
                self.arguments,
                self.completion,
                self.risk_level,
                self.detection_names,
                self.threat_types,
                self.true_file_type,
                self.updated,
            ],
        )
    }
}

/// Whether `err` means the upsert syntax is not understood by this engine.
fn is_dialect_error(err: &rusqlite::Error) -> bool {
    err.to_string().contains("syntax error")
}

fn split_list(joined: Option<String>) -> Vec<String> {
    match joined {
        Some(s) if !s.is_empty() => s.split(',').map(str::to_string).collect(),
        _ => Vec::new(),
    }
}

/// Parse `updated`, written either by SQLite or in a Vision One layout.
fn parse_updated(s: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s, SQLITE_LAYOUT)
        .ok()
        .map(|naive| naive.and_utc())
        .or_else(|| time::parse(s))
}

struct RawRow {
    kind: String,
    md5: String,
    sha1: String,
    sha256: String,
    arguments: Option<String>,
    completion: String,
    risk_level: Option<i64>,
    detection_names: Option<String>,
    threat_types: Option<String>,
    true_file_type: Option<String>,
    updated: String,
}

impl RawRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            kind: row.get(0)?,
            md5: row.get(1)?,
            sha1: row.get(2)?,
            sha256: row.get(3)?,
            arguments: row.get(4)?,
            completion: row.get(5)?,
            risk_level: row.get(6)?,
            detection_names: row.get(7)?,
            threat_types: row.get(8)?,
            true_file_type: row.get(9)?,
            updated: row.get(10)?,
        })
    }

    fn into_cached(self) -> Result<CachedResult> {
        let analysis_completion_date_time = if self.completion.is_empty() {
            None
        } else {
            Some(time::parse(&self.completion).ok_or(CacheError::Timestamp(self.completion))?)
        };
        let risk_level = match self.risk_level {
            None => RiskLevel::default(),
            Some(n) => RiskLevel::from_i64(n).ok_or_else(|| {
                CacheError::Corrupt(format!("{}: risk level {}", self.sha1, n))
            })?,
        };
        let updated = parse_updated(&self.updated).ok_or(CacheError::Timestamp(self.updated))?;

        Ok(CachedResult {
            result: AnalysisResult {
                id: String::new(),
                kind: self.kind,
                digest: Digest {
                    md5: self.md5,
                    sha1: self.sha1,
                    sha256: self.sha256,
                },
                arguments: self.arguments.unwrap_or_default(),
                analysis_completion_date_time,
                risk_level,
                detection_names: split_list(self.detection_names),
                threat_types: split_list(self.threat_types),
                true_file_type: self.true_file_type.unwrap_or_default(),
            },
            updated,
        })
    }
}
