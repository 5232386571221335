// Copyright 2026 Fels Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Persistent SQLite cache built from a catalogue source file.
//!
//! The cache sits next to its source as `<source>.v001.sqlite`. It is
//! rebuilt from scratch when it is missing, when the source's modification
//! time or size differs from what was recorded at build time, or when it was
//! built for a different table layout. Handles are owned by a
//! [`CatalogCache`], which is meant for a single thread.
//!
//! Numeric columns hold the value read by [`parse_number`], or NULL when
//! the field is not a number, so they never match a numeric filter.

use std::collections::HashMap;
use std::ffi::OsString;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;
use std::time::UNIX_EPOCH;

use anyhow::Context;
use anyhow::Result;
use anyhow::anyhow;
use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::params;
use rusqlite::params_from_iter;
use rusqlite::types::Value as SqlValue;
use sha2::Digest;
use sha2::Sha256;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::catalog::for_each_row;
use crate::catalog::parse_number;
use crate::model::Family;
use crate::sql::SqlColumn;
use crate::sql::SqlTable;

pub const CACHE_SUFFIX: &str = ".v001.sqlite";

const FINGERPRINT_KEY: &str = "fingerprint";
const SOURCE_MTIME_KEY: &str = "source_mtime_ns";
const SOURCE_SIZE_KEY: &str = "source_size";

/// Table layout of one cache file.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheSpec {
    pub table: SqlTable,
    /// Columns copied from the source, in insert order.
    pub fields: Vec<SqlColumn>,
    pub create_sql: String,
    pub index_cols: Vec<SqlColumn>,
}

impl CacheSpec {
    pub fn new(table: SqlTable, fields: Vec<SqlColumn>, index_cols: Vec<SqlColumn>) -> Self {
        let columns: Vec<String> = fields
            .iter()
            .map(|column| match affinity(*column) {
                "TEXT" => format!("{} TEXT NOT NULL", column.sql()),
                numeric => format!("{} {numeric}", column.sql()),
            })
            .collect();
        let create_sql = format!(
            "CREATE TABLE {} (id INTEGER PRIMARY KEY AUTOINCREMENT, {})",
            table.as_str(),
            columns.join(", ")
        );
        Self {
            table,
            fields,
            create_sql,
            index_cols,
        }
    }

    pub fn for_family(family: Family) -> Self {
        match family {
            Family::Landsat => Self::new(
                SqlTable::Landsat,
                vec![
                    SqlColumn::SceneId,
                    SqlColumn::SensorId,
                    SqlColumn::ProductId,
                    SqlColumn::BaseUrl,
                    SqlColumn::DateAcquired,
                    SqlColumn::WrsPath,
                    SqlColumn::WrsRow,
                    SqlColumn::CloudCover,
                ],
                vec![SqlColumn::WrsRow, SqlColumn::WrsPath],
            ),
            Family::Sentinel2 => Self::new(
                SqlTable::Sentinel2,
                vec![
                    SqlColumn::SensingTime,
                    SqlColumn::CloudCover,
                    SqlColumn::BaseUrl,
                    SqlColumn::MgrsTile,
                ],
                vec![SqlColumn::MgrsTile],
            ),
        }
    }

    /// Stable digest of everything that shapes the cache file.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.table.as_str().as_bytes());
        hasher.update([0u8]);
        for column in &self.fields {
            hasher.update(column.sql().as_bytes());
            hasher.update([b',']);
        }
        hasher.update([0u8]);
        hasher.update(self.create_sql.as_bytes());
        hasher.update([0u8]);
        for column in &self.index_cols {
            hasher.update(column.sql().as_bytes());
            hasher.update([b',']);
        }
        hex::encode(hasher.finalize())
    }

    fn index_sql(&self) -> String {
        let columns: Vec<&str> = self.index_cols.iter().map(|column| column.sql()).collect();
        format!(
            "CREATE INDEX {table}_spatial_idx ON {table} ({})",
            columns.join(", "),
            table = self.table.as_str()
        )
    }

    fn insert_sql(&self) -> String {
        let columns: Vec<&str> = self.fields.iter().map(|column| column.sql()).collect();
        let placeholders = vec!["?"; columns.len()].join(", ");
        format!(
            "INSERT INTO {} ({}) VALUES ({placeholders})",
            self.table.as_str(),
            columns.join(", ")
        )
    }
}

fn affinity(column: SqlColumn) -> &'static str {
    match column {
        SqlColumn::WrsPath | SqlColumn::WrsRow => "INTEGER",
        SqlColumn::CloudCover => "REAL",
        _ => "TEXT",
    }
}

pub fn cache_path_for(source: &Path) -> PathBuf {
    let mut name = OsString::from(source.as_os_str());
    name.push(CACHE_SUFFIX);
    PathBuf::from(name)
}

/// Open cache handles keyed by cache path.
///
/// Not thread safe; keep one per thread of work. Call [`CatalogCache::close`]
/// to surface close errors; dropping closes silently.
#[derive(Debug, Default)]
pub struct CatalogCache {
    conns: HashMap<PathBuf, Connection>,
    rebuilds: usize,
}

impl CatalogCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cache files (re)built by this handle table.
    pub fn rebuild_count(&self) -> usize {
        self.rebuilds
    }

    pub fn is_open(&self, source: &Path) -> bool {
        self.conns.contains_key(&cache_path_for(source))
    }

    /// Returns a connection to an up-to-date cache for `source`, building
    /// it first when needed.
    pub fn ensure(&mut self, source: &Path, spec: &CacheSpec) -> Result<&Connection> {
        let path = cache_path_for(source);
        let stamp = SourceStamp::of(source)?;

        let stale = if path.is_file() {
            if !self.conns.contains_key(&path) {
                let conn = open_connection(&path)?;
                self.conns.insert(path.clone(), conn);
            }
            match self.conns.get(&path).map(read_meta) {
                Some(Ok(meta)) => staleness(&meta, spec, &stamp),
                Some(Err(err)) => {
                    warn!(path = %path.display(), error = %err, "unreadable cache");
                    Some("unreadable")
                }
                None => Some("missing"),
            }
        } else {
            Some("missing")
        };

        if let Some(reason) = stale {
            if let Some(conn) = self.conns.remove(&path) {
                close_connection(&path, conn)?;
            }
            info!(path = %path.display(), reason, "building catalogue cache");
            let conn = build(source, &path, spec, &stamp)?;
            self.rebuilds += 1;
            self.conns.insert(path.clone(), conn);
        } else {
            debug!(path = %path.display(), "catalogue cache is fresh");
        }

        self.conns
            .get(&path)
            .ok_or_else(|| anyhow!("no cache handle for {}", path.display()))
    }

    /// Closes every open handle.
    pub fn close(&mut self) -> Result<()> {
        let mut first_err = None;
        for (path, conn) in self.conns.drain() {
            if let Err(err) = close_connection(&path, conn) {
                first_err.get_or_insert(err);
            }
        }
        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl Drop for CatalogCache {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!(error = %err, "closing catalogue cache");
        }
    }
}

/// Modification time and size of a source file, as recorded in the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
struct SourceStamp {
    mtime_ns: String,
    size: String,
}

impl SourceStamp {
    fn of(source: &Path) -> Result<Self> {
        let meta = fs::metadata(source).with_context(|| format!("stat {}", source.display()))?;
        let modified = meta.modified().context("source mtime")?;
        let mtime_ns = match modified.duration_since(UNIX_EPOCH) {
            Ok(since) => since.as_nanos().to_string(),
            Err(before) => format!("-{}", before.duration().as_nanos()),
        };
        Ok(Self {
            mtime_ns,
            size: meta.len().to_string(),
        })
    }
}

fn staleness(
    meta: &HashMap<String, String>,
    spec: &CacheSpec,
    stamp: &SourceStamp,
) -> Option<&'static str> {
    let stored = |key: &str| meta.get(key).map(String::as_str);
    if stored(FINGERPRINT_KEY) != Some(spec.fingerprint().as_str()) {
        return Some("layout changed");
    }
    if stored(SOURCE_MTIME_KEY) != Some(stamp.mtime_ns.as_str())
        || stored(SOURCE_SIZE_KEY) != Some(stamp.size.as_str())
    {
        return Some("source changed");
    }
    None
}

fn open_connection(path: &Path) -> Result<Connection> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE;
    let conn = Connection::open_with_flags(path, flags)
        .with_context(|| format!("open {}", path.display()))?;
    conn.busy_timeout(Duration::from_millis(5000))
        .context("set busy timeout")?;
    conn.execute_batch("PRAGMA journal_mode=DELETE;\nPRAGMA synchronous=NORMAL;")
        .context("apply pragmas")?;
    Ok(conn)
}

fn close_connection(path: &Path, conn: Connection) -> Result<()> {
    conn.close()
        .map_err(|(_, err)| err)
        .with_context(|| format!("close {}", path.display()))
}

fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
            params![name],
            |row| row.get(0),
        )
        .context("check table")?;
    Ok(count > 0)
}

fn read_meta(conn: &Connection) -> Result<HashMap<String, String>> {
    if !table_exists(conn, "cache_meta")? {
        return Ok(HashMap::new());
    }
    let mut stmt = conn
        .prepare("SELECT key, value FROM cache_meta")
        .context("prepare cache meta query")?;
    let rows = stmt
        .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))
        .context("read cache meta")?;
    let mut meta = HashMap::new();
    for row in rows {
        let (key, value) = row.context("read cache meta row")?;
        meta.insert(key, value);
    }
    Ok(meta)
}

fn build(
    source: &Path,
    path: &Path,
    spec: &CacheSpec,
    stamp: &SourceStamp,
) -> Result<Connection> {
    if path.exists() {
        fs::remove_file(path).with_context(|| format!("remove {}", path.display()))?;
    }
    match populate(source, path, spec, stamp) {
        Ok(conn) => Ok(conn),
        Err(err) => {
            if let Err(remove_err) = fs::remove_file(path) {
                debug!(path = %path.display(), error = %remove_err, "partial cache not removed");
            }
            Err(err)
        }
    }
}

fn populate(
    source: &Path,
    path: &Path,
    spec: &CacheSpec,
    stamp: &SourceStamp,
) -> Result<Connection> {
    let mut conn = open_connection(path)?;
    conn.execute_batch(&format!(
        "{};\n{};\nCREATE TABLE cache_meta (key TEXT PRIMARY KEY, value TEXT);",
        spec.create_sql,
        spec.index_sql()
    ))
    .context("create cache schema")?;

    let tx = conn.transaction().context("begin cache load")?;
    let rows = {
        let mut insert = tx.prepare(&spec.insert_sql()).context("prepare insert")?;
        let label = format!("caching {}", source.display());
        let numeric: Vec<bool> = spec
            .fields
            .iter()
            .map(|column| affinity(*column) != "TEXT")
            .collect();
        for_each_row(source, &spec.fields, &label, |values| {
            let row = values.iter().zip(&numeric).map(|(raw, numeric)| {
                if *numeric {
                    parse_number(raw).map_or(SqlValue::Null, SqlValue::Real)
                } else {
                    SqlValue::Text(raw.to_string())
                }
            });
            insert
                .execute(params_from_iter(row))
                .context("insert catalogue row")?;
            Ok(())
        })?
    };
    for (key, value) in [
        (FINGERPRINT_KEY, spec.fingerprint()),
        (SOURCE_MTIME_KEY, stamp.mtime_ns.clone()),
        (SOURCE_SIZE_KEY, stamp.size.clone()),
    ] {
        tx.execute(
            "INSERT OR REPLACE INTO cache_meta (key, value) VALUES (?1, ?2)",
            params![key, value],
        )
        .context("record cache metadata")?;
    }
    tx.commit().context("commit cache load")?;
    info!(path = %path.display(), rows, "catalogue cache ready");
    Ok(conn)
}
