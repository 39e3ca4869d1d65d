use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};

use super::schema::{self, SCHEMA};
use crate::error::{Error, Result};
use crate::types::*;

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path)?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Returns a guard to the underlying database connection.
    /// This allows consuming applications to execute custom SQL.
    pub fn connection(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn()
    }

    /// Creates tables and seeds the registry and status reference rows.
    pub fn initialize(&self) -> Result<()> {
        let conn = self.conn();
        conn.execute_batch(SCHEMA)?;
        conn.execute_batch(&schema::ownership_indexes())?;

        for registry in Registry::ALL {
            conn.execute(
                "INSERT OR IGNORE INTO registries (id, name) VALUES (?1, ?2)",
                params![registry.id(), registry.name()],
            )?;
        }
        for status in SignatureStatus::ALL {
            conn.execute(
                "INSERT OR IGNORE INTO sig_status (id, name) VALUES (?1, ?2)",
                params![status.id(), status.name()],
            )?;
        }
        Ok(())
    }

    /// Runs `f` inside a single transaction. Everything it inserts commits
    /// together; an error rolls the whole batch back.
    pub fn batch<T>(&self, f: impl FnOnce(&Batch<'_>) -> Result<T>) -> Result<T> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let out = f(&Batch { conn: &tx })?;
        tx.commit()?;
        Ok(out)
    }

    /// Deletes everything at and below `level` that belongs to `registry`.
    ///
    /// Returns the number of rows removed per table, in deletion order.
    pub fn clean(&self, registry: Registry, level: CleanLevel) -> Result<Vec<(&'static str, usize)>> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let mut removed = Vec::new();

        for entry in schema::clean_order(level) {
            let sql = format!("DELETE FROM {} WHERE {}", entry.table, schema::scope_clause(entry));
            let rows = tx.execute(&sql, params![registry.id()])?;
            tracing::debug!(table = entry.table, rows, "cleaned");
            removed.push((entry.table, rows));
        }

        tx.commit()?;
        Ok(removed)
    }

    /// Row count of an owned table restricted to `registry`.
    pub fn count(&self, table: &str, registry: Registry) -> Result<i64> {
        let entry = schema::owned(table).ok_or(Error::NotFound)?;
        let sql = format!("SELECT COUNT(*) FROM {} WHERE {}", entry.table, schema::scope_clause(entry));
        let conn = self.conn();
        conn.query_row(&sql, params![registry.id()], |row| row.get(0))
            .map_err(Error::from)
    }

    pub fn get_package(&self, registry: Registry, name: &str) -> Result<Option<Package>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, name, registry_id, versions_count, latest_release_date, first_release_date,
                    downloads, downloads_period
             FROM packages WHERE registry_id = ?1 AND name = ?2",
            params![registry.id(), name],
            |row| map_package(row, registry),
        )
        .optional()
        .map_err(Error::from)
    }

    /// All packages of a registry in insertion order. Stage ranges index into this list.
    pub fn list_packages(&self, registry: Registry) -> Result<Vec<Package>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, name, registry_id, versions_count, latest_release_date, first_release_date,
                    downloads, downloads_period
             FROM packages WHERE registry_id = ?1 ORDER BY id",
        )?;

        let rows = stmt.query_map(params![registry.id()], |row| map_package(row, registry))?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    pub fn list_versions(&self, package_id: i64) -> Result<Vec<Version>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, package_id, name, date FROM versions WHERE package_id = ?1 ORDER BY id",
        )?;

        let rows = stmt.query_map(params![package_id], |row| {
            Ok(Version {
                id: row.get(0)?,
                package_id: row.get(1)?,
                name: row.get(2)?,
                date: row.get::<_, Option<String>>(3)?.map(|s| parse_datetime(&s)),
            })
        })?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    pub fn get_pgp_key(&self, key_id: &str) -> Result<Option<PgpKey>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT key_id, keyserver, raw FROM pgp_keys WHERE key_id = ?1",
            params![key_id],
            |row| {
                Ok(PgpKey {
                    key_id: row.get(0)?,
                    keyserver: row.get(1)?,
                    raw: row.get(2)?,
                })
            },
        )
        .optional()
        .map_err(Error::from)
    }

    /// Number of checked artifacts per status for one registry.
    pub fn status_counts(&self, registry: Registry) -> Result<Vec<(SignatureStatus, i64)>> {
        let entry = schema::owned("sig_check").ok_or(Error::NotFound)?;
        let sql = format!(
            "SELECT status, COUNT(*) FROM sig_check WHERE {} GROUP BY status ORDER BY status",
            schema::scope_clause(entry)
        );
        let conn = self.conn();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![registry.id()], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut counts = Vec::new();
        for row in rows {
            let (id, count) = row?;
            match SignatureStatus::from_id(id) {
                Some(status) => counts.push((status, count)),
                None => tracing::error!("Unknown status id in sig_check: {}", id),
            }
        }
        Ok(counts)
    }

    /// Artifacts flagged as carrying a signature, scoped to one registry.
    pub fn count_signed_artifacts(&self, registry: Registry) -> Result<i64> {
        let entry = schema::owned("artifacts").ok_or(Error::NotFound)?;
        let sql = format!(
            "SELECT COUNT(*) FROM artifacts WHERE has_sig = 1 AND {}",
            schema::scope_clause(entry)
        );
        let conn = self.conn();
        conn.query_row(&sql, params![registry.id()], |row| row.get(0))
            .map_err(Error::from)
    }

    /// `(algo, data bits)` of every extracted packet for one registry.
    pub fn packet_sizes(&self, registry: Registry) -> Result<Vec<(Option<u32>, Option<u32>)>> {
        let entry = schema::owned("list_packets").ok_or(Error::NotFound)?;
        let sql = format!(
            "SELECT algo, data FROM list_packets WHERE {}",
            schema::scope_clause(entry)
        );
        let conn = self.conn();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![registry.id()], |row| Ok((row.get(0)?, row.get(1)?)))?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }
}

/// Insert handle bound to one open transaction.
///
/// Inserts are plain `INSERT`s: writing the same logical row twice without a
/// `clean` in between fails with [`Error::AlreadyExists`].
pub struct Batch<'c> {
    conn: &'c Connection,
}

impl Batch<'_> {
    pub fn insert_package(&self, pkg: &NewPackage) -> Result<i64> {
        self.conn
            .execute(
                "INSERT INTO packages (name, registry_id, versions_count, latest_release_date,
                                       first_release_date, downloads, downloads_period)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    pkg.name,
                    pkg.registry.id(),
                    pkg.versions_count,
                    pkg.latest_release_date.as_ref().map(format_datetime),
                    pkg.first_release_date.as_ref().map(format_datetime),
                    pkg.downloads,
                    pkg.downloads_period,
                ],
            )
            .map_err(|e| unique_violation(e, || format!("package {}/{}", pkg.registry, pkg.name)))?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn update_versions_count(&self, package_id: i64, versions_count: i64) -> Result<()> {
        let rows = self.conn.execute(
            "UPDATE packages SET versions_count = ?1 WHERE id = ?2",
            params![versions_count, package_id],
        )?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    pub fn insert_version(&self, version: &NewVersion) -> Result<i64> {
        self.conn
            .execute(
                "INSERT INTO versions (package_id, name, date) VALUES (?1, ?2, ?3)",
                params![
                    version.package_id,
                    version.name,
                    version.date.as_ref().map(format_datetime),
                ],
            )
            .map_err(|e| {
                unique_violation(e, || {
                    format!("version {} of package {}", version.name, version.package_id)
                })
            })?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn insert_artifact(&self, artifact: &NewArtifact) -> Result<i64> {
        let extensions = if artifact.extensions.is_empty() {
            None
        } else {
            Some(serde_json::to_string(&artifact.extensions)?)
        };

        self.conn
            .execute(
                "INSERT INTO artifacts (version_id, name, type, has_sig, digest, date, extensions)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    artifact.version_id,
                    artifact.name,
                    artifact.kind,
                    artifact.has_sig,
                    artifact.digest,
                    artifact.date.as_ref().map(format_datetime),
                    extensions,
                ],
            )
            .map_err(|e| {
                unique_violation(e, || {
                    format!("artifact {} of version {}", artifact.name, artifact.version_id)
                })
            })?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn artifact_id(&self, version_id: i64, name: &str) -> Result<Option<i64>> {
        self.conn
            .query_row(
                "SELECT id FROM artifacts WHERE version_id = ?1 AND name = ?2",
                params![version_id, name],
                |row| row.get(0),
            )
            .optional()
            .map_err(Error::from)
    }

    pub fn set_has_sig(&self, artifact_id: i64, has_sig: bool) -> Result<()> {
        let rows = self.conn.execute(
            "UPDATE artifacts SET has_sig = ?1 WHERE id = ?2",
            params![has_sig, artifact_id],
        )?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    pub fn insert_signature(&self, sig: &NewSignature) -> Result<i64> {
        self.conn
            .execute(
                "INSERT INTO signatures (artifact_id, type, raw) VALUES (?1, ?2, ?3)",
                params![sig.artifact_id, sig.kind.name(), sig.raw],
            )
            .map_err(|e| unique_violation(e, || format!("signature of artifact {}", sig.artifact_id)))?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn insert_sig_check(&self, check: &NewSigCheck) -> Result<i64> {
        self.conn
            .execute(
                "INSERT INTO sig_check (artifact_id, status, raw) VALUES (?1, ?2, ?3)",
                params![check.artifact_id, check.status.id(), check.raw],
            )
            .map_err(|e| unique_violation(e, || format!("check of artifact {}", check.artifact_id)))?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn insert_list_packet(&self, packet: &NewListPacket) -> Result<i64> {
        let meta = &packet.metadata;
        self.conn
            .execute(
                "INSERT INTO list_packets (signature_id, algo, digest_algo, data, key_id, created, expires, raw)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    packet.signature_id,
                    meta.algo,
                    meta.digest_algo,
                    meta.data_bits,
                    meta.key_id,
                    meta.created,
                    meta.expires,
                    packet.raw,
                ],
            )
            .map_err(|e| {
                unique_violation(e, || format!("packet list of signature {}", packet.signature_id))
            })?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn has_pgp_key(&self, key_id: &str) -> Result<bool> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM pgp_keys WHERE key_id = ?1",
                params![key_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    pub fn insert_pgp_key(&self, key: &PgpKey) -> Result<i64> {
        self.conn
            .execute(
                "INSERT INTO pgp_keys (key_id, keyserver, raw) VALUES (?1, ?2, ?3)",
                params![key.key_id, key.keyserver, key.raw],
            )
            .map_err(|e| unique_violation(e, || format!("pgp key {}", key.key_id)))?;
        Ok(self.conn.last_insert_rowid())
    }
}

fn unique_violation(err: rusqlite::Error, what: impl FnOnce() -> String) -> Error {
    match err {
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
        {
            Error::AlreadyExists(what())
        }
        e => Error::from(e),
    }
}

fn map_package(row: &rusqlite::Row<'_>, registry: Registry) -> rusqlite::Result<Package> {
    Ok(Package {
        id: row.get(0)?,
        name: row.get(1)?,
        registry,
        versions_count: row.get(3)?,
        latest_release_date: row.get::<_, Option<String>>(4)?.map(|s| parse_datetime(&s)),
        first_release_date: row.get::<_, Option<String>>(5)?.map(|s| parse_datetime(&s)),
        downloads: row.get(6)?,
        downloads_period: row.get(7)?,
    })
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            // Handle SQLite's default datetime format: "YYYY-MM-DD HH:MM:SS"
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            tracing::error!("Invalid datetime in database: '{}' - {}", s, e);
            Utc::now()
        })
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}
