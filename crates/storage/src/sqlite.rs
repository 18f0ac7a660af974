//! SQLite backend
//!
//! One connection guarded by a mutex. Each read batch runs inside a single
//! read transaction and each write batch inside a single write transaction,
//! so a batch observes one snapshot and commits atomically.

use crate::config::SqliteConfig;
use crate::error::normalize;
use crate::schema;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;
use tempfile::NamedTempFile;
use tracing::{debug, info};
use vellum_core::{Envelope, IdentityValue, ReadRequest, Result, Timestamp, VellumError, WriteBatch};
use vellum_engine::{Backend, TransactionRecord};

struct Inner {
    conn: Connection,
    known_types: BTreeSet<String>,
    last_entry_time: Timestamp,
}

/// Backend persisting envelopes in SQLite
pub struct SqliteBackend {
    inner: Mutex<Inner>,
    min_entry_time: Timestamp,
    location: String,
    /// Keeps a temporary database file alive; deleted on drop
    _temp: Option<NamedTempFile>,
}

impl SqliteBackend {
    /// Open (creating if needed) the database at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_config(&SqliteConfig::file(path.as_ref()))
    }

    /// Private in-memory database
    pub fn in_memory() -> Result<Self> {
        Self::from_config(&SqliteConfig::default())
    }

    /// Database in a temporary file, removed when the backend is dropped
    pub fn temporary() -> Result<Self> {
        let file = NamedTempFile::new().map_err(VellumError::unknown)?;
        let conn = Connection::open(file.path()).map_err(normalize)?;
        let location = file.path().display().to_string();
        Self::init(conn, &SqliteConfig::default(), location, Some(file))
    }

    /// Open according to `config`
    pub fn from_config(config: &SqliteConfig) -> Result<Self> {
        config.validate()?;
        let (conn, location) = match &config.path {
            Some(path) => (
                Connection::open(path).map_err(normalize)?,
                path.display().to_string(),
            ),
            None => (Connection::open_in_memory().map_err(normalize)?, ":memory:".to_string()),
        };
        Self::init(conn, config, location, None)
    }

    fn init(conn: Connection, config: &SqliteConfig, location: String, temp: Option<NamedTempFile>) -> Result<Self> {
        conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))
            .map_err(normalize)?;
        schema::create(&conn).map_err(normalize)?;

        let (min, max): (Option<i64>, Option<i64>) = conn
            .query_row("SELECT MIN(entry_time), MAX(entry_time) FROM transactions", [], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })
            .map_err(normalize)?;

        let known_types = {
            let mut stmt = conn.prepare("SELECT type_name FROM object_types").map_err(normalize)?;
            let names = stmt
                .query_map([], |row| row.get::<_, String>(0))
                .map_err(normalize)?
                .collect::<rusqlite::Result<BTreeSet<String>>>()
                .map_err(normalize)?;
            names
        };

        info!(
            target: "vellum::sqlite",
            location = %location,
            types = known_types.len(),
            "Opened object database"
        );

        Ok(SqliteBackend {
            inner: Mutex::new(Inner {
                conn,
                known_types,
                last_entry_time: max.map_or(Timestamp::EPOCH, Timestamp::from_db),
            }),
            min_entry_time: min.map_or(Timestamp::MAX, Timestamp::from_db),
            location,
            _temp: temp,
        })
    }

    /// Entry time of the oldest transaction when the database was opened
    ///
    /// `Timestamp::MAX` for an empty database.
    pub fn min_entry_time(&self) -> Timestamp {
        self.min_entry_time
    }

    /// Identity types that have been written at least once
    pub fn known_types(&self) -> BTreeSet<String> {
        self.inner.lock().known_types.clone()
    }

    /// Database file, or `:memory:`
    pub fn location(&self) -> &str {
        &self.location
    }

    /// Audit row of one transaction
    pub fn transaction(&self, transaction_id: u64) -> Result<TransactionRecord> {
        let inner = self.inner.lock();
        inner
            .conn
            .query_row(
                "SELECT transaction_id, entry_time, username, hostname, comment FROM transactions WHERE transaction_id = ?1",
                params![transaction_id as i64],
                transaction_from_row,
            )
            .optional()
            .map_err(normalize)?
            .ok_or_else(|| VellumError::NotFound {
                entity: format!("transaction {}", transaction_id),
            })
    }

    /// Every audit row, oldest first
    pub fn transactions(&self) -> Result<Vec<TransactionRecord>> {
        let inner = self.inner.lock();
        let mut stmt = inner
            .conn
            .prepare("SELECT transaction_id, entry_time, username, hostname, comment FROM transactions ORDER BY transaction_id")
            .map_err(normalize)?;
        let rows = stmt
            .query_map([], transaction_from_row)
            .map_err(normalize)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(normalize)?;
        Ok(rows)
    }
}

fn transaction_from_row(row: &Row<'_>) -> rusqlite::Result<TransactionRecord> {
    Ok(TransactionRecord {
        transaction_id: row.get::<_, i64>(0)? as u64,
        entry_time: Timestamp::from_db(row.get(1)?),
        username: row.get(2)?,
        hostname: row.get(3)?,
        comment: row.get(4)?,
    })
}

fn envelope_from_row(row: &Row<'_>) -> rusqlite::Result<Envelope> {
    Ok(Envelope {
        identity_type: row.get(0)?,
        identity_value: IdentityValue::from_canonical(row.get::<_, String>(1)?),
        concrete_type: row.get(2)?,
        contents: row.get(3)?,
        effective_version: row.get::<_, i64>(4)? as u64,
        entry_version: row.get::<_, i64>(5)? as u64,
        effective_time: Timestamp::from_db(row.get(6)?),
        entry_time: Timestamp::from_db(row.get(7)?),
        transaction_id: row.get::<_, i64>(8)? as u64,
    })
}

impl Backend for SqliteBackend {
    fn execute_reads(&self, reads: &[ReadRequest]) -> Result<Vec<Envelope>> {
        let mut guard = self.inner.lock();
        let tx = guard.conn.transaction().map_err(normalize)?;
        let mut out = Vec::new();
        {
            let mut stmt = tx.prepare_cached(schema::SELECT_LATEST).map_err(normalize)?;
            for group in reads {
                let values: Vec<&str> = group.identity_values.iter().map(|v| v.as_str()).collect();
                let values = serde_json::to_string(&values).map_err(|e| VellumError::Serialization {
                    message: e.to_string(),
                })?;
                let rows = stmt
                    .query_map(
                        params![
                            group.identity_type,
                            group.effective_time_bound.to_db(),
                            group.entry_time_bound.to_db(),
                            values
                        ],
                        envelope_from_row,
                    )
                    .map_err(normalize)?;
                for row in rows {
                    out.push(row.map_err(normalize)?);
                }
            }
        }
        tx.commit().map_err(normalize)?;
        debug!(target: "vellum::sqlite", groups = reads.len(), found = out.len(), "Executed reads");
        Ok(out)
    }

    fn execute_writes(&self, batch: &WriteBatch) -> Result<Vec<Envelope>> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        let entry_time = Timestamp::now().max(inner.last_entry_time.next());
        let tx = inner.conn.transaction().map_err(normalize)?;
        tx.execute(
            schema::INSERT_TRANSACTION,
            params![entry_time.to_db(), batch.username, batch.hostname, batch.comment],
        )
        .map_err(normalize)?;
        let transaction_id = tx.last_insert_rowid() as u64;

        let mut new_types = BTreeSet::new();
        let mut stored = Vec::with_capacity(batch.writes.len());
        for write in &batch.writes {
            if !inner.known_types.contains(&write.identity_type) && new_types.insert(write.identity_type.clone()) {
                tx.execute(schema::INSERT_TYPE, params![write.identity_type])
                    .map_err(normalize)?;
            }

            let envelope = Envelope {
                identity_type: write.identity_type.clone(),
                identity_value: write.identity_value.clone(),
                concrete_type: write.concrete_type.clone(),
                contents: write.contents.clone(),
                effective_version: write.effective_version,
                entry_version: write.entry_version,
                effective_time: write.effective_time.min(entry_time),
                entry_time,
                transaction_id,
            };
            tx.execute(
                schema::INSERT_OBJECT,
                params![
                    envelope.identity_type,
                    envelope.identity_value.as_str(),
                    envelope.concrete_type,
                    envelope.contents,
                    envelope.effective_version as i64,
                    envelope.entry_version as i64,
                    envelope.effective_time.to_db(),
                    envelope.entry_time.to_db(),
                    transaction_id as i64
                ],
            )
            .map_err(normalize)?;
            stored.push(envelope);
        }
        tx.commit().map_err(normalize)?;

        inner.last_entry_time = entry_time;
        for name in new_types {
            info!(target: "vellum::sqlite", identity_type = %name, "Provisioned type");
            inner.known_types.insert(name);
        }
        debug!(target: "vellum::sqlite", transaction_id, writes = stored.len(), "Committed batch");
        Ok(stored)
    }

    fn name(&self) -> &str {
        "sqlite"
    }
}

impl std::fmt::Debug for SqliteBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteBackend")
            .field("location", &self.location)
            .field("min_entry_time", &self.min_entry_time)
            .finish()
    }
}
