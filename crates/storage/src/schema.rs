//! Relational layout
//!
//! `objects` holds one row per envelope. The primary key makes a
//! `(effective_version, entry_version)` pair unique per object; the second
//! unique constraint allows one row per object per transaction.

use rusqlite::Connection;

pub(crate) const CREATE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS transactions (
    transaction_id INTEGER PRIMARY KEY AUTOINCREMENT,
    entry_time INTEGER NOT NULL,
    username TEXT NOT NULL,
    hostname TEXT NOT NULL,
    comment TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS transactions_by_entry_time ON transactions (entry_time);

CREATE TABLE IF NOT EXISTS object_types (
    type_name TEXT PRIMARY KEY
);

CREATE TABLE IF NOT EXISTS objects (
    identity_type TEXT NOT NULL,
    identity_value TEXT NOT NULL,
    concrete_type TEXT NOT NULL,
    contents TEXT NOT NULL,
    effective_version INTEGER NOT NULL,
    entry_version INTEGER NOT NULL,
    effective_time INTEGER NOT NULL,
    entry_time INTEGER NOT NULL,
    transaction_id INTEGER NOT NULL REFERENCES transactions (transaction_id),
    PRIMARY KEY (identity_type, identity_value, effective_version, entry_version),
    UNIQUE (transaction_id, identity_type, identity_value)
);

CREATE INDEX IF NOT EXISTS objects_by_time
    ON objects (identity_type, identity_value, effective_time DESC, entry_time DESC);
"#;

/// Latest admitted envelope per identity value of one read group
///
/// Parameters: identity type, effective-time bound, entry-time bound, and a
/// JSON array of identity values.
pub(crate) const SELECT_LATEST: &str = r#"
SELECT identity_type, identity_value, concrete_type, contents,
       effective_version, entry_version, effective_time, entry_time, transaction_id
FROM (
    SELECT o.*,
           rank() OVER (
               PARTITION BY o.identity_type, o.identity_value
               ORDER BY o.effective_time DESC, o.entry_time DESC, o.transaction_id DESC
           ) AS rnk
    FROM objects o
    WHERE o.identity_type = ?1
      AND o.effective_time <= ?2
      AND o.entry_time <= ?3
      AND o.identity_value IN (SELECT value FROM json_each(?4))
)
WHERE rnk = 1
"#;

pub(crate) const INSERT_TRANSACTION: &str =
    "INSERT INTO transactions (entry_time, username, hostname, comment) VALUES (?1, ?2, ?3, ?4)";

pub(crate) const INSERT_TYPE: &str = "INSERT OR IGNORE INTO object_types (type_name) VALUES (?1)";

pub(crate) const INSERT_OBJECT: &str = r#"
INSERT INTO objects (
    identity_type, identity_value, concrete_type, contents,
    effective_version, entry_version, effective_time, entry_time, transaction_id
) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
"#;

pub(crate) fn create(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(CREATE_SCHEMA)
}
