//! Versioned schema migrations tracked through `PRAGMA user_version`.

use rusqlite::Connection;

use crate::DbError;

/// Each entry upgrades the schema by one version, starting from 0.
const MIGRATIONS: &[&str] = &[
    // v1: settings and OAuth tokens
    r#"
    CREATE TABLE IF NOT EXISTS settings (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL,
        kind TEXT NOT NULL DEFAULT 'normal',
        updated_at INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS tokens (
        id INTEGER PRIMARY KEY,
        access_token TEXT NOT NULL,
        refresh_token TEXT NOT NULL DEFAULT '',
        scope TEXT NOT NULL DEFAULT '',
        expires_at INTEGER NOT NULL
    );
    "#,
    // v2: remember when each token was stored
    "ALTER TABLE tokens ADD COLUMN saved_at INTEGER NOT NULL DEFAULT 0;",
];

pub const SCHEMA_VERSION: u32 = MIGRATIONS.len() as u32;

pub fn current_version(conn: &Connection) -> Result<u32, DbError> {
    Ok(conn.query_row("PRAGMA user_version", [], |row| row.get(0))?)
}

/// Apply every pending migration, each in its own transaction.
pub fn run_migrations(conn: &mut Connection) -> Result<(), DbError> {
    let found = current_version(conn)?;
    if found > SCHEMA_VERSION {
        return Err(DbError::SchemaTooNew {
            found,
            supported: SCHEMA_VERSION,
        });
    }

    for (index, sql) in MIGRATIONS.iter().enumerate().skip(found as usize) {
        let version = index as u32 + 1;
        let tx = conn.transaction()?;
        tx.execute_batch(sql)?;
        tx.pragma_update(None, "user_version", version)?;
        tx.commit()?;
        tracing::info!(version, "Applied database migration");
    }
    Ok(())
}
