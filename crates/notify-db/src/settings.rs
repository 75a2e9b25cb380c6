//! Settings key-value store.

use std::collections::HashMap;

use chrono::Utc;
use rusqlite::params;

use crate::{Database, DbError, OptionalExt};

/// Secret values are masked by the control API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingKind {
    Normal,
    Secret,
}

impl SettingKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Secret => "secret",
        }
    }
}

impl Database {
    pub fn get_setting(&self, key: &str) -> Result<Option<String>, DbError> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row("SELECT value FROM settings WHERE key = ?1", [key], |row| {
                    row.get(0)
                })
                .optional()?)
        })
    }

    /// Insert or overwrite one setting.
    pub fn set_setting(&self, key: &str, value: &str, kind: SettingKind) -> Result<(), DbError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO settings (key, value, kind, updated_at) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, kind = excluded.kind,
                     updated_at = excluded.updated_at",
                params![key, value, kind.as_str(), Utc::now().timestamp()],
            )?;
            Ok(())
        })
    }

    /// Store each value whose key is not present yet. Returns how many were
    /// inserted.
    pub fn insert_missing_settings<'a>(
        &self,
        entries: impl IntoIterator<Item = (&'a str, &'a str, SettingKind)>,
    ) -> Result<usize, DbError> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let now = Utc::now().timestamp();
            let mut inserted = 0;
            {
                let mut stmt = tx.prepare(
                    "INSERT OR IGNORE INTO settings (key, value, kind, updated_at)
                     VALUES (?1, ?2, ?3, ?4)",
                )?;
                for (key, value, kind) in entries {
                    inserted += stmt.execute(params![key, value, kind.as_str(), now])?;
                }
            }
            tx.commit()?;
            Ok(inserted)
        })
    }

    pub fn get_all_settings(&self) -> Result<HashMap<String, String>, DbError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT key, value FROM settings")?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?;
            Ok(rows.collect::<Result<HashMap<_, _>, rusqlite::Error>>()?)
        })
    }

    pub fn delete_setting(&self, key: &str) -> Result<(), DbError> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM settings WHERE key = ?1", [key])?;
            Ok(())
        })
    }
}
