//! OAuth token storage. Only the newest row is ever used.

use chrono::Utc;
use rusqlite::params;
use serde::{Deserialize, Serialize};

use crate::{Database, DbError, OptionalExt};

/// Rows kept after each save, newest first.
const TOKEN_HISTORY: i64 = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredToken {
    pub access_token: String,
    pub refresh_token: String,
    pub scope: String,
    /// Unix seconds.
    pub expires_at: i64,
    /// Unix seconds. Assigned by [`Database::save_token`]; ignored on input.
    #[serde(default)]
    pub saved_at: i64,
}

impl Database {
    pub fn save_token(&self, token: &StoredToken) -> Result<(), DbError> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO tokens (access_token, refresh_token, scope, expires_at, saved_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    token.access_token,
                    token.refresh_token,
                    token.scope,
                    token.expires_at,
                    Utc::now().timestamp()
                ],
            )?;
            let pruned = tx.execute(
                "DELETE FROM tokens WHERE id NOT IN (SELECT id FROM tokens ORDER BY id DESC LIMIT ?1)",
                [TOKEN_HISTORY],
            )?;
            tx.commit()?;
            if pruned > 0 {
                tracing::debug!(pruned, "Pruned old token rows");
            }
            Ok(())
        })
    }

    pub fn get_latest_token(&self) -> Result<Option<StoredToken>, DbError> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT access_token, refresh_token, scope, expires_at, saved_at
                     FROM tokens ORDER BY id DESC LIMIT 1",
                    [],
                    |row| {
                        Ok(StoredToken {
                            access_token: row.get(0)?,
                            refresh_token: row.get(1)?,
                            scope: row.get(2)?,
                            expires_at: row.get(3)?,
                            saved_at: row.get(4)?,
                        })
                    },
                )
                .optional()?)
        })
    }

    /// Forget every stored token (logout).
    pub fn delete_all_tokens(&self) -> Result<usize, DbError> {
        self.with_conn(|conn| Ok(conn.execute("DELETE FROM tokens", [])?))
    }
}
