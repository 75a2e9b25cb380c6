//! Contract between the polling core and the remote data source.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::types::RawRecord;

/// Failure reported by an [`UpdateProvider`].
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("malformed response: {0}")]
    Malformed(String),
}

impl ProviderError {
    /// Whether polling should stop until credentials change.
    ///
    /// Explicit `Auth` errors qualify, as does any error whose text reads
    /// like a rejected credential.
    pub fn is_auth_failure(&self) -> bool {
        match self {
            Self::Auth(_) => true,
            Self::Transport(msg) | Self::Malformed(msg) => linear_client::is_auth_message(msg),
        }
    }
}

/// Remote source of inbox records.
#[async_trait]
pub trait UpdateProvider: Send + Sync {
    /// True iff a non-expired credential is configured.
    fn is_authenticated(&self) -> bool;

    /// Records created after the provider's watermark. Advances the
    /// watermark on success.
    async fn get_updates(&self) -> Result<Vec<RawRecord>, ProviderError>;

    async fn mark_as_read(&self, id: &str) -> Result<(), ProviderError>;

    async fn snooze(&self, id: &str, until: DateTime<Utc>) -> Result<(), ProviderError>;
}
