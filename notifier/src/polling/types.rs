//! Record types flowing through the polling pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Person who caused the record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Actor {
    pub name: String,
    pub avatar_url: Option<String>,
}

/// Issue linked to a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueRef {
    pub identifier: String,
    pub title: String,
    pub status: Option<String>,
}

/// An inbox item as fetched from the remote service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub id: String,
    /// Namespace of the record (`issue`, `project`, `notification`).
    pub source: String,
    /// Provider type tag, e.g. `issueAssignedToYou`.
    pub kind: String,
    pub created_at: DateTime<Utc>,
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub url: Option<String>,
    pub actor: Option<Actor>,
    pub issue: Option<IssueRef>,
    pub comment: Option<String>,
}

impl RawRecord {
    /// Minimal record, mostly for tests and synthetic items.
    pub fn new(id: impl Into<String>, kind: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            source: "notification".into(),
            kind: kind.into(),
            created_at,
            title: None,
            subtitle: None,
            url: None,
            actor: None,
            issue: None,
            comment: None,
        }
    }
}

/// Canonical notification categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    NewIssue,
    IssueAssigned,
    IssueUnassigned,
    StatusChange,
    NewComment,
    Mentioned,
    Notification,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NewIssue => "new_issue",
            Self::IssueAssigned => "issue_assigned",
            Self::IssueUnassigned => "issue_unassigned",
            Self::StatusChange => "status_change",
            Self::NewComment => "new_comment",
            Self::Mentioned => "mentioned",
            Self::Notification => "notification",
        }
    }
}

/// Display-ready notification handed to the sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalNotification {
    /// `<source>-<raw id>`.
    pub id: String,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub title: String,
    pub body: String,
    pub url: String,
    pub timestamp: DateTime<Utc>,
    pub data: Map<String, Value>,
}

impl CanonicalNotification {
    /// Identifier of the originating record, for provider calls.
    pub fn raw_id(&self) -> Option<&str> {
        self.data.get("raw_id").and_then(Value::as_str)
    }
}
