use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Wrapper for GraphQL connection responses.
#[derive(Debug, Clone, Deserialize)]
pub struct NotificationConnection {
    pub nodes: Vec<NotificationNode>,
}

/// A notification from the `notifications` query.
///
/// Fields outside the shared `Notification` interface are only present for
/// the matching concrete type (`IssueNotification`, `ProjectNotification`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationNode {
    #[serde(rename = "__typename", default)]
    pub typename: String,
    pub id: String,
    #[serde(rename = "type")]
    pub notification_type: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub read_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub snoozed_until_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub subtitle: Option<String>,
    #[serde(default)]
    pub actor: Option<NotificationActor>,
    #[serde(default)]
    pub issue: Option<NotificationIssue>,
    #[serde(default)]
    pub comment: Option<NotificationComment>,
    #[serde(default)]
    pub project: Option<NotificationProject>,
}

/// User who triggered the notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationActor {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// Issue referenced by an `IssueNotification`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationIssue {
    pub id: String,
    pub identifier: String,
    pub title: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub state: Option<WorkflowState>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowState {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationComment {
    pub body: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationProject {
    pub name: String,
    #[serde(default)]
    pub url: Option<String>,
}

/// The authenticated user from the `viewer` query.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Viewer {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}
