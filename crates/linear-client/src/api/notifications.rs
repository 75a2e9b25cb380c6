use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;

use super::*;
use crate::{Credential, LinearError};

/// Upper bound on notifications fetched per request.
pub const MAX_NOTIFICATIONS_PER_PAGE: u32 = 50;

const NOTIFICATIONS_QUERY: &str = r#"
query Notifications($since: DateTimeOrDuration!, $first: Int!) {
  notifications(first: $first, filter: { createdAt: { gt: $since } }) {
    nodes {
      __typename
      id
      type
      createdAt
      readAt
      snoozedUntilAt
      url
      title
      subtitle
      actor { id name displayName avatarUrl }
      ... on IssueNotification {
        issue { id identifier title url state { name } }
        comment { body }
      }
      ... on ProjectNotification {
        project { name url }
      }
    }
  }
}
"#;

const MARK_READ_MUTATION: &str = r#"
mutation MarkRead($id: String!, $readAt: DateTime!) {
  notificationUpdate(id: $id, input: { readAt: $readAt }) { success }
}
"#;

const SNOOZE_MUTATION: &str = r#"
mutation Snooze($id: String!, $until: DateTime!) {
  notificationUpdate(id: $id, input: { snoozedUntilAt: $until }) { success }
}
"#;

#[derive(Debug, Deserialize)]
struct NotificationsData {
    notifications: NotificationConnection,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateData {
    notification_update: MutationResult,
}

#[derive(Debug, Deserialize)]
struct MutationResult {
    success: bool,
}

impl LinearApiClient {
    /// Get notifications created strictly after `since`, newest first.
    pub async fn notifications_since(
        &self,
        credential: &Credential,
        since: DateTime<Utc>,
        first: u32,
    ) -> Result<Vec<NotificationNode>, LinearError> {
        let first = first.clamp(1, MAX_NOTIFICATIONS_PER_PAGE);
        let variables = serde_json::json!({
            "since": since.to_rfc3339_opts(SecondsFormat::Millis, true),
            "first": first,
        });
        let data: NotificationsData = self
            .graphql(credential, NOTIFICATIONS_QUERY, variables)
            .await?;
        tracing::debug!(count = data.notifications.nodes.len(), "Fetched notifications");
        Ok(data.notifications.nodes)
    }

    /// Mark a notification as read at the given time.
    pub async fn mark_notification_read(
        &self,
        credential: &Credential,
        id: &str,
        read_at: DateTime<Utc>,
    ) -> Result<(), LinearError> {
        let variables = serde_json::json!({
            "id": id,
            "readAt": read_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        });
        let data: UpdateData = self
            .graphql(credential, MARK_READ_MUTATION, variables)
            .await?;
        ensure_success(data, "notificationUpdate(readAt)")
    }

    /// Snooze a notification until the given time.
    pub async fn snooze_notification(
        &self,
        credential: &Credential,
        id: &str,
        until: DateTime<Utc>,
    ) -> Result<(), LinearError> {
        let variables = serde_json::json!({
            "id": id,
            "until": until.to_rfc3339_opts(SecondsFormat::Millis, true),
        });
        let data: UpdateData = self.graphql(credential, SNOOZE_MUTATION, variables).await?;
        ensure_success(data, "notificationUpdate(snoozedUntilAt)")
    }
}

fn ensure_success(data: UpdateData, operation: &str) -> Result<(), LinearError> {
    if data.notification_update.success {
        Ok(())
    } else {
        Err(LinearError::GraphQl {
            code: "MUTATION_FAILED".into(),
            message: format!("{operation} reported success=false"),
        })
    }
}
