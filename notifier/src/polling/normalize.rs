//! Pure mapping from provider records to canonical notifications.

use serde_json::{Map, Value, json};

use super::types::{CanonicalNotification, NotificationType, RawRecord};

const COMMENT_PREVIEW_CHARS: usize = 200;
const FALLBACK_TITLE: &str = "Linear notification";
const FALLBACK_BODY: &str = "You have a new update in Linear";
const FALLBACK_URL: &str = "https://linear.app/inbox";

/// Map a provider type tag to its canonical category.
pub fn map_type(kind: &str) -> NotificationType {
    match kind {
        "issueCreated" | "issueNew" => NotificationType::NewIssue,
        "issueAssignedToYou" => NotificationType::IssueAssigned,
        "issueUnassignedFromYou" => NotificationType::IssueUnassigned,
        "issueStatusChanged" => NotificationType::StatusChange,
        "issueNewComment" | "issueCommentReply" => NotificationType::NewComment,
        "issueMention" | "issueCommentMention" | "issueDescriptionMention" => {
            NotificationType::Mentioned
        }
        _ => NotificationType::Notification,
    }
}

/// Build the canonical notification for one record.
pub fn normalize(record: &RawRecord) -> CanonicalNotification {
    let notification_type = map_type(&record.kind);

    CanonicalNotification {
        id: format!("{}-{}", record.source, record.id),
        notification_type,
        title: title_for(notification_type, record),
        body: body_for(notification_type, record),
        url: non_empty(record.url.as_deref())
            .unwrap_or(FALLBACK_URL)
            .to_string(),
        timestamp: record.created_at,
        data: data_for(record),
    }
}

fn title_for(kind: NotificationType, record: &RawRecord) -> String {
    let identifier = record
        .issue
        .as_ref()
        .and_then(|i| non_empty(Some(i.identifier.as_str())));
    let raw_title = non_empty(record.title.as_deref());

    let subject = identifier.or(raw_title);
    match (kind, subject) {
        (NotificationType::NewIssue, Some(s)) => format!("New issue {s}"),
        (NotificationType::NewIssue, None) => "New issue".to_string(),
        (NotificationType::IssueAssigned, Some(s)) => format!("Assigned to you: {s}"),
        (NotificationType::IssueAssigned, None) => "Issue assigned to you".to_string(),
        (NotificationType::IssueUnassigned, Some(s)) => format!("Unassigned from you: {s}"),
        (NotificationType::IssueUnassigned, None) => "Issue unassigned from you".to_string(),
        (NotificationType::StatusChange, Some(s)) => format!("Status changed: {s}"),
        (NotificationType::StatusChange, None) => "Issue status changed".to_string(),
        (NotificationType::NewComment, Some(s)) => format!("New comment on {s}"),
        (NotificationType::NewComment, None) => "New comment".to_string(),
        (NotificationType::Mentioned, Some(s)) => format!("Mentioned in {s}"),
        (NotificationType::Mentioned, None) => "You were mentioned".to_string(),
        (NotificationType::Notification, _) => raw_title.unwrap_or(FALLBACK_TITLE).to_string(),
    }
}

fn body_for(kind: NotificationType, record: &RawRecord) -> String {
    let mut body = String::new();

    if let Some(actor) = record.actor.as_ref().and_then(|a| non_empty(Some(a.name.as_str()))) {
        body.push_str(actor);
        body.push_str(": ");
    }

    if kind == NotificationType::StatusChange {
        if let Some(status) = record
            .issue
            .as_ref()
            .and_then(|i| non_empty(i.status.as_deref()))
        {
            body.push('[');
            body.push_str(status);
            body.push_str("] ");
        }
    }

    let comment = match kind {
        NotificationType::NewComment | NotificationType::Mentioned => {
            non_empty(record.comment.as_deref()).map(|c| truncate_chars(c, COMMENT_PREVIEW_CHARS))
        }
        _ => None,
    };
    let detail = comment
        .or_else(|| {
            record
                .issue
                .as_ref()
                .and_then(|i| non_empty(Some(i.title.as_str())))
                .map(str::to_string)
        })
        .or_else(|| non_empty(record.subtitle.as_deref()).map(str::to_string))
        .or_else(|| non_empty(record.title.as_deref()).map(str::to_string))
        .unwrap_or_else(|| FALLBACK_BODY.to_string());

    body.push_str(&detail);
    body
}

fn data_for(record: &RawRecord) -> Map<String, Value> {
    let mut data = Map::new();
    data.insert("raw_id".into(), json!(record.id));
    data.insert("source".into(), json!(record.source));
    data.insert("kind".into(), json!(record.kind));
    if let Some(issue) = &record.issue {
        data.insert("issue_identifier".into(), json!(issue.identifier));
        if let Some(status) = &issue.status {
            data.insert("status".into(), json!(status));
        }
    }
    if let Some(actor) = &record.actor {
        data.insert("actor_name".into(), json!(actor.name));
        if let Some(avatar) = &actor.avatar_url {
            data.insert("avatar_url".into(), json!(avatar));
        }
    }
    data
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max).collect();
    out.push('…');
    out
}
