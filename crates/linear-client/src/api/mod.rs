//! Linear GraphQL API client.
//!
//! Provides typed access to the notification inbox with automatic
//! `Authorization` header injection and error classification for
//! HTTP- and GraphQL-level failures.

mod notifications;
mod request;
mod viewer;

pub mod models;

pub use notifications::MAX_NOTIFICATIONS_PER_PAGE;
pub use models::{
    NotificationActor, NotificationComment, NotificationConnection, NotificationIssue,
    NotificationNode, NotificationProject, Viewer, WorkflowState,
};

const GRAPHQL_URL: &str = "https://api.linear.app/graphql";

/// Linear GraphQL API client.
pub struct LinearApiClient {
    pub(super) http: reqwest::Client,
    pub(super) endpoint: String,
}
