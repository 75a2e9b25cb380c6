use serde::Deserialize;

use super::*;
use crate::{Credential, LinearError};

const VIEWER_QUERY: &str = "query Viewer { viewer { id name displayName email } }";

#[derive(Debug, Deserialize)]
struct ViewerData {
    viewer: Viewer,
}

impl LinearApiClient {
    /// Get the currently authenticated user.
    pub async fn viewer(&self, credential: &Credential) -> Result<Viewer, LinearError> {
        let data: ViewerData = self
            .graphql(credential, VIEWER_QUERY, serde_json::json!({}))
            .await?;
        Ok(data.viewer)
    }
}
