use serde_json::{Map, Value};
use std::time::Duration;

use super::ToolResult;
use crate::error::{Result, TutorError};
use crate::schema::ToolName;

/// A collaborator served over HTTP: arguments are POSTed as JSON and the
/// reply is a `{status, ...payload}` object.
pub struct RemoteTool {
    url: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl RemoteTool {
    pub fn new(url: String, timeout: Duration) -> Self {
        Self {
            url,
            timeout,
            client: reqwest::Client::new(),
        }
    }

    pub async fn call(&self, tool: ToolName, arguments: &Map<String, Value>) -> Result<ToolResult> {
        log::info!("RemoteTool: calling {} at {}", tool, self.url);

        let response = self
            .client
            .post(&self.url)
            .timeout(self.timeout)
            .json(arguments)
            .send()
            .await
            .map_err(|e| TutorError::unavailable(format!("{}: {}", tool, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            log::error!("RemoteTool: {} returned {}: {}", tool, status, body);
            return Err(TutorError::execution(format!("{} returned HTTP {}", tool, status)));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| TutorError::execution(format!("{} sent an unreadable body: {}", tool, e)))?;

        let result = ToolResult::from_response(tool, body)?;
        if !result.is_success() {
            log::warn!("RemoteTool: {} reported failure: {:?}", tool, result.payload);
        }
        Ok(result)
    }
}
