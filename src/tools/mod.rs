pub mod concept_explainer;
pub mod flashcards;
pub mod note_maker;
pub mod remote;

pub use concept_explainer::ConceptExplainer;
pub use flashcards::FlashcardGenerator;
pub use note_maker::NoteMaker;
pub use remote::RemoteTool;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, TutorError};
use crate::schema::ToolName;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolStatus {
    Success,
    Failure,
}

/// Structured output of one collaborator call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolResult {
    pub tool: ToolName,
    pub status: ToolStatus,
    pub payload: Map<String, Value>,
}

impl ToolResult {
    pub fn success(tool: ToolName, payload: Value) -> Self {
        let payload = match payload {
            Value::Object(map) => map,
            other => {
                let mut map = Map::new();
                map.insert("content".to_string(), other);
                map
            }
        };
        Self { tool, status: ToolStatus::Success, payload }
    }

    /// Parse a collaborator body of the form `{"status": "success"|"failure", ...}`.
    pub fn from_response(tool: ToolName, body: Value) -> Result<Self> {
        let Value::Object(mut payload) = body else {
            return Err(TutorError::execution(format!("{} returned a non-object body", tool)));
        };
        let status = payload
            .remove("status")
            .and_then(|s| serde_json::from_value::<ToolStatus>(s).ok())
            .ok_or_else(|| {
                TutorError::execution(format!("{} returned no valid status", tool))
            })?;
        Ok(Self { tool, status, payload })
    }

    pub fn is_success(&self) -> bool {
        self.status == ToolStatus::Success
    }
}

/// A tool collaborator reachable through the fixed `(arguments) -> ToolResult` contract.
///
/// Dispatch happens by matching on [`ToolName`] in the invoker, so the set of
/// tools is closed; there is no runtime registration.
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> ToolName;
    async fn run(&self, arguments: &Map<String, Value>) -> Result<ToolResult>;
}

fn default_true() -> bool {
    true
}

/// Typed view of validated arguments for the in-process stubs.
fn typed_input<T: DeserializeOwned>(tool: ToolName, arguments: &Map<String, Value>) -> Result<T> {
    serde_json::from_value(Value::Object(arguments.clone()))
        .map_err(|e| TutorError::execution(format!("{} rejected its arguments: {}", tool, e)))
}
