use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::{typed_input, RemoteTool, Tool, ToolResult};
use crate::error::Result;
use crate::schema::{ChatHistoryEntry, StudentProfile, ToolName};

#[derive(Debug, Deserialize)]
struct ExplainRequest {
    user_info: StudentProfile,
    #[serde(default)]
    chat_history: Vec<ChatHistoryEntry>,
    concept_to_explain: String,
    current_topic: String,
    desired_depth: String,
}

/// Explains one concept at the requested depth.
pub struct ConceptExplainer {
    remote: Option<RemoteTool>,
}

impl ConceptExplainer {
    pub fn new(remote: Option<RemoteTool>) -> Self {
        Self { remote }
    }

    fn synthesize(request: &ExplainRequest) -> Value {
        let mut explanation = format!(
            "Here is a {} explanation of {} in {} for {}.",
            request.desired_depth,
            request.concept_to_explain,
            request.current_topic,
            request.user_info.name
        );
        if !request.chat_history.is_empty() {
            explanation.push_str(" It builds on what we discussed earlier.");
        }

        json!({
            "concept": request.concept_to_explain,
            "depth": request.desired_depth,
            "explanation": explanation,
            "related_concepts": [
                format!("Foundations of {}", request.concept_to_explain),
                format!("{} in {}", request.concept_to_explain, request.current_topic),
            ],
        })
    }
}

#[async_trait::async_trait]
impl Tool for ConceptExplainer {
    fn name(&self) -> ToolName {
        ToolName::ConceptExplainer
    }

    async fn run(&self, arguments: &Map<String, Value>) -> Result<ToolResult> {
        if let Some(remote) = &self.remote {
            return remote.call(self.name(), arguments).await;
        }

        let request: ExplainRequest = typed_input(self.name(), arguments)?;
        log::info!(
            "ConceptExplainer: {} explanation of {}",
            request.desired_depth,
            request.concept_to_explain
        );
        Ok(ToolResult::success(self.name(), Self::synthesize(&request)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::sample_profile;

    #[tokio::test]
    async fn test_explanation_mentions_depth_and_student() {
        let args = json!({
            "user_info": sample_profile(),
            "chat_history": [{ "role": "user", "content": "we did plants" }],
            "concept_to_explain": "photosynthesis",
            "current_topic": "Biology",
            "desired_depth": "basic",
        });
        let result = ConceptExplainer::new(None)
            .run(args.as_object().unwrap())
            .await
            .unwrap();

        let explanation = result.payload["explanation"].as_str().unwrap();
        assert!(explanation.starts_with("Here is a basic explanation of photosynthesis"));
        assert!(explanation.contains("Ada"));
        assert!(explanation.contains("discussed earlier"));
        assert_eq!(result.payload["related_concepts"].as_array().unwrap().len(), 2);
    }
}
