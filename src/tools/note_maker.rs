use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::{typed_input, RemoteTool, Tool, ToolResult};
use crate::error::Result;
use crate::schema::{StudentProfile, ToolName};

#[derive(Debug, Deserialize)]
struct NoteRequest {
    user_info: StudentProfile,
    topic: String,
    subject: String,
    note_taking_style: String,
    #[serde(default = "super::default_true")]
    include_examples: bool,
    #[serde(default)]
    include_analogies: bool,
}

/// Produces notes on a topic; stub content unless a remote service is configured.
pub struct NoteMaker {
    remote: Option<RemoteTool>,
}

impl NoteMaker {
    pub fn new(remote: Option<RemoteTool>) -> Self {
        Self { remote }
    }

    fn synthesize(request: &NoteRequest) -> Value {
        let style = request.note_taking_style.replace('_', " ");
        let mut sections = vec![json!({
            "title": "Key Ideas",
            "content": format!(
                "The central ideas of {} and how they fit into {}.",
                request.topic, request.subject
            ),
        })];
        if request.include_examples {
            sections.push(json!({
                "title": "Examples",
                "content": format!("Worked examples that show {} in practice.", request.topic),
            }));
        }
        if request.include_analogies {
            sections.push(json!({
                "title": "Analogies",
                "content": format!("Everyday comparisons that make {} easier to picture.", request.topic),
            }));
        }

        json!({
            "title": format!("Notes on {}", request.topic),
            "summary": format!(
                "These are {} notes about {} in {}, prepared for {}.",
                style, request.topic, request.subject, request.user_info.name
            ),
            "note_taking_style": request.note_taking_style,
            "note_sections": sections,
        })
    }
}

#[async_trait::async_trait]
impl Tool for NoteMaker {
    fn name(&self) -> ToolName {
        ToolName::NoteMaker
    }

    async fn run(&self, arguments: &Map<String, Value>) -> Result<ToolResult> {
        if let Some(remote) = &self.remote {
            return remote.call(self.name(), arguments).await;
        }

        let request: NoteRequest = typed_input(self.name(), arguments)?;
        log::info!("NoteMaker: writing {} notes on {}", request.note_taking_style, request.topic);
        Ok(ToolResult::success(self.name(), Self::synthesize(&request)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::sample_profile;

    fn arguments(include_analogies: bool) -> Map<String, Value> {
        let value = json!({
            "user_info": sample_profile(),
            "chat_history": [],
            "topic": "causes of World War II",
            "subject": "History",
            "note_taking_style": "outline",
            "include_examples": true,
            "include_analogies": include_analogies,
        });
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_sections_follow_flags() {
        let result = NoteMaker::new(None).run(&arguments(true)).await.unwrap();
        assert!(result.is_success());
        assert_eq!(result.payload["title"], "Notes on causes of World War II");
        let titles: Vec<_> = result.payload["note_sections"]
            .as_array()
            .unwrap()
            .iter()
            .map(|s| s["title"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(titles, vec!["Key Ideas", "Examples", "Analogies"]);

        let result = NoteMaker::new(None).run(&arguments(false)).await.unwrap();
        assert_eq!(result.payload["note_sections"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_summary_names_the_student() {
        let result = NoteMaker::new(None).run(&arguments(false)).await.unwrap();
        let summary = result.payload["summary"].as_str().unwrap();
        assert!(summary.contains("outline notes"));
        assert!(summary.contains("Ada"));
    }
}
