use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::{typed_input, RemoteTool, Tool, ToolResult};
use crate::error::Result;
use crate::schema::ToolName;

#[derive(Debug, Deserialize)]
struct FlashcardRequest {
    topic: String,
    count: usize,
    difficulty: String,
    subject: String,
    #[serde(default = "super::default_true")]
    include_examples: bool,
}

/// Produces `count` question/answer cards for memorization.
pub struct FlashcardGenerator {
    remote: Option<RemoteTool>,
}

impl FlashcardGenerator {
    pub fn new(remote: Option<RemoteTool>) -> Self {
        Self { remote }
    }

    fn synthesize(request: &FlashcardRequest) -> Value {
        let cards: Vec<Value> = (1..=request.count)
            .map(|i| {
                let mut card = json!({
                    "question": format!("{}. What is a key aspect of {}?", i, request.topic),
                    "answer": format!(
                        "A {} answer about {} in {}.",
                        request.difficulty, request.topic, request.subject
                    ),
                });
                if request.include_examples {
                    card["example"] = json!(format!("An example involving {}.", request.topic));
                }
                card
            })
            .collect();

        json!({
            "topic": request.topic,
            "difficulty": request.difficulty,
            "flashcards": cards,
        })
    }
}

#[async_trait::async_trait]
impl Tool for FlashcardGenerator {
    fn name(&self) -> ToolName {
        ToolName::FlashcardGenerator
    }

    async fn run(&self, arguments: &Map<String, Value>) -> Result<ToolResult> {
        if let Some(remote) = &self.remote {
            return remote.call(self.name(), arguments).await;
        }

        let request: FlashcardRequest = typed_input(self.name(), arguments)?;
        log::info!(
            "FlashcardGenerator: {} {} cards on {}",
            request.count,
            request.difficulty,
            request.topic
        );
        Ok(ToolResult::success(self.name(), Self::synthesize(&request)))
    }
}
