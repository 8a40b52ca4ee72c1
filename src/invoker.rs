use std::time::Duration;

use crate::config::ToolsConfig;
use crate::error::{Result, TutorError};
use crate::orchestrator::ToolCallIntent;
use crate::schema::ToolName;
use crate::tools::{ConceptExplainer, FlashcardGenerator, NoteMaker, RemoteTool, Tool, ToolResult};

/// Dispatches a validated intent to its collaborator. Never retries.
pub struct ToolInvoker {
    note_maker: NoteMaker,
    flashcards: FlashcardGenerator,
    explainer: ConceptExplainer,
    timeout: Duration,
}

impl ToolInvoker {
    pub fn new(config: &ToolsConfig) -> Self {
        let remote = |url: &Option<String>| {
            url.as_ref()
                .map(|url| RemoteTool::new(url.clone(), config.timeout()))
        };

        Self {
            note_maker: NoteMaker::new(remote(&config.note_maker_url)),
            flashcards: FlashcardGenerator::new(remote(&config.flashcard_generator_url)),
            explainer: ConceptExplainer::new(remote(&config.concept_explainer_url)),
            timeout: config.timeout(),
        }
    }

    pub async fn invoke(&self, intent: &ToolCallIntent) -> Result<ToolResult> {
        let tool: &dyn Tool = match intent.tool() {
            ToolName::NoteMaker => &self.note_maker,
            ToolName::FlashcardGenerator => &self.flashcards,
            ToolName::ConceptExplainer => &self.explainer,
        };

        log::info!("Invoker: dispatching to {}", tool.name());
        let result = tokio::time::timeout(self.timeout, tool.run(intent.arguments()))
            .await
            .map_err(|_| {
                TutorError::unavailable(format!(
                    "{} did not answer within {}s",
                    tool.name(),
                    self.timeout.as_secs()
                ))
            })??;

        if result.tool != intent.tool() {
            return Err(TutorError::execution(format!(
                "{} answered for {}",
                tool.name(),
                result.tool
            )));
        }
        Ok(result)
    }
}
