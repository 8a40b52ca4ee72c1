use std::fmt;
use std::sync::Arc;

use crate::config::{Config, ReasoningProvider};
use crate::error::{Result, TutorError};
use crate::invoker::ToolInvoker;
use crate::ollama::OllamaClient;
use crate::orchestrator::Orchestrator;
use crate::reasoning::{LlmReasoner, ReasoningService, RuleBasedReasoner};
use crate::renderer::{LlmNarrator, Narrator, ResponseRenderer};
use crate::schema::{ChatHistoryEntry, StudentProfile};

/// Where a request is in its one-way trip through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    ReceivedQuery,
    Selected,
    BoundAndValidated,
    Invoked,
    Rendered,
    Returned,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::ReceivedQuery => "received",
            Stage::Selected => "selected",
            Stage::BoundAndValidated => "bound",
            Stage::Invoked => "invoked",
            Stage::Rendered => "rendered",
            Stage::Returned => "returned",
        };
        f.write_str(name)
    }
}

/// Query -> intent -> tool result -> reply, one request at a time.
pub struct TutorPipeline {
    orchestrator: Orchestrator,
    invoker: ToolInvoker,
    renderer: ResponseRenderer,
}

impl TutorPipeline {
    pub fn new(orchestrator: Orchestrator, invoker: ToolInvoker, renderer: ResponseRenderer) -> Self {
        Self { orchestrator, invoker, renderer }
    }

    pub fn from_config(config: &Config) -> Self {
        let reasoning = &config.reasoning;
        let client = || {
            OllamaClient::new(
                reasoning.endpoint.clone(),
                reasoning.model.clone(),
                reasoning.api_key.clone(),
                reasoning.timeout(),
            )
        };

        let reasoner: Arc<dyn ReasoningService> = match reasoning.provider {
            ReasoningProvider::Ollama => Arc::new(LlmReasoner::new(
                client(),
                reasoning.temperature,
                reasoning.top_p,
            )),
            ReasoningProvider::Rules => Arc::new(RuleBasedReasoner::new()),
        };

        let narrator: Option<Box<dyn Narrator>> =
            if config.renderer.narration && reasoning.provider == ReasoningProvider::Ollama {
                Some(Box::new(LlmNarrator::new(
                    client(),
                    config.renderer.temperature,
                    config.renderer.top_p,
                )))
            } else {
                None
            };

        Self::new(
            Orchestrator::new(reasoner, reasoning.timeout()),
            ToolInvoker::new(&config.tools),
            ResponseRenderer::new(narrator),
        )
    }

    pub fn reasoner_name(&self) -> &str {
        self.orchestrator.reasoner_name()
    }

    pub async fn handle(
        &self,
        query: &str,
        profile: &StudentProfile,
        history: &[ChatHistoryEntry],
    ) -> Result<String> {
        let request_id = uuid::Uuid::new_v4();
        log::info!("[{}] {}: {:?} from {}", request_id, Stage::ReceivedQuery, query, profile.user_id);

        match self.run(request_id, query, profile, history).await {
            Ok(reply) => {
                log::info!("[{}] {} ({} chars)", request_id, Stage::Returned, reply.len());
                Ok(reply)
            }
            Err(e) if e.is_client_error() => {
                log::warn!("[{}] rejected ({}): {}", request_id, e.kind(), e);
                Err(e)
            }
            Err(e) => {
                log::error!("[{}] failed ({}): {}", request_id, e.kind(), e);
                Err(e)
            }
        }
    }

    async fn run(
        &self,
        request_id: uuid::Uuid,
        query: &str,
        profile: &StudentProfile,
        history: &[ChatHistoryEntry],
    ) -> Result<String> {
        let intent = self.orchestrator.select_and_bind(query, profile, history).await?;
        log::info!(
            "[{}] {} + {}: {}",
            request_id,
            Stage::Selected,
            Stage::BoundAndValidated,
            intent.tool()
        );

        let result = self.invoker.invoke(&intent).await?;
        log::info!("[{}] {}: status {:?}", request_id, Stage::Invoked, result.status);

        let reply = self.renderer.render(&result, profile).await;
        log::info!("[{}] {}", request_id, Stage::Rendered);
        Ok(reply)
    }
}

/// What the student sees when a request fails; internal details stay in the log.
pub fn user_message(err: &TutorError) -> String {
    match err {
        TutorError::SchemaValidation { fields, .. } => format!(
            "I couldn't work out everything I need for that request (missing or invalid: {}). \
             Could you add a bit more detail?",
            fields.join(", ")
        ),
        TutorError::ReasoningParse(_) | TutorError::NotFound(_) => {
            "I had trouble understanding that request. Could you rephrase it?".to_string()
        }
        _ => crate::renderer::APOLOGY.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ToolsConfig;
    use crate::reasoning::ReasoningRequest;
    use crate::schema::sample_profile;
    use std::time::Duration;

    fn offline() -> TutorPipeline {
        TutorPipeline::new(
            Orchestrator::new(Arc::new(RuleBasedReasoner::new()), Duration::from_secs(5)),
            ToolInvoker::new(&ToolsConfig::default()),
            ResponseRenderer::new(None),
        )
    }

    /// Answers with prose instead of a JSON envelope.
    struct Garbage;

    #[async_trait::async_trait]
    impl ReasoningService for Garbage {
        fn name(&self) -> &str {
            "garbage"
        }

        async fn select_tool(&self, _: &ReasoningRequest<'_>) -> Result<String> {
            Ok("tool_name: NoteMaker".to_string())
        }
    }

    #[tokio::test]
    async fn test_end_to_end_flashcards() {
        let reply = offline()
            .handle("Make 5 flashcards on the human heart", &sample_profile(), &[])
            .await
            .unwrap();
        assert!(reply.contains("Ada"));
        assert!(reply.contains("## Flashcards: human heart (medium)"));
        assert!(reply.contains("**Card 5**"));
        assert!(!reply.contains("**Card 6**"));
    }

    #[tokio::test]
    async fn test_end_to_end_outline_notes() {
        let reply = offline()
            .handle(
                "Can you make me some outline-style notes on the causes of World War II, with analogies",
                &sample_profile(),
                &[],
            )
            .await
            .unwrap();
        assert!(reply.contains("## Notes on causes of World War II"));
        assert!(reply.contains("outline notes"));
        assert!(reply.contains("### Analogies"));
    }

    #[tokio::test]
    async fn test_parse_failure_never_reaches_tools() {
        let config = ToolsConfig {
            note_maker_url: Some("http://127.0.0.1:9/never".to_string()),
            ..ToolsConfig::default()
        };
        let pipeline = TutorPipeline::new(
            Orchestrator::new(Arc::new(Garbage), Duration::from_secs(5)),
            ToolInvoker::new(&config),
            ResponseRenderer::new(None),
        );
        let err = pipeline
            .handle("notes on volcanoes", &sample_profile(), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, TutorError::ReasoningParse(_)));
    }

    #[test]
    fn test_user_message_hides_internals() {
        let msg = user_message(&TutorError::execution("stack trace at line 42"));
        assert_eq!(msg, crate::renderer::APOLOGY);

        let msg = user_message(&TutorError::SchemaValidation {
            tool: "ConceptExplainer".to_string(),
            fields: vec!["concept_to_explain".to_string()],
        });
        assert!(msg.contains("concept_to_explain"));
    }

    #[test]
    fn test_from_config_uses_rules_without_narration() {
        let config = Config::from_toml(
            r#"
            [server]
            host = "127.0.0.1"
            port = 0

            [reasoning]
            provider = "rules"
            model = ""
            endpoint = ""

            [renderer]
            narration = true
            temperature = 0.7
            top_p = 0.9
            "#,
        )
        .unwrap();
        let pipeline = TutorPipeline::from_config(&config);
        assert_eq!(pipeline.reasoner_name(), "rules");
        assert!(!pipeline.renderer.has_narrator());
    }
}
