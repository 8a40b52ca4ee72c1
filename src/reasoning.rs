//! Reasoning services: pick a tool and draft its arguments.
//!
//! A service only has to return text containing one JSON envelope
//! `{"tool_name": ..., "tool_input": {...}}`. Whatever it returns goes
//! through [`parse_envelope`] and the orchestrator's validation, so a model
//! and the offline rule set are held to the same contract.

use serde_json::{json, Map, Value};

use crate::error::{Result, TutorError};
use crate::ollama::{ChatRequest, OllamaClient};
use crate::schema::{ChatHistoryEntry, StudentProfile, ToolName, ToolSchema};
use crate::signals::{classify_intent, QuerySignals};

/// Everything a reasoning service sees for one request.
pub struct ReasoningRequest<'a> {
    pub tools: &'a [ToolSchema],
    pub profile: &'a StudentProfile,
    pub query: &'a str,
    pub history: &'a [ChatHistoryEntry],
}

#[async_trait::async_trait]
pub trait ReasoningService: Send + Sync {
    fn name(&self) -> &str;

    /// Raw service output; expected to hold exactly one JSON envelope.
    async fn select_tool(&self, request: &ReasoningRequest<'_>) -> Result<String>;
}

/// The parsed `{tool_name, tool_input}` envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolEnvelope {
    pub tool_name: String,
    pub tool_input: Map<String, Value>,
}

/// Parse the outermost `{...}` of `raw` as a tool envelope.
///
/// Any text outside the braces (markdown fences, stray whitespace) is
/// ignored, but the braces themselves must hold one complete JSON object.
pub fn parse_envelope(raw: &str) -> Result<ToolEnvelope> {
    let start = raw
        .find('{')
        .ok_or_else(|| TutorError::parse("no JSON object in reasoning output"))?;
    let end = raw
        .rfind('}')
        .filter(|end| *end > start)
        .ok_or_else(|| TutorError::parse("unterminated JSON object in reasoning output"))?;

    let value: Value = serde_json::from_str(&raw[start..=end])
        .map_err(|e| TutorError::parse(format!("invalid JSON: {}", e)))?;

    let Value::Object(mut envelope) = value else {
        return Err(TutorError::parse("envelope is not a JSON object"));
    };

    let tool_name = match envelope.remove("tool_name") {
        Some(Value::String(name)) if !name.trim().is_empty() => name,
        _ => return Err(TutorError::parse("missing string field 'tool_name'")),
    };
    let tool_input = match envelope.remove("tool_input") {
        Some(Value::Object(input)) => input,
        _ => return Err(TutorError::parse("missing object field 'tool_input'")),
    };

    if !envelope.is_empty() {
        log::debug!(
            "Reasoning: ignoring extra envelope keys: {:?}",
            envelope.keys().collect::<Vec<_>>()
        );
    }

    Ok(ToolEnvelope { tool_name, tool_input })
}

/// Reasoning backed by a language model.
pub struct LlmReasoner {
    ollama: OllamaClient,
    temperature: f32,
    top_p: f32,
}

impl LlmReasoner {
    pub fn new(ollama: OllamaClient, temperature: f32, top_p: f32) -> Self {
        Self { ollama, temperature, top_p }
    }

    fn system_prompt(tools: &[ToolSchema]) -> String {
        let mut prompt = String::from(
            r#"You are an intelligent middleware orchestrator for an AI tutoring system.
Your task is to analyze a student's query and profile, select the single most appropriate
educational tool, and produce the JSON arguments for calling it.

## AVAILABLE TOOLS
"#,
        );

        for (i, tool) in tools.iter().enumerate() {
            prompt.push_str(&format!(
                "\n### {}. {}\n{}\nSchema:\n{}\n",
                i + 1,
                tool.name,
                tool.description,
                serde_json::to_string_pretty(&tool.to_json()["parameters"])
                    .unwrap_or_default()
            ));
        }

        prompt.push_str(
            r#"
## INSTRUCTIONS
1. Work out what the student wants: notes, practice material, or an explanation.
2. Select exactly one tool by its name above.
3. Extract every parameter the query states (topic, subject, count, style, difficulty, depth).
4. Infer missing parameters from the profile. A struggling or confused student gets
   difficulty "easy" or desired_depth "basic"; a curious or confident student gets
   "medium"/"intermediate" or higher.
5. Respond with a single JSON object with two keys:
   - "tool_name": the selected tool name
   - "tool_input": the arguments object for that tool
6. Your output must be only the JSON object, starting with { and ending with }.
   Do not include any other text or markdown formatting."#,
        );

        prompt
    }

    fn user_prompt(request: &ReasoningRequest<'_>) -> String {
        let profile = serde_json::to_string_pretty(request.profile).unwrap_or_default();
        let mut prompt = format!(
            "Student profile:\n{}\n\nStudent query: \"{}\"\n",
            profile, request.query
        );
        if !request.history.is_empty() {
            let history = serde_json::to_string_pretty(request.history).unwrap_or_default();
            prompt.push_str(&format!("\nChat history (oldest first):\n{}\n", history));
        }
        prompt
    }
}

#[async_trait::async_trait]
impl ReasoningService for LlmReasoner {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn select_tool(&self, request: &ReasoningRequest<'_>) -> Result<String> {
        log::info!("Reasoner: asking {} to select a tool", self.ollama.model);

        let output = self
            .ollama
            .chat(ChatRequest {
                system_prompt: Self::system_prompt(request.tools),
                user_prompt: Self::user_prompt(request),
                temperature: self.temperature,
                top_p: self.top_p,
                json_format: true,
            })
            .await?;

        log::debug!("Reasoner: raw output: {}", output);
        Ok(output)
    }
}

/// Offline reasoning from lexical cues.
///
/// Only explicitly stated parameters are emitted; the orchestrator infers
/// the rest exactly as it would for a model that left them out.
pub struct RuleBasedReasoner;

impl RuleBasedReasoner {
    pub fn new() -> Self {
        Self
    }

    fn draft(query: &str) -> Value {
        let signals = QuerySignals::extract(query);
        let tool = classify_intent(query, &signals);

        let mut input = Map::new();
        let mut put = |key: &str, value: Option<Value>| {
            if let Some(value) = value {
                input.insert(key.to_string(), value);
            }
        };

        match tool {
            ToolName::NoteMaker => {
                put("topic", signals.topic.map(Value::from));
                put("subject", signals.subject.map(Value::from));
                put("note_taking_style", signals.note_style.map(Value::from));
                put("include_examples", signals.include_examples.map(Value::from));
                put("include_analogies", signals.include_analogies.map(Value::from));
            }
            ToolName::FlashcardGenerator => {
                put("topic", signals.topic.map(Value::from));
                put("subject", signals.subject.map(Value::from));
                put("count", signals.count.map(Value::from));
                put("difficulty", signals.difficulty.map(Value::from));
                put("include_examples", signals.include_examples.map(Value::from));
            }
            ToolName::ConceptExplainer => {
                put("concept_to_explain", signals.topic.map(Value::from));
                put("current_topic", signals.subject.map(Value::from));
                put("desired_depth", signals.depth.map(Value::from));
            }
        }

        json!({ "tool_name": tool.as_str(), "tool_input": input })
    }
}

#[async_trait::async_trait]
impl ReasoningService for RuleBasedReasoner {
    fn name(&self) -> &str {
        "rules"
    }

    async fn select_tool(&self, request: &ReasoningRequest<'_>) -> Result<String> {
        Ok(Self::draft(request.query).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{sample_profile, SchemaRegistry};

    #[test]
    fn test_parse_envelope_plain() {
        let env = parse_envelope(r#"{"tool_name": "NoteMaker", "tool_input": {"topic": "cells"}}"#)
            .unwrap();
        assert_eq!(env.tool_name, "NoteMaker");
        assert_eq!(env.tool_input["topic"], "cells");
    }

    #[test]
    fn test_parse_envelope_inside_fences() {
        let raw = "```json\n{\"tool_name\": \"ConceptExplainer\", \"tool_input\": {}}\n```";
        let env = parse_envelope(raw).unwrap();
        assert_eq!(env.tool_name, "ConceptExplainer");
        assert!(env.tool_input.is_empty());
    }

    #[test]
    fn test_parse_envelope_rejects_non_json() {
        for raw in [
            "I think you should use the note maker.",
            "{ not json at all }",
            "} backwards {",
            r#"{"tool_name": "NoteMaker"}"#,
            r#"{"tool_name": 3, "tool_input": {}}"#,
            r#"{"tool_name": "NoteMaker", "tool_input": "topic=cells"}"#,
            r#"{"tool_name": "NoteMaker", "tool_input": {}} and {"extra": 1}"#,
        ] {
            assert!(
                matches!(parse_envelope(raw), Err(TutorError::ReasoningParse(_))),
                "should reject: {}",
                raw
            );
        }
    }

    #[test]
    fn test_system_prompt_lists_registry_schemas() {
        let prompt = LlmReasoner::system_prompt(SchemaRegistry::global().list_tools());
        assert!(prompt.contains("### 1. NoteMaker"));
        assert!(prompt.contains("### 3. ConceptExplainer"));
        assert!(prompt.contains("\"bullet_points\""));
        assert!(prompt.contains("only the JSON object"));
    }

    #[test]
    fn test_user_prompt_includes_history_only_when_present() {
        let profile = sample_profile();
        let history = vec![ChatHistoryEntry {
            role: crate::schema::Role::User,
            content: "We covered cells yesterday".to_string(),
        }];
        let request = ReasoningRequest {
            tools: SchemaRegistry::global().list_tools(),
            profile: &profile,
            query: "explain mitosis",
            history: &history,
        };
        let prompt = LlmReasoner::user_prompt(&request);
        assert!(prompt.contains("\"name\": \"Ada\""));
        assert!(prompt.contains("Chat history"));

        let request = ReasoningRequest { history: &[], ..request };
        assert!(!LlmReasoner::user_prompt(&request).contains("Chat history"));
    }

    #[tokio::test]
    async fn test_rule_based_output_is_a_valid_envelope() {
        let profile = sample_profile();
        let request = ReasoningRequest {
            tools: SchemaRegistry::global().list_tools(),
            profile: &profile,
            query: "Make 5 flashcards on the human heart",
            history: &[],
        };
        let raw = RuleBasedReasoner::new().select_tool(&request).await.unwrap();
        let env = parse_envelope(&raw).unwrap();
        assert_eq!(env.tool_name, "FlashcardGenerator");
        assert_eq!(env.tool_input["count"], 5);
        assert_eq!(env.tool_input["topic"], "human heart");
        assert!(env.tool_input.get("difficulty").is_none());
    }
}
