//! Turns a tool result into the reply the student reads.
//!
//! The payload is always laid out from a fixed template so every reply
//! covers the tool's content; only the opening lines may come from a
//! language model, and those are dropped when they fail to address the
//! student by name.

use serde_json::{Map, Value};

use crate::error::Result;
use crate::ollama::{ChatRequest, OllamaClient};
use crate::schema::{StudentProfile, ToolName};
use crate::signals::{EmotionalClass, ProfileSignals, ReadingLevel};
use crate::tools::ToolResult;

pub const APOLOGY: &str =
    "I'm sorry, I couldn't put that together right now. Please try again in a moment.";

/// Writes a tailored opening for a successful result.
#[async_trait::async_trait]
pub trait Narrator: Send + Sync {
    async fn narrate(&self, result: &ToolResult, profile: &StudentProfile) -> Result<String>;
}

pub struct LlmNarrator {
    ollama: OllamaClient,
    temperature: f32,
    top_p: f32,
}

impl LlmNarrator {
    pub fn new(ollama: OllamaClient, temperature: f32, top_p: f32) -> Self {
        Self { ollama, temperature, top_p }
    }

    fn system_prompt() -> &'static str {
        r#"You are a friendly and helpful AI tutor.
An educational tool has just produced material for a student. Write a short opening
(two or three sentences) that introduces the material.

Rules:
- Address the student directly by their name.
- Simplify your language for a lower grade_level.
- Match the tone to emotional_state_summary: reassuring if they are confused or
  struggling, energetic if they are curious or motivated.
- Do NOT repeat or summarize the material itself; it is shown after your opening.

Respond with the opening text only."#
    }

    fn user_prompt(result: &ToolResult, profile: &StudentProfile) -> String {
        format!(
            "Tool: {}\n\nTool output:\n{}\n\nStudent profile:\n{}",
            result.tool,
            serde_json::to_string_pretty(&result.payload).unwrap_or_default(),
            serde_json::to_string_pretty(profile).unwrap_or_default()
        )
    }
}

#[async_trait::async_trait]
impl Narrator for LlmNarrator {
    async fn narrate(&self, result: &ToolResult, profile: &StudentProfile) -> Result<String> {
        self.ollama
            .chat(ChatRequest {
                system_prompt: Self::system_prompt().to_string(),
                user_prompt: Self::user_prompt(result, profile),
                temperature: self.temperature,
                top_p: self.top_p,
                json_format: false,
            })
            .await
    }
}

pub struct ResponseRenderer {
    narrator: Option<Box<dyn Narrator>>,
}

impl ResponseRenderer {
    pub fn new(narrator: Option<Box<dyn Narrator>>) -> Self {
        Self { narrator }
    }

    pub fn has_narrator(&self) -> bool {
        self.narrator.is_some()
    }

    pub async fn render(&self, result: &ToolResult, profile: &StudentProfile) -> String {
        if !result.is_success() {
            return APOLOGY.to_string();
        }

        let signals = ProfileSignals::from_profile(profile);
        let name = profile.name.trim();

        let opening = match self.narrate(result, profile).await {
            Some(text) => text,
            None => template_opening(name, &signals, result.tool),
        };

        let mut reply = opening;
        reply.push_str("\n\n");
        reply.push_str(&format_payload(result.tool, &result.payload));
        reply.push_str("\n\n");
        reply.push_str(closing(&signals));
        reply
    }

    async fn narrate(&self, result: &ToolResult, profile: &StudentProfile) -> Option<String> {
        let narrator = self.narrator.as_ref()?;
        match narrator.narrate(result, profile).await {
            Ok(text) => {
                let text = text.trim();
                let name = profile.name.trim();
                if text.is_empty() || (!name.is_empty() && !text.contains(name)) {
                    log::warn!("Renderer: narration ignored (empty or missing student name)");
                    None
                } else {
                    Some(text.to_string())
                }
            }
            Err(e) => {
                log::warn!("Renderer: narration failed, using template: {}", e);
                None
            }
        }
    }
}

fn template_opening(name: &str, signals: &ProfileSignals, tool: ToolName) -> String {
    let greeting = match (signals.emotion, name.is_empty()) {
        (EmotionalClass::Struggling, false) => {
            format!("Hi {}, no worries, we'll take this one step at a time.", name)
        }
        (EmotionalClass::Struggling, true) => {
            "No worries, we'll take this one step at a time.".to_string()
        }
        (EmotionalClass::Engaged, false) => format!("Great question, {}!", name),
        (EmotionalClass::Engaged, true) => "Great question!".to_string(),
        (EmotionalClass::Neutral, false) => format!("Hi {}!", name),
        (EmotionalClass::Neutral, true) => "Hi there!".to_string(),
    };

    let intro = match (tool, signals.reading_level) {
        (ToolName::NoteMaker, ReadingLevel::Early) => "Here are some notes to help you learn.",
        (ToolName::NoteMaker, ReadingLevel::Middle) => "I made some notes you can study from.",
        (ToolName::NoteMaker, ReadingLevel::Advanced) => {
            "Below are organized notes covering the essentials."
        }
        (ToolName::FlashcardGenerator, ReadingLevel::Early) => {
            "Here are some cards to practice with. Read the question, guess, then check!"
        }
        (ToolName::FlashcardGenerator, ReadingLevel::Middle) => {
            "Here are flashcards to practice with. Try to answer before you look."
        }
        (ToolName::FlashcardGenerator, ReadingLevel::Advanced) => {
            "Here is a flashcard set for active recall. Attempt each answer before revealing it."
        }
        (ToolName::ConceptExplainer, ReadingLevel::Early) => "Let's figure this out together.",
        (ToolName::ConceptExplainer, ReadingLevel::Middle) => "Here's an explanation to help.",
        (ToolName::ConceptExplainer, ReadingLevel::Advanced) => {
            "Here is an explanation that builds the idea from its foundations."
        }
    };

    format!("{} {}", greeting, intro)
}

fn closing(signals: &ProfileSignals) -> &'static str {
    match (signals.emotion, signals.reading_level) {
        (EmotionalClass::Struggling, _) => {
            "You're making progress. Ask me anything that still feels unclear."
        }
        (_, ReadingLevel::Early) => "Great job! Ask me if you want to learn more.",
        (EmotionalClass::Engaged, _) => "Want to go further? Ask me for a deeper dive.",
        (EmotionalClass::Neutral, _) => "Let me know if you'd like more on this.",
    }
}

fn text<'a>(payload: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    payload.get(key).and_then(Value::as_str)
}

fn format_payload(tool: ToolName, payload: &Map<String, Value>) -> String {
    let formatted = match tool {
        ToolName::NoteMaker => format_notes(payload),
        ToolName::FlashcardGenerator => format_flashcards(payload),
        ToolName::ConceptExplainer => format_explanation(payload),
    };
    formatted.unwrap_or_else(|| format_generic(payload))
}

fn format_notes(payload: &Map<String, Value>) -> Option<String> {
    let sections = payload.get("note_sections")?.as_array()?;
    let mut md = format!("## {}\n", text(payload, "title").unwrap_or("Notes"));
    if let Some(summary) = text(payload, "summary") {
        md.push_str(&format!("\n{}\n", summary));
    }
    for section in sections {
        let title = section.get("title").and_then(Value::as_str).unwrap_or("Section");
        let content = section.get("content").and_then(Value::as_str).unwrap_or_default();
        md.push_str(&format!("\n### {}\n{}\n", title, content));
    }
    Some(md.trim_end().to_string())
}

fn format_flashcards(payload: &Map<String, Value>) -> Option<String> {
    let cards = payload.get("flashcards")?.as_array()?;
    let mut md = format!("## Flashcards: {}", text(payload, "topic").unwrap_or("practice"));
    if let Some(difficulty) = text(payload, "difficulty") {
        md.push_str(&format!(" ({})", difficulty));
    }
    md.push('\n');
    for (i, card) in cards.iter().enumerate() {
        let question = card.get("question").and_then(Value::as_str).unwrap_or_default();
        let answer = card.get("answer").and_then(Value::as_str).unwrap_or_default();
        md.push_str(&format!(
            "\n**Card {}**\n- **Q:** {}\n- **A:** {}\n",
            i + 1,
            question,
            answer
        ));
        if let Some(example) = card.get("example").and_then(Value::as_str) {
            md.push_str(&format!("- *Example:* {}\n", example));
        }
    }
    Some(md.trim_end().to_string())
}

fn format_explanation(payload: &Map<String, Value>) -> Option<String> {
    let explanation = text(payload, "explanation")?;
    let mut md = match text(payload, "concept") {
        Some(concept) => format!("## {}\n\n{}\n", concept, explanation),
        None => format!("{}\n", explanation),
    };
    let related: Vec<&str> = payload
        .get("related_concepts")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();
    if !related.is_empty() {
        md.push_str(&format!("\n**Related concepts:** {}\n", related.join(", ")));
    }
    Some(md.trim_end().to_string())
}

/// Fallback for payloads that do not match the known shapes.
fn format_generic(payload: &Map<String, Value>) -> String {
    payload
        .iter()
        .map(|(key, value)| match value {
            Value::String(s) => format!("- **{}:** {}", key, s),
            other => format!("- **{}:** {}", key, other),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TutorError;
    use crate::schema::sample_profile;
    use crate::tools::ToolStatus;
    use serde_json::json;

    struct FixedNarrator(std::result::Result<&'static str, ()>);

    #[async_trait::async_trait]
    impl Narrator for FixedNarrator {
        async fn narrate(&self, _: &ToolResult, _: &StudentProfile) -> Result<String> {
            self.0
                .map(String::from)
                .map_err(|_| TutorError::ReasoningUnavailable("offline".to_string()))
        }
    }

    fn flashcards() -> ToolResult {
        ToolResult::success(
            ToolName::FlashcardGenerator,
            json!({
                "topic": "human heart",
                "difficulty": "easy",
                "flashcards": [
                    { "question": "How many chambers does the heart have?", "answer": "Four." },
                    { "question": "What carries blood away from the heart?", "answer": "Arteries.", "example": "The aorta." }
                ]
            }),
        )
    }

    #[tokio::test]
    async fn test_failure_renders_fixed_apology() {
        let result = ToolResult {
            tool: ToolName::NoteMaker,
            status: ToolStatus::Failure,
            payload: json!({ "error": "db connection refused at 10.0.0.3" })
                .as_object()
                .cloned()
                .unwrap(),
        };
        let reply = ResponseRenderer::new(None).render(&result, &sample_profile()).await;
        assert_eq!(reply, APOLOGY);
        assert!(!reply.contains("10.0.0.3"));
    }

    #[tokio::test]
    async fn test_reply_covers_name_and_payload() {
        let reply = ResponseRenderer::new(None).render(&flashcards(), &sample_profile()).await;
        assert!(reply.contains("Ada"));
        assert!(reply.contains("## Flashcards: human heart (easy)"));
        assert!(reply.contains("How many chambers does the heart have?"));
        assert!(reply.contains("Arteries."));
        assert!(reply.contains("*Example:* The aorta."));
    }

    #[tokio::test]
    async fn test_tone_and_vocabulary_follow_profile() {
        let young_and_stuck = StudentProfile {
            grade_level: "Grade 3".to_string(),
            emotional_state_summary: "Frustrated".to_string(),
            ..sample_profile()
        };
        let reply = ResponseRenderer::new(None).render(&flashcards(), &young_and_stuck).await;
        assert!(reply.starts_with("Hi Ada, no worries"));
        assert!(reply.contains("Read the question, guess, then check!"));

        let reply = ResponseRenderer::new(None).render(&flashcards(), &sample_profile()).await;
        assert!(reply.starts_with("Great question, Ada!"));
        assert!(reply.contains("active recall"));
    }

    #[tokio::test]
    async fn test_missing_name_is_not_addressed() {
        let anonymous = StudentProfile { name: String::new(), ..sample_profile() };
        let reply = ResponseRenderer::new(None).render(&flashcards(), &anonymous).await;
        assert!(reply.starts_with("Great question!"));
        assert!(!reply.contains(", !"));
    }

    #[tokio::test]
    async fn test_narration_used_only_when_it_names_the_student() {
        let narrated = ResponseRenderer::new(Some(Box::new(FixedNarrator(Ok(
            "Ada, these cards will have you thinking like a cardiologist!",
        )))));
        let reply = narrated.render(&flashcards(), &sample_profile()).await;
        assert!(reply.starts_with("Ada, these cards"));
        assert!(reply.contains("How many chambers"));

        let nameless = ResponseRenderer::new(Some(Box::new(FixedNarrator(Ok("Here you go.")))));
        let reply = nameless.render(&flashcards(), &sample_profile()).await;
        assert!(reply.starts_with("Great question, Ada!"));

        let broken = ResponseRenderer::new(Some(Box::new(FixedNarrator(Err(())))));
        let reply = broken.render(&flashcards(), &sample_profile()).await;
        assert!(reply.starts_with("Great question, Ada!"));
    }

    #[tokio::test]
    async fn test_notes_and_explanations_layout() {
        let notes = ToolResult::success(
            ToolName::NoteMaker,
            json!({
                "title": "Notes on volcanoes",
                "summary": "Structured notes.",
                "note_sections": [{ "title": "Key Ideas", "content": "Magma rises." }]
            }),
        );
        let reply = ResponseRenderer::new(None).render(&notes, &sample_profile()).await;
        assert!(reply.contains("## Notes on volcanoes"));
        assert!(reply.contains("### Key Ideas\nMagma rises."));

        let explanation = ToolResult::success(
            ToolName::ConceptExplainer,
            json!({
                "concept": "gravity",
                "explanation": "Masses attract.",
                "related_concepts": ["mass", "orbits"]
            }),
        );
        let reply = ResponseRenderer::new(None).render(&explanation, &sample_profile()).await;
        assert!(reply.contains("## gravity\n\nMasses attract."));
        assert!(reply.contains("**Related concepts:** mass, orbits"));
    }

    #[test]
    fn test_unknown_payload_shape_falls_back_to_list() {
        let payload = json!({ "answer": "42", "confidence": 0.9 });
        let md = format_payload(ToolName::ConceptExplainer, payload.as_object().unwrap());
        assert!(md.contains("- **answer:** 42"));
        assert!(md.contains("- **confidence:** 0.9"));
    }
}
