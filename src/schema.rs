//! Schema registry: the three tool definitions and the shared student profile.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use crate::error::{Result, TutorError};

/// Student context required by every tool call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentProfile {
    pub user_id: String,
    pub name: String,
    pub grade_level: String,
    pub mastery_level_summary: String,
    pub emotional_state_summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub learning_style_summary: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One turn of prior conversation, oldest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatHistoryEntry {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ToolName {
    NoteMaker,
    FlashcardGenerator,
    ConceptExplainer,
}

impl ToolName {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolName::NoteMaker => "NoteMaker",
            ToolName::FlashcardGenerator => "FlashcardGenerator",
            ToolName::ConceptExplainer => "ConceptExplainer",
        }
    }

    fn index(&self) -> usize {
        match self {
            ToolName::NoteMaker => 0,
            ToolName::FlashcardGenerator => 1,
            ToolName::ConceptExplainer => 2,
        }
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolName {
    type Err = TutorError;

    /// Accepts "NoteMaker", "Note Maker" and "note_maker" alike.
    fn from_str(s: &str) -> Result<Self> {
        let key: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match key.as_str() {
            "notemaker" => Ok(ToolName::NoteMaker),
            "flashcardgenerator" => Ok(ToolName::FlashcardGenerator),
            "conceptexplainer" => Ok(ToolName::ConceptExplainer),
            _ => Err(TutorError::NotFound(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    String,
    Boolean,
    Integer { min: i64, max: i64 },
    Enum(&'static [&'static str]),
    Profile,
    History,
}

impl FieldType {
    fn type_name(&self) -> &'static str {
        match self {
            FieldType::String | FieldType::Enum(_) => "string",
            FieldType::Boolean => "boolean",
            FieldType::Integer { .. } => "integer",
            FieldType::Profile => "object",
            FieldType::History => "array",
        }
    }

    /// Whether `value` satisfies this type and its constraints.
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            FieldType::String => value.as_str().is_some_and(|s| !s.trim().is_empty()),
            FieldType::Boolean => value.is_boolean(),
            FieldType::Integer { min, max } => value
                .as_i64()
                .is_some_and(|n| (*min..=*max).contains(&n)),
            FieldType::Enum(allowed) => value.as_str().is_some_and(|s| allowed.contains(&s)),
            FieldType::Profile => {
                serde_json::from_value::<StudentProfile>(value.clone()).is_ok()
            }
            FieldType::History => {
                serde_json::from_value::<Vec<ChatHistoryEntry>>(value.clone()).is_ok()
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: &'static str,
    pub ty: FieldType,
    pub required: bool,
    pub default: Option<Value>,
}

impl FieldSpec {
    fn required(name: &'static str, ty: FieldType) -> Self {
        Self { name, ty, required: true, default: None }
    }

    fn optional(name: &'static str, ty: FieldType) -> Self {
        Self { name, ty, required: false, default: None }
    }

    fn with_default(name: &'static str, ty: FieldType, default: Value) -> Self {
        Self { name, ty, required: false, default: Some(default) }
    }

    fn to_json(&self) -> Value {
        let mut spec = json!({
            "type": self.ty.type_name(),
            "required": self.required,
        });
        match &self.ty {
            FieldType::Enum(allowed) => spec["enum"] = json!(allowed),
            FieldType::Integer { min, max } => {
                spec["minimum"] = json!(min);
                spec["maximum"] = json!(max);
            }
            FieldType::History => {
                spec["items"] = json!({ "role": "user|assistant", "content": "string" })
            }
            FieldType::Profile => {
                spec["properties"] = json!({
                    "user_id": "string",
                    "name": "string",
                    "grade_level": "string",
                    "mastery_level_summary": "string",
                    "emotional_state_summary": "string",
                    "learning_style_summary": "string (optional)",
                })
            }
            FieldType::String | FieldType::Boolean => {}
        }
        if let Some(default) = &self.default {
            spec["default"] = default.clone();
        }
        spec
    }
}

pub const NOTE_STYLES: &[&str] = &["outline", "bullet_points", "narrative", "structured"];
pub const DIFFICULTIES: &[&str] = &["easy", "medium", "hard"];
pub const DEPTHS: &[&str] = &["basic", "intermediate", "advanced", "comprehensive"];
pub const MIN_FLASHCARDS: i64 = 1;
pub const MAX_FLASHCARDS: i64 = 20;

#[derive(Debug, Clone)]
pub struct ToolSchema {
    pub name: ToolName,
    pub description: &'static str,
    /// Parameters in declaration order.
    pub parameters: Vec<FieldSpec>,
}

impl ToolSchema {
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.parameters.iter().find(|f| f.name == name)
    }

    pub fn accepts_history(&self) -> bool {
        self.field("chat_history").is_some()
    }

    /// Names of every field that violates the schema: missing required
    /// fields, type or range violations, and fields the schema does not declare.
    pub fn violations(&self, arguments: &Map<String, Value>) -> Vec<String> {
        let mut offending: Vec<String> = self
            .parameters
            .iter()
            .filter(|spec| match arguments.get(spec.name) {
                Some(value) => !spec.ty.accepts(value),
                None => spec.required,
            })
            .map(|spec| spec.name.to_string())
            .collect();

        offending.extend(
            arguments
                .keys()
                .filter(|key| self.field(key).is_none())
                .cloned(),
        );
        offending
    }

    /// JSON description handed to the reasoning service.
    pub fn to_json(&self) -> Value {
        let parameters: Map<String, Value> = self
            .parameters
            .iter()
            .map(|f| (f.name.to_string(), f.to_json()))
            .collect();
        json!({
            "name": self.name.as_str(),
            "description": self.description,
            "parameters": parameters,
        })
    }
}

/// Read-only set of tool schemas, built once per process.
#[derive(Debug)]
pub struct SchemaRegistry {
    tools: [ToolSchema; 3],
}

impl SchemaRegistry {
    pub fn builtin() -> Self {
        let note_maker = ToolSchema {
            name: ToolName::NoteMaker,
            description: "Generates structured notes on a specific topic and subject. \
                Use this when a student wants to summarize, review, or get notes on a topic.",
            parameters: vec![
                FieldSpec::required("user_info", FieldType::Profile),
                FieldSpec::optional("chat_history", FieldType::History),
                FieldSpec::required("topic", FieldType::String),
                FieldSpec::required("subject", FieldType::String),
                FieldSpec::required("note_taking_style", FieldType::Enum(NOTE_STYLES)),
                FieldSpec::with_default("include_examples", FieldType::Boolean, json!(true)),
                FieldSpec::with_default("include_analogies", FieldType::Boolean, json!(false)),
            ],
        };

        let flashcards = ToolSchema {
            name: ToolName::FlashcardGenerator,
            description: "Creates flashcards for a topic to help with memorization. \
                Use this when a student asks for flashcards, a quiz, or practice questions.",
            parameters: vec![
                FieldSpec::required("user_info", FieldType::Profile),
                FieldSpec::required("topic", FieldType::String),
                FieldSpec::required(
                    "count",
                    FieldType::Integer { min: MIN_FLASHCARDS, max: MAX_FLASHCARDS },
                ),
                FieldSpec::required("difficulty", FieldType::Enum(DIFFICULTIES)),
                FieldSpec::required("subject", FieldType::String),
                FieldSpec::with_default("include_examples", FieldType::Boolean, json!(true)),
            ],
        };

        let explainer = ToolSchema {
            name: ToolName::ConceptExplainer,
            description: "Explains a specific concept in detail. Use this when a student asks \
                'what is X?', 'can you explain X?', or expresses confusion about a concept.",
            parameters: vec![
                FieldSpec::required("user_info", FieldType::Profile),
                FieldSpec::optional("chat_history", FieldType::History),
                FieldSpec::required("concept_to_explain", FieldType::String),
                FieldSpec::required("current_topic", FieldType::String),
                FieldSpec::required("desired_depth", FieldType::Enum(DEPTHS)),
            ],
        };

        Self { tools: [note_maker, flashcards, explainer] }
    }

    pub fn global() -> &'static SchemaRegistry {
        static REGISTRY: OnceLock<SchemaRegistry> = OnceLock::new();
        REGISTRY.get_or_init(SchemaRegistry::builtin)
    }

    pub fn list_tools(&self) -> &[ToolSchema] {
        &self.tools
    }

    pub fn get_tool(&self, name: &str) -> Result<&ToolSchema> {
        let name: ToolName = name.parse()?;
        Ok(self.schema(name))
    }

    pub fn schema(&self, name: ToolName) -> &ToolSchema {
        &self.tools[name.index()]
    }
}

#[cfg(test)]
pub(crate) fn sample_profile() -> StudentProfile {
    StudentProfile {
        user_id: "student-42".to_string(),
        name: "Ada".to_string(),
        grade_level: "Grade 10".to_string(),
        mastery_level_summary: "Level 5: Developing competence".to_string(),
        emotional_state_summary: "Focused and motivated".to_string(),
        learning_style_summary: None,
    }
}
