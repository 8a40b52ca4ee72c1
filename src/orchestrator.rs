//! Tool selection and argument binding.
//!
//! `select_and_bind` turns a free-text query and a student profile into one
//! validated [`ToolCallIntent`]: the reasoning service picks the tool and
//! drafts arguments, then every absent field is filled from the query and
//! profile signals and the result is checked against the tool's schema.

use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;

use crate::error::{Result, TutorError};
use crate::reasoning::{parse_envelope, ReasoningRequest, ReasoningService};
use crate::schema::{
    ChatHistoryEntry, FieldType, SchemaRegistry, StudentProfile, ToolName, ToolSchema,
};
use crate::signals::{clamp_count, subject_for_topic, ProfileSignals, QuerySignals};

const DEFAULT_FLASHCARD_COUNT: i64 = 5;
const FALLBACK_SUBJECT: &str = "General";

/// Fields decided by query and profile signals alone; a reasoner draft never wins.
const GOVERNED_FIELDS: &[&str] = &[
    "difficulty",
    "desired_depth",
    "note_taking_style",
    "count",
    "include_examples",
    "include_analogies",
];

/// A selected tool plus arguments that satisfy its schema.
///
/// Only constructible through validation, so an intent that reaches the
/// invoker is always schema-valid.
#[derive(Debug, Clone)]
pub struct ToolCallIntent {
    schema: &'static ToolSchema,
    arguments: Map<String, Value>,
}

impl ToolCallIntent {
    /// Returns the offending field names when `arguments` violate `schema`.
    pub fn validated(
        schema: &'static ToolSchema,
        arguments: Map<String, Value>,
    ) -> std::result::Result<Self, Vec<String>> {
        let violations = schema.violations(&arguments);
        if violations.is_empty() {
            Ok(Self { schema, arguments })
        } else {
            Err(violations)
        }
    }

    pub fn tool(&self) -> ToolName {
        self.schema.name
    }

    pub fn arguments(&self) -> &Map<String, Value> {
        &self.arguments
    }
}

pub struct Orchestrator {
    registry: &'static SchemaRegistry,
    reasoner: Arc<dyn ReasoningService>,
    timeout: Duration,
}

impl Orchestrator {
    pub fn new(reasoner: Arc<dyn ReasoningService>, timeout: Duration) -> Self {
        Self {
            registry: SchemaRegistry::global(),
            reasoner,
            timeout,
        }
    }

    pub fn reasoner_name(&self) -> &str {
        self.reasoner.name()
    }

    pub async fn select_and_bind(
        &self,
        query: &str,
        profile: &StudentProfile,
        history: &[ChatHistoryEntry],
    ) -> Result<ToolCallIntent> {
        let request = ReasoningRequest {
            tools: self.registry.list_tools(),
            profile,
            query,
            history,
        };

        let raw = tokio::time::timeout(self.timeout, self.reasoner.select_tool(&request))
            .await
            .map_err(|_| TutorError::ReasoningTimeout(self.timeout.as_secs()))??;

        let envelope = parse_envelope(&raw)?;
        let schema = self.registry.get_tool(&envelope.tool_name)?;
        log::info!("Orchestrator: {} selected {}", self.reasoner.name(), schema.name);

        let binder = Binder::new(schema, query, profile, history);
        let arguments = binder.bind(envelope.tool_input);

        let offending = match ToolCallIntent::validated(schema, arguments.clone()) {
            Ok(intent) => return Ok(intent),
            Err(offending) => offending,
        };

        log::warn!(
            "Orchestrator: {} arguments invalid ({}), retrying with conservative defaults",
            schema.name,
            offending.join(", ")
        );
        let retried = binder.conservative(arguments, &offending);
        ToolCallIntent::validated(schema, retried).map_err(|fields| TutorError::SchemaValidation {
            tool: schema.name.to_string(),
            fields,
        })
    }
}

/// Fills and repairs the arguments of one selected tool.
struct Binder<'a> {
    schema: &'static ToolSchema,
    query: &'a str,
    profile: &'a StudentProfile,
    history: &'a [ChatHistoryEntry],
    stated: QuerySignals,
    inferred: ProfileSignals,
}

impl<'a> Binder<'a> {
    fn new(
        schema: &'static ToolSchema,
        query: &'a str,
        profile: &'a StudentProfile,
        history: &'a [ChatHistoryEntry],
    ) -> Self {
        Self {
            schema,
            query,
            profile,
            history,
            stated: QuerySignals::extract(query),
            inferred: ProfileSignals::from_profile(profile),
        }
    }

    /// Drop undeclared fields, normalise values, pin the request context,
    /// apply the signal-governed fields, then infer whatever is still absent.
    fn bind(&self, mut arguments: Map<String, Value>) -> Map<String, Value> {
        arguments.retain(|key, _| {
            let known = self.schema.field(key).is_some();
            if !known {
                log::warn!("Orchestrator: dropping undeclared field '{}'", key);
            }
            known
        });

        for spec in &self.schema.parameters {
            if let Some(value) = arguments.remove(spec.name) {
                if let Some(value) = normalize(&spec.ty, value) {
                    arguments.insert(spec.name.to_string(), value);
                }
            }
        }

        self.pin_context(&mut arguments);

        for spec in &self.schema.parameters {
            if GOVERNED_FIELDS.contains(&spec.name) {
                if let Some(value) = self.governed(spec.name).or_else(|| spec.default.clone()) {
                    if arguments.get(spec.name).is_some_and(|drafted| *drafted != value) {
                        log::debug!("Orchestrator: overriding drafted {} with {}", spec.name, value);
                    }
                    arguments.insert(spec.name.to_string(), value);
                }
                continue;
            }
            if arguments.contains_key(spec.name) {
                continue;
            }
            let value = self
                .infer(spec.name, &arguments)
                .or_else(|| spec.default.clone());
            if let Some(value) = value {
                log::debug!("Orchestrator: inferred {} = {}", spec.name, value);
                arguments.insert(spec.name.to_string(), value);
            }
        }

        arguments
    }

    /// The profile and history always come from the request, never the reasoner.
    fn pin_context(&self, arguments: &mut Map<String, Value>) {
        if let Ok(profile) = serde_json::to_value(self.profile) {
            arguments.insert("user_info".to_string(), profile);
        }
        if self.schema.accepts_history() {
            if let Ok(history) = serde_json::to_value(self.history) {
                arguments.insert("chat_history".to_string(), history);
            }
        }
    }

    fn infer(&self, field: &str, arguments: &Map<String, Value>) -> Option<Value> {
        let stated = &self.stated;
        match field {
            "topic" | "concept_to_explain" => stated.topic.clone().map(Value::from),
            "subject" => Some(Value::from(
                stated
                    .subject
                    .clone()
                    .or_else(|| self.subject_from(arguments, "topic").map(String::from))
                    .unwrap_or_else(|| FALLBACK_SUBJECT.to_string()),
            )),
            "current_topic" => {
                let concept = arguments.get("concept_to_explain").and_then(Value::as_str);
                let topic = stated
                    .subject
                    .clone()
                    .or_else(|| {
                        self.subject_from(arguments, "concept_to_explain")
                            .map(String::from)
                    })
                    .or_else(|| concept.map(String::from))
                    .unwrap_or_else(|| FALLBACK_SUBJECT.to_string());
                Some(Value::from(topic))
            }
            _ => None,
        }
    }

    /// Query wording first, then the profile. `None` falls back to the schema default.
    fn governed(&self, field: &str) -> Option<Value> {
        let stated = &self.stated;
        match field {
            "note_taking_style" => Some(Value::from(
                stated.note_style.unwrap_or(self.inferred.note_style),
            )),
            "difficulty" => Some(Value::from(
                stated.difficulty.unwrap_or_else(|| self.inferred.difficulty()),
            )),
            "desired_depth" => Some(Value::from(
                stated.depth.unwrap_or_else(|| self.inferred.depth()),
            )),
            "count" => Some(Value::from(
                stated.count.unwrap_or(DEFAULT_FLASHCARD_COUNT),
            )),
            "include_examples" => stated.include_examples.map(Value::from),
            "include_analogies" => stated.include_analogies.map(Value::from),
            _ => None,
        }
    }

    fn subject_from(&self, arguments: &Map<String, Value>, field: &str) -> Option<&'static str> {
        arguments
            .get(field)
            .and_then(Value::as_str)
            .and_then(subject_for_topic)
    }

    /// Second and last attempt: replace each offending field with the most
    /// conservative value available.
    fn conservative(
        &self,
        mut arguments: Map<String, Value>,
        offending: &[String],
    ) -> Map<String, Value> {
        for field in offending {
            let Some(spec) = self.schema.field(field) else {
                arguments.remove(field);
                continue;
            };

            let replacement = match (&spec.ty, field.as_str()) {
                (FieldType::Integer { .. }, _) => Some(Value::from(
                    arguments
                        .get(field)
                        .and_then(Value::as_i64)
                        .map(clamp_count)
                        .unwrap_or(DEFAULT_FLASHCARD_COUNT),
                )),
                (FieldType::Enum(_), "difficulty") => Some(Value::from("easy")),
                (FieldType::Enum(_), "desired_depth") => Some(Value::from("basic")),
                (FieldType::Enum(_), "note_taking_style") => Some(Value::from("structured")),
                (FieldType::Boolean, _) => spec.default.clone(),
                (_, "topic" | "concept_to_explain") => {
                    let query = self.query.trim();
                    (!query.is_empty()).then(|| Value::from(query))
                }
                (_, "subject" | "current_topic") => Some(Value::from(FALLBACK_SUBJECT)),
                (FieldType::Profile, _) => serde_json::to_value(self.profile).ok(),
                (FieldType::History, _) => Some(Value::Array(Vec::new())),
                _ => spec.default.clone(),
            };

            match replacement {
                Some(value) => {
                    arguments.insert(field.clone(), value);
                }
                None => {
                    arguments.remove(field);
                }
            }
        }
        arguments
    }
}

/// Coerce a drafted value toward the field's type; `None` means "treat as absent".
fn normalize(ty: &FieldType, value: Value) -> Option<Value> {
    match (ty, value) {
        (_, Value::Null) => None,
        (FieldType::String, Value::String(s)) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| Value::from(trimmed))
        }
        (FieldType::Enum(_), Value::String(s)) => {
            let key: String = s
                .trim()
                .to_lowercase()
                .chars()
                .map(|c| if c == ' ' || c == '-' { '_' } else { c })
                .collect();
            (!key.is_empty()).then(|| Value::from(key))
        }
        (FieldType::Integer { .. }, Value::String(s)) => match s.trim().parse::<i64>() {
            Ok(n) => Some(Value::from(n)),
            Err(_) => Some(Value::String(s)),
        },
        (FieldType::Integer { .. }, Value::Number(n)) => match n.as_f64() {
            Some(f) if f.fract() == 0.0 && n.as_i64().is_none() => Some(Value::from(f as i64)),
            _ => Some(Value::Number(n)),
        },
        (FieldType::Boolean, Value::String(s)) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" => Some(Value::Bool(true)),
            "false" | "no" => Some(Value::Bool(false)),
            _ => Some(Value::String(s)),
        },
        (_, value) => Some(value),
    }
}
