//! Error types for the tutoring pipeline

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, TutorError>;

/// Errors that can end a request in the `Failed` state.
#[derive(Debug, thiserror::Error)]
pub enum TutorError {
    /// Unknown tool name
    #[error("Tool not found: {0}")]
    NotFound(String),

    /// Bound arguments still violate the schema after one conservative retry
    #[error("Schema validation failed for {tool}: {}", fields.join(", "))]
    SchemaValidation { tool: String, fields: Vec<String> },

    /// Reasoning output was not the required JSON envelope
    #[error("Could not parse reasoning output: {0}")]
    ReasoningParse(String),

    /// Reasoning service did not answer in time
    #[error("Reasoning service timed out after {0}s")]
    ReasoningTimeout(u64),

    /// Reasoning service unreachable or returned an HTTP error
    #[error("Reasoning service unavailable: {0}")]
    ReasoningUnavailable(String),

    /// Tool collaborator unreachable or timed out
    #[error("Tool unavailable: {0}")]
    ToolUnavailable(String),

    /// Tool collaborator failed internally
    #[error("Tool execution failed: {0}")]
    ToolExecution(String),
}

impl TutorError {
    pub fn parse<S: Into<String>>(msg: S) -> Self {
        Self::ReasoningParse(msg.into())
    }

    pub fn execution<S: Into<String>>(msg: S) -> Self {
        Self::ToolExecution(msg.into())
    }

    pub fn unavailable<S: Into<String>>(msg: S) -> Self {
        Self::ToolUnavailable(msg.into())
    }

    /// Stable identifier used in the gateway error envelope.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::SchemaValidation { .. } => "schema_validation",
            Self::ReasoningParse(_) => "reasoning_parse",
            Self::ReasoningTimeout(_) => "reasoning_timeout",
            Self::ReasoningUnavailable(_) => "reasoning_unavailable",
            Self::ToolUnavailable(_) => "tool_unavailable",
            Self::ToolExecution(_) => "tool_execution",
        }
    }

    /// True when the caller sent something we cannot serve (4xx).
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::SchemaValidation { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_validation_names_fields() {
        let err = TutorError::SchemaValidation {
            tool: "FlashcardGenerator".to_string(),
            fields: vec!["topic".to_string(), "count".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Schema validation failed for FlashcardGenerator: topic, count"
        );
        assert!(err.is_client_error());
        assert_eq!(err.kind(), "schema_validation");
    }

    #[test]
    fn test_server_side_errors() {
        assert!(!TutorError::parse("no json").is_client_error());
        assert!(!TutorError::unavailable("down").is_client_error());
        assert_eq!(TutorError::ReasoningTimeout(30).kind(), "reasoning_timeout");
        assert_eq!(TutorError::NotFound("x".into()).to_string(), "Tool not found: x");
    }
}
