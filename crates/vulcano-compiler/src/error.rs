//! Error types for the Vulcano compiler.

use thiserror::Error;

/// Result type alias for profile evaluation.
pub type Result<T> = std::result::Result<T, EvaluationError>;

/// A profile failed to evaluate.
///
/// Raised for syntax errors and runtime faults in profile code. When
/// `rule_id` is set the fault was contained to that rule's body and the rest
/// of the profile was still evaluated.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{source_id}:{line}: {message}")]
pub struct EvaluationError {
    /// Source the error was raised in.
    pub source_id: String,
    /// Line within the source, adjusted by its line offset.
    pub line: usize,
    /// Rule whose body failed, if the error was rule-scoped.
    pub rule_id: Option<String>,
    /// Error message.
    pub message: String,
}

/// A rule could not be compiled into test units.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("rule '{rule_id}' failed to compile at {source_id}:{line}: {message}")]
pub struct CompilationError {
    /// Rule that failed.
    pub rule_id: String,
    /// Source the rule was declared in.
    pub source_id: String,
    /// Line of the offending declaration.
    pub line: usize,
    /// Error message.
    pub message: String,
}

/// Syntax or runtime fault before source attribution is attached.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("line {line}: {message}")]
pub struct ScriptError {
    /// Line within the parsed text (1-based, no offset applied).
    pub line: usize,
    /// Error message.
    pub message: String,
}

impl ScriptError {
    /// Creates a script error.
    #[must_use]
    pub fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evaluation_error_display() {
        let err = EvaluationError {
            source_id: "base.vul".to_string(),
            line: 10,
            rule_id: None,
            message: "unexpected token `end`".to_string(),
        };
        assert_eq!(err.to_string(), "base.vul:10: unexpected token `end`");
    }

    #[test]
    fn test_compilation_error_display() {
        let err = CompilationError {
            rule_id: "ssh-01".to_string(),
            source_id: "ssh.vul".to_string(),
            line: 3,
            message: "unknown matcher `equal`".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "rule 'ssh-01' failed to compile at ssh.vul:3: unknown matcher `equal`"
        );
    }
}
