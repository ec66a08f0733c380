use thiserror::Error;

/// Errors that can occur when parsing a filter token
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterParseError {
    #[error("Missing operator in '{0}'. Valid operators are: =, !=, =~, !~")]
    MissingOperator(String),

    #[error("Empty label name in '{0}'")]
    EmptyName(String),

    #[error("Empty value in '{0}'")]
    EmptyValue(String),

    #[error("Ambiguous operator in '{0}': a name ending with '!' or a value starting with '~' merges into the operator")]
    AmbiguousOperator(String),

    #[error("Matcher '{0}' does not parse back to the same name, operator and value")]
    NotCanonical(String),

    #[error("Invalid regex '{value}': {reason}")]
    InvalidRegex { value: String, reason: String },
}
