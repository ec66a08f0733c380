use super::error::FilterParseError;
use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Comparison operator of a matcher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Operator {
    #[serde(rename = "=")]
    Equal,
    #[serde(rename = "!=")]
    NotEqual,
    #[serde(rename = "=~")]
    Regex,
    #[serde(rename = "!~")]
    NotRegex,
}

impl Operator {
    /// Order in which operators are tried at each position. Two-character
    /// operators come first so `a!=b` is never split at the `=`.
    pub const SCAN_ORDER: [Operator; 4] = [
        Operator::NotRegex,
        Operator::Regex,
        Operator::NotEqual,
        Operator::Equal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Equal => "=",
            Operator::NotEqual => "!=",
            Operator::Regex => "=~",
            Operator::NotRegex => "!~",
        }
    }

    pub fn is_regex(&self) -> bool {
        matches!(self, Operator::Regex | Operator::NotRegex)
    }

    pub fn is_negative(&self) -> bool {
        matches!(self, Operator::NotEqual | Operator::NotRegex)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operator {
    type Err = FilterParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operator::SCAN_ORDER
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| FilterParseError::MissingOperator(s.to_string()))
    }
}

/// Structured form of a filter token (e.g. "team!=sre")
///
/// Fields are read-only so every matcher reads back as itself through
/// [`parse_matcher`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Matcher {
    name: String,
    operator: Operator,
    value: String,
}

impl Matcher {
    /// Build a matcher from its parts, rejecting combinations whose text form
    /// would parse differently (untrimmed sides, a name holding an operator)
    pub fn new(
        name: impl Into<String>,
        operator: Operator,
        value: impl Into<String>,
    ) -> Result<Self, FilterParseError> {
        let candidate = Self {
            name: name.into(),
            operator,
            value: value.into(),
        };
        let text = candidate.to_string();
        if parse_matcher(&text)? != candidate {
            return Err(FilterParseError::NotCanonical(text));
        }
        Ok(candidate)
    }

    /// Label name, left-hand side of the expression
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn operator(&self) -> Operator {
        self.operator
    }

    /// Right-hand side of the expression
    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn is_regex(&self) -> bool {
        self.operator.is_regex()
    }
}

/// Stringify: the exact inverse of [`parse_matcher`] for well-formed matchers.
impl fmt::Display for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.name, self.operator, self.value)
    }
}

impl FromStr for Matcher {
    type Err = FilterParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_matcher(s)
    }
}

/// Parse a single filter token into a matcher
///
/// The token is scanned left to right and split at the first position where
/// any operator matches. Both sides are trimmed and must be non-empty. The
/// name is free text otherwise (`foo-bar`, `job.name`, `@receiver`).
pub fn parse_matcher(token: &str) -> Result<Matcher, FilterParseError> {
    let token = token.trim();

    let (pos, operator) = find_operator(token)
        .ok_or_else(|| FilterParseError::MissingOperator(token.to_string()))?;

    let name = token[..pos].trim();
    let value = token[pos + operator.as_str().len()..].trim();

    if name.is_empty() {
        return Err(FilterParseError::EmptyName(token.to_string()));
    }
    if value.is_empty() {
        return Err(FilterParseError::EmptyValue(token.to_string()));
    }

    // "a! =b" would stringify to "a!=b" and "a= ~b" to "a=~b", both of which
    // parse back with a different operator
    if name.ends_with('!') || (operator == Operator::Equal && value.starts_with('~')) {
        return Err(FilterParseError::AmbiguousOperator(token.to_string()));
    }

    if operator.is_regex() {
        Regex::new(value).map_err(|e| FilterParseError::InvalidRegex {
            value: value.to_string(),
            reason: e.to_string(),
        })?;
    }

    Ok(Matcher {
        name: name.to_string(),
        operator,
        value: value.to_string(),
    })
}

fn find_operator(token: &str) -> Option<(usize, Operator)> {
    token.char_indices().find_map(|(idx, _)| {
        let rest = &token[idx..];
        Operator::SCAN_ORDER
            .into_iter()
            .find(|op| rest.starts_with(op.as_str()))
            .map(|op| (idx, op))
    })
}
