use super::error::FilterParseError;
use super::parser::{Matcher, Operator, parse_matcher};

/// A filter token together with its parse result and evaluation state
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    raw: String,
    parsed: Result<Matcher, FilterParseError>,
    applied: bool,
    hits: usize,
}

impl Filter {
    /// Build an unapplied filter from a token
    ///
    /// Valid tokens are normalized to their stringified form, so `raw` always
    /// agrees with the matcher. Invalid tokens keep their trimmed text and
    /// carry the parse error instead of a matcher.
    pub fn new(token: &str) -> Self {
        let parsed = parse_matcher(token);
        let raw = match &parsed {
            Ok(matcher) => matcher.to_string(),
            Err(_) => token.trim().to_string(),
        };

        Filter {
            raw,
            parsed,
            applied: false,
            hits: 0,
        }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn matcher(&self) -> Option<&Matcher> {
        self.parsed.as_ref().ok()
    }

    pub fn error(&self) -> Option<&FilterParseError> {
        self.parsed.as_ref().err()
    }

    pub fn is_valid(&self) -> bool {
        self.parsed.is_ok()
    }

    pub fn matcher_name(&self) -> Option<&str> {
        self.matcher().map(Matcher::name)
    }

    pub fn operator(&self) -> Option<Operator> {
        self.matcher().map(Matcher::operator)
    }

    pub fn matcher_value(&self) -> Option<&str> {
        self.matcher().map(Matcher::value)
    }

    pub fn is_regex(&self) -> bool {
        self.matcher().is_some_and(Matcher::is_regex)
    }

    /// Whether the last evaluation pass already used this filter
    pub fn applied(&self) -> bool {
        self.applied
    }

    pub fn hits(&self) -> usize {
        self.hits
    }

    pub(crate) fn mark_unapplied(&mut self) {
        self.applied = false;
    }

    pub(crate) fn record_evaluation(&mut self, hits: usize) {
        self.applied = true;
        self.hits = hits;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_filter_is_unapplied() {
        let filter = Filter::new("foo=bar");
        assert!(!filter.applied());
        assert_eq!(filter.hits(), 0);
        assert_eq!(filter.matcher_name(), Some("foo"));
        assert_eq!(filter.operator(), Some(Operator::Equal));
        assert_eq!(filter.matcher_value(), Some("bar"));
        assert!(!filter.is_regex());
    }

    #[test]
    fn test_raw_is_normalized_for_valid_tokens() {
        let filter = Filter::new(" foo =  bar ");
        assert_eq!(filter.raw(), "foo=bar");
    }

    #[test]
    fn test_invalid_token_is_kept_with_error() {
        let filter = Filter::new(" garbage ");
        assert!(!filter.is_valid());
        assert_eq!(filter.raw(), "garbage");
        assert!(filter.matcher().is_none());
        assert!(matches!(
            filter.error(),
            Some(FilterParseError::MissingOperator(_))
        ));
    }

    #[test]
    fn test_record_evaluation_marks_applied() {
        let mut filter = Filter::new("a=~b.*");
        assert!(filter.is_regex());
        filter.record_evaluation(7);
        assert!(filter.applied());
        assert_eq!(filter.hits(), 7);

        filter.mark_unapplied();
        assert!(!filter.applied());
        assert_eq!(filter.hits(), 7);
    }
}
