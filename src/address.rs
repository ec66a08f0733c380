use std::cell::RefCell;
use std::rc::Rc;
use url::form_urlencoded;

/// Access to the query string of the current location
pub trait AddressSource {
    /// Query string without the leading `?`
    fn query(&self) -> String;

    /// Replace the query of the current history entry without navigating
    fn replace_query(&mut self, query: &str);
}

/// Lets the host keep a handle on a location the engine also writes to
impl<T: AddressSource> AddressSource for Rc<RefCell<T>> {
    fn query(&self) -> String {
        self.borrow().query()
    }

    fn replace_query(&mut self, query: &str) {
        self.borrow_mut().replace_query(query)
    }
}

/// In-memory location with a history stack
///
/// `navigate` pushes a new entry, as an external link or the user would;
/// `replace_query` rewrites the current entry in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryAddress {
    history: Vec<Location>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Location {
    path: String,
    query: String,
}

impl Location {
    fn parse(location: &str) -> Self {
        let (path, query) = location.split_once('?').unwrap_or((location, ""));
        Location {
            path: if path.is_empty() { "/" } else { path }.to_string(),
            query: query.to_string(),
        }
    }
}

impl MemoryAddress {
    /// Start at a location such as `/` or `/?q=foo%3Dbar`
    pub fn new(location: &str) -> Self {
        Self {
            history: vec![Location::parse(location)],
        }
    }

    pub fn navigate(&mut self, location: &str) {
        self.history.push(Location::parse(location));
    }

    /// Current location rendered as `path?query`
    pub fn location(&self) -> String {
        let current = self.current();
        if current.query.is_empty() {
            current.path.clone()
        } else {
            format!("{}?{}", current.path, current.query)
        }
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    fn current(&self) -> &Location {
        self.history
            .last()
            .expect("history always holds the initial location")
    }
}

impl Default for MemoryAddress {
    fn default() -> Self {
        Self::new("/")
    }
}

impl AddressSource for MemoryAddress {
    fn query(&self) -> String {
        self.current().query.clone()
    }

    fn replace_query(&mut self, query: &str) {
        if let Some(current) = self.history.last_mut() {
            current.query = query.to_string();
        }
    }
}

/// Reads and writes the filter set as repeated query parameters
#[derive(Debug)]
pub struct AddressSync<A> {
    source: A,
    key: String,
}

impl<A: AddressSource> AddressSync<A> {
    pub fn new(source: A, key: impl Into<String>) -> Self {
        Self {
            source,
            key: key.into(),
        }
    }

    pub fn source(&self) -> &A {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut A {
        &mut self.source
    }

    pub fn into_source(self) -> A {
        self.source
    }

    /// Tokens from every occurrence of the filter key, in order
    ///
    /// Empty values are dropped. Returns None when no non-empty value is
    /// present, so `?q=` reads the same as a query without `q`.
    pub fn read(&self) -> Option<Vec<String>> {
        let query = self.source.query();
        let tokens: Vec<String> = form_urlencoded::parse(query.as_bytes())
            .filter(|(key, _)| key == self.key.as_str())
            .map(|(_, value)| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .collect();

        if tokens.is_empty() { None } else { Some(tokens) }
    }

    /// Encode the query that [`AddressSync::write`] would produce
    ///
    /// Parameters other than the filter key are copied byte for byte; only
    /// the filter pairs are re-encoded.
    pub fn encode(&self, tokens: &[String]) -> String {
        let query = self.source.query();
        let mut segments: Vec<String> = query
            .split('&')
            .filter(|segment| !segment.is_empty() && !self.is_filter_segment(segment))
            .map(str::to_string)
            .collect();

        segments.extend(tokens.iter().map(|token| {
            form_urlencoded::Serializer::new(String::new())
                .append_pair(&self.key, token)
                .finish()
        }));

        segments.join("&")
    }

    fn is_filter_segment(&self, segment: &str) -> bool {
        form_urlencoded::parse(segment.as_bytes())
            .next()
            .is_some_and(|(key, _)| key == self.key.as_str())
    }

    /// Replace the filter key in the current entry; returns whether anything changed
    pub fn write(&mut self, tokens: &[String]) -> bool {
        let encoded = self.encode(tokens);
        if encoded == self.source.query() {
            return false;
        }

        tracing::debug!(query = %encoded, "updating address");
        self.source.replace_query(&encoded);
        true
    }
}
