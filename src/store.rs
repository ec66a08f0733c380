use crate::filter::Filter;
use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::{Rc, Weak};

/// What kind of mutation produced a change notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Replaced,
    Added,
    Removed,
    MarkedUnapplied,
}

/// Payload delivered to store listeners after each mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterChange {
    pub kind: ChangeKind,
    /// Raw tokens of the store after the mutation, in order
    pub tokens: Vec<String>,
}

/// Selects a filter for removal, either by raw token or by position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterRef<'a> {
    Raw(&'a str),
    Index(usize),
}

impl<'a> From<&'a str> for FilterRef<'a> {
    fn from(raw: &'a str) -> Self {
        FilterRef::Raw(raw)
    }
}

impl<'a> From<&'a String> for FilterRef<'a> {
    fn from(raw: &'a String) -> Self {
        FilterRef::Raw(raw.as_str())
    }
}

impl From<usize> for FilterRef<'_> {
    fn from(index: usize) -> Self {
        FilterRef::Index(index)
    }
}

type Listener = Box<dyn FnMut(&FilterChange)>;

#[derive(Default)]
struct ListenerRegistry {
    next_id: u64,
    entries: Vec<(u64, Listener)>,
    /// Ids unsubscribed while their listener was detached for a notification
    cancelled: HashSet<u64>,
}

/// Handle returned by [`FilterStore::subscribe`]
///
/// Dropping the handle keeps the listener registered; call
/// [`Subscription::unsubscribe`] to remove it.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    registry: Weak<RefCell<ListenerRegistry>>,
}

impl Subscription {
    pub fn unsubscribe(self) {
        let Some(registry) = self.registry.upgrade() else {
            return;
        };
        let mut registry = registry.borrow_mut();
        let before = registry.entries.len();
        registry.entries.retain(|(id, _)| *id != self.id);
        if registry.entries.len() == before {
            registry.cancelled.insert(self.id);
        }
    }
}

impl std::fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("listeners", &self.entries.len())
            .finish()
    }
}

/// Ordered, deduplicated set of filters
///
/// Insertion order is display and evaluation order. The raw token is the
/// uniqueness key: duplicates are dropped, never appended twice.
#[derive(Debug, Default)]
pub struct FilterStore {
    filters: Vec<Filter>,
    listeners: Rc<RefCell<ListenerRegistry>>,
}

impl FilterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    /// Filters that parsed successfully, the set a downstream evaluator matches with
    pub fn valid_filters(&self) -> impl Iterator<Item = &Filter> {
        self.filters.iter().filter(|f| f.is_valid())
    }

    pub fn tokens(&self) -> Vec<String> {
        self.filters.iter().map(|f| f.raw().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn get(&self, raw: &str) -> Option<&Filter> {
        self.filters.iter().find(|f| f.raw() == raw)
    }

    pub fn contains(&self, raw: &str) -> bool {
        self.get(raw).is_some()
    }

    /// Replace the whole store with freshly parsed, unapplied filters
    ///
    /// Blank tokens are skipped: they carry no filter and could not be
    /// written to the address.
    pub fn replace_all<I, S>(&mut self, tokens: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let filters: Vec<Filter> = tokens
            .into_iter()
            .filter(|token| !token.as_ref().trim().is_empty())
            .map(|token| Filter::new(token.as_ref()))
            .filter(|filter| seen.insert(filter.raw().to_string()))
            .collect();

        for filter in filters.iter().filter(|f| !f.is_valid()) {
            if let Some(err) = filter.error() {
                tracing::warn!(token = filter.raw(), "invalid filter: {err}");
            }
        }

        self.filters = filters;
        self.notify(ChangeKind::Replaced);
    }

    /// Append a filter; returns false without notifying if it already exists
    /// or the token is blank
    ///
    /// Any edit invalidates the previous evaluation, so all filters become
    /// unapplied. The same holds for [`FilterStore::remove`].
    pub fn add(&mut self, token: &str) -> bool {
        if token.trim().is_empty() {
            tracing::debug!("ignoring blank filter token");
            return false;
        }
        let filter = Filter::new(token);
        if self.contains(filter.raw()) {
            return false;
        }
        if let Some(err) = filter.error() {
            tracing::warn!(token = filter.raw(), "invalid filter: {err}");
        }

        self.filters.push(filter);
        self.filters.iter_mut().for_each(Filter::mark_unapplied);
        self.notify(ChangeKind::Added);
        true
    }

    /// Remove a filter; returns None without notifying if it is absent
    ///
    /// Raw tokens are normalized the same way [`FilterStore::add`] does, so
    /// `remove("a = b")` removes the filter added as `"a=b"`.
    pub fn remove<'a>(&mut self, target: impl Into<FilterRef<'a>>) -> Option<Filter> {
        let index = match target.into() {
            FilterRef::Raw(token) => {
                let raw = Filter::new(token).raw().to_string();
                self.filters.iter().position(|f| f.raw() == raw)?
            }
            FilterRef::Index(index) if index < self.filters.len() => index,
            FilterRef::Index(_) => return None,
        };

        let removed = self.filters.remove(index);
        self.filters.iter_mut().for_each(Filter::mark_unapplied);
        self.notify(ChangeKind::Removed);
        Some(removed)
    }

    /// Flag every filter as not yet used by the evaluator
    pub fn mark_all_unapplied(&mut self) {
        self.filters.iter_mut().for_each(Filter::mark_unapplied);
        self.notify(ChangeKind::MarkedUnapplied);
    }

    /// Record the outcome of an evaluation pass for one filter
    ///
    /// This is the write path for the downstream evaluator and does not
    /// notify listeners. Returns false when no such filter exists.
    pub fn record_evaluation(&mut self, raw: &str, hits: usize) -> bool {
        match self.filters.iter_mut().find(|f| f.raw() == raw) {
            Some(filter) => {
                filter.record_evaluation(hits);
                true
            }
            None => false,
        }
    }

    /// Register a change listener, called after every mutation
    pub fn subscribe(&self, listener: impl FnMut(&FilterChange) + 'static) -> Subscription {
        let mut registry = self.listeners.borrow_mut();
        let id = registry.next_id;
        registry.next_id += 1;
        registry.entries.push((id, Box::new(listener)));

        Subscription {
            id,
            registry: Rc::downgrade(&self.listeners),
        }
    }

    fn notify(&self, kind: ChangeKind) {
        let change = FilterChange {
            kind,
            tokens: self.tokens(),
        };

        // Detach listeners while calling them so they may subscribe or
        // unsubscribe without a RefCell double borrow. The guard puts them
        // back even if a listener panics.
        let mut detached = Detached {
            registry: &self.listeners,
            entries: std::mem::take(&mut self.listeners.borrow_mut().entries),
        };
        for (_, listener) in detached.entries.iter_mut() {
            listener(&change);
        }
    }
}

/// Listeners taken out of the registry for one notification round
struct Detached<'a> {
    registry: &'a RefCell<ListenerRegistry>,
    entries: Vec<(u64, Listener)>,
}

impl Drop for Detached<'_> {
    fn drop(&mut self) {
        let mut registry = self.registry.borrow_mut();
        let cancelled = std::mem::take(&mut registry.cancelled);
        let mut entries = std::mem::take(&mut self.entries);
        entries.retain(|(id, _)| !cancelled.contains(id));
        // listeners subscribed during the round go after the existing ones
        entries.append(&mut registry.entries);
        registry.entries = entries;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::panic::{AssertUnwindSafe, catch_unwind};

    fn counting(store: &FilterStore) -> (Rc<RefCell<Vec<FilterChange>>>, Subscription) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let sub = store.subscribe(move |change| sink.borrow_mut().push(change.clone()));
        (seen, sub)
    }

    #[test]
    fn test_replace_all_dedupes_and_keeps_order() {
        let mut store = FilterStore::new();
        store.replace_all(["b=c", "a=b", "a=b", "b = c"]);
        assert_eq!(store.tokens(), vec!["b=c", "a=b"]);
        assert!(store.filters().iter().all(|f| !f.applied()));
    }

    #[test]
    fn test_replace_all_keeps_invalid_tokens() {
        let mut store = FilterStore::new();
        store.replace_all(["a=b", "broken", "c!~("]);
        assert_eq!(store.len(), 3);
        assert_eq!(store.valid_filters().count(), 1);
        assert!(!store.get("broken").unwrap().is_valid());
    }

    #[test]
    fn test_replace_all_resets_evaluation_state() {
        let mut store = FilterStore::new();
        store.replace_all(["a=b"]);
        assert!(store.record_evaluation("a=b", 3));
        store.replace_all(["a=b"]);
        let filter = store.get("a=b").unwrap();
        assert!(!filter.applied());
        assert_eq!(filter.hits(), 0);
    }

    #[test]
    fn test_add_is_idempotent() {
        let mut store = FilterStore::new();
        let (seen, _sub) = counting(&store);

        assert!(store.add("a=b"));
        assert!(!store.add("a=b"));
        assert!(!store.add(" a = b"));

        assert_eq!(store.tokens(), vec!["a=b"]);
        assert_eq!(seen.borrow().len(), 1);
        assert_eq!(seen.borrow()[0].kind, ChangeKind::Added);
    }

    #[test]
    fn test_blank_tokens_are_skipped() {
        let mut store = FilterStore::new();
        let (seen, _sub) = counting(&store);

        assert!(store.add("a=b"));
        assert!(!store.add("   "));
        assert!(!store.add(""));
        assert_eq!(store.tokens(), vec!["a=b"]);
        assert_eq!(seen.borrow().len(), 1);

        store.replace_all(["c=d", " ", "", "e=f"]);
        assert_eq!(store.tokens(), vec!["c=d", "e=f"]);
    }

    #[test]
    fn test_remove_by_raw_and_index() {
        let mut store = FilterStore::new();
        store.replace_all(["a=b", "c=d", "e=f"]);
        let (seen, _sub) = counting(&store);

        assert_eq!(store.remove("c = d").map(|f| f.raw().to_string()), Some("c=d".into()));
        assert_eq!(store.remove(0usize).map(|f| f.raw().to_string()), Some("a=b".into()));
        assert!(store.remove("missing=1").is_none());
        assert!(store.remove(5usize).is_none());

        assert_eq!(store.tokens(), vec!["e=f"]);
        assert_eq!(seen.borrow().len(), 2);
    }

    #[test]
    fn test_mark_all_unapplied() {
        let mut store = FilterStore::new();
        store.replace_all(["a=b", "c=d"]);
        store.record_evaluation("a=b", 1);
        store.record_evaluation("c=d", 2);

        store.mark_all_unapplied();
        assert!(store.filters().iter().all(|f| !f.applied()));
        assert_eq!(store.get("c=d").unwrap().hits(), 2);
    }

    #[test]
    fn test_edits_mark_all_unapplied() {
        let mut store = FilterStore::new();
        store.replace_all(["a=b"]);
        store.record_evaluation("a=b", 4);

        store.add("c=d");
        assert!(!store.get("a=b").unwrap().applied());

        store.record_evaluation("a=b", 4);
        store.remove("c=d");
        assert!(!store.get("a=b").unwrap().applied());
    }

    #[test]
    fn test_record_evaluation_unknown_filter() {
        let mut store = FilterStore::new();
        assert!(!store.record_evaluation("a=b", 1));
    }

    #[test]
    fn test_unsubscribe_stops_notifications() {
        let mut store = FilterStore::new();
        let (seen, sub) = counting(&store);
        store.add("a=b");
        sub.unsubscribe();
        store.add("c=d");
        assert_eq!(seen.borrow().len(), 1);
    }

    #[test]
    fn test_listener_can_unsubscribe_during_notification() {
        let mut store = FilterStore::new();
        let slot: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));
        let calls = Rc::new(RefCell::new(0));

        let slot_in = Rc::clone(&slot);
        let calls_in = Rc::clone(&calls);
        let sub = store.subscribe(move |_| {
            *calls_in.borrow_mut() += 1;
            if let Some(sub) = slot_in.borrow_mut().take() {
                sub.unsubscribe();
            }
        });
        *slot.borrow_mut() = Some(sub);

        store.add("a=b");
        store.add("c=d");
        assert_eq!(*calls.borrow(), 1);
    }

    #[test]
    fn test_listeners_survive_a_panicking_listener() {
        let mut store = FilterStore::new();
        let (seen, _sub) = counting(&store);
        let armed = Rc::new(Cell::new(true));
        let armed_in = Rc::clone(&armed);
        let _failing = store.subscribe(move |_| {
            if armed_in.replace(false) {
                panic!("listener failed");
            }
        });

        let result = catch_unwind(AssertUnwindSafe(|| store.add("a=b")));
        assert!(result.is_err());

        store.add("c=d");
        assert_eq!(seen.borrow().len(), 2);
        assert!(!armed.get());

        let late = Rc::new(Cell::new(0));
        let late_in = Rc::clone(&late);
        let _late = store.subscribe(move |_| late_in.set(late_in.get() + 1));
        store.add("e=f");
        assert_eq!(seen.borrow().len(), 3);
        assert_eq!(late.get(), 1);
    }

    #[test]
    fn test_change_carries_tokens_after_mutation() {
        let mut store = FilterStore::new();
        let (seen, _sub) = counting(&store);
        store.replace_all(["x=1", "y=2"]);
        assert_eq!(
            seen.borrow()[0],
            FilterChange {
                kind: ChangeKind::Replaced,
                tokens: vec!["x=1".to_string(), "y=2".to_string()],
            }
        );
    }
}
