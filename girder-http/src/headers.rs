//! Immutable HTTP headers with a deferred update queue.
//!
//! `HttpHeaders` is a value type: every mutation returns a new instance and
//! the receiver is never changed. Updates are queued, not applied — a header
//! map built up through N `set`/`append` calls costs one O(N) apply at the
//! first read instead of N intermediate copies. Lookup is case-insensitive
//! while the first-seen casing of each name is preserved for rendering.

use std::fmt;
use std::sync::{Arc, OnceLock};

use indexmap::IndexMap;
use parking_lot::Mutex;

/// Case-insensitive, multi-valued, insertion-ordered header map.
///
/// Cheap to clone; clones share storage until one of them is updated.
///
/// # Examples
///
/// ```
/// use girder_http::HttpHeaders;
///
/// let headers = HttpHeaders::new()
///     .set("Content-Type", "application/json")
///     .append("Accept", "text/plain");
/// assert_eq!(headers.get("content-type"), Some("application/json"));
/// ```
#[derive(Clone, Default)]
pub struct HttpHeaders {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    /// Unresolved source of this instance. Taken exactly once, by the first
    /// read; `None` afterwards (or for an instance created empty).
    pending: Mutex<Option<Lazy>>,
    /// Authoritative storage once materialized.
    table: OnceLock<Table>,
}

enum Lazy {
    /// A newline-separated `Name: value` header block, unparsed.
    Raw(String),
    /// Name/values pairs supplied at construction, uncopied.
    Pairs(Vec<(String, Vec<String>)>),
    /// A clone: shared reference to the instance it was derived from plus
    /// the ordered updates to apply on top of it.
    Derived { source: Arc<Inner>, ops: Vec<Update> },
}

#[derive(Clone)]
enum Update {
    Append { name: String, values: Vec<String> },
    Set { name: String, values: Vec<String> },
    Delete { name: String, value: Option<String> },
}

impl Inner {
    fn table(&self) -> &Table {
        self.table.get_or_init(|| match self.pending.lock().take() {
            None => Table::default(),
            Some(Lazy::Raw(raw)) => Table::parse(&raw),
            Some(Lazy::Pairs(pairs)) => Table::from_pairs(pairs),
            Some(Lazy::Derived { source, ops }) => {
                // Copy, not share: the ancestor may be cloned again with a
                // different update queue.
                let mut table = source.table().clone();
                for op in ops {
                    table.apply(op);
                }
                table
            }
        })
    }
}

/// Materialized storage: lower-cased name -> (first-seen casing, values).
#[derive(Clone, Default)]
struct Table {
    entries: IndexMap<String, Entry>,
}

#[derive(Clone)]
struct Entry {
    name: String,
    values: Vec<String>,
}

impl Table {
    /// Parse a newline-separated header block. A line is accepted only when
    /// it carries a `:` at an index greater than zero; anything else is
    /// dropped. Repeated names accumulate values in order.
    fn parse(raw: &str) -> Self {
        let mut table = Table::default();
        for line in raw.split('\n') {
            if let Some(idx) = line.find(':')
                && idx > 0
            {
                let name = &line[..idx];
                let value = line[idx + 1..].trim();
                table.append(name, vec![value.to_string()]);
            }
        }
        table
    }

    fn from_pairs(pairs: Vec<(String, Vec<String>)>) -> Self {
        let mut table = Table::default();
        for (name, values) in pairs {
            table.append(&name, values);
        }
        table
    }

    fn apply(&mut self, op: Update) {
        match op {
            Update::Append { name, values } => self.append(&name, values),
            Update::Set { name, values } => self.set(&name, values),
            Update::Delete { name, value } => self.delete(&name, value.as_deref()),
        }
    }

    fn append(&mut self, name: &str, values: Vec<String>) {
        if values.is_empty() {
            return;
        }
        let key = name.to_ascii_lowercase();
        self.entries
            .entry(key)
            .or_insert_with(|| Entry {
                name: name.to_string(),
                values: Vec::new(),
            })
            .values
            .extend(values);
    }

    fn set(&mut self, name: &str, values: Vec<String>) {
        if values.is_empty() {
            return;
        }
        let key = name.to_ascii_lowercase();
        match self.entries.get_mut(&key) {
            // The first-seen casing wins; only the values are replaced.
            Some(entry) => entry.values = values,
            None => {
                self.entries.insert(
                    key,
                    Entry {
                        name: name.to_string(),
                        values,
                    },
                );
            }
        }
    }

    fn delete(&mut self, name: &str, value: Option<&str>) {
        let key = name.to_ascii_lowercase();
        match value {
            None => {
                self.entries.shift_remove(&key);
            }
            Some(value) => {
                if let Some(entry) = self.entries.get_mut(&key) {
                    entry.values.retain(|v| v != value);
                    if entry.values.is_empty() {
                        self.entries.shift_remove(&key);
                    }
                }
            }
        }
    }
}

impl HttpHeaders {
    /// Create an empty header map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Construct lazily from a newline-separated `Name: value` block.
    ///
    /// The block is not parsed until the first read.
    pub fn from_raw(block: impl Into<String>) -> Self {
        Self::with_pending(Lazy::Raw(block.into()))
    }

    /// Construct lazily from name/value pairs. Repeated names accumulate.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let pairs = pairs
            .into_iter()
            .map(|(name, value)| (name.into(), vec![value.into()]))
            .collect();
        Self::with_pending(Lazy::Pairs(pairs))
    }

    /// Construct lazily from name/values pairs.
    pub fn from_multi_pairs<I, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, Vec<String>)>,
        K: Into<String>,
    {
        let pairs = pairs
            .into_iter()
            .map(|(name, values)| (name.into(), values))
            .collect();
        Self::with_pending(Lazy::Pairs(pairs))
    }

    fn with_pending(lazy: Lazy) -> Self {
        Self {
            inner: Arc::new(Inner {
                pending: Mutex::new(Some(lazy)),
                table: OnceLock::new(),
            }),
        }
    }

    /// Whether a header with this name exists (case-insensitive).
    pub fn has(&self, name: &str) -> bool {
        self.inner
            .table()
            .entries
            .contains_key(&name.to_ascii_lowercase())
    }

    /// First value recorded for this name, if any.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.inner
            .table()
            .entries
            .get(&name.to_ascii_lowercase())
            .and_then(|entry| entry.values.first())
            .map(String::as_str)
    }

    /// Every value recorded for this name, in insertion order.
    pub fn get_all(&self, name: &str) -> Option<&[String]> {
        self.inner
            .table()
            .entries
            .get(&name.to_ascii_lowercase())
            .map(|entry| entry.values.as_slice())
    }

    /// Header names in first-seen order, with their first-seen casing.
    pub fn keys(&self) -> Vec<String> {
        self.inner
            .table()
            .entries
            .values()
            .map(|entry| entry.name.clone())
            .collect()
    }

    /// Number of distinct header names.
    pub fn len(&self) -> usize {
        self.inner.table().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.table().entries.is_empty()
    }

    /// All (name, values) pairs in order, with first-seen casing.
    pub fn entries(&self) -> Vec<(String, Vec<String>)> {
        self.inner
            .table()
            .entries
            .values()
            .map(|entry| (entry.name.clone(), entry.values.clone()))
            .collect()
    }

    /// Return a new map with `value` appended to `name`.
    pub fn append(&self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.update(Update::Append {
            name: name.into(),
            values: vec![value.into()],
        })
    }

    /// Return a new map with all of `values` appended to `name`.
    /// Appending an empty list is a no-op.
    pub fn append_values(&self, name: impl Into<String>, values: Vec<String>) -> Self {
        self.update(Update::Append {
            name: name.into(),
            values,
        })
    }

    /// Return a new map where `name` holds exactly `value`.
    pub fn set(&self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.update(Update::Set {
            name: name.into(),
            values: vec![value.into()],
        })
    }

    /// Return a new map where `name` holds exactly `values`.
    /// Setting an empty list is a no-op.
    pub fn set_values(&self, name: impl Into<String>, values: Vec<String>) -> Self {
        self.update(Update::Set {
            name: name.into(),
            values,
        })
    }

    /// Return a new map without `name`.
    pub fn delete(&self, name: impl Into<String>) -> Self {
        self.update(Update::Delete {
            name: name.into(),
            value: None,
        })
    }

    /// Return a new map with one `value` removed from `name`; the name
    /// disappears entirely when its last value is removed.
    pub fn delete_value(&self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.update(Update::Delete {
            name: name.into(),
            value: Some(value.into()),
        })
    }

    /// Queue an update without materializing. Derivations are funneled to
    /// the canonical source: a clone of a clone shares the original source
    /// and carries the combined queue, keeping ancestor chains one level
    /// deep.
    fn update(&self, op: Update) -> Self {
        let (source, mut ops) = {
            let pending = self.inner.pending.lock();
            match pending.as_ref() {
                Some(Lazy::Derived { source, ops }) => (source.clone(), ops.clone()),
                _ => (self.inner.clone(), Vec::new()),
            }
        };
        ops.push(op);
        Self {
            inner: Arc::new(Inner {
                pending: Mutex::new(Some(Lazy::Derived { source, ops })),
                table: OnceLock::new(),
            }),
        }
    }
}

impl fmt::Display for HttpHeaders {
    /// Wire-style rendering: one `Name: v1,v2` line per header.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lines: Vec<String> = self
            .inner
            .table()
            .entries
            .values()
            .map(|entry| format!("{}: {}", entry.name, entry.values.join(",")))
            .collect();
        f.write_str(&lines.join("\n"))
    }
}

impl fmt::Debug for HttpHeaders {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(
                self.inner
                    .table()
                    .entries
                    .values()
                    .map(|entry| (&entry.name, &entry.values)),
            )
            .finish()
    }
}

impl<K, V> FromIterator<(K, V)> for HttpHeaders
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::from_pairs(iter)
    }
}
