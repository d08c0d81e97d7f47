//! Immutable URL query parameters with a deferred update queue.
//!
//! `HttpParams` mirrors the copy-on-write design of
//! [`HttpHeaders`](crate::HttpHeaders): updates are queued on a new instance
//! and applied once, at the first read. Keys are plain strings (no case
//! folding) and serialization goes through a pluggable percent-codec.

use std::fmt;
use std::sync::{Arc, OnceLock};

use indexmap::IndexMap;
use parking_lot::Mutex;

/// Encodes and decodes query-string keys and values.
///
/// Keys and values are encoded independently so a codec may treat them
/// differently (e.g. keeping `=` legal inside values only).
pub trait HttpParameterCodec: Send + Sync {
    fn encode_key(&self, key: &str) -> String;
    fn encode_value(&self, value: &str) -> String;
    fn decode_key(&self, key: &str) -> String;
    fn decode_value(&self, value: &str) -> String;
}

/// Default codec: percent-encoding with the characters `@ : $ , ; + = ? /`
/// left readable, matching how query strings are conventionally encoded.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpUrlEncodingCodec;

fn standard_encode(input: &str) -> String {
    urlencoding::encode(input)
        .replace("%40", "@")
        .replace("%3A", ":")
        .replace("%24", "$")
        .replace("%2C", ",")
        .replace("%3B", ";")
        .replace("%2B", "+")
        .replace("%3D", "=")
        .replace("%3F", "?")
        .replace("%2F", "/")
}

fn standard_decode(input: &str) -> String {
    urlencoding::decode(input)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| input.to_string())
}

impl HttpParameterCodec for HttpUrlEncodingCodec {
    fn encode_key(&self, key: &str) -> String {
        standard_encode(key)
    }

    fn encode_value(&self, value: &str) -> String {
        standard_encode(value)
    }

    fn decode_key(&self, key: &str) -> String {
        standard_decode(key)
    }

    fn decode_value(&self, value: &str) -> String {
        standard_decode(value)
    }
}

/// Insertion-ordered, multi-valued query parameter map.
///
/// A value type: every mutation returns a new instance. Construction from a
/// query string defers parsing until the first read.
///
/// # Examples
///
/// ```
/// use girder_http::HttpParams;
///
/// let params = HttpParams::new().set("page", "2").append("tag", "a");
/// assert_eq!(params.to_query_string(), "page=2&tag=a");
/// ```
#[derive(Clone)]
pub struct HttpParams {
    codec: Arc<dyn HttpParameterCodec>,
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    pending: Mutex<Option<Lazy>>,
    table: OnceLock<Table>,
}

enum Lazy {
    /// An unparsed query string (optionally with a leading `?`).
    Raw(String),
    Pairs(Vec<(String, Vec<String>)>),
    Derived { source: Arc<Inner>, ops: Vec<Update> },
}

#[derive(Clone)]
enum Update {
    Append { key: String, values: Vec<String> },
    Set { key: String, values: Vec<String> },
    Delete { key: String, value: Option<String> },
}

#[derive(Clone, Default)]
struct Table {
    entries: IndexMap<String, Vec<String>>,
}

impl Table {
    /// Parse an `&`-separated query string. A pair without `=` becomes a
    /// bare key with an empty value. Both halves go through the codec.
    fn parse(raw: &str, codec: &dyn HttpParameterCodec) -> Self {
        let mut table = Table::default();
        if raw.is_empty() {
            return table;
        }
        let raw = raw.strip_prefix('?').unwrap_or(raw);
        for pair in raw.split('&') {
            let (key, value) = match pair.find('=') {
                None => (codec.decode_key(pair), String::new()),
                Some(idx) => (
                    codec.decode_key(&pair[..idx]),
                    codec.decode_value(&pair[idx + 1..]),
                ),
            };
            table.entries.entry(key).or_default().push(value);
        }
        table
    }

    fn from_pairs(pairs: Vec<(String, Vec<String>)>) -> Self {
        let mut table = Table::default();
        for (key, values) in pairs {
            if values.is_empty() {
                continue;
            }
            table.entries.entry(key).or_default().extend(values);
        }
        table
    }

    fn apply(&mut self, op: Update) {
        match op {
            Update::Append { key, values } => {
                if values.is_empty() {
                    return;
                }
                self.entries.entry(key).or_default().extend(values);
            }
            Update::Set { key, values } => {
                if values.is_empty() {
                    return;
                }
                self.entries.insert(key, values);
            }
            Update::Delete { key, value } => match value {
                None => {
                    self.entries.shift_remove(&key);
                }
                Some(value) => {
                    if let Some(values) = self.entries.get_mut(&key) {
                        values.retain(|v| v != &value);
                        if values.is_empty() {
                            self.entries.shift_remove(&key);
                        }
                    }
                }
            },
        }
    }
}

impl Inner {
    fn table(&self, codec: &dyn HttpParameterCodec) -> &Table {
        self.table.get_or_init(|| match self.pending.lock().take() {
            None => Table::default(),
            Some(Lazy::Raw(raw)) => Table::parse(&raw, codec),
            Some(Lazy::Pairs(pairs)) => Table::from_pairs(pairs),
            Some(Lazy::Derived { source, ops }) => {
                let mut table = source.table(codec).clone();
                for op in ops {
                    table.apply(op);
                }
                table
            }
        })
    }
}

impl HttpParams {
    /// Create an empty parameter map with the default codec.
    pub fn new() -> Self {
        Self {
            codec: Arc::new(HttpUrlEncodingCodec),
            inner: Arc::new(Inner::default()),
        }
    }

    /// Construct lazily from a query string (a leading `?` is tolerated).
    /// Parsing happens at the first read.
    pub fn from_query(query: impl Into<String>) -> Self {
        Self::with_pending(Lazy::Raw(query.into()))
    }

    /// Construct lazily from key/value pairs. Repeated keys accumulate.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let pairs = pairs
            .into_iter()
            .map(|(key, value)| (key.into(), vec![value.into()]))
            .collect();
        Self::with_pending(Lazy::Pairs(pairs))
    }

    fn with_pending(lazy: Lazy) -> Self {
        Self {
            codec: Arc::new(HttpUrlEncodingCodec),
            inner: Arc::new(Inner {
                pending: Mutex::new(Some(lazy)),
                table: OnceLock::new(),
            }),
        }
    }

    /// Replace the codec. Set this before the first read: the codec also
    /// drives query-string parsing.
    pub fn with_codec(mut self, codec: Arc<dyn HttpParameterCodec>) -> Self {
        self.codec = codec;
        self
    }

    fn table(&self) -> &Table {
        self.inner.table(self.codec.as_ref())
    }

    pub fn has(&self, key: &str) -> bool {
        self.table().entries.contains_key(key)
    }

    /// First value recorded for this key, if any.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.table()
            .entries
            .get(key)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// Every value recorded for this key, in insertion order.
    pub fn get_all(&self, key: &str) -> Option<&[String]> {
        self.table().entries.get(key).map(Vec::as_slice)
    }

    /// Keys in first-seen order.
    pub fn keys(&self) -> Vec<String> {
        self.table().entries.keys().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.table().entries.is_empty()
    }

    /// Return a new map with `value` appended to `key`.
    pub fn append(&self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.update(Update::Append {
            key: key.into(),
            values: vec![value.into()],
        })
    }

    /// Return a new map with all of `values` appended to `key`.
    /// Appending an empty list is a no-op.
    pub fn append_all(&self, key: impl Into<String>, values: Vec<String>) -> Self {
        self.update(Update::Append {
            key: key.into(),
            values,
        })
    }

    /// Return a new map where `key` holds exactly `value`.
    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.update(Update::Set {
            key: key.into(),
            values: vec![value.into()],
        })
    }

    /// Return a new map without `key`.
    pub fn delete(&self, key: impl Into<String>) -> Self {
        self.update(Update::Delete {
            key: key.into(),
            value: None,
        })
    }

    /// Return a new map with one `value` removed from `key`; the key
    /// disappears when its last value is removed.
    pub fn delete_value(&self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.update(Update::Delete {
            key: key.into(),
            value: Some(value.into()),
        })
    }

    /// Render as an encoded query string (no leading `?`). Keys whose value
    /// list is empty are omitted.
    pub fn to_query_string(&self) -> String {
        self.table()
            .entries
            .iter()
            .map(|(key, values)| {
                let encoded_key = self.codec.encode_key(key);
                values
                    .iter()
                    .map(|value| format!("{}={}", encoded_key, self.codec.encode_value(value)))
                    .collect::<Vec<_>>()
                    .join("&")
            })
            .filter(|pair| !pair.is_empty())
            .collect::<Vec<_>>()
            .join("&")
    }

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
            codec: self.codec.clone(),
            inner: Arc::new(Inner {
                pending: Mutex::new(Some(Lazy::Derived { source, ops })),
                table: OnceLock::new(),
            }),
        }
    }
}

impl Default for HttpParams {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for HttpParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_query_string())
    }
}

impl fmt::Debug for HttpParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.table().entries.iter()).finish()
    }
}

impl<K, V> FromIterator<(K, V)> for HttpParams
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::from_pairs(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_params_empty() {
        let params = HttpParams::new();
        assert!(params.is_empty());
        assert_eq!(params.to_query_string(), "");
    }

    #[test]
    fn test_mutations_leave_receiver_unchanged() {
        let base = HttpParams::from_pairs([("a", "1")]);
        let _updated = base.set("a", "2");
        let _deleted = base.delete("a");

        assert_eq!(base.get("a"), Some("1"));
    }

    #[test]
    fn test_set_append_delete_ordering() {
        let params = HttpParams::new()
            .set("a", "1")
            .append("a", "2")
            .append("b", "3")
            .delete_value("a", "1");
        assert_eq!(params.to_query_string(), "a=2&b=3");
    }

    #[test]
    fn test_parse_bare_key_and_empty_value() {
        let params = HttpParams::from_query("flag&x=");
        assert_eq!(params.get("flag"), Some(""));
        assert_eq!(params.get("x"), Some(""));
    }

    #[test]
    fn test_parse_tolerates_leading_question_mark() {
        let params = HttpParams::from_query("?a=1&b=2");
        assert_eq!(params.keys(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_round_trip_preserves_keys_and_order() {
        let original = HttpParams::from_pairs([("first", "one"), ("second", "two two")])
            .append("first", "three");
        let rendered = original.to_query_string();
        let reparsed = HttpParams::from_query(rendered.clone());

        assert_eq!(reparsed.keys(), original.keys());
        assert_eq!(
            reparsed.get_all("first"),
            Some(&["one".to_string(), "three".to_string()][..])
        );
        assert_eq!(reparsed.get("second"), Some("two two"));
        assert_eq!(rendered, "first=one&first=three&second=two%20two");
    }

    #[test]
    fn test_standard_codec_keeps_query_characters_readable() {
        let params = HttpParams::new().set("redirect", "https://example.com/a?b=c");
        assert_eq!(
            params.to_query_string(),
            "redirect=https://example.com/a?b=c"
        );
    }

    #[test]
    fn test_standard_codec_decodes_escapes() {
        let params = HttpParams::from_query("q=caf%C3%A9");
        assert_eq!(params.get("q"), Some("café"));
    }

    #[test]
    fn test_repeated_reads_are_idempotent() {
        let params = HttpParams::from_query("a=1&a=2").append("a", "3");
        assert_eq!(params.get_all("a").map(<[String]>::len), Some(3));
        assert_eq!(params.get_all("a").map(<[String]>::len), Some(3));
    }

    #[test]
    fn test_clone_chain_shares_canonical_source() {
        let base = HttpParams::from_query("a=1");
        let second = base.set("b", "2");
        let third = second.delete("a");

        assert!(!third.has("a"));
        assert_eq!(third.get("b"), Some("2"));
        assert_eq!(second.get("a"), Some("1"));
        assert!(!base.has("b"));
    }

    struct UpperCodec;

    impl HttpParameterCodec for UpperCodec {
        fn encode_key(&self, key: &str) -> String {
            key.to_ascii_uppercase()
        }
        fn encode_value(&self, value: &str) -> String {
            value.to_ascii_uppercase()
        }
        fn decode_key(&self, key: &str) -> String {
            key.to_string()
        }
        fn decode_value(&self, value: &str) -> String {
            value.to_string()
        }
    }

    #[test]
    fn test_custom_codec_drives_rendering() {
        let params = HttpParams::new()
            .set("k", "v")
            .with_codec(Arc::new(UpperCodec));
        assert_eq!(params.to_query_string(), "K=V");
    }
}
