//! Token extraction from an ambient cookie string.

use std::sync::Arc;

use parking_lot::Mutex;

/// Supplies the ambient cookie string: semicolon-separated `name=value`
/// pairs, the way a user agent exposes them.
pub trait CookieSource: Send + Sync {
    fn cookie(&self) -> String;
}

/// Produces the current XSRF token, if one is available.
pub trait XsrfTokenExtractor: Send + Sync {
    fn token(&self) -> Option<String>;
}

/// Pull one cookie's value out of a `name=value; other=value` string.
/// Names are compared in their URI-encoded form; the value comes back
/// decoded.
pub fn parse_cookie_value(cookie_str: &str, name: &str) -> Option<String> {
    let target = urlencoding::encode(name).into_owned();
    for part in cookie_str.split(';') {
        let (cookie_name, cookie_value) = match part.find('=') {
            Some(idx) => (&part[..idx], &part[idx + 1..]),
            None => (part, ""),
        };
        if cookie_name.trim() == target {
            return Some(
                urlencoding::decode(cookie_value)
                    .map(|decoded| decoded.into_owned())
                    .unwrap_or_else(|_| cookie_value.to_string()),
            );
        }
    }
    None
}

/// Default extractor: parses a named cookie from a [`CookieSource`],
/// re-parsing only when the raw cookie string changed since the last read.
pub struct CookieXsrfTokenExtractor {
    source: Arc<dyn CookieSource>,
    cookie_name: String,
    cache: Mutex<CookieCache>,
}

#[derive(Default)]
struct CookieCache {
    last_cookie: String,
    last_token: Option<String>,
}

impl CookieXsrfTokenExtractor {
    pub fn new(source: Arc<dyn CookieSource>, cookie_name: impl Into<String>) -> Self {
        Self {
            source,
            cookie_name: cookie_name.into(),
            cache: Mutex::new(CookieCache::default()),
        }
    }
}

impl XsrfTokenExtractor for CookieXsrfTokenExtractor {
    fn token(&self) -> Option<String> {
        let raw = self.source.cookie();
        let mut cache = self.cache.lock();
        if raw != cache.last_cookie {
            cache.last_token = parse_cookie_value(&raw, &self.cookie_name);
            cache.last_cookie = raw;
        }
        cache.last_token.clone()
    }
}
