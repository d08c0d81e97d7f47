//! Immutable outgoing request.
//!
//! A request's shape is frozen at construction: the builder resolves every
//! field, derives `url_with_params`, and the resulting value is read-only.
//! Interceptors change a request by building a new one with
//! [`HttpRequest::clone_with`].

use bytes::Bytes;
use http::Method;
use serde::Serialize;

use crate::context::HttpContext;
use crate::headers::HttpHeaders;
use crate::params::HttpParams;

/// How the response body should be decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseType {
    /// Raw bytes, untouched.
    Bytes,
    /// Parse as JSON (the default).
    #[default]
    Json,
    /// Decode as text.
    Text,
}

/// An outgoing body. The variant decides both serialization and the
/// content type inferred when the caller did not set one explicitly.
#[derive(Debug, Clone)]
pub enum RequestBody {
    /// Opaque bytes; the content type cannot be inferred.
    Bytes(Bytes),
    /// Plain text (`text/plain`).
    Text(String),
    /// A JSON document (`application/json`).
    Json(serde_json::Value),
    /// Form parameters (`application/x-www-form-urlencoded;charset=UTF-8`),
    /// serialized through the params' own codec.
    UrlEncoded(HttpParams),
}

impl RequestBody {
    /// Serialize for the wire.
    pub fn serialize(&self) -> Bytes {
        match self {
            RequestBody::Bytes(bytes) => bytes.clone(),
            RequestBody::Text(text) => Bytes::from(text.clone().into_bytes()),
            RequestBody::Json(value) => match serde_json::to_vec(value) {
                Ok(encoded) => Bytes::from(encoded),
                Err(e) => {
                    tracing::error!(error = %e, "failed to serialize JSON body");
                    Bytes::new()
                }
            },
            RequestBody::UrlEncoded(params) => Bytes::from(params.to_query_string().into_bytes()),
        }
    }

    /// Content type to declare when the caller did not set one.
    pub fn content_type(&self) -> Option<&'static str> {
        match self {
            RequestBody::Bytes(_) => None,
            RequestBody::Text(_) => Some("text/plain"),
            RequestBody::Json(_) => Some("application/json"),
            RequestBody::UrlEncoded(_) => {
                Some("application/x-www-form-urlencoded;charset=UTF-8")
            }
        }
    }
}

/// A fully-specified, immutable outgoing request.
///
/// # Examples
///
/// ```
/// use girder_http::{HttpParams, HttpRequest};
///
/// let request = HttpRequest::get("/items")
///     .params(HttpParams::from_pairs([("page", "2")]))
///     .build();
/// assert_eq!(request.url_with_params(), "/items?page=2");
/// ```
#[derive(Debug, Clone)]
pub struct HttpRequest {
    method: Method,
    url: String,
    url_with_params: String,
    body: Option<RequestBody>,
    headers: HttpHeaders,
    params: HttpParams,
    context: HttpContext,
    report_progress: bool,
    with_credentials: bool,
    response_type: ResponseType,
}

impl HttpRequest {
    /// Start building a request with an explicit method.
    pub fn builder(method: Method, url: impl Into<String>) -> HttpRequestBuilder {
        HttpRequestBuilder::new(method, url.into())
    }

    pub fn get(url: impl Into<String>) -> HttpRequestBuilder {
        Self::builder(Method::GET, url)
    }

    pub fn post(url: impl Into<String>) -> HttpRequestBuilder {
        Self::builder(Method::POST, url)
    }

    pub fn put(url: impl Into<String>) -> HttpRequestBuilder {
        Self::builder(Method::PUT, url)
    }

    pub fn patch(url: impl Into<String>) -> HttpRequestBuilder {
        Self::builder(Method::PATCH, url)
    }

    pub fn delete(url: impl Into<String>) -> HttpRequestBuilder {
        Self::builder(Method::DELETE, url)
    }

    pub fn head(url: impl Into<String>) -> HttpRequestBuilder {
        Self::builder(Method::HEAD, url)
    }

    pub fn options(url: impl Into<String>) -> HttpRequestBuilder {
        Self::builder(Method::OPTIONS, url)
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The URL exactly as supplied, without the serialized params.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// The URL joined with the serialized params, derived at construction.
    pub fn url_with_params(&self) -> &str {
        &self.url_with_params
    }

    pub fn body(&self) -> Option<&RequestBody> {
        self.body.as_ref()
    }

    pub fn headers(&self) -> &HttpHeaders {
        &self.headers
    }

    pub fn params(&self) -> &HttpParams {
        &self.params
    }

    pub fn context(&self) -> &HttpContext {
        &self.context
    }

    pub fn report_progress(&self) -> bool {
        self.report_progress
    }

    pub fn with_credentials(&self) -> bool {
        self.with_credentials
    }

    pub fn response_type(&self) -> ResponseType {
        self.response_type
    }

    /// Serialize the body for the wire; `None` when there is no body.
    pub fn serialize_body(&self) -> Option<Bytes> {
        self.body.as_ref().map(RequestBody::serialize)
    }

    /// Content type inferred from the body, for when the caller did not set
    /// an explicit `Content-Type` header.
    pub fn detect_content_type(&self) -> Option<&'static str> {
        self.body.as_ref().and_then(RequestBody::content_type)
    }

    /// Build a new request with the supplied fields replacing the current
    /// ones. `body` follows keep-vs-clear semantics: outer `None` keeps the
    /// current body, `Some(None)` clears it. `set_headers`/`set_params` are
    /// applied additively, in order, on top of whichever headers/params are
    /// in effect after the direct overrides — later same-name entries win.
    pub fn clone_with(&self, update: HttpRequestUpdate) -> Self {
        let method = update.method.unwrap_or_else(|| self.method.clone());
        let url = update.url.unwrap_or_else(|| self.url.clone());
        let body = match update.body {
            Some(body) => body,
            None => self.body.clone(),
        };

        let mut headers = update.headers.unwrap_or_else(|| self.headers.clone());
        for (name, value) in update.set_headers {
            headers = headers.set(name, value);
        }

        let mut params = update.params.unwrap_or_else(|| self.params.clone());
        for (key, value) in update.set_params {
            params = params.set(key, value);
        }

        Self::assemble(
            method,
            url,
            body,
            headers,
            params,
            update.context.unwrap_or_else(|| self.context.clone()),
            update.report_progress.unwrap_or(self.report_progress),
            update.with_credentials.unwrap_or(self.with_credentials),
            update.response_type.unwrap_or(self.response_type),
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn assemble(
        method: Method,
        url: String,
        body: Option<RequestBody>,
        headers: HttpHeaders,
        params: HttpParams,
        context: HttpContext,
        report_progress: bool,
        with_credentials: bool,
        response_type: ResponseType,
    ) -> Self {
        let url_with_params = compose_url(&url, &params);
        Self {
            method,
            url,
            url_with_params,
            body,
            headers,
            params,
            context,
            report_progress,
            with_credentials,
            response_type,
        }
    }
}

/// Join a URL with serialized params: `?` when the URL has none, `&` when a
/// `?` is followed by content, nothing when the URL ends in a bare `?`.
fn compose_url(url: &str, params: &HttpParams) -> String {
    let query = params.to_query_string();
    if query.is_empty() {
        return url.to_string();
    }
    match url.find('?') {
        None => format!("{url}?{query}"),
        Some(idx) if idx < url.len() - 1 => format!("{url}&{query}"),
        Some(_) => format!("{url}{query}"),
    }
}

/// Partial update for [`HttpRequest::clone_with`].
#[derive(Debug, Clone, Default)]
pub struct HttpRequestUpdate {
    pub method: Option<Method>,
    pub url: Option<String>,
    /// Outer `None` keeps the current body; `Some(None)` clears it.
    pub body: Option<Option<RequestBody>>,
    pub headers: Option<HttpHeaders>,
    pub params: Option<HttpParams>,
    pub context: Option<HttpContext>,
    pub report_progress: Option<bool>,
    pub with_credentials: Option<bool>,
    pub response_type: Option<ResponseType>,
    /// Applied via repeated `set` after the `headers` override.
    pub set_headers: Vec<(String, String)>,
    /// Applied via repeated `set` after the `params` override.
    pub set_params: Vec<(String, String)>,
}

/// Builder for [`HttpRequest`]. Method and URL are mandatory; everything
/// else has a default. Setting a body on a conventionally body-less method
/// (GET, HEAD, ...) is allowed and simply carries the body.
#[derive(Debug, Clone)]
pub struct HttpRequestBuilder {
    method: Method,
    url: String,
    body: Option<RequestBody>,
    headers: HttpHeaders,
    params: HttpParams,
    context: HttpContext,
    report_progress: bool,
    with_credentials: bool,
    response_type: ResponseType,
}

impl HttpRequestBuilder {
    fn new(method: Method, url: String) -> Self {
        Self {
            method,
            url,
            body: None,
            headers: HttpHeaders::new(),
            params: HttpParams::new(),
            context: HttpContext::new(),
            report_progress: false,
            with_credentials: false,
            response_type: ResponseType::default(),
        }
    }

    /// Set a single header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers = self.headers.set(name, value);
        self
    }

    /// Replace the whole header map.
    pub fn headers(mut self, headers: HttpHeaders) -> Self {
        self.headers = headers;
        self
    }

    /// Append a single query parameter.
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params = self.params.append(key, value);
        self
    }

    /// Replace the whole parameter map.
    pub fn params(mut self, params: HttpParams) -> Self {
        self.params = params;
        self
    }

    /// Set the body explicitly.
    pub fn body(mut self, body: RequestBody) -> Self {
        self.body = Some(body);
        self
    }

    /// Set a JSON body from any serializable value.
    pub fn json<T: Serialize>(mut self, value: &T) -> Self {
        match serde_json::to_value(value) {
            Ok(value) => self.body = Some(RequestBody::Json(value)),
            Err(e) => {
                tracing::error!(error = %e, "failed to encode JSON body");
            }
        }
        self
    }

    /// Set a plain-text body.
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.body = Some(RequestBody::Text(text.into()));
        self
    }

    /// Set a raw bytes body.
    pub fn bytes(mut self, bytes: impl Into<Bytes>) -> Self {
        self.body = Some(RequestBody::Bytes(bytes.into()));
        self
    }

    /// Set a form-encoded body.
    pub fn form(mut self, params: HttpParams) -> Self {
        self.body = Some(RequestBody::UrlEncoded(params));
        self
    }

    pub fn context(mut self, context: HttpContext) -> Self {
        self.context = context;
        self
    }

    pub fn report_progress(mut self, enable: bool) -> Self {
        self.report_progress = enable;
        self
    }

    pub fn with_credentials(mut self, enable: bool) -> Self {
        self.with_credentials = enable;
        self
    }

    pub fn response_type(mut self, response_type: ResponseType) -> Self {
        self.response_type = response_type;
        self
    }

    pub fn build(self) -> HttpRequest {
        HttpRequest::assemble(
            self.method,
            self.url,
            self.body,
            self.headers,
            self.params,
            self.context,
            self.report_progress,
            self.with_credentials,
            self.response_type,
        )
    }
}
