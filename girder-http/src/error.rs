//! HTTP failure type delivered on the event stream's error channel.

use thiserror::Error;

use crate::event::ResponseBody;
use crate::headers::HttpHeaders;

/// What actually went wrong, by failure class.
#[derive(Debug, Clone)]
pub enum ErrorPayload {
    /// Network-level failure: connection refused, DNS, script load failure,
    /// a JSONP callback that never fired. The status is always 0.
    Network(String),
    /// The server answered with a non-2xx status; carries the decoded body.
    Body(Option<ResponseBody>),
    /// The body could not be parsed; carries the original unparsed text.
    Parse { error: String, text: String },
}

/// A fully-formed HTTP failure: URL, status and status text are always
/// populated so an error handler never has to inspect a bare transport
/// error. Delivered exclusively through the stream's `Err` arm — never
/// thrown across an async boundary.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct HttpErrorResponse {
    pub error: ErrorPayload,
    pub headers: HttpHeaders,
    /// Server status, or 0 for network-level failures.
    pub status: u16,
    pub status_text: String,
    pub url: Option<String>,
    pub message: String,
}

impl HttpErrorResponse {
    pub fn new(
        error: ErrorPayload,
        headers: HttpHeaders,
        status: u16,
        status_text: impl Into<String>,
        url: Option<String>,
    ) -> Self {
        let status_text = status_text.into();
        let message = failure_message(url.as_deref(), status, &status_text);
        Self {
            error,
            headers,
            status,
            status_text,
            url,
            message,
        }
    }

    /// A network-level failure: status 0, no headers.
    pub fn network(url: Option<String>, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self::new(
            ErrorPayload::Network(reason),
            HttpHeaders::new(),
            0,
            "Unknown Error",
            url,
        )
    }

    /// A body that failed to parse, on a response that would otherwise have
    /// succeeded.
    pub fn parse_failure(
        headers: HttpHeaders,
        status: u16,
        status_text: impl Into<String>,
        url: Option<String>,
        error: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        let status_text = status_text.into();
        let message = format!(
            "HTTP failure during parsing for {}",
            url.as_deref().unwrap_or("(unknown url)")
        );
        Self {
            error: ErrorPayload::Parse {
                error: error.into(),
                text: text.into(),
            },
            headers,
            status,
            status_text,
            url,
            message,
        }
    }

    /// Always false; present for symmetry with the response types.
    pub fn ok(&self) -> bool {
        false
    }

    /// Whether this failure never reached the server.
    pub fn is_network(&self) -> bool {
        matches!(self.error, ErrorPayload::Network(_))
    }

    /// Whether the body arrived but could not be decoded.
    pub fn is_parse(&self) -> bool {
        matches!(self.error, ErrorPayload::Parse { .. })
    }
}

fn failure_message(url: Option<&str>, status: u16, status_text: &str) -> String {
    format!(
        "HTTP failure response for {}: {} {}",
        url.unwrap_or("(unknown url)"),
        status,
        status_text
    )
}
