//! Response event taxonomy and event-stream plumbing.
//!
//! A request produces a stream of typed events rather than a single
//! response: `Sent`, optional upload/download progress, an optional header
//! event, and exactly one terminal outcome — a `Response` followed by
//! completion, or an [`HttpErrorResponse`] on the error arm. Streams are
//! cold: nothing runs until first poll, and dropping the stream aborts the
//! transfer.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde::de::DeserializeOwned;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::error::HttpErrorResponse;
use crate::headers::HttpHeaders;

/// One item on a request's event stream.
pub type HttpResult = Result<HttpEvent, HttpErrorResponse>;

/// The asynchronous event stream returned by handlers and backends.
pub type HttpEventStream = Pin<Box<dyn Stream<Item = HttpResult> + Send>>;

/// Everything a request can emit over its lifetime, in order:
/// `Sent`, then upload progress, then an optional `ResponseHeader`, then
/// download progress, then the terminal `Response`. `User` events may be
/// interleaved anywhere by interceptors.
#[derive(Debug, Clone)]
pub enum HttpEvent {
    /// The request has been handed to the transport.
    Sent,
    /// Upload progress; `total` is known when the body length is.
    UploadProgress { loaded: u64, total: Option<u64> },
    /// Download progress; `partial_text` carries the text received so far
    /// for text-typed responses.
    DownloadProgress {
        loaded: u64,
        total: Option<u64>,
        partial_text: Option<String>,
    },
    /// The response head, before the body arrives. Carries the same data as
    /// the terminal `Response`.
    ResponseHeader(HttpHeaderResponse),
    /// The terminal successful response. Nothing follows it.
    Response(HttpResponse),
    /// Marker for custom events injected by interceptors.
    User,
}

/// A decoded response body.
#[derive(Debug, Clone)]
pub enum ResponseBody {
    Bytes(Bytes),
    Text(String),
    Json(serde_json::Value),
}

impl ResponseBody {
    /// Decode into a concrete type, whatever the underlying representation.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        match self {
            ResponseBody::Json(value) => serde_json::from_value(value.clone()),
            ResponseBody::Text(text) => serde_json::from_str(text),
            ResponseBody::Bytes(bytes) => serde_json::from_slice(bytes),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ResponseBody::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            ResponseBody::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }
}

/// Whether a status code counts as success.
pub fn is_ok_status(status: u16) -> bool {
    (200..300).contains(&status)
}

/// The head of a response: everything except the body.
#[derive(Debug, Clone)]
pub struct HttpHeaderResponse {
    pub headers: HttpHeaders,
    pub status: u16,
    pub status_text: String,
    pub url: Option<String>,
}

impl HttpHeaderResponse {
    pub fn ok(&self) -> bool {
        is_ok_status(self.status)
    }

    /// Return a copy with the supplied fields replaced.
    pub fn clone_with(&self, update: ResponseHeadUpdate) -> Self {
        Self {
            headers: update.headers.unwrap_or_else(|| self.headers.clone()),
            status: update.status.unwrap_or(self.status),
            status_text: update
                .status_text
                .unwrap_or_else(|| self.status_text.clone()),
            url: update.url.or_else(|| self.url.clone()),
        }
    }
}

/// Partial update for [`HttpHeaderResponse::clone_with`].
#[derive(Debug, Clone, Default)]
pub struct ResponseHeadUpdate {
    pub headers: Option<HttpHeaders>,
    pub status: Option<u16>,
    pub status_text: Option<String>,
    pub url: Option<String>,
}

/// A complete successful response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub headers: HttpHeaders,
    pub status: u16,
    pub status_text: String,
    pub url: Option<String>,
    pub body: Option<ResponseBody>,
}

impl HttpResponse {
    pub fn ok(&self) -> bool {
        is_ok_status(self.status)
    }

    /// Decode the body into a concrete type. A missing body decodes as JSON
    /// `null`, so `Option<T>` targets work naturally.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        match &self.body {
            Some(body) => body.json(),
            None => serde_json::from_value(serde_json::Value::Null),
        }
    }

    /// Return a copy with the supplied fields replaced. `body` follows
    /// keep-vs-clear semantics: `None` keeps the current body,
    /// `Some(None)` clears it explicitly.
    pub fn clone_with(&self, update: ResponseUpdate) -> Self {
        Self {
            headers: update.headers.unwrap_or_else(|| self.headers.clone()),
            status: update.status.unwrap_or(self.status),
            status_text: update
                .status_text
                .unwrap_or_else(|| self.status_text.clone()),
            url: update.url.or_else(|| self.url.clone()),
            body: match update.body {
                Some(body) => body,
                None => self.body.clone(),
            },
        }
    }
}

/// Partial update for [`HttpResponse::clone_with`].
#[derive(Debug, Clone, Default)]
pub struct ResponseUpdate {
    pub headers: Option<HttpHeaders>,
    pub status: Option<u16>,
    pub status_text: Option<String>,
    pub url: Option<String>,
    pub body: Option<Option<ResponseBody>>,
}

impl fmt::Display for HttpResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.status, self.status_text)
    }
}

/// Sender half handed to an emitting task by [`deferred_event_stream`].
pub type EventSender = mpsc::Sender<HttpResult>;

/// Build a cold, cancellable event stream.
///
/// The `setup` closure is not run until the stream is first polled; it is
/// then spawned as a task that pushes events through the supplied sender.
/// Dropping the stream aborts the task, which is the cancellation path: the
/// task's own resources (transport handles, callback registrations) clean up
/// through their drop guards, and nothing is delivered afterwards. The
/// stream fuses itself after a terminal item, so a misbehaving emitter
/// cannot deliver events past a `Response` or an error.
pub fn deferred_event_stream<F, Fut>(setup: F) -> HttpEventStream
where
    F: FnOnce(EventSender) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Box::pin(
        futures::stream::once(async move {
            let (tx, rx) = mpsc::channel(16);
            let task = tokio::spawn(setup(tx));
            EmissionGuard {
                task,
                events: ReceiverStream::new(rx),
                done: false,
            }
        })
        .flatten(),
    )
}

struct EmissionGuard {
    task: tokio::task::JoinHandle<()>,
    events: ReceiverStream<HttpResult>,
    done: bool,
}

impl Stream for EmissionGuard {
    type Item = HttpResult;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }
        match Pin::new(&mut this.events).poll_next(cx) {
            Poll::Ready(Some(item)) => {
                if item.is_err() || matches!(item, Ok(HttpEvent::Response(_))) {
                    this.done = true;
                }
                Poll::Ready(Some(item))
            }
            other => other,
        }
    }
}

impl Drop for EmissionGuard {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ok_status_range() {
        assert!(!is_ok_status(199));
        assert!(is_ok_status(200));
        assert!(is_ok_status(299));
        assert!(!is_ok_status(300));
        assert!(!is_ok_status(0));
    }

    fn response(status: u16) -> HttpResponse {
        HttpResponse {
            headers: HttpHeaders::new(),
            status,
            status_text: "OK".into(),
            url: Some("/x".into()),
            body: Some(ResponseBody::Text("hello".into())),
        }
    }

    #[test]
    fn test_clone_with_body_keep_vs_clear() {
        let original = response(200);

        let kept = original.clone_with(ResponseUpdate::default());
        assert!(kept.body.is_some());

        let cleared = original.clone_with(ResponseUpdate {
            body: Some(None),
            ..Default::default()
        });
        assert!(cleared.body.is_none());
        assert!(original.body.is_some());
    }

    #[test]
    fn test_header_response_clone_with() {
        let head = HttpHeaderResponse {
            headers: HttpHeaders::new(),
            status: 200,
            status_text: "OK".into(),
            url: None,
        };
        let moved = head.clone_with(ResponseHeadUpdate {
            status: Some(204),
            ..Default::default()
        });
        assert_eq!(moved.status, 204);
        assert_eq!(head.status, 200);
    }

    #[test]
    fn test_body_json_decoding() {
        let body = ResponseBody::Text(r#"{"x":1}"#.into());
        let value: serde_json::Value = body.json().unwrap();
        assert_eq!(value["x"], 1);

        let none = response(200).clone_with(ResponseUpdate {
            body: Some(None),
            ..Default::default()
        });
        let decoded: Option<u32> = none.json().unwrap();
        assert_eq!(decoded, None);
    }

    #[tokio::test]
    async fn test_deferred_stream_is_cold_and_ordered() {
        use std::sync::Arc;
        use std::sync::atomic::{AtomicBool, Ordering};

        let started = Arc::new(AtomicBool::new(false));
        let flag = started.clone();
        let mut stream = deferred_event_stream(move |tx| async move {
            flag.store(true, Ordering::SeqCst);
            let _ = tx.send(Ok(HttpEvent::Sent)).await;
            let _ = tx.send(Ok(HttpEvent::Response(response(200)))).await;
        });

        // Nothing runs before the first poll.
        tokio::task::yield_now().await;
        assert!(!started.load(Ordering::SeqCst));

        let first = stream.next().await.unwrap().unwrap();
        assert!(matches!(first, HttpEvent::Sent));
        assert!(started.load(Ordering::SeqCst));

        let second = stream.next().await.unwrap().unwrap();
        assert!(matches!(second, HttpEvent::Response(_)));
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_stream_fuses_after_terminal_response() {
        let mut stream = deferred_event_stream(move |tx| async move {
            let _ = tx.send(Ok(HttpEvent::Response(response(200)))).await;
            // A misbehaving emitter keeps going; the guard must swallow it.
            let _ = tx.send(Ok(HttpEvent::User)).await;
        });

        assert!(matches!(
            stream.next().await,
            Some(Ok(HttpEvent::Response(_)))
        ));
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_dropping_stream_aborts_emitter() {
        use std::sync::Arc;
        use std::sync::atomic::{AtomicBool, Ordering};

        let finished = Arc::new(AtomicBool::new(false));
        let flag = finished.clone();
        let mut stream = deferred_event_stream(move |tx| async move {
            let _ = tx.send(Ok(HttpEvent::Sent)).await;
            tokio::time::sleep(std::time::Duration::from_secs(60)).await;
            flag.store(true, Ordering::SeqCst);
            let _ = tx.send(Ok(HttpEvent::User)).await;
        });

        assert!(matches!(stream.next().await, Some(Ok(HttpEvent::Sent))));
        drop(stream);
        tokio::task::yield_now().await;
        assert!(!finished.load(Ordering::SeqCst));
    }
}
