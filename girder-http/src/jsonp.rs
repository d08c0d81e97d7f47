//! JSONP: cross-origin GET transport over injected scripts.
//!
//! The backend substitutes a unique callback name into the request URL,
//! registers the callback, and asks a [`ScriptLoader`] collaborator to fetch
//! and execute the script. The loaded script is expected to invoke the
//! callback through the registry; the backend turns that invocation (or its
//! absence) into the usual event protocol.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::oneshot;

use crate::error::HttpErrorResponse;
use crate::event::{HttpEvent, HttpEventStream, HttpResponse, ResponseBody, deferred_event_stream};
use crate::headers::HttpHeaders;
use crate::interceptor::{HttpBackend, HttpHandler, HttpInterceptor};
use crate::request::{HttpRequest, ResponseType};

/// Placeholder in a request URL that is replaced by the allocated callback
/// name.
pub const JSONP_CALLBACK_PLACEHOLDER: &str = "JSONP_CALLBACK";

/// The sentinel method routing a request to the JSONP backend.
pub fn jsonp_method() -> http::Method {
    http::Method::from_bytes(b"JSONP").expect("JSONP is a valid method token")
}

/// A script failed to load or execute.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct ScriptLoadError(pub String);

/// The script-injection collaborator: fetch the script at `url` and execute
/// it, resolving once execution finished. Execution is expected to call
/// [`JsonpCallbackRegistry::invoke`] with the payload.
#[async_trait]
pub trait ScriptLoader: Send + Sync {
    async fn load(&self, url: &str) -> Result<(), ScriptLoadError>;
}

/// Allocates callback names and routes invocations back to the requests
/// waiting on them.
///
/// Callback names must be unique across everything sharing the script
/// execution environment, not just one client — use [`global()`] unless the
/// requests are isolated. The counter only grows; names are never reused.
///
/// [`global()`]: JsonpCallbackRegistry::global
#[derive(Default)]
pub struct JsonpCallbackRegistry {
    counter: AtomicU64,
    pending: Mutex<HashMap<String, oneshot::Sender<serde_json::Value>>>,
}

impl JsonpCallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry.
    pub fn global() -> Arc<JsonpCallbackRegistry> {
        static GLOBAL: OnceLock<Arc<JsonpCallbackRegistry>> = OnceLock::new();
        GLOBAL
            .get_or_init(|| Arc::new(JsonpCallbackRegistry::new()))
            .clone()
    }

    /// Allocate a fresh name and register a callback slot under it.
    fn register(&self) -> (String, oneshot::Receiver<serde_json::Value>) {
        let name = format!("jsonp_callback_{}", self.counter.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(name.clone(), tx);
        (name, rx)
    }

    /// Deliver a payload to a registered callback. Returns false when the
    /// name is unknown — including a request that was cancelled first, which
    /// is how racing invocations are suppressed.
    pub fn invoke(&self, name: &str, payload: serde_json::Value) -> bool {
        match self.pending.lock().remove(name) {
            Some(tx) => tx.send(payload).is_ok(),
            None => false,
        }
    }

    /// Drop a registration without invoking it.
    pub fn unregister(&self, name: &str) -> bool {
        self.pending.lock().remove(name).is_some()
    }

    /// Number of callbacks currently awaiting invocation.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }
}

/// Removes the callback registration when the emitting task ends — normally
/// or by cancellation.
struct UnregisterOnDrop {
    registry: Arc<JsonpCallbackRegistry>,
    name: String,
}

impl Drop for UnregisterOnDrop {
    fn drop(&mut self) {
        self.registry.unregister(&self.name);
    }
}

/// Terminal handler for `JSONP`-method requests.
pub struct JsonpClientBackend {
    loader: Arc<dyn ScriptLoader>,
    registry: Arc<JsonpCallbackRegistry>,
}

impl JsonpClientBackend {
    pub fn new(loader: Arc<dyn ScriptLoader>, registry: Arc<JsonpCallbackRegistry>) -> Self {
        Self { loader, registry }
    }

    /// Construct over the process-wide registry.
    pub fn with_global_registry(loader: Arc<dyn ScriptLoader>) -> Self {
        Self::new(loader, JsonpCallbackRegistry::global())
    }
}

impl HttpBackend for JsonpClientBackend {}

impl HttpHandler for JsonpClientBackend {
    /// # Panics
    ///
    /// Panics on a non-`JSONP` method or a non-JSON response type — both are
    /// wiring errors, detected before any event is emitted.
    fn handle(&self, request: HttpRequest) -> HttpEventStream {
        if request.method() != &jsonp_method() {
            panic!(
                "JSONP backend received a {} request; only JSONP requests are supported",
                request.method()
            );
        }
        if request.response_type() != ResponseType::Json {
            panic!("JSONP requests must use a JSON response type");
        }

        let loader = self.loader.clone();
        let registry = self.registry.clone();
        deferred_event_stream(move |tx| async move {
            let (name, mut callback) = registry.register();
            let _guard = UnregisterOnDrop {
                registry: registry.clone(),
                name: name.clone(),
            };
            let url = request
                .url_with_params()
                .replace(JSONP_CALLBACK_PLACEHOLDER, &name);
            tracing::debug!(url = %url, callback = %name, "dispatching JSONP request");

            if tx.send(Ok(HttpEvent::Sent)).await.is_err() {
                return;
            }

            match loader.load(&url).await {
                Ok(()) => match callback.try_recv() {
                    Ok(payload) => {
                        let body = if payload.is_null() {
                            None
                        } else {
                            Some(ResponseBody::Json(payload))
                        };
                        let response = HttpResponse {
                            headers: HttpHeaders::new(),
                            status: 200,
                            status_text: "OK".to_string(),
                            url: Some(url),
                            body,
                        };
                        let _ = tx.send(Ok(HttpEvent::Response(response))).await;
                    }
                    Err(_) => {
                        let _ = tx
                            .send(Err(HttpErrorResponse::network(
                                Some(url),
                                "JSONP request did not invoke callback",
                            )))
                            .await;
                    }
                },
                Err(e) => {
                    let _ = tx
                        .send(Err(HttpErrorResponse::network(Some(url), e.0)))
                        .await;
                }
            }
        })
    }
}

/// Routes `JSONP`-method requests to the JSONP backend; everything else
/// passes through untouched.
pub struct JsonpInterceptor {
    backend: Arc<JsonpClientBackend>,
}

impl JsonpInterceptor {
    pub fn new(backend: Arc<JsonpClientBackend>) -> Self {
        Self { backend }
    }
}

impl HttpInterceptor for JsonpInterceptor {
    fn intercept(&self, request: HttpRequest, next: Arc<dyn HttpHandler>) -> HttpEventStream {
        if request.method() == &jsonp_method() {
            self.backend.handle(request)
        } else {
            next.handle(request)
        }
    }
}
