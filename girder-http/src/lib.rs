//! # Girder HTTP Client
//!
//! The HTTP client layer of the Girder framework: an immutable
//! request/response model, an interceptor chain over typed response event
//! streams, and pluggable transport backends.
//!
//! ## Features
//!
//! - **Immutable headers and params**: every update returns a new value;
//!   updates are queued and applied once, at the first read
//! - **Event streams**: a request yields `Sent`, progress and header events
//!   before its single terminal outcome, on a cold, cancellable stream
//! - **Interceptors**: ordered request/stream transformers composed around
//!   a terminal backend
//! - **Pluggable transport**: reqwest by default, any [`HttpTransport`]
//!   implementation otherwise
//! - **JSONP**: script-injection transport behind the same handler contract
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use girder_http::HttpClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = HttpClient::new();
//!
//!     let response = client
//!         .get("https://api.example.com/users")
//!         .response()
//!         .await?;
//!
//!     println!("status: {}", response.status);
//!     Ok(())
//! }
//! ```
//!
//! ## Watching the whole event stream
//!
//! ```rust,no_run
//! use futures::StreamExt;
//! use girder_http::{HttpClient, HttpEvent};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = HttpClient::new();
//!     let mut events = client
//!         .get("https://api.example.com/report")
//!         .report_progress(true)
//!         .send();
//!
//!     while let Some(event) = events.next().await {
//!         match event? {
//!             HttpEvent::DownloadProgress { loaded, total, .. } => {
//!                 println!("{loaded} of {total:?} bytes");
//!             }
//!             HttpEvent::Response(response) => println!("done: {}", response.status),
//!             _ => {}
//!         }
//!     }
//!     Ok(())
//! }
//! ```

mod backend;
mod client;
mod context;
mod error;
mod event;
mod headers;
mod interceptor;
mod jsonp;
mod params;
mod request;
mod transport;

pub use backend::TransportBackend;
pub use client::{HttpClient, HttpClientBuilder, RequestBuilder};
pub use context::HttpContext;
pub use error::{ErrorPayload, HttpErrorResponse};
pub use event::{
    HttpEvent, HttpEventStream, HttpHeaderResponse, HttpResponse, HttpResult, ResponseBody,
    ResponseHeadUpdate, ResponseUpdate, deferred_event_stream, is_ok_status,
};
pub use headers::HttpHeaders;
pub use interceptor::{
    HttpBackend, HttpHandler, HttpInterceptor, HttpInterceptorHandler, build_chain,
};
pub use jsonp::{
    JSONP_CALLBACK_PLACEHOLDER, JsonpCallbackRegistry, JsonpClientBackend, JsonpInterceptor,
    ScriptLoadError, ScriptLoader, jsonp_method,
};
pub use params::{HttpParameterCodec, HttpParams, HttpUrlEncodingCodec};
pub use request::{
    HttpRequest, HttpRequestBuilder, HttpRequestUpdate, RequestBody, ResponseType,
};
pub use transport::{
    ByteChunkStream, HttpTransport, ReqwestTransport, TransportError, TransportRequest,
    TransportResponse, UploadProgressSender,
};

// Re-export common types
pub use bytes::Bytes;
pub use http::Method;

/// Prelude for common imports.
///
/// ```
/// use girder_http::prelude::*;
/// ```
pub mod prelude {
    pub use crate::backend::TransportBackend;
    pub use crate::client::{HttpClient, HttpClientBuilder, RequestBuilder};
    pub use crate::context::HttpContext;
    pub use crate::error::{ErrorPayload, HttpErrorResponse};
    pub use crate::event::{
        HttpEvent, HttpEventStream, HttpHeaderResponse, HttpResponse, ResponseBody,
    };
    pub use crate::headers::HttpHeaders;
    pub use crate::interceptor::{HttpBackend, HttpHandler, HttpInterceptor};
    pub use crate::params::{HttpParameterCodec, HttpParams};
    pub use crate::request::{HttpRequest, HttpRequestUpdate, RequestBody, ResponseType};
    pub use crate::transport::{HttpTransport, ReqwestTransport};
    pub use http::Method;
}
