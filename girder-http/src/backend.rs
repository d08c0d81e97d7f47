//! Terminal handler: drives a transport and speaks the event protocol.
//!
//! `TransportBackend` is where the request/event protocol meets raw I/O:
//! header injection, `Sent`-first emission, progress wiring, status
//! normalization, XSSI stripping and body decoding all live here, so that
//! transports stay byte-movers and interceptors stay protocol-level.

use std::sync::Arc;

use bytes::BytesMut;
use futures::StreamExt;
use tokio::sync::mpsc;

use crate::error::{ErrorPayload, HttpErrorResponse};
use crate::event::{
    EventSender, HttpEvent, HttpEventStream, HttpHeaderResponse, HttpResponse, ResponseBody,
    deferred_event_stream, is_ok_status,
};
use crate::interceptor::{HttpBackend, HttpHandler};
use crate::request::{HttpRequest, ResponseType};
use crate::transport::{HttpTransport, ReqwestTransport, TransportRequest};

/// Default `Accept` header injected when the caller set none.
const ACCEPT_ANY: &str = "application/json, text/plain, */*";

/// Anti-JSON-hijacking prefix some servers prepend to JSON bodies.
const XSSI_PREFIXES: [&str; 2] = [")]}',\n", ")]}'\n"];

fn strip_xssi_prefix(text: &str) -> &str {
    for prefix in XSSI_PREFIXES {
        if let Some(rest) = text.strip_prefix(prefix) {
            return rest;
        }
    }
    text
}

/// The terminal handler for ordinary HTTP requests.
pub struct TransportBackend {
    transport: Arc<dyn HttpTransport>,
}

impl TransportBackend {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self { transport }
    }
}

impl Default for TransportBackend {
    fn default() -> Self {
        Self::new(Arc::new(ReqwestTransport::default()))
    }
}

impl HttpBackend for TransportBackend {}

impl HttpHandler for TransportBackend {
    /// # Panics
    ///
    /// Panics when handed a `JSONP`-method request: those must be routed to
    /// the JSONP backend by its interceptor, and reaching this backend is a
    /// wiring error, detected before any event is emitted.
    fn handle(&self, request: HttpRequest) -> HttpEventStream {
        if request.method().as_str() == "JSONP" {
            panic!(
                "attempted to send a JSONP request through the transport backend; \
                 register JsonpInterceptor and JsonpClientBackend instead"
            );
        }
        let transport = self.transport.clone();
        deferred_event_stream(move |tx| perform(transport, request, tx))
    }
}

async fn perform(transport: Arc<dyn HttpTransport>, request: HttpRequest, tx: EventSender) {
    let url = request.url_with_params().to_string();

    // Copy every header; inject Accept and an inferred Content-Type only
    // when the caller set none. An explicit header is never overwritten.
    let mut header_pairs: Vec<(String, String)> = request
        .headers()
        .entries()
        .into_iter()
        .map(|(name, values)| (name, values.join(",")))
        .collect();
    if !request.headers().has("Accept") {
        header_pairs.push(("Accept".to_string(), ACCEPT_ANY.to_string()));
    }
    let body = request.serialize_body();
    if !request.headers().has("Content-Type")
        && let Some(content_type) = request.detect_content_type()
    {
        header_pairs.push(("Content-Type".to_string(), content_type.to_string()));
    }

    let (upload_tx, mut upload_rx) = mpsc::channel(8);
    let mut upload_open = request.report_progress() && body.is_some();

    let wire_request = TransportRequest {
        method: request.method().clone(),
        url: url.clone(),
        headers: header_pairs,
        body,
        with_credentials: request.with_credentials(),
        upload_progress: upload_open.then_some(upload_tx),
    };

    tracing::debug!(method = %request.method(), url = %url, "dispatching HTTP request");

    let send = transport.send(wire_request);
    tokio::pin!(send);

    // Sent goes out as soon as the transfer is dispatched, before anything
    // comes back.
    if tx.send(Ok(HttpEvent::Sent)).await.is_err() {
        return;
    }

    let head = loop {
        tokio::select! {
            progress = upload_rx.recv(), if upload_open => match progress {
                Some((loaded, total)) => {
                    if tx.send(Ok(HttpEvent::UploadProgress { loaded, total })).await.is_err() {
                        return;
                    }
                }
                None => upload_open = false,
            },
            outcome = &mut send => break outcome,
        }
    };

    // Progress that raced the response head is still in the channel; flush
    // it so upload events always precede the head.
    while let Ok((loaded, total)) = upload_rx.try_recv() {
        if tx
            .send(Ok(HttpEvent::UploadProgress { loaded, total }))
            .await
            .is_err()
        {
            return;
        }
    }

    let head = match head {
        Ok(head) => head,
        Err(e) => {
            tracing::debug!(url = %url, error = %e, "transport-level failure");
            let _ = tx
                .send(Err(HttpErrorResponse::network(Some(url), e.message)))
                .await;
            return;
        }
    };

    // 1223 is a legacy IE rewrite of 204.
    let status = if head.status == 1223 { 204 } else { head.status };
    let head_response = HttpHeaderResponse {
        headers: head.headers,
        status,
        status_text: head.status_text,
        url: head.url.or_else(|| Some(request.url().to_string())),
    };

    if request.report_progress()
        && tx
            .send(Ok(HttpEvent::ResponseHeader(head_response.clone())))
            .await
            .is_err()
    {
        return;
    }

    let total = head_response
        .headers
        .get("Content-Length")
        .and_then(|value| value.trim().parse::<u64>().ok());

    let mut chunks = head.body;
    let mut collected = BytesMut::new();
    while let Some(chunk) = chunks.next().await {
        match chunk {
            Ok(bytes) => {
                collected.extend_from_slice(&bytes);
                if request.report_progress() {
                    let partial_text = matches!(request.response_type(), ResponseType::Text)
                        .then(|| String::from_utf8_lossy(&collected).into_owned());
                    let event = HttpEvent::DownloadProgress {
                        loaded: collected.len() as u64,
                        total,
                        partial_text,
                    };
                    if tx.send(Ok(event)).await.is_err() {
                        return;
                    }
                }
            }
            Err(e) => {
                let _ = tx
                    .send(Err(HttpErrorResponse::network(
                        head_response.url.clone(),
                        e.message,
                    )))
                    .await;
                return;
            }
        }
    }
    let collected = collected.freeze();

    // A raw status of 0 usually means the status never came through
    // (opaque cross-origin responses): a body indicates the request in fact
    // succeeded. Environment-dependent, not a protocol guarantee.
    let status = if status == 0 {
        if collected.is_empty() { 0 } else { 200 }
    } else {
        status
    };
    let ok = is_ok_status(status);

    let body = match request.response_type() {
        ResponseType::Bytes => (!collected.is_empty()).then(|| ResponseBody::Bytes(collected)),
        ResponseType::Text => (!collected.is_empty())
            .then(|| ResponseBody::Text(String::from_utf8_lossy(&collected).into_owned())),
        ResponseType::Json => {
            let text = String::from_utf8_lossy(&collected).into_owned();
            if text.is_empty() {
                None
            } else {
                match serde_json::from_str::<serde_json::Value>(strip_xssi_prefix(&text)) {
                    Ok(value) => Some(ResponseBody::Json(value)),
                    Err(e) if ok => {
                        // A 2xx with an undecodable body is a failure, and
                        // the caller gets the original, unstripped text.
                        let _ = tx
                            .send(Err(HttpErrorResponse::parse_failure(
                                head_response.headers.clone(),
                                status,
                                head_response.status_text.clone(),
                                head_response.url.clone(),
                                e.to_string(),
                                text,
                            )))
                            .await;
                        return;
                    }
                    Err(_) => Some(ResponseBody::Text(text)),
                }
            }
        }
    };

    if ok {
        tracing::debug!(status, url = %url, "HTTP response received");
        let response = HttpResponse {
            headers: head_response.headers,
            status,
            status_text: head_response.status_text,
            url: head_response.url,
            body,
        };
        let _ = tx.send(Ok(HttpEvent::Response(response))).await;
    } else {
        let _ = tx
            .send(Err(HttpErrorResponse::new(
                ErrorPayload::Body(body),
                head_response.headers,
                status,
                head_response.status_text,
                head_response.url,
            )))
            .await;
    }
}
