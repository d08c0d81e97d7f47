//! HTTP client: interceptor registration, chain memoization, and the
//! request builder surface.

use std::sync::{Arc, OnceLock};

use futures::StreamExt;
use http::Method;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::context::HttpContext;
use crate::error::HttpErrorResponse;
use crate::event::{HttpEvent, HttpEventStream, HttpResponse};
use crate::headers::HttpHeaders;
use crate::interceptor::{HttpHandler, HttpInterceptor, build_chain};
use crate::jsonp::{JSONP_CALLBACK_PLACEHOLDER, jsonp_method};
use crate::params::HttpParams;
use crate::request::{HttpRequest, HttpRequestBuilder, RequestBody, ResponseType};
use crate::transport::HttpTransport;

/// HTTP client over an interceptor chain and a terminal backend.
///
/// The chain is built once, on the first request, and reused; registration
/// order decides nesting — the first interceptor added is outermost.
///
/// # Examples
///
/// ```rust,no_run
/// use girder_http::HttpClient;
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let client = HttpClient::new();
///
/// let response = client
///     .get("https://api.example.com/users")
///     .response()
///     .await?;
///
/// println!("status: {}", response.status);
/// # Ok(())
/// # }
/// ```
pub struct HttpClient {
    interceptors: Vec<Arc<dyn HttpInterceptor>>,
    backend: Arc<dyn HttpHandler>,
    chain: OnceLock<Arc<dyn HttpHandler>>,
}

impl HttpClient {
    /// A client with no interceptors over the default reqwest transport.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::default()
    }

    /// The composed handler, built lazily once and reused for every request.
    fn handler(&self) -> Arc<dyn HttpHandler> {
        self.chain
            .get_or_init(|| build_chain(&self.interceptors, self.backend.clone()))
            .clone()
    }

    /// Send a fully-built request through the chain. Returns the cold event
    /// stream; nothing happens until it is polled.
    pub fn send(&self, request: HttpRequest) -> HttpEventStream {
        tracing::debug!(method = %request.method(), url = %request.url(), "sending HTTP request");
        self.handler().handle(request)
    }

    /// Start a request with a custom method.
    pub fn request(&self, method: Method, url: impl Into<String>) -> RequestBuilder<'_> {
        RequestBuilder::new(self, method, url.into())
    }

    pub fn get(&self, url: impl Into<String>) -> RequestBuilder<'_> {
        self.request(Method::GET, url)
    }

    pub fn post(&self, url: impl Into<String>) -> RequestBuilder<'_> {
        self.request(Method::POST, url)
    }

    pub fn put(&self, url: impl Into<String>) -> RequestBuilder<'_> {
        self.request(Method::PUT, url)
    }

    pub fn patch(&self, url: impl Into<String>) -> RequestBuilder<'_> {
        self.request(Method::PATCH, url)
    }

    pub fn delete(&self, url: impl Into<String>) -> RequestBuilder<'_> {
        self.request(Method::DELETE, url)
    }

    pub fn head(&self, url: impl Into<String>) -> RequestBuilder<'_> {
        self.request(Method::HEAD, url)
    }

    pub fn options(&self, url: impl Into<String>) -> RequestBuilder<'_> {
        self.request(Method::OPTIONS, url)
    }

    /// Start a JSONP request: appends `callback_param=JSONP_CALLBACK` and
    /// routes through the JSONP backend (which must be registered via
    /// [`JsonpInterceptor`](crate::JsonpInterceptor)).
    pub fn jsonp(
        &self,
        url: impl Into<String>,
        callback_param: impl Into<String>,
    ) -> RequestBuilder<'_> {
        self.request(jsonp_method(), url)
            .param(callback_param, JSONP_CALLBACK_PLACEHOLDER)
            .response_type(ResponseType::Json)
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for HttpClient {
    fn clone(&self) -> Self {
        Self {
            interceptors: self.interceptors.clone(),
            backend: self.backend.clone(),
            // The clone rebuilds its chain on first use.
            chain: OnceLock::new(),
        }
    }
}

/// Builder for [`HttpClient`].
#[derive(Default)]
pub struct HttpClientBuilder {
    interceptors: Vec<Arc<dyn HttpInterceptor>>,
    backend: Option<Arc<dyn HttpHandler>>,
    transport: Option<Arc<dyn HttpTransport>>,
}

impl HttpClientBuilder {
    /// Register an interceptor. Order matters: the first registered is
    /// outermost.
    pub fn interceptor<I: HttpInterceptor + 'static>(mut self, interceptor: I) -> Self {
        self.interceptors.push(Arc::new(interceptor));
        self
    }

    /// Register an already-shared interceptor.
    pub fn interceptor_arc(mut self, interceptor: Arc<dyn HttpInterceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    /// Replace the terminal backend entirely.
    pub fn backend<B: HttpHandler + 'static>(mut self, backend: B) -> Self {
        self.backend = Some(Arc::new(backend));
        self
    }

    /// Replace the transport under the default backend. Ignored when a
    /// custom backend is set.
    pub fn transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn build(self) -> HttpClient {
        let backend = self.backend.unwrap_or_else(|| {
            let backend = match self.transport {
                Some(transport) => crate::backend::TransportBackend::new(transport),
                None => crate::backend::TransportBackend::default(),
            };
            Arc::new(backend)
        });
        HttpClient {
            interceptors: self.interceptors,
            backend,
            chain: OnceLock::new(),
        }
    }
}

/// Per-request builder tied to a client.
pub struct RequestBuilder<'a> {
    client: &'a HttpClient,
    inner: HttpRequestBuilder,
}

impl<'a> RequestBuilder<'a> {
    fn new(client: &'a HttpClient, method: Method, url: String) -> Self {
        Self {
            client,
            inner: HttpRequest::builder(method, url),
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.inner = self.inner.header(name, value);
        self
    }

    pub fn headers(mut self, headers: HttpHeaders) -> Self {
        self.inner = self.inner.headers(headers);
        self
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.inner = self.inner.param(key, value);
        self
    }

    pub fn params(mut self, params: HttpParams) -> Self {
        self.inner = self.inner.params(params);
        self
    }

    pub fn body(mut self, body: RequestBody) -> Self {
        self.inner = self.inner.body(body);
        self
    }

    pub fn json<T: Serialize>(mut self, value: &T) -> Self {
        self.inner = self.inner.json(value);
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.inner = self.inner.text(text);
        self
    }

    pub fn form(mut self, params: HttpParams) -> Self {
        self.inner = self.inner.form(params);
        self
    }

    pub fn context(mut self, context: HttpContext) -> Self {
        self.inner = self.inner.context(context);
        self
    }

    pub fn report_progress(mut self, enable: bool) -> Self {
        self.inner = self.inner.report_progress(enable);
        self
    }

    pub fn with_credentials(mut self, enable: bool) -> Self {
        self.inner = self.inner.with_credentials(enable);
        self
    }

    pub fn response_type(mut self, response_type: ResponseType) -> Self {
        self.inner = self.inner.response_type(response_type);
        self
    }

    /// Build the request without sending it.
    pub fn build(self) -> HttpRequest {
        self.inner.build()
    }

    /// Send and return the full event stream.
    pub fn send(self) -> HttpEventStream {
        let request = self.inner.build();
        self.client.send(request)
    }

    /// Send and await the single terminal response, discarding intermediate
    /// events.
    pub async fn response(self) -> Result<HttpResponse, HttpErrorResponse> {
        let mut events = self.send();
        while let Some(item) = events.next().await {
            if let HttpEvent::Response(response) = item? {
                return Ok(response);
            }
        }
        Err(HttpErrorResponse::network(
            None,
            "event stream completed without a terminal response",
        ))
    }

    /// Send, await the terminal response and decode its body.
    pub async fn json_response<T: DeserializeOwned>(self) -> Result<T, HttpErrorResponse> {
        let response = self.response().await?;
        let text = match &response.body {
            Some(body) => body.as_text().unwrap_or_default().to_string(),
            None => String::new(),
        };
        response.json().map_err(|e| {
            HttpErrorResponse::parse_failure(
                response.headers.clone(),
                response.status,
                response.status_text.clone(),
                response.url.clone(),
                e.to_string(),
                text,
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{ResponseBody, deferred_event_stream};
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingBackend {
        handled: Arc<Mutex<Vec<String>>>,
    }

    impl HttpHandler for CountingBackend {
        fn handle(&self, request: HttpRequest) -> HttpEventStream {
            self.handled.lock().push(request.url_with_params().to_string());
            deferred_event_stream(move |tx| async move {
                let _ = tx.send(Ok(HttpEvent::Sent)).await;
                let _ = tx
                    .send(Ok(HttpEvent::Response(HttpResponse {
                        headers: HttpHeaders::new(),
                        status: 200,
                        status_text: "OK".into(),
                        url: Some(request.url().to_string()),
                        body: Some(ResponseBody::Json(serde_json::json!({"n": 7}))),
                    })))
                    .await;
            })
        }
    }

    struct ChainCounter {
        built: Arc<AtomicUsize>,
    }

    impl HttpInterceptor for ChainCounter {
        fn intercept(
            &self,
            request: HttpRequest,
            next: Arc<dyn HttpHandler>,
        ) -> HttpEventStream {
            self.built.fetch_add(1, Ordering::SeqCst);
            next.handle(request)
        }
    }

    fn client_with_stub() -> (HttpClient, Arc<Mutex<Vec<String>>>) {
        let handled = Arc::new(Mutex::new(Vec::new()));
        let client = HttpClient::builder()
            .backend(CountingBackend {
                handled: handled.clone(),
            })
            .build();
        (client, handled)
    }

    #[tokio::test]
    async fn test_response_awaits_terminal_event() {
        let (client, _) = client_with_stub();
        let response = client.get("/items").response().await.unwrap();
        assert_eq!(response.status, 200);
    }

    #[tokio::test]
    async fn test_json_response_decodes_body() {
        #[derive(serde::Deserialize)]
        struct Payload {
            n: u32,
        }

        let (client, _) = client_with_stub();
        let payload: Payload = client.get("/items").json_response().await.unwrap();
        assert_eq!(payload.n, 7);
    }

    #[tokio::test]
    async fn test_builder_params_reach_the_backend() {
        let (client, handled) = client_with_stub();
        client
            .get("/items")
            .param("page", "2")
            .response()
            .await
            .unwrap();
        assert_eq!(handled.lock().clone(), vec!["/items?page=2"]);
    }

    #[tokio::test]
    async fn test_jsonp_builder_shape() {
        let (client, _) = client_with_stub();
        let request = client.jsonp("/feed", "callback").build();
        assert_eq!(request.method().as_str(), "JSONP");
        assert_eq!(request.url_with_params(), "/feed?callback=JSONP_CALLBACK");
        assert_eq!(request.response_type(), ResponseType::Json);
    }

    #[tokio::test]
    async fn test_chain_memoized_across_requests() {
        let built = Arc::new(AtomicUsize::new(0));
        let handled = Arc::new(Mutex::new(Vec::new()));
        let client = HttpClient::builder()
            .interceptor(ChainCounter {
                built: built.clone(),
            })
            .backend(CountingBackend {
                handled: handled.clone(),
            })
            .build();

        client.get("/a").response().await.unwrap();
        client.get("/b").response().await.unwrap();

        // The interceptor runs per request; the chain handler is the same
        // object both times (send twice through one memoized chain).
        assert_eq!(built.load(Ordering::SeqCst), 2);
        assert!(Arc::ptr_eq(&client.handler(), &client.handler()));
    }

    #[tokio::test]
    async fn test_send_emits_sent_first() {
        let (client, _) = client_with_stub();
        let mut events = client.get("/first").send();
        assert!(matches!(events.next().await, Some(Ok(HttpEvent::Sent))));
        assert!(matches!(
            events.next().await,
            Some(Ok(HttpEvent::Response(_)))
        ));
    }
}
