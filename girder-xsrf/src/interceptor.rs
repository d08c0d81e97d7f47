//! The XSRF request interceptor.

use std::sync::Arc;

use girder_http::{
    HttpEventStream, HttpHandler, HttpInterceptor, HttpRequest, HttpRequestUpdate,
};
use http::Method;

use crate::config::XsrfConfig;
use crate::extractor::{CookieSource, CookieXsrfTokenExtractor, XsrfTokenExtractor};

/// Echoes the XSRF token into a header on mutating same-origin requests.
///
/// GET and HEAD requests pass through untouched, as do absolute
/// `http(s)://` URLs — the token is scoped to the ambient origin and must
/// not leak cross-origin. An already-present header is never overwritten.
pub struct XsrfInterceptor {
    extractor: Arc<dyn XsrfTokenExtractor>,
    header_name: String,
}

impl XsrfInterceptor {
    pub fn new(extractor: Arc<dyn XsrfTokenExtractor>, config: XsrfConfig) -> Self {
        Self {
            extractor,
            header_name: config.header_name,
        }
    }

    /// Convenience constructor over the default cookie extractor.
    pub fn from_cookie(source: Arc<dyn CookieSource>, config: XsrfConfig) -> Self {
        let extractor = CookieXsrfTokenExtractor::new(source, config.cookie_name.clone());
        Self::new(Arc::new(extractor), config)
    }
}

impl HttpInterceptor for XsrfInterceptor {
    fn intercept(&self, request: HttpRequest, next: Arc<dyn HttpHandler>) -> HttpEventStream {
        let url = request.url().to_ascii_lowercase();
        if request.method() == Method::GET
            || request.method() == Method::HEAD
            || url.starts_with("http://")
            || url.starts_with("https://")
        {
            return next.handle(request);
        }

        match self.extractor.token() {
            Some(token) if !request.headers().has(&self.header_name) => {
                tracing::debug!(header = %self.header_name, "attaching XSRF token");
                let request = request.clone_with(HttpRequestUpdate {
                    set_headers: vec![(self.header_name.clone(), token)],
                    ..Default::default()
                });
                next.handle(request)
            }
            _ => next.handle(request),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use girder_http::{
        HttpEvent, HttpHeaders, HttpResponse, deferred_event_stream,
    };
    use parking_lot::Mutex;

    struct StaticCookies(&'static str);

    impl CookieSource for StaticCookies {
        fn cookie(&self) -> String {
            self.0.to_string()
        }
    }

    /// Terminal handler recording the headers of every request it sees.
    struct CapturingBackend {
        seen: Arc<Mutex<Vec<HttpHeaders>>>,
    }

    impl HttpHandler for CapturingBackend {
        fn handle(&self, request: HttpRequest) -> HttpEventStream {
            self.seen.lock().push(request.headers().clone());
            deferred_event_stream(move |tx| async move {
                let _ = tx
                    .send(Ok(HttpEvent::Response(HttpResponse {
                        headers: HttpHeaders::new(),
                        status: 200,
                        status_text: "OK".into(),
                        url: Some(request.url().to_string()),
                        body: None,
                    })))
                    .await;
            })
        }
    }

    async fn run(
        interceptor: &XsrfInterceptor,
        request: HttpRequest,
    ) -> Arc<Mutex<Vec<HttpHeaders>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let backend: Arc<dyn HttpHandler> = Arc::new(CapturingBackend { seen: seen.clone() });
        let mut stream = interceptor.intercept(request, backend);
        while stream.next().await.is_some() {}
        seen
    }

    fn interceptor_with(cookie: &'static str) -> XsrfInterceptor {
        XsrfInterceptor::from_cookie(Arc::new(StaticCookies(cookie)), XsrfConfig::default())
    }

    #[tokio::test]
    async fn test_post_gets_token_header() {
        let interceptor = interceptor_with("XSRF-TOKEN=secret");
        let seen = run(&interceptor, HttpRequest::post("/submit").build()).await;
        assert_eq!(seen.lock()[0].get("x-xsrf-token"), Some("secret"));
    }

    #[tokio::test]
    async fn test_get_passes_through_untouched() {
        let interceptor = interceptor_with("XSRF-TOKEN=secret");
        let seen = run(&interceptor, HttpRequest::get("/read").build()).await;
        assert!(!seen.lock()[0].has("x-xsrf-token"));
    }

    #[tokio::test]
    async fn test_head_passes_through_untouched() {
        let interceptor = interceptor_with("XSRF-TOKEN=secret");
        let seen = run(&interceptor, HttpRequest::head("/read").build()).await;
        assert!(!seen.lock()[0].has("x-xsrf-token"));
    }

    #[tokio::test]
    async fn test_absolute_url_passes_through_untouched() {
        let interceptor = interceptor_with("XSRF-TOKEN=secret");
        let seen = run(
            &interceptor,
            HttpRequest::post("https://other.example.com/submit").build(),
        )
        .await;
        assert!(!seen.lock()[0].has("x-xsrf-token"));
    }

    #[tokio::test]
    async fn test_existing_header_never_overwritten() {
        let interceptor = interceptor_with("XSRF-TOKEN=fresh");
        let seen = run(
            &interceptor,
            HttpRequest::post("/submit")
                .header("X-XSRF-TOKEN", "pinned")
                .build(),
        )
        .await;
        assert_eq!(seen.lock()[0].get("x-xsrf-token"), Some("pinned"));
    }

    #[tokio::test]
    async fn test_missing_cookie_means_no_header() {
        let interceptor = interceptor_with("session=only");
        let seen = run(&interceptor, HttpRequest::post("/submit").build()).await;
        assert!(!seen.lock()[0].has("x-xsrf-token"));
    }

    #[tokio::test]
    async fn test_custom_names() {
        let config = XsrfConfig::new()
            .with_cookie_name("MY-TOKEN")
            .with_header_name("X-MY-TOKEN");
        let interceptor =
            XsrfInterceptor::from_cookie(Arc::new(StaticCookies("MY-TOKEN=t0k3n")), config);
        let seen = run(&interceptor, HttpRequest::delete("/item/1").build()).await;
        assert_eq!(seen.lock()[0].get("x-my-token"), Some("t0k3n"));
    }
}
