//! XSRF protection through a full client chain.

use std::sync::Arc;

use futures::StreamExt;
use girder_http::{
    HttpClient, HttpEvent, HttpEventStream, HttpHandler, HttpHeaders, HttpRequest, HttpResponse,
    deferred_event_stream,
};
use girder_xsrf::{CookieSource, XsrfConfig, XsrfInterceptor};
use parking_lot::Mutex;

struct AmbientCookies(&'static str);

impl CookieSource for AmbientCookies {
    fn cookie(&self) -> String {
        self.0.to_string()
    }
}

struct CapturingBackend {
    seen: Arc<Mutex<Vec<HttpRequest>>>,
}

impl HttpHandler for CapturingBackend {
    fn handle(&self, request: HttpRequest) -> HttpEventStream {
        self.seen.lock().push(request.clone());
        deferred_event_stream(move |tx| async move {
            let _ = tx.send(Ok(HttpEvent::Sent)).await;
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

fn protected_client(cookie: &'static str) -> (HttpClient, Arc<Mutex<Vec<HttpRequest>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let client = HttpClient::builder()
        .interceptor(XsrfInterceptor::from_cookie(
            Arc::new(AmbientCookies(cookie)),
            XsrfConfig::default(),
        ))
        .backend(CapturingBackend { seen: seen.clone() })
        .build();
    (client, seen)
}

#[tokio::test]
async fn post_carries_the_token() {
    let (client, seen) = protected_client("XSRF-TOKEN=tok-1; session=abc");
    client
        .post("/api/submit")
        .text("payload")
        .response()
        .await
        .unwrap();

    let seen = seen.lock();
    assert_eq!(seen[0].headers().get("x-xsrf-token"), Some("tok-1"));
}

#[tokio::test]
async fn get_is_untouched_whatever_the_cookie_says() {
    let (client, seen) = protected_client("XSRF-TOKEN=tok-1");
    client.get("/api/read").response().await.unwrap();

    let seen = seen.lock();
    assert!(!seen[0].headers().has("x-xsrf-token"));
}

#[tokio::test]
async fn explicit_header_survives_the_interceptor() {
    let (client, seen) = protected_client("XSRF-TOKEN=newer");
    client
        .post("/api/submit")
        .header("X-XSRF-TOKEN", "original")
        .response()
        .await
        .unwrap();

    let seen = seen.lock();
    assert_eq!(seen[0].headers().get("x-xsrf-token"), Some("original"));
}

#[tokio::test]
async fn events_flow_unchanged_through_the_interceptor() {
    let (client, _) = protected_client("XSRF-TOKEN=tok-1");
    let mut events = client.post("/api/submit").send();

    assert!(matches!(events.next().await, Some(Ok(HttpEvent::Sent))));
    assert!(matches!(
        events.next().await,
        Some(Ok(HttpEvent::Response(_)))
    ));
    assert!(events.next().await.is_none());
}
