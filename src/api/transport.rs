use std::borrow::Cow;
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use reqwest::header::{HeaderMap, ACCEPT, AUTHORIZATION, CONTENT_TYPE, RETRY_AFTER};
use reqwest::{Method, StatusCode};

use crate::cancel::CancelToken;
use crate::error::Error;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const LOG_BODY_LIMIT: usize = 2048;

/// Retry schedule for retryable response statuses. The default matches the
/// service contract: 4 retries beyond the first attempt, exponential backoff
/// from 500ms capped at 5s, no jitter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 4,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Backoff before the retry that follows `attempt` (0-based), absent a
    /// `Retry-After` hint: initial * 2^attempt, capped.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.initial_backoff
            .saturating_mul(1u32 << attempt.min(31))
            .min(self.max_backoff)
    }
}

/// Retry on 429 and any 5xx; every other non-2xx status is terminal.
pub fn should_retry(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// A `Retry-After` value that parses as whole seconds overrides the
/// computed backoff. Anything else is ignored.
pub fn retry_after_hint(headers: &HeaderMap) -> Option<Duration> {
    let value = headers.get(RETRY_AFTER)?.to_str().ok()?;
    let seconds: u64 = value.trim().parse().ok()?;
    Some(Duration::from_secs(seconds))
}

#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
    pub content_type: Option<&'static str>,
}

#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

/// One HTTP exchange with retry/backoff and status classification. The
/// gateway talks to this trait only, so tests swap in scripted transports.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn request(&self, req: ApiRequest, cancel: &CancelToken) -> Result<ApiResponse, Error>;
}

/// Cloneable sink for verbose duplex logging. Writes are line-buffered and
/// never affect control flow.
#[derive(Clone)]
pub struct LogSink {
    writer: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl LogSink {
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Arc::new(Mutex::new(writer)),
        }
    }

    pub fn stderr() -> Self {
        Self::new(Box::new(std::io::stderr()))
    }

    fn line(&self, text: &str) {
        if let Ok(mut writer) = self.writer.lock() {
            let _ = writeln!(writer, "{text}");
        }
    }
}

pub struct HttpTransport {
    http: reqwest::Client,
    auth_header: String,
    policy: RetryPolicy,
    log: Option<LogSink>,
}

impl HttpTransport {
    pub fn new(
        pat: &str,
        insecure: bool,
        log: Option<LogSink>,
        policy: RetryPolicy,
    ) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .danger_accept_invalid_certs(insecure)
            .build()?;
        // Basic auth with an empty username and the PAT as password.
        let encoded = base64::engine::general_purpose::STANDARD.encode(format!(":{pat}"));
        Ok(Self {
            http,
            auth_header: format!("Basic {encoded}"),
            policy,
            log,
        })
    }

    fn build_request(&self, req: &ApiRequest) -> Result<reqwest::Request, Error> {
        let mut builder = self
            .http
            .request(req.method.clone(), &req.url)
            .header(ACCEPT, "application/json")
            .header(AUTHORIZATION, &self.auth_header);
        if !req.query.is_empty() {
            builder = builder.query(&req.query);
        }
        if let Some(content_type) = req.content_type {
            builder = builder.header(CONTENT_TYPE, content_type);
        }
        if let Some(body) = &req.body {
            builder = builder.body(body.clone());
        }
        builder.build().map_err(Error::Network)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn request(&self, req: ApiRequest, cancel: &CancelToken) -> Result<ApiResponse, Error> {
        let mut attempt: u32 = 0;
        loop {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            let request = self.build_request(&req)?;
            if let Some(log) = &self.log {
                log_request(log, &request);
            }
            // Connection-level failures propagate without retry; only
            // response statuses are classified below.
            let response = tokio::select! {
                result = self.http.execute(request) => result?,
                _ = cancel.cancelled() => return Err(Error::Cancelled),
            };
            let status = response.status();
            let headers = response.headers().clone();
            let body = tokio::select! {
                result = response.bytes() => result?.to_vec(),
                _ = cancel.cancelled() => return Err(Error::Cancelled),
            };
            if let Some(log) = &self.log {
                log_response(log, status, &headers, &body);
            }

            if status.is_success() {
                return Ok(ApiResponse { headers, body });
            }
            if !should_retry(status) {
                return Err(Error::Http {
                    status: status.as_u16(),
                    body: String::from_utf8_lossy(&body).into_owned(),
                });
            }
            if attempt >= self.policy.max_retries {
                return Err(Error::HttpRetry {
                    status: status.as_u16(),
                    body: String::from_utf8_lossy(&body).into_owned(),
                });
            }
            let wait = retry_after_hint(&headers)
                .unwrap_or_else(|| self.policy.delay_for_attempt(attempt));
            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = cancel.cancelled() => return Err(Error::Cancelled),
            }
            attempt += 1;
        }
    }
}

fn log_request(log: &LogSink, request: &reqwest::Request) {
    log.line(&format!("> {} {}", request.method(), request.url()));
    for (name, value) in request.headers() {
        if name == AUTHORIZATION {
            continue;
        }
        log.line(&format!("> {}: {}", name, value.to_str().unwrap_or("<binary>")));
    }
    if let Some(body) = request.body().and_then(|body| body.as_bytes()) {
        if !body.is_empty() {
            log.line(&format!("> body: {}", truncated(body)));
        }
    }
}

fn log_response(log: &LogSink, status: StatusCode, headers: &HeaderMap, body: &[u8]) {
    log.line(&format!("< {status}"));
    for (name, value) in headers {
        log.line(&format!("< {}: {}", name, value.to_str().unwrap_or("<binary>")));
    }
    if !body.is_empty() {
        log.line(&format!("< body: {}", truncated(body)));
    }
}

fn truncated(body: &[u8]) -> Cow<'_, str> {
    if body.len() <= LOG_BODY_LIMIT {
        String::from_utf8_lossy(body)
    } else {
        Cow::Owned(format!(
            "{}...",
            String::from_utf8_lossy(&body[..LOG_BODY_LIMIT])
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 4,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(4),
        }
    }

    fn response(status_line: &str, extra_headers: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 {status_line}\r\nContent-Length: {}\r\nConnection: close\r\n{extra_headers}\r\n{body}",
            body.len()
        )
    }

    /// Serves each canned response to one connection, then stops accepting.
    async fn serve_script(responses: Vec<String>) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind listener");
        let addr = listener.local_addr().expect("local addr");
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        tokio::spawn(async move {
            for canned in responses {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                let mut buf = [0u8; 8192];
                let _ = socket.read(&mut buf).await;
                counter.fetch_add(1, Ordering::SeqCst);
                let _ = socket.write_all(canned.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });
        (format!("http://{addr}"), hits)
    }

    fn get(url: &str) -> ApiRequest {
        ApiRequest {
            method: Method::GET,
            url: url.to_string(),
            query: Vec::new(),
            body: None,
            content_type: None,
        }
    }

    #[test]
    fn backoff_schedule_doubles_then_caps() {
        let policy = RetryPolicy::default();
        let delays: Vec<u64> = (0..5)
            .map(|attempt| policy.delay_for_attempt(attempt).as_millis() as u64)
            .collect();
        assert_eq!(delays, vec![500, 1000, 2000, 4000, 5000]);
    }

    #[test]
    fn retry_classification_covers_429_and_5xx() {
        assert!(should_retry(StatusCode::TOO_MANY_REQUESTS));
        assert!(should_retry(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(should_retry(StatusCode::from_u16(599).unwrap()));
        assert!(!should_retry(StatusCode::BAD_REQUEST));
        assert!(!should_retry(StatusCode::NOT_FOUND));
        assert!(!should_retry(StatusCode::UNAUTHORIZED));
    }

    #[test]
    fn retry_after_parses_whole_seconds_only() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, "3".parse().unwrap());
        assert_eq!(retry_after_hint(&headers), Some(Duration::from_secs(3)));

        headers.insert(RETRY_AFTER, "soon".parse().unwrap());
        assert_eq!(retry_after_hint(&headers), None);

        assert_eq!(retry_after_hint(&HeaderMap::new()), None);
    }

    #[tokio::test]
    async fn success_passes_body_and_headers_through() {
        let (url, hits) = serve_script(vec![response(
            "200 OK",
            "X-Vss-Userdata: abc:me@x\r\n",
            "{\"ok\":true}",
        )])
        .await;
        let transport =
            HttpTransport::new("token", false, None, fast_policy()).expect("transport");
        let result = transport
            .request(get(&url), &CancelToken::new())
            .await
            .expect("success");
        assert_eq!(result.body, b"{\"ok\":true}");
        assert_eq!(
            result.headers.get("x-vss-userdata").and_then(|v| v.to_str().ok()),
            Some("abc:me@x")
        );
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn terminal_4xx_is_not_retried() {
        let (url, hits) = serve_script(vec![response("404 Not Found", "", "missing")]).await;
        let transport =
            HttpTransport::new("token", false, None, fast_policy()).expect("transport");
        let err = transport
            .request(get(&url), &CancelToken::new())
            .await
            .expect_err("must fail");
        match err {
            Error::Http { status, body } => {
                assert_eq!(status, 404);
                assert_eq!(body, "missing");
            }
            other => panic!("expected http_error, got {other:?}"),
        }
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retryable_status_recovers_on_a_later_attempt() {
        let (url, hits) = serve_script(vec![
            response("503 Service Unavailable", "", "busy"),
            response("429 Too Many Requests", "Retry-After: 0\r\n", "slow down"),
            response("200 OK", "", "done"),
        ])
        .await;
        let transport =
            HttpTransport::new("token", false, None, fast_policy()).expect("transport");
        let result = transport
            .request(get(&url), &CancelToken::new())
            .await
            .expect("recovers");
        assert_eq!(result.body, b"done");
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausted_retries_surface_the_retry_error() {
        let busy = response("500 Internal Server Error", "", "still busy");
        let (url, hits) = serve_script(vec![busy.clone(); 5]).await;
        let transport =
            HttpTransport::new("token", false, None, fast_policy()).expect("transport");
        let err = transport
            .request(get(&url), &CancelToken::new())
            .await
            .expect_err("must exhaust");
        match err {
            Error::HttpRetry { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body, "still busy");
            }
            other => panic!("expected http_retry, got {other:?}"),
        }
        // first attempt plus four retries
        assert_eq!(hits.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn cancelled_token_short_circuits_before_any_request() {
        let (url, hits) = serve_script(vec![response("200 OK", "", "unused")]).await;
        let transport =
            HttpTransport::new("token", false, None, fast_policy()).expect("transport");
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = transport
            .request(get(&url), &cancel)
            .await
            .expect_err("must cancel");
        assert!(matches!(err, Error::Cancelled));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, data: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(data);
            Ok(data.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn verbose_log_never_contains_the_auth_header() {
        let (url, _hits) = serve_script(vec![response("200 OK", "", "{}")]).await;
        let buf = SharedBuf::default();
        let sink = LogSink::new(Box::new(buf.clone()));
        let transport =
            HttpTransport::new("secret-pat", false, Some(sink), fast_policy()).expect("transport");
        let mut request = get(&url);
        request.method = Method::POST;
        request.body = Some(b"{\"query\":\"SELECT\"}".to_vec());
        request.content_type = Some("application/json");
        transport
            .request(request, &CancelToken::new())
            .await
            .expect("success");

        let log = String::from_utf8(buf.0.lock().unwrap().clone()).expect("utf8 log");
        assert!(log.contains("> POST"));
        assert!(log.contains("> body: {\"query\":\"SELECT\"}"));
        assert!(log.contains("< 200 OK"));
        assert!(!log.to_lowercase().contains("authorization"));
        assert!(!log.contains("secret-pat"));
    }

    #[test]
    fn long_bodies_are_truncated_in_logs() {
        let body = vec![b'a'; LOG_BODY_LIMIT + 10];
        let text = truncated(&body);
        assert_eq!(text.len(), LOG_BODY_LIMIT + 3);
        assert!(text.ends_with("..."));
    }
}
