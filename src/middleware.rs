//! Access-log middleware: the per-request interceptor.
//!
//! Wraps the response so that every body byte and the header flush are
//! observed without altering what reaches the client. The handler is invoked
//! exactly once; when the response body finishes, one access-log line is
//! emitted. The wrapper holds the inner body and delegates to it explicitly
//! rather than inheriting its interface.

use std::net::SocketAddr;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use axum::body::Body;
use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::Response;
use bytes::Bytes;
use http::header;
use http_body::{Body as HttpBody, Frame, SizeHint};

use crate::access::{client_host, entry_line, AccessLog, RequestInfo, ResponseRecord};

/// Middleware that instruments each response and emits one access-log line.
///
/// Layer this outermost so the elapsed time covers all request processing.
/// State is the access-log handle; `None` disables logging but keeps the
/// instrumentation in place.
pub async fn access_log_layer(
    State(log): State<Option<AccessLog>>,
    request: Request,
    next: Next,
) -> Response {
    let mut record = ResponseRecord::start();
    let info = request_info(&request);

    let response = next.run(request).await;

    // The response head is ready: this is the first (and only) header flush
    // the async stack exposes, so elapsed time is measured here.
    record.record_status(response.status());
    tracing::debug!(
        method = %info.method,
        path = %info.path,
        status = record.status_code(),
        "request completed"
    );

    let (parts, body) = response.into_parts();
    let body = Body::new(InstrumentedBody::new(body, record, info, log));
    Response::from_parts(parts, body)
}

/// Capture the request fields that go into the log line.
fn request_info(request: &Request) -> RequestInfo {
    let remote = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string());
    let host = remote
        .as_deref()
        .map(client_host)
        .unwrap_or_else(|| "-".to_string());

    RequestInfo {
        host,
        method: request.method().to_string(),
        path: request.uri().to_string(),
        proto: format!("{:?}", request.version()),
        referer: header_str(request, header::REFERER),
        agent: header_str(request, header::USER_AGENT),
    }
}

fn header_str(request: &Request, name: header::HeaderName) -> String {
    request
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string()
}

/// Response body wrapper that counts the bytes it forwards and logs the
/// request once the body ends (normally, on error, or on drop).
struct InstrumentedBody {
    inner: Body,
    record: ResponseRecord,
    info: RequestInfo,
    log: Option<AccessLog>,
    finished: bool,
}

impl InstrumentedBody {
    fn new(inner: Body, record: ResponseRecord, info: RequestInfo, log: Option<AccessLog>) -> Self {
        Self {
            inner,
            record,
            info,
            log,
            finished: false,
        }
    }

    fn finish(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        if let Some(log) = &self.log {
            log.append(entry_line(&self.info, &self.record));
        }
    }
}

impl HttpBody for InstrumentedBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Bytes>, Self::Error>>> {
        let this = self.get_mut();
        match ready!(Pin::new(&mut this.inner).poll_frame(cx)) {
            Some(Ok(frame)) => {
                if let Some(data) = frame.data_ref() {
                    this.record.record_write(data.len());
                }
                Poll::Ready(Some(Ok(frame)))
            }
            Some(Err(err)) => {
                this.finish();
                Poll::Ready(Some(Err(err)))
            }
            None => {
                this.finish();
                Poll::Ready(None)
            }
        }
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

impl Drop for InstrumentedBody {
    fn drop(&mut self) {
        self.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::get;
    use axum::Router;
    use std::convert::Infallible;
    use std::path::Path;
    use std::time::Duration;
    use tower::ServiceExt;

    async fn read_lines(path: &Path, expected: usize) -> String {
        // The writer task runs asynchronously; poll for the result.
        for _ in 0..100 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            if let Ok(contents) = std::fs::read_to_string(path) {
                if contents.lines().count() >= expected {
                    return contents;
                }
            }
        }
        panic!("access log never reached {} lines", expected);
    }

    fn app_with_log(log: Option<AccessLog>) -> Router {
        Router::new()
            .route("/health", get(|| async { "health check body content online okay yes" }))
            .route(
                "/stream",
                get(|| async {
                    let chunks: Vec<Result<Bytes, Infallible>> = vec![
                        Ok(Bytes::from_static(b"chunk one, ")),
                        Ok(Bytes::from_static(b"chunk two")),
                    ];
                    Body::from_stream(futures::stream::iter(chunks))
                }),
            )
            .layer(axum::middleware::from_fn_with_state(log, access_log_layer))
    }

    #[tokio::test]
    async fn test_one_line_per_request_body_unaltered() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("access_log");
        let log = AccessLog::open(&path).unwrap();
        let app = app_with_log(Some(log));

        let request = http::Request::builder()
            .uri("/health")
            .header("user-agent", "test-agent")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), http::StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"health check body content online okay yes");

        let contents = read_lines(&path, 1).await;
        let line = contents.lines().next().unwrap();
        assert!(line.starts_with("- - nobody ["));
        assert!(line.contains(&format!("\"GET /health HTTP/1.1\" 200 {}", body.len())));
        assert!(line.contains("\"test-agent\""));
        assert!(line.ends_with(" ms]"));
    }

    #[tokio::test]
    async fn test_streamed_body_counted_in_full() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("access_log");
        let log = AccessLog::open(&path).unwrap();
        let app = app_with_log(Some(log));

        let request = http::Request::builder()
            .uri("/stream")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"chunk one, chunk two");

        let contents = read_lines(&path, 1).await;
        assert!(contents.contains("\"GET /stream HTTP/1.1\" 200 20"));
    }

    #[tokio::test]
    async fn test_client_host_from_connect_info() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("access_log");
        let log = AccessLog::open(&path).unwrap();
        let app = app_with_log(Some(log));

        let mut request = http::Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let addr: SocketAddr = "203.0.113.5:54321".parse().unwrap();
        request.extensions_mut().insert(ConnectInfo(addr));

        let response = app.oneshot(request).await.unwrap();
        axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();

        let contents = read_lines(&path, 1).await;
        assert!(contents.starts_with("203.0.113.5 - nobody ["));
    }

    #[tokio::test]
    async fn test_disabled_access_log_writes_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let app = app_with_log(None);
        let request = http::Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), http::StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"health check body content online okay yes");

        // Give any stray writer a chance to run, then check that nothing
        // was written anywhere: no default-named file, empty directory.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!dir.path().join("access_log").exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
