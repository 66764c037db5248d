//! HTTP to HTTPS redirect listener.
//!
//! A plaintext listener whose sole job is to answer every request with a
//! permanent redirect to the HTTPS equivalent URL.

use std::net::SocketAddr;
use std::time::Duration;

use axum::http::Uri;
use axum::response::Redirect;
use axum::routing::any;
use axum::Router;
use axum_extra::extract::Host;
use tower_http::timeout::TimeoutLayer;

use crate::config::REDIRECT_TIMEOUT_SECS;

/// Serve the redirect listener. Returns only on listener failure, which the
/// caller treats as fatal.
pub async fn serve_redirect(http_port: u16, https_port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], http_port));

    tracing::info!(
        http_port = %http_port,
        https_port = %https_port,
        "starting HTTP->HTTPS redirect listener"
    );

    let app = Router::new()
        .fallback(any(move |Host(host): Host, uri: Uri| async move {
            redirect_to_https(host, uri, https_port)
        }))
        .layer(TimeoutLayer::new(Duration::from_secs(REDIRECT_TIMEOUT_SECS)));

    axum_server::bind(addr)
        .serve(app.into_make_service())
        .await
}

fn redirect_to_https(host: String, uri: Uri, https_port: u16) -> Redirect {
    let url = https_url(&host, &uri, https_port);
    tracing::debug!(from = %uri, to = %url, "redirecting to HTTPS");
    Redirect::permanent(&url)
}

/// Build the HTTPS equivalent of a plaintext request URL: port stripped from
/// the host, path and query preserved, explicit port only when nonstandard.
fn https_url(host: &str, uri: &Uri, https_port: u16) -> String {
    let host = strip_host_port(host);
    let path = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");

    if https_port == 443 {
        format!("https://{}{}", host, path)
    } else {
        format!("https://{}:{}{}", host, https_port, path)
    }
}

/// Drop a trailing `:port` from a Host header value. Bracketed IPv6
/// literals keep their brackets; colons inside them are not a port.
fn strip_host_port(host: &str) -> &str {
    if let Some(rest) = host.strip_prefix('[') {
        return match rest.find(']') {
            Some(end) => &host[..end + 2],
            None => host,
        };
    }
    host.split(':').next().unwrap_or(host)
}
