//! HTTPS server bootstrap.
//!
//! Wires up the ACME certificate manager, the access-log middleware, the
//! plaintext redirect listener, and the TLS listener. Certificates come from
//! Let's Encrypt, cached in the configured directory; the CA's terms are
//! accepted automatically.

use std::net::SocketAddr;
use std::path::Path;

use axum::Router;
use axum_server::Handle;
use futures::StreamExt;
use rustls_acme::caches::DirCache;
use rustls_acme::AcmeConfig;

use crate::access::AccessLog;
use crate::config::{ConfigError, ServerConfig, HTTPS_PORT, HTTP_PORT};
use crate::middleware;

use super::redirect;
use super::shutdown;

/// Server startup error. All variants are fatal: the caller is expected to
/// abort startup.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to load configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to open access log '{path}': {source}")]
    AccessLog {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to prepare certificate cache '{path}': {source}")]
    CertCache {
        path: String,
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    Server(#[from] std::io::Error),
}

/// The HTTPS front-end. Construct from configuration, then call [`serve`]
/// with the handler that should receive every request.
///
/// [`serve`]: Server::serve
#[derive(Debug)]
pub struct Server {
    config: ServerConfig,
    access_log: Option<AccessLog>,
}

impl Server {
    /// Load configuration from a TOML file and construct the server.
    pub fn from_config_file<P: AsRef<Path>>(path: P) -> Result<Self, ServerError> {
        Self::new(ServerConfig::load(path)?)
    }

    /// Construct the server, opening the access log if one is configured.
    ///
    /// Must be called within a tokio runtime.
    pub fn new(config: ServerConfig) -> Result<Self, ServerError> {
        let access_log = match config.access_log_path() {
            Some(path) => {
                let log = AccessLog::open(path).map_err(|source| ServerError::AccessLog {
                    path: path.to_string(),
                    source,
                })?;
                Some(log)
            }
            None => None,
        };
        Ok(Self { config, access_log })
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Serve `app` over TLS on port 443, with the redirect listener on
    /// port 80. Each request is wrapped by the access-log middleware before
    /// `app` sees it.
    ///
    /// Runs until a listener fails; a redirect-listener failure is fatal.
    pub async fn serve(self, app: Router) -> Result<(), ServerError> {
        let app = app.layer(axum::middleware::from_fn_with_state(
            self.access_log.clone(),
            middleware::access_log_layer,
        ));

        tracing::info!(cache = %self.config.certs, "caching ACME certificates on disk");
        std::fs::create_dir_all(&self.config.certs).map_err(|source| ServerError::CertCache {
            path: self.config.certs.clone(),
            source,
        })?;

        let mut acme = AcmeConfig::new(self.config.hostnames.clone())
            .cache(DirCache::new(self.config.certs.clone()))
            .directory_lets_encrypt(self.config.acme_production);
        if let Some(email) = &self.config.acme_email {
            acme = acme.contact_push(format!("mailto:{}", email));
        }
        let mut acme_state = acme.state();
        let acceptor = acme_state.axum_acceptor(acme_state.default_rustls_config());

        // Certificate acquisition and renewal run in the background.
        tokio::spawn(async move {
            loop {
                match acme_state.next().await {
                    Some(Ok(event)) => tracing::info!(event = ?event, "ACME event"),
                    Some(Err(err)) => tracing::error!(error = %err, "ACME error"),
                    None => break,
                }
            }
        });

        let handle = Handle::new();
        shutdown::setup_shutdown_handler(handle.clone());

        let https_addr = SocketAddr::from(([0, 0, 0, 0], HTTPS_PORT));
        tracing::info!(
            hostnames = ?self.config.hostnames,
            %https_addr,
            "starting HTTPS server"
        );

        let https = axum_server::bind(https_addr)
            .handle(handle)
            .acceptor(acceptor)
            .serve(app.into_make_service_with_connect_info::<SocketAddr>());

        tokio::select! {
            result = https => result.map_err(ServerError::Server),
            result = redirect::serve_redirect(HTTP_PORT, HTTPS_PORT) => {
                result?;
                Err(ServerError::Server(std::io::Error::other(
                    "redirect listener exited",
                )))
            }
        }
    }
}
