//! Access-log records and the append-only access-log writer.
//!
//! `ResponseRecord` tracks what was observed for one response (bytes written,
//! status, elapsed time). `format_line` renders the fixed access-log line
//! format. `AccessLog` serializes appends from concurrent request tasks
//! through a single writer task fed by a channel.

use std::fs::OpenOptions;
use std::io;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Instant;

use chrono::{DateTime, Local, TimeZone};
use http::StatusCode;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;

use crate::config::{ACCESS_LOG_TIME_FORMAT, ACCESS_LOG_USER};

/// Request fields captured before the handler runs, for the log line.
#[derive(Debug, Clone)]
pub struct RequestInfo {
    /// Client host with any port stripped
    pub host: String,
    pub method: String,
    /// Path plus query string
    pub path: String,
    /// Protocol version, e.g. `HTTP/1.1`
    pub proto: String,
    pub referer: String,
    pub agent: String,
}

/// Per-request response instrumentation. One instance exists per request,
/// owned by the task handling it.
#[derive(Debug)]
pub struct ResponseRecord {
    started: Instant,
    started_at: DateTime<Local>,
    bytes: u64,
    status: Option<StatusCode>,
    elapsed_ms: Option<u64>,
}

impl ResponseRecord {
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
            started_at: Local::now(),
            bytes: 0,
            status: None,
            elapsed_ms: None,
        }
    }

    /// Account for body bytes forwarded to the client.
    pub fn record_write(&mut self, n: usize) {
        self.bytes += n as u64;
    }

    /// Record the status at header flush. Only the first call is meaningful:
    /// elapsed time is measured here, once, and later calls are no-ops.
    pub fn record_status(&mut self, status: StatusCode) {
        if self.status.is_none() {
            self.elapsed_ms = Some(self.started.elapsed().as_millis() as u64);
            self.status = Some(status);
        }
    }

    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    /// Status code as a number, 0 while unset.
    pub fn status_code(&self) -> u16 {
        self.status.map(|s| s.as_u16()).unwrap_or(0)
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ms.unwrap_or(0)
    }

    pub fn started_at(&self) -> &DateTime<Local> {
        &self.started_at
    }
}

/// Strip the port from a client address, falling back to the raw string
/// when it does not parse as a socket address.
pub fn client_host(remote: &str) -> String {
    match remote.parse::<SocketAddr>() {
        Ok(addr) => addr.ip().to_string(),
        Err(_) => remote.to_string(),
    }
}

/// Render one access-log line, newline included.
///
/// Format: `<host> - <user> [<date>] "<METHOD> <path> <proto>" <status>
/// <size> "<referer>" "<agent>" [<elapsed> ms]`
#[allow(clippy::too_many_arguments)]
pub fn format_line<Tz: TimeZone>(
    host: &str,
    user: &str,
    method: &str,
    path: &str,
    proto: &str,
    status: u16,
    size: u64,
    referer: &str,
    agent: &str,
    started: &DateTime<Tz>,
    elapsed_ms: u64,
) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let date = started.format(ACCESS_LOG_TIME_FORMAT);
    format!(
        "{} - {} [{}] \"{} {} {}\" {} {} {:?} {:?} [{} ms]\n",
        host, user, date, method, path, proto, status, size, referer, agent, elapsed_ms
    )
}

/// Render the access-log line for a finished request.
pub fn entry_line(info: &RequestInfo, record: &ResponseRecord) -> String {
    format_line(
        &info.host,
        ACCESS_LOG_USER,
        &info.method,
        &info.path,
        &info.proto,
        record.status_code(),
        record.bytes(),
        &info.referer,
        &info.agent,
        record.started_at(),
        record.elapsed_ms(),
    )
}

/// Handle to the access log. Cloneable; lines from all request tasks funnel
/// into one writer task so concurrent appends never interleave.
#[derive(Debug, Clone)]
pub struct AccessLog {
    tx: mpsc::UnboundedSender<String>,
}

impl AccessLog {
    /// Open the log file for append and spawn the writer task.
    ///
    /// Must be called within a tokio runtime. Failing to open the file is
    /// returned to the caller; write failures inside the task are not.
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = OpenOptions::new().append(true).create(true).open(path)?;
        let mut file = tokio::fs::File::from_std(file);
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();

        tokio::spawn(async move {
            while let Some(line) = rx.recv().await {
                if let Err(e) = file.write_all(line.as_bytes()).await {
                    tracing::debug!(error = %e, "access log write failed");
                } else if let Err(e) = file.flush().await {
                    tracing::debug!(error = %e, "access log flush failed");
                }
            }
        });

        Ok(Self { tx })
    }

    /// Queue one line for append. Never blocks and never fails the caller.
    pub fn append(&self, line: String) {
        let _ = self.tx.send(line);
    }
}
