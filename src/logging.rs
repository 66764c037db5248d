//! Operational logging setup.
//!
//! The operational log is the tracing subscriber: with a configured file it
//! appends there (ANSI disabled), otherwise events go to stderr. This is the
//! default implementation of the logging capability; library users may skip
//! [`init`] and install their own subscriber instead.

use std::fs::OpenOptions;
use std::io;
use std::sync::Mutex;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Install the process-wide subscriber. An unopenable log file is a fatal
/// startup error. Call at most once.
pub fn init(log_path: Option<&str>, filter: &str) -> io::Result<()> {
    let registry = tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::new(filter));

    match log_path {
        Some(path) => {
            let file = OpenOptions::new().append(true).create(true).open(path)?;
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(Mutex::new(file)),
                )
                .init();
        }
        None => {
            registry.with(tracing_subscriber::fmt::layer()).init();
        }
    }

    Ok(())
}
