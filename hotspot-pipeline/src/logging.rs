//! Tracing subscriber setup for the binaries.

use std::error::Error;
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "hotspot=info";

/// Error returned when a global subscriber cannot be installed.
pub type InitError = Box<dyn Error + Send + Sync + 'static>;

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Log compact lines to stderr.
///
/// # Errors
///
/// Fails when a global subscriber is already installed.
pub fn init() -> Result<(), InitError> {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .try_init()
}

/// Append log lines to `path`, keeping the terminal free for a full-screen UI.
///
/// # Errors
///
/// Fails when the file cannot be opened or a global subscriber is already installed.
pub fn init_file(path: &Path) -> Result<(), InitError> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .try_init()
}
