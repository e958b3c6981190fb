// crates/clipmark-ui/src/helpers/log.rs
//
// Logging setup for the binary.
//
// Release builds on Windows run with `windows_subsystem = "windows"`, so there
// is no console and stderr goes nowhere. Everything is also appended to a
// file in the OS temp directory so it is visible regardless of launch mode.
//
// File: <temp>/clipmark.log, append-only across sessions.
// Filter: RUST_LOG, default `info`.

use std::sync::Mutex;

use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

pub fn log_path() -> std::path::PathBuf {
    std::env::temp_dir().join("clipmark.log")
}

/// Install the global subscriber. Never panics: if the log file can't be
/// opened we fall back to stderr only.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path());

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);
    let installed = match file {
        Ok(f) => builder
            .with_ansi(false)
            .with_writer(std::io::stderr.and(Mutex::new(f)))
            .try_init(),
        Err(_) => builder.with_writer(std::io::stderr).try_init(),
    };
    if installed.is_err() {
        eprintln!("[log] subscriber already installed");
    }
}
