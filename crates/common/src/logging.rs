//! Logging and tracing initialization.

use std::fs::OpenOptions;
use std::sync::Mutex;

use tracing_subscriber::fmt::writer::BoxMakeWriter;

use crate::config::LoggingConfig;

/// Initialize the tracing subscriber with the given configuration.
///
/// `RUST_LOG` takes precedence over the configured level. If the log file
/// cannot be opened, output falls back to stderr.
pub fn init_logging(config: &LoggingConfig) {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let (writer, file_error) = make_writer(config);

    if config.json {
        let subscriber = fmt::Subscriber::builder()
            .with_env_filter(env_filter)
            .with_writer(writer)
            .json()
            .finish();
        tracing::subscriber::set_global_default(subscriber).ok();
    } else {
        let subscriber = fmt::Subscriber::builder()
            .with_env_filter(env_filter)
            .with_writer(writer)
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .finish();
        tracing::subscriber::set_global_default(subscriber).ok();
    }

    if let Some(e) = file_error {
        tracing::warn!(error = %e, "Failed to open log file; logging to stderr");
    }
}

/// Initialize logging with defaults (useful for tests and quick scripts).
pub fn init_default_logging() {
    init_logging(&LoggingConfig::default());
}

fn make_writer(config: &LoggingConfig) -> (BoxMakeWriter, Option<std::io::Error>) {
    let Some(path) = &config.file else {
        return (BoxMakeWriter::new(std::io::stderr), None);
    };

    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    match OpenOptions::new().create(true).append(true).open(path) {
        Ok(file) => (BoxMakeWriter::new(Mutex::new(file)), None),
        Err(e) => (BoxMakeWriter::new(std::io::stderr), Some(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_file_is_created_with_parent_dirs() {
        let dir = std::env::temp_dir().join(format!("overlay-logging-{}", std::process::id()));
        let path = dir.join("nested").join("engine.log");
        let config = LoggingConfig {
            file: Some(path.clone()),
            ..LoggingConfig::default()
        };

        let (_writer, error) = make_writer(&config);
        assert!(error.is_none());
        assert!(path.exists());
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn unopenable_log_file_falls_back_to_stderr() {
        // A directory cannot be opened for appending.
        let config = LoggingConfig {
            file: Some(std::env::temp_dir()),
            ..LoggingConfig::default()
        };
        let (_writer, error) = make_writer(&config);
        assert!(error.is_some());
    }
}
