//! Tracing subscriber setup shared by the binaries.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, EnvFilter};

use crate::error::{ClientError, ClientResult};

#[derive(Debug, Clone, Default)]
pub struct LogOptions {
    /// Emit JSON lines instead of human-readable text.
    pub json: bool,
    /// Append to this file instead of writing to stderr.
    pub file: Option<String>,
    /// Filter used when `RUST_LOG` is unset.
    pub default_filter: Option<String>,
}

fn env_filter(default: Option<&str>) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default.unwrap_or("info")))
}

/// Installs the global subscriber. The returned guard must live until exit when
/// logging to a file, or buffered lines are lost.
pub fn init_tracing(options: &LogOptions) -> ClientResult<Option<WorkerGuard>> {
    let filter = env_filter(options.default_filter.as_deref());

    let (writer, guard) = match &options.file {
        Some(path) => {
            let path = Path::new(path);
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = path
                .file_name()
                .ok_or_else(|| ClientError::config(format!("invalid log file '{}'", path.display())))?;
            let appender = tracing_appender::rolling::never(dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(writer), Some(guard))
        }
        None => (None, None),
    };

    let builder = fmt().with_env_filter(filter).with_target(false);
    let installed = match (writer, options.json) {
        (Some(writer), true) => builder.json().with_writer(writer).with_ansi(false).try_init(),
        (Some(writer), false) => builder.with_writer(writer).with_ansi(false).try_init(),
        (None, true) => builder.json().with_writer(std::io::stderr).try_init(),
        (None, false) => builder.with_writer(std::io::stderr).try_init(),
    };
    installed.map_err(|e| ClientError::config(format!("cannot install logger: {e}")))?;
    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_logging_returns_guard() {
        let dir = tempfile::tempdir().unwrap();
        let options = LogOptions {
            file: Some(dir.path().join("client.log").display().to_string()),
            ..Default::default()
        };
        // Only one global subscriber per process; a second init reports an error.
        match init_tracing(&options) {
            Ok(guard) => assert!(guard.is_some()),
            Err(err) => assert!(matches!(err, ClientError::Config(_))),
        }
    }
}
