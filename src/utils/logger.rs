use std::fs::OpenOptions;
use std::io;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "EMFRP_LOG";

const DEFAULT_FILTER: &str = "warn";

fn filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Where log output goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTarget<'a> {
    Stderr,
    File(&'a Path),
    /// Nothing is written; used while the terminal UI owns the screen.
    Discard,
}

/// Installs the global subscriber. Calling it again is a no-op.
pub fn init_logging(target: LogTarget<'_>) -> Result<()> {
    let builder = tracing_subscriber::fmt().with_env_filter(filter()).with_target(false);
    match target {
        LogTarget::File(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            let _ = builder.with_ansi(false).with_writer(Mutex::new(file)).try_init();
        }
        LogTarget::Stderr => {
            let _ = builder.with_writer(io::stderr).try_init();
        }
        LogTarget::Discard => {
            let _ = builder.with_ansi(false).with_writer(io::sink).try_init();
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{LogTarget, init_logging};

    #[test]
    fn log_files_are_created() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("bridge.log");
        init_logging(LogTarget::File(&path)).expect("log file opens");
        assert!(path.exists());
        init_logging(LogTarget::Discard).expect("second init is ignored");
    }
}
