//! REPL console adapter: runs command text against a session and keeps the
//! append-only log the front-ends display.

use emfrp_sys::EngineStatus;
use tracing::debug;

use crate::bridge::{BridgeError, BridgeResult, BridgeSession};

/// Append-only list of log lines.
#[derive(Debug, Default, Clone)]
pub struct ConsoleLog {
    lines: Vec<String>,
}

impl ConsoleLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Lines appended since `mark`, a value previously returned by [`Self::len`].
    pub fn since(&self, mark: usize) -> &[String] {
        self.lines.get(mark..).unwrap_or_default()
    }

    /// Records the outcome of a node registration as `Return Code:<n>`.
    pub fn record_status(&mut self, outcome: &BridgeResult<()>) {
        match outcome {
            Ok(()) => self.push(return_code_line(EngineStatus::Ok)),
            Err(err) => match err.engine_status() {
                Some(status) => self.push(return_code_line(status)),
                None => self.push(format!("Error: {err}")),
            },
        }
    }
}

/// What one command produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandReport {
    pub command: String,
    /// `None` when the command was refused before reaching the engine.
    pub status: Option<EngineStatus>,
    pub rendered: Option<String>,
    pub error: Option<String>,
}

impl CommandReport {
    pub fn is_ok(&self) -> bool {
        self.status.is_some_and(EngineStatus::is_ok)
    }
}

#[derive(Debug, Default)]
pub struct ReplConsole {
    log: ConsoleLog,
}

impl ReplConsole {
    pub fn new() -> Self {
        Self::default()
    }

    pub const fn log(&self) -> &ConsoleLog {
        &self.log
    }

    pub fn log_mut(&mut self) -> &mut ConsoleLog {
        &mut self.log
    }

    /// Runs one REPL line and appends the echoed command, its return code and
    /// the rendered result to the log.
    pub fn execute(&mut self, session: &mut BridgeSession, command: &str) -> CommandReport {
        self.log.push(command);
        let report = match session.execute_repl(command) {
            Ok(value) => CommandReport {
                command: command.to_string(),
                status: Some(EngineStatus::Ok),
                rendered: value.map(|value| value.render()),
                error: None,
            },
            Err(err) => failed(command, &err),
        };

        if let Some(status) = report.status {
            self.log.push(return_code_line(status));
        }
        if let Some(rendered) = &report.rendered {
            self.log.push(format!("Return Value:{rendered}"));
        }
        if let Some(error) = &report.error {
            self.log.push(format!("Error: {error}"));
        }
        debug!(command, status = ?report.status, "console command finished");
        report
    }
}

fn failed(command: &str, err: &BridgeError) -> CommandReport {
    CommandReport {
        command: command.to_string(),
        status: err.engine_status(),
        rendered: None,
        error: Some(err.to_string()),
    }
}

fn return_code_line(status: EngineStatus) -> String {
    format!("Return Code:{}", status.code())
}
