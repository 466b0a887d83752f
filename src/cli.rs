use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use emfrp_sys::EngineLibrary;
use tracing::info;

use crate::bridge::{BridgeSession, InputMode};
use crate::config::BridgeConfig;
use crate::frontend::{self, FrontEnd};
use crate::utils::logger::{self, LogTarget};
use crate::version::VERSION;

#[derive(Parser, Debug)]
#[command(name = "emfrp-bridge", version = VERSION, about = "Interactive front-end for the emfrp dataflow engine")]
pub struct BridgeCli {
    #[arg(long, global = true)]
    /// Shared engine library to load instead of the bundled engine.
    library: Option<PathBuf>,

    #[arg(long, global = true, value_enum)]
    /// How slider values reach input nodes.
    input_mode: Option<InputMode>,

    #[arg(long, global = true)]
    /// TOML configuration file.
    config: Option<PathBuf>,

    #[arg(long, global = true)]
    /// Write logs to this file instead of stderr.
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Full-screen terminal front-end (the default).
    Tui,
    /// Line-oriented REPL on stdin and stdout.
    Repl,
}

impl BridgeCli {
    pub fn command(&self) -> Command {
        self.command.unwrap_or(Command::Tui)
    }

    /// Defaults, then the config file, then the environment, then flags.
    pub fn resolve_config(&self) -> Result<BridgeConfig> {
        let base = match &self.config {
            Some(path) => BridgeConfig::from_file(path)?,
            None => BridgeConfig::default(),
        };
        let mut config = base.with_env()?;
        if let Some(library) = &self.library {
            config.library = Some(library.clone());
        }
        if let Some(mode) = self.input_mode {
            config.input_mode = mode;
        }
        if let Some(log_file) = &self.log_file {
            config.log_file = Some(log_file.clone());
        }
        Ok(config)
    }
}

pub fn run() -> Result<()> {
    let cli = BridgeCli::parse();
    let config = cli.resolve_config()?;
    logger::init_logging(log_target(cli.command(), &config))?;

    let library = open_library(config.library.as_deref())?;
    let session = BridgeSession::new(Rc::new(library), config.input_mode)
        .context("failed to start the engine")?;
    info!(mode = %config.input_mode, "session started");
    let mut front_end = FrontEnd::new(session, config.slider_max);

    match cli.command() {
        Command::Tui => frontend::tui::run(&mut front_end),
        Command::Repl => frontend::line::run(&mut front_end, io::stdin().lock(), io::stdout().lock()),
    }
}

/// The terminal UI owns the screen, so without a log file its logs are
/// dropped; the line REPL logs to stderr.
pub fn log_target(command: Command, config: &BridgeConfig) -> LogTarget<'_> {
    match (&config.log_file, command) {
        (Some(path), _) => LogTarget::File(path),
        (None, Command::Tui) => LogTarget::Discard,
        (None, Command::Repl) => LogTarget::Stderr,
    }
}

fn open_library(path: Option<&Path>) -> Result<EngineLibrary> {
    match path {
        Some(path) => Ok(EngineLibrary::load(path)?),
        None => bundled_library(),
    }
}

#[cfg(feature = "bundled-engine")]
fn bundled_library() -> Result<EngineLibrary> {
    Ok(emfrp_engine::library())
}

#[cfg(not(feature = "bundled-engine"))]
fn bundled_library() -> Result<EngineLibrary> {
    anyhow::bail!("no engine library given; pass --library or set {}", crate::config::LIBRARY_ENV)
}
