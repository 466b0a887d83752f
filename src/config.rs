use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::bridge::InputMode;
use crate::frontend::DEFAULT_SLIDER_MAX;

pub const LIBRARY_ENV: &str = "EMFRP_LIBRARY";
pub const INPUT_MODE_ENV: &str = "EMFRP_INPUT_MODE";

/// Settings for one run of the bridge.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BridgeConfig {
    /// Shared engine library to load. The bundled engine is used when unset.
    pub library: Option<PathBuf>,
    pub input_mode: InputMode,
    /// Upper bound of every input slider.
    pub slider_max: i32,
    /// Where log output goes while the terminal UI owns the screen.
    pub log_file: Option<PathBuf>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            library: None,
            input_mode: InputMode::default(),
            slider_max: DEFAULT_SLIDER_MAX,
            log_file: None,
        }
    }
}

impl BridgeConfig {
    /// Reads a TOML configuration file.
    #[cfg(feature = "toml-config")]
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config = toml::from_str(&text)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        tracing::debug!(path = %path.display(), "configuration file loaded");
        Ok(config)
    }

    #[cfg(not(feature = "toml-config"))]
    pub fn from_file(path: &Path) -> Result<Self> {
        anyhow::bail!(
            "cannot read {}: built without the `toml-config` feature",
            path.display()
        )
    }

    /// Applies `EMFRP_LIBRARY` and `EMFRP_INPUT_MODE` on top of `self`.
    pub fn with_env(self) -> Result<Self> {
        self.with_vars(|key| env::var(key).ok())
    }

    pub(crate) fn with_vars(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(library) = lookup(LIBRARY_ENV).filter(|value| !value.is_empty()) {
            self.library = Some(PathBuf::from(library));
        }
        if let Some(mode) = lookup(INPUT_MODE_ENV).filter(|value| !value.is_empty()) {
            self.input_mode = parse_mode(&mode)
                .with_context(|| format!("invalid {INPUT_MODE_ENV} value `{mode}`"))?;
        }
        Ok(self)
    }
}

fn parse_mode(text: &str) -> Result<InputMode> {
    match text.to_ascii_lowercase().as_str() {
        "pull" => Ok(InputMode::Pull),
        "push" => Ok(InputMode::Push),
        _ => anyhow::bail!("expected `pull` or `push`"),
    }
}
