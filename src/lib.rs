//! Drives an emfrp reactive dataflow engine from an interactive front-end
//! through the engine's C ABI.

pub mod bridge;
pub mod cli;
pub mod config;
pub mod console;
pub mod frontend;
pub mod utils;
pub mod version;

pub use bridge::{BridgeError, BridgeResult, BridgeSession, EngineSession, EngineValue, InputMode};
pub use config::BridgeConfig;
pub use console::{CommandReport, ConsoleLog, ReplConsole};
