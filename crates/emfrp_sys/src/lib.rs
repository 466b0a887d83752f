//! Raw C boundary of the emfrp reactive engine.
//!
//! Everything here mirrors `emfrp.h`: opaque handle types, the two callback
//! shapes, the `em_result` status codes and a function table ([`EngineAbi`])
//! that can be filled either from a shared library at runtime or from an
//! in-process implementation of the same symbols.

pub mod abi;
pub mod loader;
pub mod status;

pub use abi::{
    EmObject, EmfrpHandle, EngineAbi, InputCallback, OutputCallback, SYMBOL_NAMES,
};
pub use loader::{EngineLibrary, LoadError};
pub use status::EngineStatus;
