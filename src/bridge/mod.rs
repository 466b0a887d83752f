//! The bridge between the front-end and an engine reached through the
//! `emfrp_*` C ABI.

pub mod error;
pub mod registrar;
pub mod session;
pub mod trampoline;
pub mod value;

pub use error::{BridgeError, BridgeResult, NodeKind};
pub use registrar::{BridgeSession, InputMode};
pub use session::EngineSession;
pub use trampoline::{PullTrampoline, PushTrampoline, RegistrationTable, SLOT_CAPACITY, free_slots};
pub use value::{EngineValue, MAX_TEXT_LEN, Marshaler, engine_text};
