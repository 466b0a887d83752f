use std::ffi::CStr;
use std::ptr::{self, NonNull};
use std::rc::Rc;

use emfrp_sys::{EmObject, EmfrpHandle, EngineLibrary, EngineStatus, InputCallback, OutputCallback};
use tracing::{debug, info, trace};

use super::error::{BridgeError, BridgeResult};
use super::trampoline::BoundaryGuard;
use super::value::{EngineValue, Marshaler, engine_text};

/// One live engine instance.
///
/// Every method that crosses into the engine holds the thread's boundary
/// guard for the duration of the call. The ABI has no destroy entry point, so
/// the instance is released only when the process exits.
pub struct EngineSession {
    marshaler: Marshaler,
    handle: NonNull<EmfrpHandle>,
}

impl EngineSession {
    /// Creates the engine. Any failure here is fatal for the session.
    pub fn create(library: Rc<EngineLibrary>) -> BridgeResult<Self> {
        let marshaler = Marshaler::new(library);
        let mut raw: *mut EmfrpHandle = ptr::null_mut();
        let code = {
            let _guard = BoundaryGuard::enter("emfrp_create")?;
            // SAFETY: `raw` is a valid out slot for the duration of the call.
            unsafe { (marshaler.abi().create)(&mut raw) }
        };
        let status = EngineStatus::from_raw(code);
        if !status.is_ok() {
            return Err(BridgeError::FatalInit { status });
        }
        let handle = NonNull::new(raw).ok_or(BridgeError::FatalInit { status })?;
        info!(origin = marshaler.library().origin(), "engine session created");
        Ok(Self { marshaler, handle })
    }

    pub const fn marshaler(&self) -> &Marshaler {
        &self.marshaler
    }

    /// Submits one REPL line. The returned value, if any, lives until the next
    /// call on this session.
    pub fn execute_repl(&mut self, line: &str) -> BridgeResult<Option<EngineValue<'_>>> {
        let text = engine_text("REPL line", line)?;
        let mut out: *mut EmObject = ptr::null_mut();
        let code = {
            let _guard = BoundaryGuard::enter("emfrp_repl")?;
            // SAFETY: handle is live, `text` is NUL-terminated and `out` is writable.
            unsafe { (self.marshaler.abi().repl)(self.handle.as_ptr(), text.as_ptr(), &mut out) }
        };
        BridgeError::check("emfrp_repl", code)?;
        trace!(line, "repl line accepted");
        Ok(self.marshaler.view(out))
    }

    /// Asks the engine to propagate current inputs through the graph. Output
    /// callbacks run before this returns.
    pub fn trigger_recompute(&mut self) -> BridgeResult<()> {
        let code = {
            let _guard = BoundaryGuard::enter("emfrp_update")?;
            // SAFETY: handle is live.
            unsafe { (self.marshaler.abi().update)(self.handle.as_ptr()) }
        };
        BridgeError::check("emfrp_update", code)
    }

    pub(crate) fn add_input_node(&mut self, name: &CStr, callback: InputCallback) -> BridgeResult<()> {
        let code = {
            let _guard = BoundaryGuard::enter("emfrp_add_input_node")?;
            // SAFETY: handle is live and `name` is NUL-terminated.
            unsafe { (self.marshaler.abi().add_input_node)(self.handle.as_ptr(), name.as_ptr(), callback) }
        };
        BridgeError::check("emfrp_add_input_node", code)?;
        debug!(node = ?name, "input node registered with engine");
        Ok(())
    }

    pub(crate) fn add_output_node(&mut self, name: &CStr, callback: OutputCallback) -> BridgeResult<()> {
        let code = {
            let _guard = BoundaryGuard::enter("emfrp_add_output_node")?;
            // SAFETY: as above.
            unsafe { (self.marshaler.abi().add_output_node)(self.handle.as_ptr(), name.as_ptr(), callback) }
        };
        BridgeError::check("emfrp_add_output_node", code)?;
        debug!(node = ?name, "output node registered with engine");
        Ok(())
    }

    pub(crate) fn set_node_value(&mut self, name: &CStr, value: i32) -> BridgeResult<()> {
        let boxed = self.marshaler.box_integer(value);
        let code = {
            let _guard = BoundaryGuard::enter("emfrp_set_node_value")?;
            // SAFETY: handle is live, `name` is NUL-terminated and `boxed` came
            // from this engine.
            unsafe { (self.marshaler.abi().set_node_value)(self.handle.as_ptr(), name.as_ptr(), boxed) }
        };
        BridgeError::check("emfrp_set_node_value", code)
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use emfrp_sys::EngineStatus;

    use super::EngineSession;
    use crate::bridge::error::BridgeError;

    fn session() -> EngineSession {
        EngineSession::create(Rc::new(emfrp_engine::library())).expect("engine starts")
    }

    #[test]
    fn repl_values_render_through_the_engine() {
        let mut session = session();
        let value = session.execute_repl("1 + 1").expect("valid line");
        assert_eq!(value.map(|value| value.render()).as_deref(), Some("2"));
    }

    #[test]
    fn engine_failures_carry_their_status() {
        let mut session = session();
        let err = session.execute_repl("missing + 1").expect_err("unknown node");
        assert_eq!(err.engine_status(), Some(EngineStatus::MissingIdentifier));
        let err = session.execute_repl("1 +").expect_err("bad syntax");
        assert_eq!(err.engine_status(), Some(EngineStatus::ParseError));
    }

    #[test]
    fn invalid_text_never_reaches_the_engine() {
        let mut session = session();
        assert!(matches!(
            session.execute_repl(""),
            Err(BridgeError::InvalidText { .. })
        ));
        assert!(matches!(
            session.execute_repl("1\0"),
            Err(BridgeError::InvalidText { .. })
        ));
    }

    #[test]
    fn recompute_on_an_empty_graph_is_fine() {
        let mut session = session();
        session.trigger_recompute().expect("nothing to do");
        session.trigger_recompute().expect("still nothing to do");
    }
}
