//! The `emfrp_*` C entry points.
//!
//! Every fallible entry point runs behind [`guarded`], so a panic inside the
//! engine surfaces as `Unknown` instead of unwinding into the caller.

use std::ffi::CStr;
use std::os::raw::c_char;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::ptr;

use emfrp_sys::{EmObject, EmfrpHandle, EngineStatus, InputCallback, OutputCallback};
use tracing::{debug, error, warn};

use crate::diagnostics::{render_lexer_errors, render_parser_errors};
use crate::grammar::parse;
use crate::lexer::tokenize;
use crate::machine::Machine;
use crate::object::Value;

/// Engine instance behind an `emfrp_t *`.
#[derive(Debug, Default)]
pub struct Emfrp {
    machine: Machine,
}

impl Emfrp {
    pub fn repl(&mut self, line: &str) -> Result<Value, EngineStatus> {
        let tokens = tokenize(line).map_err(|errors| {
            warn!(line, "lexing failed\n{}", render_lexer_errors(line, &errors));
            EngineStatus::ParseError
        })?;
        let toplevel = parse(&tokens).map_err(|errors| {
            warn!(line, "parsing failed\n{}", render_parser_errors(line, &errors));
            EngineStatus::ParseError
        })?;
        let value = self.machine.exec(toplevel).map_err(|err| {
            debug!(line, error = %err, "repl command rejected");
            err.status()
        })?;
        for (name, program) in self.machine.definitions() {
            debug!("Node<{name}> = {program}");
        }
        Ok(value)
    }

    pub const fn machine(&self) -> &Machine {
        &self.machine
    }
}

fn guarded(op: &'static str, body: impl FnOnce() -> Result<(), EngineStatus>) -> i32 {
    match catch_unwind(AssertUnwindSafe(body)) {
        Ok(Ok(())) => EngineStatus::Ok.code(),
        Ok(Err(status)) => status.code(),
        Err(_) => {
            error!(op, "engine panicked");
            EngineStatus::Unknown.code()
        }
    }
}

unsafe fn engine_mut<'a>(handle: *mut EmfrpHandle) -> Result<&'a mut Emfrp, EngineStatus> {
    // SAFETY: non-null handles are only ever produced by `emfrp_create`.
    unsafe { handle.cast::<Emfrp>().as_mut() }.ok_or(EngineStatus::InvalidArgument)
}

unsafe fn c_text<'a>(text: *const c_char) -> Result<&'a str, EngineStatus> {
    if text.is_null() {
        return Err(EngineStatus::InvalidArgument);
    }
    // SAFETY: the caller passes a NUL-terminated string.
    unsafe { CStr::from_ptr(text) }
        .to_str()
        .map_err(|_| EngineStatus::InvalidArgument)
}

unsafe fn node_name<'a>(name: *const c_char) -> Result<&'a str, EngineStatus> {
    let name = unsafe { c_text(name) }?;
    if name.is_empty() {
        return Err(EngineStatus::InvalidArgument);
    }
    Ok(name)
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn emfrp_create(out: *mut *mut EmfrpHandle) -> i32 {
    guarded("emfrp_create", || {
        if out.is_null() {
            return Err(EngineStatus::InvalidArgument);
        }
        let engine = Box::into_raw(Box::new(Emfrp::default()));
        // SAFETY: `out` was checked for null above.
        unsafe { *out = engine.cast() };
        debug!("engine created");
        Ok(())
    })
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn emfrp_repl(
    engine: *mut EmfrpHandle,
    line: *const c_char,
    out: *mut *mut EmObject,
) -> i32 {
    guarded("emfrp_repl", || {
        if !out.is_null() {
            // SAFETY: non-null out pointers are writable per the ABI.
            unsafe { *out = ptr::null_mut() };
        }
        let engine = unsafe { engine_mut(engine) }?;
        let line = unsafe { c_text(line) }?;
        let value = engine.repl(line)?;
        if !out.is_null() {
            // SAFETY: as above.
            unsafe { *out = value.into_raw() };
        }
        Ok(())
    })
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn emfrp_add_input_node(
    engine: *mut EmfrpHandle,
    name: *const c_char,
    callback: InputCallback,
) -> i32 {
    guarded("emfrp_add_input_node", || {
        let engine = unsafe { engine_mut(engine) }?;
        let name = unsafe { node_name(name) }?;
        engine
            .machine
            .add_input(name, callback)
            .map_err(|err| {
                debug!(node = name, error = %err, "input node rejected");
                err.status()
            })
    })
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn emfrp_add_output_node(
    engine: *mut EmfrpHandle,
    name: *const c_char,
    callback: OutputCallback,
) -> i32 {
    guarded("emfrp_add_output_node", || {
        let engine = unsafe { engine_mut(engine) }?;
        let name = unsafe { node_name(name) }?;
        engine
            .machine
            .add_output(name, callback)
            .map_err(|err| {
                debug!(node = name, error = %err, "output node rejected");
                err.status()
            })
    })
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn emfrp_set_node_value(
    engine: *mut EmfrpHandle,
    name: *const c_char,
    value: *mut EmObject,
) -> i32 {
    guarded("emfrp_set_node_value", || {
        let engine = unsafe { engine_mut(engine) }?;
        let name = unsafe { node_name(name) }?;
        engine
            .machine
            .set_value(name, value)
            .map_err(|err| err.status())
    })
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn emfrp_update(engine: *mut EmfrpHandle) -> i32 {
    guarded("emfrp_update", || {
        let engine = unsafe { engine_mut(engine) }?;
        engine.machine.update().map_err(|err| err.status())
    })
}

#[unsafe(no_mangle)]
pub extern "C" fn emfrp_create_int_object(num: i32) -> *mut EmObject {
    Value::Int(num).into_raw()
}

#[unsafe(no_mangle)]
pub extern "C" fn emfrp_get_integer(value: *mut EmObject) -> i32 {
    match Value::from_raw(value) {
        Some(Value::Int(num)) => num,
        other => {
            error!(?other, "emfrp_get_integer called on a non-integer object");
            -1
        }
    }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn emfrp_format_object(
    value: *mut EmObject,
    buffer: *mut c_char,
    capacity: usize,
) -> usize {
    let text = describe(value);
    if !buffer.is_null() && capacity > 0 {
        let len = text.len().min(capacity - 1);
        // SAFETY: the caller guarantees `capacity` writable bytes at `buffer`.
        unsafe {
            ptr::copy_nonoverlapping(text.as_ptr(), buffer.cast::<u8>(), len);
            *buffer.add(len) = 0;
        }
    }
    text.len()
}

#[unsafe(no_mangle)]
pub extern "C" fn emfrp_print_object(value: *mut EmObject) {
    println!("{}", describe(value));
}

fn describe(value: *mut EmObject) -> String {
    match Value::from_raw(value) {
        Some(value) => value.to_string(),
        None if value.is_null() => "nil".to_string(),
        None => "<object>".to_string(),
    }
}
