//! Boxed value marshaling.
//!
//! [`Marshaler`] creates engine objects from scalars; [`EngineValue`] is the
//! read-only view of an object the engine handed back. An `EngineValue`
//! borrows whatever produced it, so it cannot outlive the boundary call (or
//! callback) it came from.

use std::ffi::CString;
use std::fmt;
use std::os::raw::c_char;
use std::ptr::NonNull;
use std::rc::Rc;

use emfrp_sys::{EmObject, EngineAbi, EngineLibrary};

use super::error::{BridgeError, BridgeResult};

/// REPL lines and node names are capped at this many bytes.
pub const MAX_TEXT_LEN: usize = 1024;

const RENDER_BUFFER: usize = 64;

#[derive(Clone, Debug)]
pub struct Marshaler {
    library: Rc<EngineLibrary>,
}

impl Marshaler {
    pub const fn new(library: Rc<EngineLibrary>) -> Self {
        Self { library }
    }

    pub fn abi(&self) -> &EngineAbi {
        self.library.abi()
    }

    pub fn library(&self) -> &EngineLibrary {
        &self.library
    }

    /// Allocates an engine object holding `num`. Ownership passes to whoever
    /// receives the pointer next; the bridge never frees it.
    pub fn box_integer(&self, num: i32) -> *mut EmObject {
        // SAFETY: `emfrp_create_int_object` takes no pointers.
        unsafe { (self.abi().create_int_object)(num) }
    }

    /// Views a raw object pointer for as long as `self` is borrowed.
    pub fn view(&self, raw: *mut EmObject) -> Option<EngineValue<'_>> {
        EngineValue::new(raw, self.abi())
    }
}

/// An engine-owned value. Only exposes integer extraction and rendering.
#[derive(Clone, Copy)]
pub struct EngineValue<'a> {
    raw: NonNull<EmObject>,
    abi: &'a EngineAbi,
}

impl<'a> EngineValue<'a> {
    pub(crate) fn new(raw: *mut EmObject, abi: &'a EngineAbi) -> Option<Self> {
        NonNull::new(raw).map(|raw| Self { raw, abi })
    }

    /// Reads the integer inside. Calling this on a non-integer object is a
    /// caller bug; what comes back is whatever the engine decides.
    pub fn as_integer(&self) -> i32 {
        // SAFETY: `raw` came from the engine and is only read.
        unsafe { (self.abi.get_integer)(self.raw.as_ptr()) }
    }

    /// Human-readable text from the engine's own printer. Never fails.
    pub fn render(&self) -> String {
        render_raw(self.abi, self.raw.as_ptr())
    }

    pub const fn as_ptr(&self) -> *mut EmObject {
        self.raw.as_ptr()
    }
}

impl fmt::Debug for EngineValue<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EngineValue").field(&self.render()).finish()
    }
}

impl fmt::Display for EngineValue<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

fn render_raw(abi: &EngineAbi, raw: *mut EmObject) -> String {
    let mut buffer = vec![0u8; RENDER_BUFFER];
    // SAFETY: the buffer is `buffer.len()` writable bytes.
    let needed = unsafe { (abi.format_object)(raw, buffer.as_mut_ptr().cast::<c_char>(), buffer.len()) };
    if needed >= buffer.len() {
        buffer = vec![0u8; needed + 1];
        // SAFETY: as above, with the size the engine asked for.
        unsafe { (abi.format_object)(raw, buffer.as_mut_ptr().cast::<c_char>(), buffer.len()) };
    }
    let end = buffer.iter().position(|&byte| byte == 0).unwrap_or(buffer.len());
    String::from_utf8_lossy(&buffer[..end]).into_owned()
}

/// Converts text bound for the engine into a C string: non-empty, ASCII, no
/// interior NUL, at most [`MAX_TEXT_LEN`] bytes.
pub fn engine_text(what: &'static str, text: &str) -> BridgeResult<CString> {
    let invalid = || BridgeError::InvalidText {
        what,
        max: MAX_TEXT_LEN,
    };
    if text.is_empty() || text.len() > MAX_TEXT_LEN || !text.is_ascii() {
        return Err(invalid());
    }
    CString::new(text).map_err(|_| invalid())
}
