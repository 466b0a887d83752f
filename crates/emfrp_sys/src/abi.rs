use std::os::raw::c_char;

/// Opaque engine value (`em_object_t`). Only ever handled by pointer.
#[repr(C)]
pub struct EmObject {
    _private: [u8; 0],
}

/// Opaque engine instance (`emfrp_t`).
#[repr(C)]
pub struct EmfrpHandle {
    _private: [u8; 0],
}

/// `em_object_t *(*)(void)`; `None` declares an input fed only by
/// `emfrp_set_node_value`.
pub type InputCallback = Option<extern "C" fn() -> *mut EmObject>;

/// `void (*)(em_object_t *)`.
pub type OutputCallback = Option<extern "C" fn(*mut EmObject)>;

pub type CreateFn = unsafe extern "C" fn(out: *mut *mut EmfrpHandle) -> i32;
pub type ReplFn =
    unsafe extern "C" fn(engine: *mut EmfrpHandle, line: *const c_char, out: *mut *mut EmObject) -> i32;
pub type AddInputNodeFn =
    unsafe extern "C" fn(engine: *mut EmfrpHandle, name: *const c_char, callback: InputCallback) -> i32;
pub type AddOutputNodeFn =
    unsafe extern "C" fn(engine: *mut EmfrpHandle, name: *const c_char, callback: OutputCallback) -> i32;
pub type SetNodeValueFn =
    unsafe extern "C" fn(engine: *mut EmfrpHandle, name: *const c_char, value: *mut EmObject) -> i32;
pub type UpdateFn = unsafe extern "C" fn(engine: *mut EmfrpHandle) -> i32;
pub type CreateIntObjectFn = unsafe extern "C" fn(num: i32) -> *mut EmObject;
pub type GetIntegerFn = unsafe extern "C" fn(value: *mut EmObject) -> i32;
pub type FormatObjectFn =
    unsafe extern "C" fn(value: *mut EmObject, buffer: *mut c_char, capacity: usize) -> usize;
pub type PrintObjectFn = unsafe extern "C" fn(value: *mut EmObject);

/// Exported symbol names, in [`EngineAbi`] field order.
pub const SYMBOL_NAMES: [&str; 10] = [
    "emfrp_create",
    "emfrp_repl",
    "emfrp_add_input_node",
    "emfrp_add_output_node",
    "emfrp_set_node_value",
    "emfrp_update",
    "emfrp_create_int_object",
    "emfrp_get_integer",
    "emfrp_format_object",
    "emfrp_print_object",
];

/// Function table for one engine implementation.
///
/// The pointers are only valid while whatever provides them (a loaded
/// library, or the current executable) stays mapped; [`crate::EngineLibrary`]
/// ties the two together.
#[derive(Clone, Copy, Debug)]
pub struct EngineAbi {
    pub create: CreateFn,
    pub repl: ReplFn,
    pub add_input_node: AddInputNodeFn,
    pub add_output_node: AddOutputNodeFn,
    pub set_node_value: SetNodeValueFn,
    pub update: UpdateFn,
    pub create_int_object: CreateIntObjectFn,
    pub get_integer: GetIntegerFn,
    pub format_object: FormatObjectFn,
    pub print_object: PrintObjectFn,
}
