//! Reference implementation of the emfrp engine.
//!
//! The crate is built both as an `rlib`, so a host can link it statically and
//! obtain the ABI table through [`library`], and as a `cdylib` exporting the
//! same `emfrp_*` symbols for hosts that load the engine at runtime.

pub mod ast;
pub mod diagnostics;
pub mod exports;
pub mod grammar;
pub mod lexer;
pub mod machine;
pub mod object;

use emfrp_sys::{EngineAbi, EngineLibrary};

pub use machine::{EvalError, Machine};
pub use object::Value;

/// Function table pointing at this crate's exported entry points.
pub fn abi() -> EngineAbi {
    EngineAbi {
        create: exports::emfrp_create,
        repl: exports::emfrp_repl,
        add_input_node: exports::emfrp_add_input_node,
        add_output_node: exports::emfrp_add_output_node,
        set_node_value: exports::emfrp_set_node_value,
        update: exports::emfrp_update,
        create_int_object: exports::emfrp_create_int_object,
        get_integer: exports::emfrp_get_integer,
        format_object: exports::emfrp_format_object,
        print_object: exports::emfrp_print_object,
    }
}

/// The statically linked engine, ready to hand to a bridge session.
pub fn library() -> EngineLibrary {
    EngineLibrary::from_static(abi(), "bundled reference engine")
}
