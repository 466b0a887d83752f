use std::fmt;

use emfrp_sys::{EngineStatus, LoadError};
use thiserror::Error;

/// Which registration namespace a node name lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Input,
    Output,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Input => f.write_str("input"),
            Self::Output => f.write_str("output"),
        }
    }
}

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("engine could not be created: {status}")]
    FatalInit { status: EngineStatus },
    #[error("{kind} node `{name}` is already registered")]
    RegistrationConflict { kind: NodeKind, name: String },
    #[error("`{op}` failed: {status}")]
    Engine {
        op: &'static str,
        status: EngineStatus,
    },
    #[error("{what} must be non-empty ASCII without NUL bytes and at most {max} bytes")]
    InvalidText { what: &'static str, max: usize },
    #[error("`{name}` is not a registered input node")]
    UnknownInput { name: String },
    #[error("all {capacity} {kind} trampolines on this thread are in use")]
    TrampolinesExhausted { kind: NodeKind, capacity: usize },
    #[error("`{op}` was called while another engine call is in progress")]
    Reentrant { op: &'static str },
    #[error(transparent)]
    Library(#[from] LoadError),
}

impl BridgeError {
    /// The engine status behind this error, if the engine produced one.
    pub const fn engine_status(&self) -> Option<EngineStatus> {
        match self {
            Self::FatalInit { status } | Self::Engine { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub(crate) fn check(op: &'static str, code: i32) -> BridgeResult<()> {
        let status = EngineStatus::from_raw(code);
        if status.is_ok() {
            Ok(())
        } else {
            Err(Self::Engine { op, status })
        }
    }
}

pub type BridgeResult<T> = Result<T, BridgeError>;
