use std::fmt;
use std::rc::Rc;

use clap::ValueEnum;
use emfrp_sys::EngineLibrary;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::error::{BridgeError, BridgeResult, NodeKind};
use super::session::EngineSession;
use super::trampoline::{PullTrampoline, PushTrampoline, RegistrationTable};
use super::value::{EngineValue, engine_text};

/// How values set from the front-end reach input nodes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum InputMode {
    /// The engine reads inputs through their pull trampolines on every
    /// recompute; pushing a value only stores it bridge-side.
    #[default]
    Pull,
    /// Inputs are plain engine nodes; pushing a value sets it and recomputes.
    Push,
}

impl fmt::Display for InputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pull => f.write_str("pull"),
            Self::Push => f.write_str("push"),
        }
    }
}

/// An engine session together with every node registered on it.
///
/// Dropping the session drops the trampolines; the engine handle itself is
/// never released, so any entry point it still holds falls back to a no-op.
pub struct BridgeSession {
    engine: EngineSession,
    table: RegistrationTable,
    mode: InputMode,
    input_order: Vec<String>,
    output_order: Vec<String>,
    next_input: usize,
    next_output: usize,
}

impl BridgeSession {
    pub fn new(library: Rc<EngineLibrary>, mode: InputMode) -> BridgeResult<Self> {
        let engine = EngineSession::create(library)?;
        debug!(%mode, "bridge session ready");
        Ok(Self {
            engine,
            table: RegistrationTable::new(),
            mode,
            input_order: Vec::new(),
            output_order: Vec::new(),
            next_input: 0,
            next_output: 0,
        })
    }

    pub const fn mode(&self) -> InputMode {
        self.mode
    }

    /// Registers `name` as an input node fed by `pull`.
    pub fn register_input_node<F>(&mut self, name: &str, pull: F) -> BridgeResult<()>
    where
        F: FnMut() -> i32 + 'static,
    {
        let c_name = engine_text("node name", name)?;
        self.ensure_unregistered(NodeKind::Input, name)?;
        let trampoline = self
            .table
            .prepare_input(name, self.engine.marshaler(), Box::new(pull))?;

        let callback = match self.mode {
            InputMode::Pull => Some(trampoline.entry()),
            InputMode::Push => None,
        };
        if let Err(err) = self.engine.add_input_node(&c_name, callback) {
            self.table.discard_input(trampoline);
            return Err(err);
        }
        if self.mode == InputMode::Push {
            match trampoline.sample() {
                Some(seed) => {
                    if let Err(err) = self.engine.set_node_value(&c_name, seed) {
                        warn!(node = name, error = %err, "seeding input node failed");
                    }
                }
                None => warn!(node = name, "pull callback panicked while seeding"),
            }
        }

        self.table.retain_input(trampoline);
        self.input_order.push(name.to_string());
        info!(node = name, mode = %self.mode, "input node registered");
        Ok(())
    }

    /// Registers `name` as an output node; `push` runs each time the node's
    /// value changes during a recompute.
    pub fn register_output_node<F>(&mut self, name: &str, push: F) -> BridgeResult<()>
    where
        F: FnMut(EngineValue<'_>) + 'static,
    {
        let c_name = engine_text("node name", name)?;
        self.ensure_unregistered(NodeKind::Output, name)?;
        let trampoline = self
            .table
            .prepare_output(name, self.engine.marshaler(), Box::new(push))?;
        if let Err(err) = self.engine.add_output_node(&c_name, Some(trampoline.entry())) {
            self.table.discard_output(trampoline);
            return Err(err);
        }
        self.table.retain_output(trampoline);
        self.output_order.push(name.to_string());
        info!(node = name, "output node registered");
        Ok(())
    }

    /// Feeds a new value into a registered input.
    ///
    /// In [`InputMode::Pull`] this only stores the value; call
    /// [`Self::trigger_recompute`] to propagate it. In [`InputMode::Push`]
    /// the value is set on the engine and propagated immediately.
    pub fn push_input_value(&mut self, name: &str, value: i32) -> BridgeResult<()> {
        let trampoline = self
            .table
            .input(name)
            .ok_or_else(|| BridgeError::UnknownInput {
                name: name.to_string(),
            })?;
        match self.mode {
            InputMode::Pull => {
                trampoline.set_pushed(value);
                Ok(())
            }
            InputMode::Push => {
                let c_name = engine_text("node name", name)?;
                self.engine.set_node_value(&c_name, value)?;
                self.engine.trigger_recompute()
            }
        }
    }

    pub fn execute_repl(&mut self, line: &str) -> BridgeResult<Option<EngineValue<'_>>> {
        self.engine.execute_repl(line)
    }

    pub fn trigger_recompute(&mut self) -> BridgeResult<()> {
        self.engine.trigger_recompute()
    }

    /// Input names in registration order.
    pub fn input_names(&self) -> &[String] {
        &self.input_order
    }

    /// Output names in registration order.
    pub fn output_names(&self) -> &[String] {
        &self.output_order
    }

    pub fn input(&self, name: &str) -> Option<&PullTrampoline> {
        self.table.input(name).map(Rc::as_ref)
    }

    pub fn output(&self, name: &str) -> Option<&PushTrampoline> {
        self.table.output(name).map(Rc::as_ref)
    }

    /// Hands out the next `in<k>` name. The counter only moves forward, so a
    /// name the engine refused is not offered again.
    pub fn allocate_input_name(&mut self) -> String {
        allocate_name("in", &mut self.next_input, |name| {
            self.table.contains(NodeKind::Input, name)
        })
    }

    /// Hands out the next `out<k>` name; see [`Self::allocate_input_name`].
    pub fn allocate_output_name(&mut self) -> String {
        allocate_name("out", &mut self.next_output, |name| {
            self.table.contains(NodeKind::Output, name)
        })
    }

    fn ensure_unregistered(&self, kind: NodeKind, name: &str) -> BridgeResult<()> {
        if self.table.contains(kind, name) {
            warn!(%kind, node = name, "registration conflict");
            return Err(BridgeError::RegistrationConflict {
                kind,
                name: name.to_string(),
            });
        }
        Ok(())
    }
}

fn allocate_name(prefix: &str, counter: &mut usize, taken: impl Fn(&str) -> bool) -> String {
    loop {
        let name = format!("{prefix}{counter}");
        *counter += 1;
        if !taken(&name) {
            return name;
        }
    }
}
