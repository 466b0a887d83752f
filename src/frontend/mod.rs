//! Front-end model: input sliders, output labels, a command entry and the
//! console log, independent of how they are drawn.

pub mod line;
pub mod tui;

use std::cell::Cell;
use std::rc::Rc;

use tracing::{debug, warn};

use crate::bridge::{BridgeResult, BridgeSession, InputMode};
use crate::console::{CommandReport, ConsoleLog, ReplConsole};

/// Highest value an input slider reaches unless configured otherwise.
pub const DEFAULT_SLIDER_MAX: i32 = 100_000;

/// One input slider. The cell is what the node's pull callback reads.
#[derive(Debug, Clone)]
pub struct InputControl {
    name: String,
    value: Rc<Cell<i32>>,
}

impl InputControl {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> i32 {
        self.value.get()
    }

    pub fn label(&self) -> String {
        format!("{} : {}", self.name, self.value.get())
    }
}

/// One output label, updated from the node's push callback.
#[derive(Debug, Clone)]
pub struct OutputControl {
    name: String,
    value: Rc<Cell<i32>>,
}

impl OutputControl {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> i32 {
        self.value.get()
    }

    pub fn label(&self) -> String {
        format!("{} : {}", self.name, self.value.get())
    }
}

pub struct FrontEnd {
    session: BridgeSession,
    console: ReplConsole,
    inputs: Vec<InputControl>,
    outputs: Vec<OutputControl>,
    slider_max: i32,
}

impl FrontEnd {
    pub fn new(session: BridgeSession, slider_max: i32) -> Self {
        Self {
            session,
            console: ReplConsole::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            slider_max: slider_max.max(0),
        }
    }

    pub const fn mode(&self) -> InputMode {
        self.session.mode()
    }

    pub const fn slider_max(&self) -> i32 {
        self.slider_max
    }

    pub fn inputs(&self) -> &[InputControl] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[OutputControl] {
        &self.outputs
    }

    pub const fn log(&self) -> &ConsoleLog {
        self.console.log()
    }

    pub fn session_mut(&mut self) -> &mut BridgeSession {
        &mut self.session
    }

    /// Adds slider `in<k>` starting at 0 and logs the registration code. A
    /// refused attempt still uses up its name, so the next one tries `in<k+1>`.
    pub fn add_input_node(&mut self) -> BridgeResult<String> {
        let name = self.session.allocate_input_name();
        let value = Rc::new(Cell::new(0));
        let source = Rc::clone(&value);
        let outcome = self.session.register_input_node(&name, move || source.get());
        self.console.log_mut().record_status(&outcome);
        outcome?;
        self.inputs.push(InputControl {
            name: name.clone(),
            value,
        });
        Ok(name)
    }

    /// Adds label `out<k>` showing 0 until the node first changes.
    pub fn add_output_node(&mut self) -> BridgeResult<String> {
        let name = self.session.allocate_output_name();
        let value = Rc::new(Cell::new(0));
        let sink = Rc::clone(&value);
        let outcome = self
            .session
            .register_output_node(&name, move |pushed| sink.set(pushed.as_integer()));
        self.console.log_mut().record_status(&outcome);
        outcome?;
        self.outputs.push(OutputControl {
            name: name.clone(),
            value,
        });
        Ok(name)
    }

    /// Moves slider `index` to `value` (clamped) and propagates it. Returns
    /// the value the slider ended up at, or `None` for an unknown slider.
    pub fn set_input(&mut self, index: usize, value: i32) -> Option<i32> {
        let clamped = value.clamp(0, self.slider_max);
        let control = self.inputs.get(index)?;
        control.value.set(clamped);
        let name = control.name.clone();
        debug!(node = %name, value = clamped, "slider moved");

        let outcome = self.session.push_input_value(&name, clamped).and_then(|()| match self.session.mode() {
            InputMode::Pull => self.session.trigger_recompute(),
            InputMode::Push => Ok(()),
        });
        if let Err(err) = &outcome {
            warn!(node = %name, error = %err, "propagating slider value failed");
            self.console.log_mut().record_status(&outcome);
        }
        Some(clamped)
    }

    pub fn nudge_input(&mut self, index: usize, delta: i32) -> Option<i32> {
        let current = self.inputs.get(index)?.value();
        self.set_input(index, current.saturating_add(delta))
    }

    pub fn input_index(&self, name: &str) -> Option<usize> {
        self.inputs.iter().position(|control| control.name == name)
    }

    pub fn submit_command(&mut self, command: &str) -> CommandReport {
        self.console.execute(&mut self.session, command)
    }

    /// Runs a recompute and logs its return code.
    pub fn recompute(&mut self) -> BridgeResult<()> {
        let outcome = self.session.trigger_recompute();
        self.console.log_mut().record_status(&outcome);
        outcome
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use emfrp_sys::EngineStatus;

    use super::FrontEnd;
    use crate::bridge::{BridgeSession, InputMode, free_slots};

    fn front_end(mode: InputMode) -> FrontEnd {
        let session =
            BridgeSession::new(Rc::new(emfrp_engine::library()), mode).expect("engine starts");
        FrontEnd::new(session, 100)
    }

    #[test]
    fn controls_get_sequential_names_and_initial_labels() {
        let mut ui = front_end(InputMode::Pull);
        assert_eq!(ui.add_input_node().expect("in0"), "in0");
        assert_eq!(ui.add_input_node().expect("in1"), "in1");
        assert_eq!(ui.add_output_node().expect("out0"), "out0");
        assert_eq!(ui.inputs()[1].label(), "in1 : 0");
        assert_eq!(ui.outputs()[0].label(), "out0 : 0");
        assert_eq!(ui.log().lines(), ["Return Code:0", "Return Code:0", "Return Code:0"]);
    }

    #[test]
    fn a_refused_name_is_skipped_next_time() {
        let mut ui = front_end(InputMode::Pull);
        assert!(ui.submit_command("node in0 = 5").is_ok());
        let slots = free_slots();

        let err = ui.add_input_node().expect_err("in0 is a formula node");
        assert_eq!(err.engine_status(), Some(EngineStatus::InvalidArgument));
        assert_eq!(ui.log().lines().last().map(String::as_str), Some("Return Code:3"));
        assert_eq!(ui.add_input_node().expect("next name"), "in1");
        assert_eq!(ui.inputs().len(), 1);
        assert_eq!(ui.inputs()[0].label(), "in1 : 0");
        assert_eq!(free_slots().0, slots.0 - 1);
    }

    #[test]
    fn sliders_clamp_and_drive_outputs() {
        for mode in [InputMode::Pull, InputMode::Push] {
            let mut ui = front_end(mode);
            ui.add_input_node().expect("in0");
            ui.add_output_node().expect("out0");
            assert!(ui.submit_command("node out0 = in0 + 1").is_ok());

            assert_eq!(ui.set_input(0, 500), Some(100));
            assert_eq!(ui.inputs()[0].label(), "in0 : 100");
            assert_eq!(ui.outputs()[0].label(), "out0 : 101");

            assert_eq!(ui.nudge_input(0, -1), Some(99));
            assert_eq!(ui.outputs()[0].value(), 100);
            assert_eq!(ui.set_input(3, 1), None);
        }
    }
}
