use std::rc::Rc;

use anyhow::Result;
use emfrp_bridge::frontend::{FrontEnd, line};
use emfrp_bridge::{BridgeSession, InputMode};

fn front_end(mode: InputMode) -> Result<FrontEnd> {
    let session = BridgeSession::new(Rc::new(emfrp_engine::library()), mode)?;
    Ok(FrontEnd::new(session, 100_000))
}

#[test]
fn slider_session_matches_the_console_log() -> Result<()> {
    let mut ui = front_end(InputMode::Pull)?;
    ui.add_input_node()?;
    ui.add_input_node()?;
    ui.add_output_node()?;
    let report = ui.submit_command("node out0 = if in0 > in1 then in0 else in1");
    assert!(report.is_ok());

    ui.set_input(0, 250);
    assert_eq!(ui.outputs()[0].label(), "out0 : 250");
    ui.set_input(1, 400);
    assert_eq!(ui.outputs()[0].label(), "out0 : 400");
    ui.set_input(1, -5);
    assert_eq!(ui.inputs()[1].label(), "in1 : 0");
    assert_eq!(ui.outputs()[0].label(), "out0 : 250");

    let lines = ui.log().lines();
    assert_eq!(lines[..3], ["Return Code:0", "Return Code:0", "Return Code:0"]);
    assert_eq!(lines[3], "node out0 = if in0 > in1 then in0 else in1");
    assert_eq!(lines[4], "Return Code:0");
    assert_eq!(lines[5], "Return Value:0");
    Ok(())
}

#[test]
fn type_errors_are_logged_with_their_code() -> Result<()> {
    let mut ui = front_end(InputMode::Push)?;
    let report = ui.submit_command("1 + true");
    assert!(!report.is_ok());
    assert!(ui.log().lines().iter().any(|line| line == "Return Code:16"));
    Ok(())
}

#[test]
fn line_repl_runs_a_script() -> Result<()> {
    colored::control::set_override(false);
    let mut ui = front_end(InputMode::Push)?;
    let script = ":in\n:out\nnode out0 = in0 % 7\n:set in0 100\n:update\n:nodes\n1 << 4\n";
    let mut out = Vec::new();
    line::run(&mut ui, script.as_bytes(), &mut out)?;
    let out = String::from_utf8(out)?;

    assert!(out.contains("push inputs"));
    assert!(out.contains("out0 : 2"));
    assert!(out.contains("Return Value:16"));
    Ok(())
}
