use std::cell::{Cell, RefCell};
use std::path::Path;
use std::rc::Rc;

use anyhow::Result;
use emfrp_bridge::bridge::{BridgeError, BridgeSession, EngineValue, InputMode, NodeKind, free_slots};
use emfrp_sys::{EngineLibrary, EngineStatus};

fn session(mode: InputMode) -> Result<BridgeSession> {
    Ok(BridgeSession::new(Rc::new(emfrp_engine::library()), mode)?)
}

fn recorder() -> (Rc<RefCell<Vec<i32>>>, impl FnMut(EngineValue<'_>) + 'static) {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    (seen, move |value| sink.borrow_mut().push(value.as_integer()))
}

#[test]
fn output_follows_input_after_recompute() -> Result<()> {
    let mut session = session(InputMode::Pull)?;
    let (seen, record) = recorder();
    session.register_input_node("in0", || 42)?;
    session.register_output_node("out0", record)?;
    session.execute_repl("node out0 = in0 + 1")?;
    assert!(seen.borrow().is_empty());

    session.trigger_recompute()?;
    assert_eq!(*seen.borrow(), [43]);
    Ok(())
}

#[test]
fn repl_expression_renders_its_value() -> Result<()> {
    let mut session = session(InputMode::Pull)?;
    let rendered = session.execute_repl("1 + 1")?.map(|value| value.render());
    assert_eq!(rendered.as_deref(), Some("2"));
    Ok(())
}

#[test]
fn duplicate_input_conflicts_and_first_keeps_working() -> Result<()> {
    let mut session = session(InputMode::Pull)?;
    let first = Rc::new(Cell::new(3));
    let reader = Rc::clone(&first);
    session.register_input_node("in0", move || reader.get())?;
    let err = session
        .register_input_node("in0", || 99)
        .expect_err("name already taken");
    assert!(matches!(
        err,
        BridgeError::RegistrationConflict { kind: NodeKind::Input, ref name } if name == "in0"
    ));

    let (seen, record) = recorder();
    session.register_output_node("out0", record)?;
    session.execute_repl("node out0 = in0")?;
    first.set(8);
    session.trigger_recompute()?;
    assert_eq!(*seen.borrow(), [8]);
    assert_eq!(session.input_names(), ["in0"]);
    Ok(())
}

#[test]
fn pull_callback_runs_before_recompute_returns() -> Result<()> {
    let mut session = session(InputMode::Pull)?;
    let pulls = Rc::new(Cell::new(0u32));
    let counter = Rc::clone(&pulls);
    session.register_input_node("in0", move || {
        counter.set(counter.get() + 1);
        1
    })?;
    let before = pulls.get();
    session.trigger_recompute()?;
    assert!(pulls.get() > before);
    assert_eq!(session.input("in0").map(|input| input.calls()), Some(u64::from(pulls.get())));
    Ok(())
}

#[test]
fn outputs_fire_once_per_change() -> Result<()> {
    let mut session = session(InputMode::Pull)?;
    let source = Rc::new(Cell::new(1));
    let reader = Rc::clone(&source);
    let (seen, record) = recorder();
    session.register_input_node("in0", move || reader.get())?;
    session.register_output_node("out0", record)?;
    session.execute_repl("node out0 = in0 * 10")?;

    session.trigger_recompute()?;
    session.trigger_recompute()?;
    session.trigger_recompute()?;
    assert_eq!(*seen.borrow(), [10]);

    source.set(2);
    session.trigger_recompute()?;
    session.trigger_recompute()?;
    assert_eq!(*seen.borrow(), [10, 20]);
    assert_eq!(session.output("out0").map(|output| output.calls()), Some(2));
    Ok(())
}

#[test]
fn push_mode_folds_the_update_into_the_push() -> Result<()> {
    let mut session = session(InputMode::Push)?;
    let (seen, record) = recorder();
    session.register_input_node("in0", || 0)?;
    session.register_output_node("out0", record)?;
    session.execute_repl("node out0 = in0 + in0@last")?;

    session.push_input_value("in0", 5)?;
    session.push_input_value("in0", 7)?;
    assert_eq!(*seen.borrow(), [5, 12]);
    Ok(())
}

#[test]
fn engine_rejections_leave_the_session_usable() -> Result<()> {
    let mut session = session(InputMode::Pull)?;
    session.execute_repl("node a = 1")?;
    let err = session
        .register_input_node("a", || 0)
        .expect_err("formula node cannot become an input");
    assert!(err.engine_status().is_some());
    assert!(session.input("a").is_none());

    let err = session.execute_repl("node a = a + 1").expect_err("self reference");
    assert_eq!(err.engine_status(), Some(EngineStatus::CyclicReference));
    let value = session.execute_repl("a * 2")?.map(|value| value.as_integer());
    assert_eq!(value, Some(2));
    Ok(())
}

#[test]
fn nested_boundary_calls_are_refused() -> Result<()> {
    let other = Rc::new(RefCell::new(session(InputMode::Pull)?));
    let outcome = Rc::new(RefCell::new(None));

    let mut session = session(InputMode::Pull)?;
    let nested = Rc::clone(&other);
    let result = Rc::clone(&outcome);
    session.register_input_node("in0", || 1)?;
    session.register_output_node("out0", move |_| {
        let refused = matches!(
            nested.borrow_mut().execute_repl("1"),
            Err(BridgeError::Reentrant { .. })
        );
        *result.borrow_mut() = Some(refused);
    })?;
    session.execute_repl("node out0 = in0")?;
    session.trigger_recompute()?;

    assert_eq!(*outcome.borrow(), Some(true));
    assert!(other.borrow_mut().execute_repl("1").is_ok());
    Ok(())
}

#[test]
fn trampolines_outlive_nothing_but_their_session() -> Result<()> {
    let (pull_before, push_before) = free_slots();
    {
        let mut session = session(InputMode::Pull)?;
        session.register_input_node("in0", || 1)?;
        session.register_output_node("out0", |_| {})?;
    }
    assert_eq!(free_slots(), (pull_before - 1, push_before - 1));
    Ok(())
}

#[test]
fn missing_library_is_a_library_error() {
    let err = EngineLibrary::load(Path::new("/nonexistent/libemfrp-repl.so"))
        .map_err(BridgeError::from)
        .expect_err("no such file");
    assert!(matches!(err, BridgeError::Library(_)));
    assert!(err.to_string().contains("libemfrp-repl.so"));
}
