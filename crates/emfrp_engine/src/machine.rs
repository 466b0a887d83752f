//! Node store and update loop.
//!
//! Nodes are kept in declaration order; evaluation order is recomputed from
//! the formula dependencies whenever a node is added, so an update is a single
//! pass. Output bindings remember the last value delivered to them and only
//! fire when the node's value differs from it.

use ahash::{AHashMap, AHashSet};
use emfrp_sys::{EmObject, EngineStatus, InputCallback, OutputCallback};
use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::ast::{BinaryOp, Expr, Toplevel};
use crate::object::Value;

type PullFn = extern "C" fn() -> *mut EmObject;
type ActionFn = extern "C" fn(*mut EmObject);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EvalError {
    #[error("`{0}` is not defined")]
    MissingIdentifier(String),
    #[error("`{0}` has no value yet")]
    Unset(String),
    #[error("defining `{0}` would make it depend on itself")]
    Cyclic(String),
    #[error("`{0}` is already defined")]
    AlreadyDefined(String),
    #[error("`{0}` is an input node and cannot be redefined")]
    InputRedefinition(String),
    #[error("`{0}` is not an input node")]
    NotAnInput(String),
    #[error("`{0}` received an object the engine did not create")]
    ForeignObject(String),
    #[error("a callback is required for `{0}`")]
    NullCallback(String),
    #[error("operator `{op}` cannot be applied to {lhs} and {rhs}")]
    TypeMismatch {
        op: &'static str,
        lhs: &'static str,
        rhs: &'static str,
    },
    #[error("expected {expected}, found {found}")]
    Expected {
        expected: &'static str,
        found: &'static str,
    },
    #[error("division by zero")]
    DivisionByZero,
}

impl EvalError {
    pub const fn status(&self) -> EngineStatus {
        match self {
            Self::MissingIdentifier(_) | Self::Unset(_) => EngineStatus::MissingIdentifier,
            Self::Cyclic(_) => EngineStatus::CyclicReference,
            Self::TypeMismatch { .. } | Self::Expected { .. } => EngineStatus::TypeMismatch,
            Self::AlreadyDefined(_)
            | Self::InputRedefinition(_)
            | Self::NotAnInput(_)
            | Self::ForeignObject(_)
            | Self::NullCallback(_)
            | Self::DivisionByZero => EngineStatus::InvalidArgument,
        }
    }
}

#[derive(Debug, Clone)]
enum Program {
    /// Fed only through [`Machine::set_value`].
    Nothing,
    Callback(PullFn),
    Formula(Expr),
}

#[derive(Debug, Clone)]
struct Node {
    program: Program,
    value: Option<Value>,
    /// What `@last` reads during the current update.
    last: Option<Value>,
    /// Value at the end of the previous update.
    settled: Option<Value>,
}

#[derive(Debug)]
struct OutputBinding {
    name: String,
    action: ActionFn,
    delivered: Option<Value>,
}

#[derive(Debug, Default)]
pub struct Machine {
    nodes: AHashMap<String, Node>,
    declared: Vec<String>,
    order: Vec<String>,
    outputs: Vec<OutputBinding>,
}

impl Machine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn exec(&mut self, toplevel: Toplevel) -> Result<Value, EvalError> {
        match toplevel {
            Toplevel::Expression(expr) => self.eval(&expr),
            Toplevel::Node { name, expr } => self.define(name, expr),
        }
    }

    /// Adds an input node. With a callback the node is sampled right away and
    /// on every update; without one it only changes through `set_value`.
    pub fn add_input(&mut self, name: &str, callback: InputCallback) -> Result<(), EvalError> {
        if self.nodes.contains_key(name) {
            return Err(EvalError::AlreadyDefined(name.to_string()));
        }
        let (program, value) = match callback {
            Some(pull) => (Program::Callback(pull), sample(name, pull)?),
            None => (Program::Nothing, None),
        };
        self.nodes.insert(
            name.to_string(),
            Node {
                program,
                value,
                last: None,
                settled: value,
            },
        );
        self.declared.push(name.to_string());
        self.rebuild_order();
        debug!(node = name, "input node added");
        Ok(())
    }

    /// Binds an action to a node name. The node itself may be defined later.
    pub fn add_output(&mut self, name: &str, action: OutputCallback) -> Result<(), EvalError> {
        let action = action.ok_or_else(|| EvalError::NullCallback(name.to_string()))?;
        if self.outputs.iter().any(|binding| binding.name == name) {
            return Err(EvalError::AlreadyDefined(name.to_string()));
        }
        self.outputs.push(OutputBinding {
            name: name.to_string(),
            action,
            delivered: None,
        });
        debug!(node = name, "output node added");
        Ok(())
    }

    pub fn set_value(&mut self, name: &str, raw: *mut EmObject) -> Result<(), EvalError> {
        let node = self
            .nodes
            .get_mut(name)
            .ok_or_else(|| EvalError::MissingIdentifier(name.to_string()))?;
        if matches!(node.program, Program::Formula(_)) {
            return Err(EvalError::NotAnInput(name.to_string()));
        }
        let value = Value::from_raw(raw).ok_or_else(|| EvalError::ForeignObject(name.to_string()))?;
        node.value = Some(value);
        trace!(node = name, %value, "input value set");
        Ok(())
    }

    /// Re-evaluates every node once, in dependency order, then notifies the
    /// outputs whose value changed. A failing formula keeps its previous value;
    /// the first failure is reported after the whole pass.
    pub fn update(&mut self) -> Result<(), EvalError> {
        for node in self.nodes.values_mut() {
            node.last = node.settled;
        }

        let mut first_error = None;
        for idx in 0..self.order.len() {
            let name = &self.order[idx];
            let Some(node) = self.nodes.get(name) else {
                continue;
            };
            let next = match &node.program {
                Program::Nothing => continue,
                Program::Callback(pull) => sample(name, *pull),
                Program::Formula(expr) => self.eval(expr).map(Some),
            };
            match next {
                Ok(Some(value)) => {
                    if let Some(node) = self.nodes.get_mut(name.as_str()) {
                        node.value = Some(value);
                    }
                }
                Ok(None) => {}
                Err(err) => {
                    warn!(node = %name, error = %err, "node evaluation failed");
                    first_error.get_or_insert(err);
                }
            }
        }

        for node in self.nodes.values_mut() {
            node.settled = node.value;
        }
        self.notify_outputs();
        first_error.map_or(Ok(()), Err)
    }

    pub fn value_of(&self, name: &str) -> Option<Value> {
        self.nodes.get(name).and_then(|node| node.value)
    }

    /// `(name, program)` pairs in evaluation order, for debug logging.
    pub fn definitions(&self) -> Vec<(String, String)> {
        self.order
            .iter()
            .filter_map(|name| {
                let node = self.nodes.get(name)?;
                let program = match &node.program {
                    Program::Nothing => "<pushed>".to_string(),
                    Program::Callback(_) => "<callback>".to_string(),
                    Program::Formula(expr) => expr.to_string(),
                };
                Some((name.clone(), program))
            })
            .collect()
    }

    fn define(&mut self, name: String, expr: Expr) -> Result<Value, EvalError> {
        if let Some(existing) = self.nodes.get(&name) {
            if !matches!(existing.program, Program::Formula(_)) {
                return Err(EvalError::InputRedefinition(name));
            }
        }

        for dep in expr.dependencies() {
            if dep == name {
                return Err(EvalError::Cyclic(name));
            }
            if !self.nodes.contains_key(dep) {
                return Err(EvalError::MissingIdentifier(dep.to_string()));
            }
            if self.depends_on(dep, &name) {
                return Err(EvalError::Cyclic(name));
            }
        }
        for referenced in expr.last_references() {
            if referenced != name && !self.nodes.contains_key(referenced) {
                return Err(EvalError::MissingIdentifier(referenced.to_string()));
            }
        }

        let value = self.eval(&expr)?;
        let (last, settled) = self
            .nodes
            .get(&name)
            .map_or((None, Some(value)), |node| (node.last, node.settled));
        let redefined = self
            .nodes
            .insert(
                name.clone(),
                Node {
                    program: Program::Formula(expr),
                    value: Some(value),
                    last,
                    settled,
                },
            )
            .is_some();
        if !redefined {
            self.declared.push(name.clone());
        }
        self.rebuild_order();
        debug!(node = %name, %value, redefined, "node defined");
        Ok(value)
    }

    fn depends_on(&self, from: &str, target: &str) -> bool {
        let mut stack = vec![from];
        let mut seen = AHashSet::new();
        while let Some(current) = stack.pop() {
            if current == target {
                return true;
            }
            if !seen.insert(current) {
                continue;
            }
            if let Some(Node {
                program: Program::Formula(expr),
                ..
            }) = self.nodes.get(current)
            {
                stack.extend(expr.dependencies());
            }
        }
        false
    }

    fn rebuild_order(&mut self) {
        let mut order = Vec::with_capacity(self.declared.len());
        let mut visited = AHashSet::new();
        for name in &self.declared {
            self.visit(name, &mut visited, &mut order);
        }
        self.order = order;
    }

    fn visit<'a>(&'a self, name: &'a str, visited: &mut AHashSet<&'a str>, order: &mut Vec<String>) {
        if !visited.insert(name) {
            return;
        }
        if let Some(Node {
            program: Program::Formula(expr),
            ..
        }) = self.nodes.get(name)
        {
            for dep in expr.dependencies() {
                self.visit(dep, visited, order);
            }
        }
        order.push(name.to_string());
    }

    fn notify_outputs(&mut self) {
        for binding in &mut self.outputs {
            let Some(current) = self.nodes.get(&binding.name).and_then(|node| node.value) else {
                continue;
            };
            if binding.delivered == Some(current) {
                continue;
            }
            binding.delivered = Some(current);
            trace!(node = %binding.name, value = %current, "notifying output");
            (binding.action)(current.into_raw());
        }
    }

    fn eval(&self, expr: &Expr) -> Result<Value, EvalError> {
        match expr {
            Expr::Int(value) => Ok(Value::Int(*value)),
            Expr::Bool(value) => Ok(Value::Bool(*value)),
            Expr::Identifier(name) => self
                .nodes
                .get(name)
                .ok_or_else(|| EvalError::MissingIdentifier(name.clone()))?
                .value
                .ok_or_else(|| EvalError::Unset(name.clone())),
            Expr::Last(name) => Ok(self
                .nodes
                .get(name)
                .and_then(|node| node.last)
                .unwrap_or(Value::Int(0))),
            Expr::Negate(inner) => match self.eval(inner)? {
                Value::Int(value) => Ok(Value::Int(value.wrapping_neg())),
                other => Err(EvalError::Expected {
                    expected: "int",
                    found: other.type_name(),
                }),
            },
            Expr::If {
                cond,
                then,
                otherwise,
            } => match self.eval(cond)? {
                Value::Bool(true) => self.eval(then),
                Value::Bool(false) => self.eval(otherwise),
                other => Err(EvalError::Expected {
                    expected: "bool",
                    found: other.type_name(),
                }),
            },
            Expr::Binary { op, lhs, rhs } => {
                let left = self.eval(lhs)?;
                match (op, left) {
                    (BinaryOp::And, Value::Bool(false)) => return Ok(Value::Bool(false)),
                    (BinaryOp::Or, Value::Bool(true)) => return Ok(Value::Bool(true)),
                    _ => {}
                }
                let right = self.eval(rhs)?;
                apply(*op, left, right)
            }
        }
    }
}

fn sample(name: &str, pull: PullFn) -> Result<Option<Value>, EvalError> {
    let raw = pull();
    if raw.is_null() {
        return Ok(None);
    }
    Value::from_raw(raw)
        .map(Some)
        .ok_or_else(|| EvalError::ForeignObject(name.to_string()))
}

fn apply(op: BinaryOp, left: Value, right: Value) -> Result<Value, EvalError> {
    let mismatch = || EvalError::TypeMismatch {
        op: op.symbol(),
        lhs: left.type_name(),
        rhs: right.type_name(),
    };
    match (left, right) {
        (Value::Int(l), Value::Int(r)) => apply_int(op, l, r).ok_or_else(mismatch)?,
        (Value::Bool(l), Value::Bool(r)) => match op {
            BinaryOp::Eq => Ok(Value::Bool(l == r)),
            BinaryOp::NotEq => Ok(Value::Bool(l != r)),
            BinaryOp::BitAnd | BinaryOp::And => Ok(Value::Bool(l && r)),
            BinaryOp::BitOr | BinaryOp::Or => Ok(Value::Bool(l || r)),
            BinaryOp::BitXor => Ok(Value::Bool(l ^ r)),
            _ => Err(mismatch()),
        },
        _ => match op {
            BinaryOp::Eq => Ok(Value::Bool(false)),
            BinaryOp::NotEq => Ok(Value::Bool(true)),
            _ => Err(mismatch()),
        },
    }
}

/// `None` when the operator does not take integers.
fn apply_int(op: BinaryOp, l: i32, r: i32) -> Option<Result<Value, EvalError>> {
    let value = match op {
        BinaryOp::Add => Value::Int(l.wrapping_add(r)),
        BinaryOp::Sub => Value::Int(l.wrapping_sub(r)),
        BinaryOp::Mul => Value::Int(l.wrapping_mul(r)),
        BinaryOp::Div | BinaryOp::Mod if r == 0 => return Some(Err(EvalError::DivisionByZero)),
        BinaryOp::Div => Value::Int(l.wrapping_div(r)),
        BinaryOp::Mod => Value::Int(l.wrapping_rem(r)),
        BinaryOp::Shl => Value::Int(l.wrapping_shl(r as u32)),
        BinaryOp::Shr => Value::Int(l.wrapping_shr(r as u32)),
        BinaryOp::Lt => Value::Bool(l < r),
        BinaryOp::LtEq => Value::Bool(l <= r),
        BinaryOp::Gt => Value::Bool(l > r),
        BinaryOp::GtEq => Value::Bool(l >= r),
        BinaryOp::Eq => Value::Bool(l == r),
        BinaryOp::NotEq => Value::Bool(l != r),
        BinaryOp::BitAnd => Value::Int(l & r),
        BinaryOp::BitXor => Value::Int(l ^ r),
        BinaryOp::BitOr => Value::Int(l | r),
        BinaryOp::And | BinaryOp::Or => return None,
    };
    Some(Ok(value))
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};

    use emfrp_sys::{EmObject, EngineStatus};

    use super::{EvalError, Machine};
    use crate::grammar::parse;
    use crate::lexer::tokenize;
    use crate::object::Value;

    thread_local! {
        static INPUT: Cell<i32> = const { Cell::new(0) };
        static PULLS: Cell<usize> = const { Cell::new(0) };
        static SEEN: RefCell<Vec<Value>> = const { RefCell::new(Vec::new()) };
    }

    extern "C" fn pull_input() -> *mut EmObject {
        PULLS.with(|pulls| pulls.set(pulls.get() + 1));
        Value::Int(INPUT.with(Cell::get)).into_raw()
    }

    extern "C" fn record_output(raw: *mut EmObject) {
        let value = Value::from_raw(raw).expect("engine only delivers its own objects");
        SEEN.with(|seen| seen.borrow_mut().push(value));
    }

    fn run(machine: &mut Machine, line: &str) -> Result<Value, EvalError> {
        let tokens = tokenize(line).expect("tokenization should succeed");
        let toplevel = parse(&tokens).expect("parsing should succeed");
        machine.exec(toplevel)
    }

    fn seen() -> Vec<Value> {
        SEEN.with(|seen| seen.borrow().clone())
    }

    #[test]
    fn expressions_evaluate() {
        let mut machine = Machine::new();
        assert_eq!(run(&mut machine, "1 + 1"), Ok(Value::Int(2)));
        assert_eq!(run(&mut machine, "7 / 2 * 2 + 7 % 2"), Ok(Value::Int(7)));
        assert_eq!(run(&mut machine, "1 << 4 | 1"), Ok(Value::Int(17)));
        assert_eq!(run(&mut machine, "3 > 2 && 1 < 2"), Ok(Value::Bool(true)));
        assert_eq!(run(&mut machine, "-(2 - 5)"), Ok(Value::Int(3)));
        assert_eq!(run(&mut machine, "if 3 > 2 then 10 else 20"), Ok(Value::Int(10)));
        assert_eq!(run(&mut machine, "true == 1"), Ok(Value::Bool(false)));
    }

    #[test]
    fn evaluation_errors_map_to_status_codes() {
        let mut machine = Machine::new();
        let missing = run(&mut machine, "nope + 1").expect_err("should fail");
        assert_eq!(missing.status(), EngineStatus::MissingIdentifier);
        let mismatch = run(&mut machine, "1 + true").expect_err("should fail");
        assert_eq!(mismatch.status(), EngineStatus::TypeMismatch);
        let division = run(&mut machine, "1 / 0").expect_err("should fail");
        assert_eq!(division.status(), EngineStatus::InvalidArgument);
    }

    #[test]
    fn outputs_fire_once_per_change() {
        let mut machine = Machine::new();
        INPUT.with(|input| input.set(42));
        machine.add_input("in0", Some(pull_input)).expect("input");
        machine.add_output("out0", Some(record_output)).expect("output");
        assert_eq!(run(&mut machine, "node out0 = in0 + 1"), Ok(Value::Int(43)));
        assert!(seen().is_empty());

        machine.update().expect("update");
        assert_eq!(seen(), vec![Value::Int(43)]);

        machine.update().expect("update");
        machine.update().expect("update");
        assert_eq!(seen(), vec![Value::Int(43)]);

        INPUT.with(|input| input.set(1));
        machine.update().expect("update");
        assert_eq!(seen(), vec![Value::Int(43), Value::Int(2)]);
    }

    #[test]
    fn inputs_are_sampled_on_registration_and_update() {
        let mut machine = Machine::new();
        machine.add_input("in0", Some(pull_input)).expect("input");
        assert_eq!(PULLS.with(Cell::get), 1);
        machine.update().expect("update");
        assert_eq!(PULLS.with(Cell::get), 2);
    }

    #[test]
    fn duplicate_and_conflicting_declarations_are_rejected() {
        let mut machine = Machine::new();
        machine.add_input("in0", None).expect("input");
        assert_eq!(
            machine.add_input("in0", None),
            Err(EvalError::AlreadyDefined("in0".to_string()))
        );
        assert_eq!(
            run(&mut machine, "node in0 = 3"),
            Err(EvalError::InputRedefinition("in0".to_string()))
        );
        run(&mut machine, "node x = 1").expect("define");
        assert_eq!(
            machine.add_input("x", None),
            Err(EvalError::AlreadyDefined("x".to_string()))
        );
    }

    #[test]
    fn pushed_inputs_take_set_values() {
        let mut machine = Machine::new();
        machine.add_input("in0", None).expect("input");
        assert_eq!(
            run(&mut machine, "node y = in0 * 2"),
            Err(EvalError::Unset("in0".to_string()))
        );
        machine.set_value("in0", Value::Int(5).into_raw()).expect("set");
        assert_eq!(run(&mut machine, "node y = in0 * 2"), Ok(Value::Int(10)));
        machine.set_value("in0", Value::Int(6).into_raw()).expect("set");
        machine.update().expect("update");
        assert_eq!(machine.value_of("y"), Some(Value::Int(12)));
        assert_eq!(
            machine.set_value("y", Value::Int(1).into_raw()),
            Err(EvalError::NotAnInput("y".to_string()))
        );
    }

    #[test]
    fn cycles_are_rejected() {
        let mut machine = Machine::new();
        run(&mut machine, "node a = 1").expect("a");
        run(&mut machine, "node b = a + 1").expect("b");
        assert_eq!(run(&mut machine, "node a = b"), Err(EvalError::Cyclic("a".to_string())));
        assert_eq!(run(&mut machine, "node c = c + 1"), Err(EvalError::Cyclic("c".to_string())));
        assert_eq!(machine.value_of("a"), Some(Value::Int(1)));
    }

    #[test]
    fn last_values_accumulate() {
        let mut machine = Machine::new();
        assert_eq!(run(&mut machine, "node count = count@last + 1"), Ok(Value::Int(1)));
        machine.update().expect("update");
        machine.update().expect("update");
        assert_eq!(machine.value_of("count"), Some(Value::Int(3)));
    }

    #[test]
    fn last_sees_the_previous_update_for_set_inputs() {
        let mut machine = Machine::new();
        machine.add_input("in0", None).expect("input");
        machine.set_value("in0", Value::Int(5).into_raw()).expect("set");
        run(&mut machine, "node delta = in0 - in0@last").expect("delta");
        machine.update().expect("update");
        assert_eq!(machine.value_of("delta"), Some(Value::Int(5)));
        machine.set_value("in0", Value::Int(7).into_raw()).expect("set");
        machine.update().expect("update");
        assert_eq!(machine.value_of("delta"), Some(Value::Int(2)));
    }

    #[test]
    fn redefinition_reorders_dependents() {
        let mut machine = Machine::new();
        run(&mut machine, "node a = 1").expect("a");
        run(&mut machine, "node b = 2").expect("b");
        run(&mut machine, "node a = b + 1").expect("redefine a");
        machine.update().expect("update");
        let names: Vec<String> = machine.definitions().into_iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["b".to_string(), "a".to_string()]);
        assert_eq!(machine.value_of("a"), Some(Value::Int(3)));
    }
}
