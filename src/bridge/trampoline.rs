//! Callback trampolines.
//!
//! The engine calls back through bare C function pointers with no user data,
//! so each registration is assigned one of a fixed set of monomorphized
//! `extern "C"` entry points. An entry point finds its trampoline through a
//! thread-local slot directory that only holds [`Weak`] references; the strong
//! reference lives in the session's [`RegistrationTable`]. A slot whose entry
//! point reached the engine is never reused, since the engine may keep calling
//! it for as long as it lives.
//!
//! The same thread-local state carries the boundary flag that serializes
//! engine calls: a second call issued while one is running (for example from
//! inside a callback) is refused instead of recursing into the engine.

use std::cell::{Cell, RefCell};
use std::marker::PhantomData;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::ptr;
use std::rc::{Rc, Weak};
use std::thread::LocalKey;

use ahash::AHashMap;
use emfrp_sys::EmObject;
use tracing::{error, trace, warn};

use super::error::{BridgeError, BridgeResult, NodeKind};
use super::value::{EngineValue, Marshaler};

/// Entry points available per thread, for each of inputs and outputs.
pub const SLOT_CAPACITY: usize = 64;

pub type PullEntry = extern "C" fn() -> *mut EmObject;
pub type PushEntry = extern "C" fn(*mut EmObject);

thread_local! {
    static PULL_SLOTS: RefCell<Vec<Weak<PullTrampoline>>> = const { RefCell::new(Vec::new()) };
    static PUSH_SLOTS: RefCell<Vec<Weak<PushTrampoline>>> = const { RefCell::new(Vec::new()) };
    static IN_BOUNDARY: Cell<bool> = const { Cell::new(false) };
}

/// Wraps a pull callback: invoked by the engine, returns a freshly boxed
/// integer each time.
pub struct PullTrampoline {
    name: String,
    marshaler: Marshaler,
    callback: RefCell<Box<dyn FnMut() -> i32>>,
    pushed: Cell<Option<i32>>,
    calls: Cell<u64>,
    slot: usize,
    entry: PullEntry,
}

impl PullTrampoline {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn calls(&self) -> u64 {
        self.calls.get()
    }

    pub(crate) const fn entry(&self) -> PullEntry {
        self.entry
    }

    /// Makes the next pull return `value` instead of asking the callback.
    /// Later pulls go back to the callback.
    pub(crate) fn set_pushed(&self, value: i32) {
        self.pushed.set(Some(value));
    }

    /// Runs the wrapped callback once, outside of any engine call.
    pub(crate) fn sample(&self) -> Option<i32> {
        catch_unwind(AssertUnwindSafe(|| (self.callback.borrow_mut())())).ok()
    }

    fn invoke(&self) -> *mut EmObject {
        self.calls.set(self.calls.get() + 1);
        if let Some(value) = self.pushed.take() {
            trace!(node = %self.name, value, "pull of pushed value");
            return self.marshaler.box_integer(value);
        }
        match self.sample() {
            Some(value) => {
                trace!(node = %self.name, value, "pull");
                self.marshaler.box_integer(value)
            }
            None => {
                error!(node = %self.name, "pull callback panicked; reporting no value");
                ptr::null_mut()
            }
        }
    }
}

/// Wraps a push callback: invoked by the engine with each new output value.
pub struct PushTrampoline {
    name: String,
    marshaler: Marshaler,
    callback: RefCell<Box<dyn FnMut(EngineValue<'_>)>>,
    calls: Cell<u64>,
    slot: usize,
    entry: PushEntry,
}

impl PushTrampoline {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn calls(&self) -> u64 {
        self.calls.get()
    }

    pub(crate) const fn entry(&self) -> PushEntry {
        self.entry
    }

    fn invoke(&self, raw: *mut EmObject) {
        self.calls.set(self.calls.get() + 1);
        let Some(value) = self.marshaler.view(raw) else {
            warn!(node = %self.name, "engine pushed a null value");
            return;
        };
        trace!(node = %self.name, ?value, "push");
        let outcome = catch_unwind(AssertUnwindSafe(|| (self.callback.borrow_mut())(value)));
        if outcome.is_err() {
            error!(node = %self.name, "push callback panicked");
        }
    }
}

extern "C" fn pull_entry<const SLOT: usize>() -> *mut EmObject {
    let trampoline = PULL_SLOTS.with(|slots| slots.borrow().get(SLOT).and_then(Weak::upgrade));
    match trampoline {
        Some(trampoline) => trampoline.invoke(),
        None => {
            warn!(slot = SLOT, "pull entry invoked after its session was dropped");
            ptr::null_mut()
        }
    }
}

extern "C" fn push_entry<const SLOT: usize>(raw: *mut EmObject) {
    let trampoline = PUSH_SLOTS.with(|slots| slots.borrow().get(SLOT).and_then(Weak::upgrade));
    match trampoline {
        Some(trampoline) => trampoline.invoke(raw),
        None => warn!(slot = SLOT, "push entry invoked after its session was dropped"),
    }
}

macro_rules! entry_table {
    ($entry:ident as $ty:ty; $($slot:literal)*) => {
        [$($entry::<$slot> as $ty),*]
    };
}

static PULL_ENTRIES: [PullEntry; SLOT_CAPACITY] = entry_table!(pull_entry as PullEntry;
    0 1 2 3 4 5 6 7 8 9 10 11 12 13 14 15 16 17 18 19 20 21 22 23 24 25 26 27 28 29 30 31
    32 33 34 35 36 37 38 39 40 41 42 43 44 45 46 47 48 49 50 51 52 53 54 55 56 57 58 59 60 61 62 63);

static PUSH_ENTRIES: [PushEntry; SLOT_CAPACITY] = entry_table!(push_entry as PushEntry;
    0 1 2 3 4 5 6 7 8 9 10 11 12 13 14 15 16 17 18 19 20 21 22 23 24 25 26 27 28 29 30 31
    32 33 34 35 36 37 38 39 40 41 42 43 44 45 46 47 48 49 50 51 52 53 54 55 56 57 58 59 60 61 62 63);

fn claim_slot<T: 'static>(
    slots: &'static LocalKey<RefCell<Vec<Weak<T>>>>,
    kind: NodeKind,
    build: impl FnOnce(usize) -> Rc<T>,
) -> BridgeResult<Rc<T>> {
    slots.with(|slots| {
        let mut slots = slots.borrow_mut();
        let slot = slots.len();
        if slot >= SLOT_CAPACITY {
            return Err(BridgeError::TrampolinesExhausted {
                kind,
                capacity: SLOT_CAPACITY,
            });
        }
        let trampoline = build(slot);
        slots.push(Rc::downgrade(&trampoline));
        Ok(trampoline)
    })
}

/// Hands back a slot whose entry point never reached the engine. Only the
/// most recently claimed slot can be handed back.
fn release_slot<T: 'static>(slots: &'static LocalKey<RefCell<Vec<Weak<T>>>>, slot: usize, trampoline: Rc<T>) {
    drop(trampoline);
    slots.with(|slots| {
        let mut slots = slots.borrow_mut();
        if slots.len() == slot + 1 && slots[slot].strong_count() == 0 {
            slots.pop();
        }
    });
}

/// Remaining `(pull, push)` slots on the current thread.
pub fn free_slots() -> (usize, usize) {
    let pull = PULL_SLOTS.with(|slots| SLOT_CAPACITY - slots.borrow().len());
    let push = PUSH_SLOTS.with(|slots| SLOT_CAPACITY - slots.borrow().len());
    (pull, push)
}

/// Owns every trampoline of one session, keyed by node name, until the
/// session is dropped. There is no way to remove an entry.
#[derive(Default)]
pub struct RegistrationTable {
    inputs: AHashMap<String, Rc<PullTrampoline>>,
    outputs: AHashMap<String, Rc<PushTrampoline>>,
}

impl RegistrationTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, kind: NodeKind, name: &str) -> bool {
        match kind {
            NodeKind::Input => self.inputs.contains_key(name),
            NodeKind::Output => self.outputs.contains_key(name),
        }
    }

    pub fn input(&self, name: &str) -> Option<&Rc<PullTrampoline>> {
        self.inputs.get(name)
    }

    pub fn output(&self, name: &str) -> Option<&Rc<PushTrampoline>> {
        self.outputs.get(name)
    }

    pub fn len(&self) -> usize {
        self.inputs.len() + self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Builds a pull trampoline on a fresh slot without storing it yet.
    pub(crate) fn prepare_input(
        &self,
        name: &str,
        marshaler: &Marshaler,
        callback: Box<dyn FnMut() -> i32>,
    ) -> BridgeResult<Rc<PullTrampoline>> {
        claim_slot(&PULL_SLOTS, NodeKind::Input, |slot| {
            Rc::new(PullTrampoline {
                name: name.to_string(),
                marshaler: marshaler.clone(),
                callback: RefCell::new(callback),
                pushed: Cell::new(None),
                calls: Cell::new(0),
                slot,
                entry: PULL_ENTRIES[slot],
            })
        })
    }

    pub(crate) fn prepare_output(
        &self,
        name: &str,
        marshaler: &Marshaler,
        callback: Box<dyn FnMut(EngineValue<'_>)>,
    ) -> BridgeResult<Rc<PushTrampoline>> {
        claim_slot(&PUSH_SLOTS, NodeKind::Output, |slot| {
            Rc::new(PushTrampoline {
                name: name.to_string(),
                marshaler: marshaler.clone(),
                callback: RefCell::new(callback),
                calls: Cell::new(0),
                slot,
                entry: PUSH_ENTRIES[slot],
            })
        })
    }

    /// Drops a pull trampoline the engine refused, freeing its slot.
    pub(crate) fn discard_input(&self, trampoline: Rc<PullTrampoline>) {
        let slot = trampoline.slot;
        release_slot(&PULL_SLOTS, slot, trampoline);
    }

    /// Drops a push trampoline the engine refused, freeing its slot.
    pub(crate) fn discard_output(&self, trampoline: Rc<PushTrampoline>) {
        let slot = trampoline.slot;
        release_slot(&PUSH_SLOTS, slot, trampoline);
    }

    pub(crate) fn retain_input(&mut self, trampoline: Rc<PullTrampoline>) {
        self.inputs.insert(trampoline.name.clone(), trampoline);
    }

    pub(crate) fn retain_output(&mut self, trampoline: Rc<PushTrampoline>) {
        self.outputs.insert(trampoline.name.clone(), trampoline);
    }
}

/// Held for the duration of one engine call.
pub(crate) struct BoundaryGuard {
    _not_send: PhantomData<*const ()>,
}

impl BoundaryGuard {
    pub(crate) fn enter(op: &'static str) -> BridgeResult<Self> {
        IN_BOUNDARY.with(|flag| {
            if flag.replace(true) {
                Err(BridgeError::Reentrant { op })
            } else {
                Ok(Self {
                    _not_send: PhantomData,
                })
            }
        })
    }
}

impl Drop for BoundaryGuard {
    fn drop(&mut self) {
        IN_BOUNDARY.with(|flag| flag.set(false));
    }
}
