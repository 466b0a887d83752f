//! Tagged object words.
//!
//! Integers never touch the heap: the word is `(value << 2) | 1`. Booleans are
//! two static cells, so the words handed out for them are stable addresses.
//! A null word means "no value".

use std::fmt;
use std::ptr;

use emfrp_sys::EmObject;

const INTEGER_TAG: usize = 0b01;
const TAG_MASK: usize = 0b11;

#[repr(C, align(4))]
#[allow(dead_code)]
struct StaticObject {
    kind: u32,
}

const KIND_BOOLEAN: u32 = 1 << 3;

static TRUE_OBJECT: StaticObject = StaticObject { kind: KIND_BOOLEAN | 0b1_0000 };
static FALSE_OBJECT: StaticObject = StaticObject { kind: KIND_BOOLEAN };

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Value {
    Int(i32),
    Bool(bool),
}

impl Value {
    pub const fn type_name(self) -> &'static str {
        match self {
            Self::Int(_) => "int",
            Self::Bool(_) => "bool",
        }
    }

    /// Encodes the value as an object word. The caller takes no ownership;
    /// nothing here ever needs freeing.
    pub fn into_raw(self) -> *mut EmObject {
        match self {
            Self::Int(value) => {
                let word = ((value as isize as usize) << 2) | INTEGER_TAG;
                ptr::without_provenance_mut(word)
            }
            Self::Bool(true) => ptr::from_ref(&TRUE_OBJECT).cast_mut().cast(),
            Self::Bool(false) => ptr::from_ref(&FALSE_OBJECT).cast_mut().cast(),
        }
    }

    /// Decodes an object word. Returns `None` for null and for words that
    /// were not produced by [`Value::into_raw`].
    pub fn from_raw(raw: *mut EmObject) -> Option<Self> {
        if raw.is_null() {
            return None;
        }
        let word = raw.addr();
        if word & TAG_MASK == INTEGER_TAG {
            return Some(Self::Int(((word as isize) >> 2) as i32));
        }
        if ptr::eq(raw.cast_const().cast(), &TRUE_OBJECT) {
            Some(Self::Bool(true))
        } else if ptr::eq(raw.cast_const().cast(), &FALSE_OBJECT) {
            Some(Self::Bool(false))
        } else {
            None
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(value) => write!(f, "{value}"),
            Self::Bool(value) => write!(f, "{value}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Value;

    #[test]
    fn integers_survive_the_tagged_word() {
        for value in [0, 1, 42, 100_000, -1, -100_000, i32::MAX, i32::MIN] {
            assert_eq!(Value::from_raw(Value::Int(value).into_raw()), Some(Value::Int(value)));
        }
    }

    #[test]
    fn booleans_are_static_and_distinct() {
        let t = Value::Bool(true).into_raw();
        let f = Value::Bool(false).into_raw();
        assert_ne!(t, f);
        assert_eq!(t, Value::Bool(true).into_raw());
        assert_eq!(Value::from_raw(t), Some(Value::Bool(true)));
        assert_eq!(Value::from_raw(f), Some(Value::Bool(false)));
    }

    #[test]
    fn null_is_no_value() {
        assert_eq!(Value::from_raw(std::ptr::null_mut()), None);
    }
}
