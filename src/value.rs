//! The tagged value type the VM operates on, plus the heap of objects it
//! can point into.
//!
//! `Value` carries a `Copy` index (`ObjRef`) rather than a pointer or `Rc`
//! into the object graph; the arena in [`Heap`] is the sole owner of heap
//! records and is dropped wholesale at VM teardown.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjRef(u32);

#[derive(Debug, Clone, Copy)]
pub enum Value {
    Nil,
    Bool(bool),
    Number(f64),
    Obj(ObjRef),
}

impl Value {
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Bool(false))
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Value::Number(_))
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_string_ref(&self) -> Option<ObjRef> {
        match self {
            Value::Obj(r) => Some(*r),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Obj(a), Value::Obj(b)) => a == b,
            _ => false,
        }
    }
}

/// A heap record. The core only ever allocates strings.
#[derive(Debug)]
pub enum Object {
    String(Rc<str>),
}

/// Arena owning every heap object plus the interning pool over strings.
///
/// `strings` maps textual content to the arena slot of its canonical
/// `Object::String`; `intern` is the only path by which a string enters the
/// arena, so two equal byte sequences always resolve to the same `ObjRef`.
#[derive(Debug, Default)]
pub struct Heap {
    objects: Vec<Object>,
    strings: HashMap<Rc<str>, ObjRef>,
}

impl Heap {
    pub fn new() -> Self {
        Heap::default()
    }

    pub fn intern(&mut self, text: &str) -> ObjRef {
        if let Some(&existing) = self.strings.get(text) {
            return existing;
        }
        let rc: Rc<str> = Rc::from(text);
        let idx = self.objects.len() as u32;
        self.objects.push(Object::String(Rc::clone(&rc)));
        let obj_ref = ObjRef(idx);
        self.strings.insert(rc, obj_ref);
        obj_ref
    }

    pub fn object(&self, r: ObjRef) -> &Object {
        &self.objects[r.0 as usize]
    }

    pub fn as_str(&self, r: ObjRef) -> &str {
        let Object::String(s) = self.object(r);
        s
    }

    /// Clone of the canonical `Rc<str>` backing a string object, used as a
    /// globals-map key so the map is keyed by interned textual content
    /// rather than by arena index.
    pub fn rc_str(&self, r: ObjRef) -> Rc<str> {
        let Object::String(s) = self.object(r);
        Rc::clone(s)
    }
}

/// Renders a value for `print` and the REPL. Needs `Heap` to resolve
/// `Obj` references, so this is a free function rather than `Display` on
/// `Value` directly.
pub fn render(value: &Value, heap: &Heap) -> String {
    match value {
        Value::Nil => "nil".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => format_number(*n),
        Value::Obj(r) => heap.as_str(*r).to_string(),
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.is_finite() {
        format!("{n:.0}")
    } else {
        format!("{n}")
    }
}

pub struct DebugValue<'a> {
    pub value: &'a Value,
    pub heap: &'a Heap,
}

impl fmt::Display for DebugValue<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value {
            Value::Obj(r) => write!(f, "\"{}\"", self.heap.as_str(*r)),
            other => write!(f, "{}", render(other, self.heap)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_is_idempotent_by_content() {
        let mut heap = Heap::new();
        let a = heap.intern("hi");
        let b = heap.intern("hi");
        let c = heap.intern("bye");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn nil_equals_nil_and_nothing_else() {
        assert_eq!(Value::Nil, Value::Nil);
        assert_ne!(Value::Nil, Value::Bool(false));
        assert_ne!(Value::Nil, Value::Number(0.0));
    }

    #[test]
    fn truthiness_matches_nil_bool_rule() {
        assert!(!Value::Nil.is_truthy());
        assert!(!Value::Bool(false).is_truthy());
        assert!(Value::Bool(true).is_truthy());
        assert!(Value::Number(0.0).is_truthy());
    }

    #[test]
    fn number_renders_without_trailing_zeros() {
        let heap = Heap::new();
        assert_eq!(render(&Value::Number(3.0), &heap), "3");
        assert_eq!(render(&Value::Number(3.5), &heap), "3.5");
    }
}
