//! Heap storage and tagged heap records.

use crate::errors::VMError;
use crate::instruction::Value;
use crate::memory::pointer::{Pointer, Target};
use crate::memory::stack::Stack;
use crate::observe::RangeObserver;
use std::fmt;
use std::rc::Rc;

/// The machine's heap.
///
/// Works like the [`Stack`] - growable observable cells with the same
/// auto-extension and copy-on-store behavior - and adds [`Heap::alloc`],
/// which appends a value and hands back a pointer to its new cell.
pub struct Heap {
    cells: Stack,
}

impl Heap {
    /// Creates an empty heap.
    pub fn new() -> Self {
        Self {
            cells: Stack::for_target(Target::Heap),
        }
    }

    /// Appends `value` and returns a pointer to its cell.
    pub fn alloc(&mut self, value: Value) -> Pointer {
        let at = self.cells.len() as i64;
        self.cells.push(value);
        Pointer::new(Target::Heap, at)
    }

    /// Returns the number of cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Returns `true` if the heap holds no cells.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Reads the cell a pointer addresses.
    pub fn get(&self, ptr: &Pointer) -> Result<&Value, VMError> {
        self.cells.get(ptr)
    }

    /// Reads the cell at a raw offset.
    pub fn get_at(&self, offset: i64) -> Result<&Value, VMError> {
        self.cells.get_at(offset)
    }

    /// Writes `value` into the cell at `offset`, auto-extending past the
    /// current end.
    pub fn set(&mut self, offset: i64, value: Value) -> Result<(), VMError> {
        self.cells.set(offset, value)
    }

    /// Removes every cell.
    pub fn clear(&mut self) {
        self.cells.clear();
    }

    /// Returns a pointer to `offset` within the heap.
    pub fn ptr(&self, offset: i64) -> Pointer {
        self.cells.ptr(offset)
    }

    /// Registers a range observer for the heap's mutations.
    pub fn add_observer<O>(&mut self, observer: &Rc<O>)
    where
        O: RangeObserver + 'static,
    {
        self.cells.add_observer(observer);
    }

    /// Removes a range observer's registration.
    pub fn remove_observer<O>(&mut self, observer: &Rc<O>)
    where
        O: RangeObserver + 'static,
    {
        self.cells.remove_observer(observer);
    }

    /// Renders one index-prefixed line per cell for inspection.
    pub fn dump(&self) -> String {
        self.cells.dump()
    }
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}

/// Declared shape of one kind of heap record: a tag plus an ordered field
/// list.
///
/// Declared once per record kind, then used to construct and to read
/// [`HeapObject`]s of that kind by field name.
#[derive(Clone, Debug)]
pub struct RecordKind {
    tag: String,
    fields: Vec<String>,
}

impl RecordKind {
    /// Declares a record kind with the given tag and field names.
    pub fn new(tag: impl Into<String>, fields: &[&str]) -> Self {
        Self {
            tag: tag.into(),
            fields: fields.iter().map(|f| f.to_string()).collect(),
        }
    }

    /// Returns the kind's tag.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Returns the number of declared fields.
    pub fn arity(&self) -> usize {
        self.fields.len()
    }

    /// Returns the position of a declared field.
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f == name)
    }

    /// Constructs a record of this kind from positional field values.
    ///
    /// Returns [`VMError::Arity`] naming the tag when the value count does
    /// not match the declared field list. Pointer values end up as
    /// independent copies inside the record.
    pub fn construct(&self, values: Vec<Value>) -> Result<HeapObject, VMError> {
        if values.len() != self.fields.len() {
            return Err(VMError::Arity {
                op: self.tag.clone(),
                expected: self.fields.len(),
                got: values.len(),
            });
        }
        Ok(HeapObject {
            tag: self.tag.clone(),
            values,
        })
    }
}

/// An immutable tagged record stored on the heap.
///
/// Fields are fixed at construction; there is no mutating access.
#[derive(Clone, Debug, PartialEq)]
pub struct HeapObject {
    tag: String,
    values: Vec<Value>,
}

impl HeapObject {
    /// Returns the record's kind tag.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Returns the number of fields.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if the record has no fields.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns the field at `index`.
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Returns the field named by `name` according to `kind`.
    pub fn field(&self, kind: &RecordKind, name: &str) -> Option<&Value> {
        kind.field_index(name).and_then(|index| self.values.get(index))
    }
}

impl fmt::Display for HeapObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{{", self.tag)?;
        for (i, value) in self.values.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", value)?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_returns_a_pointer_to_the_new_cell() {
        let mut heap = Heap::new();
        let first = heap.alloc(Value::Int(10));
        let second = heap.alloc(Value::Int(20));
        assert_eq!(first.target(), Target::Heap);
        assert_eq!(first.offset(), 0);
        assert_eq!(second.offset(), 1);
        assert_eq!(heap.get(&second).unwrap(), &Value::Int(20));
    }

    #[test]
    fn record_construction_checks_arity() {
        let cons = RecordKind::new("Cons", &["head", "tail"]);
        let err = cons.construct(vec![Value::Int(1)]).unwrap_err();
        assert!(matches!(
            err,
            VMError::Arity {
                ref op,
                expected: 2,
                got: 1,
            } if op == "Cons"
        ));
    }

    #[test]
    fn record_fields_are_positional_and_named() {
        let cons = RecordKind::new("Cons", &["head", "tail"]);
        let obj = cons
            .construct(vec![Value::Int(1), Value::Ptr(Pointer::new(Target::Heap, 0))])
            .unwrap();
        assert_eq!(obj.tag(), "Cons");
        assert_eq!(obj.get(0), Some(&Value::Int(1)));
        assert_eq!(obj.field(&cons, "head"), Some(&Value::Int(1)));
        assert_eq!(
            obj.field(&cons, "tail"),
            Some(&Value::Ptr(Pointer::new(Target::Heap, 0)))
        );
        assert_eq!(obj.field(&cons, "missing"), None);
    }

    #[test]
    fn record_pointer_fields_do_not_alias_their_source() {
        let cell = RecordKind::new("Cell", &["slot"]);
        let mut p = Pointer::new(Target::Heap, 5);
        let obj = cell.construct(vec![Value::Ptr(p)]).unwrap();
        p += 3;
        assert_eq!(
            obj.get(0),
            Some(&Value::Ptr(Pointer::new(Target::Heap, 5)))
        );
    }

    #[test]
    fn record_display_shows_tag_and_fields() {
        let pair = RecordKind::new("Pair", &["a", "b"]);
        let obj = pair
            .construct(vec![Value::Int(1), Value::Sym("x".to_string())])
            .unwrap();
        assert_eq!(obj.to_string(), "Pair{1, x}");
    }

    #[test]
    fn heap_records_round_trip_through_cells() {
        let mut heap = Heap::new();
        let pair = RecordKind::new("Pair", &["a", "b"]);
        let obj = pair
            .construct(vec![Value::Int(4), Value::Int(2)])
            .unwrap();
        let ptr = heap.alloc(Value::Obj(obj.clone()));
        assert_eq!(heap.get(&ptr).unwrap(), &Value::Obj(obj));
    }
}
