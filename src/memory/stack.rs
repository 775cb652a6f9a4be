//! Growable observable cell container.

use crate::errors::VMError;
use crate::instruction::Value;
use crate::memory::pointer::{Pointer, Target};
use crate::observe::{RangeBroker, RangeObserver};
use std::fmt::Write as _;
use std::rc::Rc;

/// The machine's operand stack.
///
/// Behaves like a growable sequence of [`Value`] cells: writing past the
/// current end auto-extends the stack, filling the gap with
/// [`Value::Undef`]. Cells own their contents, so a pointer written into a
/// cell is an independent copy that later mutation of the source pointer
/// never reaches.
///
/// Every mutation is bracketed by range notifications on the embedded
/// [`RangeBroker`]: growth for appends and auto-extension, shrinkage for
/// pops and clears, in-place change for overwrites.
pub struct Stack {
    target: Target,
    cells: Vec<Value>,
    observers: RangeBroker,
}

impl Stack {
    /// Creates an empty stack.
    pub fn new() -> Self {
        Self::for_target(Target::Stack)
    }

    /// Creates an empty container addressed as `target`.
    pub(crate) fn for_target(target: Target) -> Self {
        Self {
            target,
            cells: Vec::new(),
            observers: RangeBroker::new(target.tag()),
        }
    }

    /// Returns the number of cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Returns `true` if the container holds no cells.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Reads the cell a pointer addresses.
    ///
    /// Returns [`VMError::OutOfBounds`] if the offset is outside the
    /// current extent.
    pub fn get(&self, ptr: &Pointer) -> Result<&Value, VMError> {
        self.get_at(ptr.offset())
    }

    /// Reads the cell at a raw offset.
    pub fn get_at(&self, offset: i64) -> Result<&Value, VMError> {
        let index = self.check(offset)?;
        Ok(&self.cells[index])
    }

    /// Writes `value` into the cell at `offset`, auto-extending past the
    /// current end and filling intermediate cells with [`Value::Undef`].
    ///
    /// Returns [`VMError::OutOfBounds`] for negative offsets.
    pub fn set(&mut self, offset: i64, value: Value) -> Result<(), VMError> {
        if offset < 0 {
            return Err(self.out_of_bounds(offset));
        }
        let index = offset as usize;
        if index >= self.cells.len() {
            let old_len = self.cells.len();
            self.observers.will_grow(old_len, index + 1);
            self.cells.resize(index + 1, Value::Undef);
            self.cells[index] = value;
            self.observers.did_grow();
        } else {
            self.observers.will_change(index, index + 1);
            self.cells[index] = value;
            self.observers.did_change();
        }
        Ok(())
    }

    /// Appends `value` as the new top cell.
    pub fn push(&mut self, value: Value) {
        let at = self.cells.len();
        self.observers.will_grow(at, at + 1);
        self.cells.push(value);
        self.observers.did_grow();
    }

    /// Removes and returns the top cell.
    ///
    /// Returns [`VMError::OutOfBounds`] when the container is empty.
    pub fn pop(&mut self) -> Result<Value, VMError> {
        let len = self.cells.len();
        if len == 0 {
            return Err(self.out_of_bounds(-1));
        }
        self.observers.will_shrink(len - 1, len);
        let value = self.cells.remove(len - 1);
        self.observers.did_shrink();
        Ok(value)
    }

    /// Removes every cell.
    pub fn clear(&mut self) {
        if self.cells.is_empty() {
            return;
        }
        self.observers.will_shrink(0, self.cells.len());
        self.cells.clear();
        self.observers.did_shrink();
    }

    /// Returns a pointer to `offset` within this container.
    pub fn ptr(&self, offset: i64) -> Pointer {
        Pointer::new(self.target, offset)
    }

    /// Registers a range observer for this container's mutations.
    pub fn add_observer<O>(&mut self, observer: &Rc<O>)
    where
        O: RangeObserver + 'static,
    {
        self.observers.add_observer(observer);
    }

    /// Removes a range observer's registration.
    pub fn remove_observer<O>(&mut self, observer: &Rc<O>)
    where
        O: RangeObserver + 'static,
    {
        self.observers.remove_observer(observer);
    }

    /// Renders one index-prefixed line per cell for inspection.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        for (index, cell) in self.cells.iter().enumerate() {
            let _ = writeln!(out, "{:2}: {}", index, cell);
        }
        out
    }

    fn check(&self, offset: i64) -> Result<usize, VMError> {
        if offset < 0 || offset as usize >= self.cells.len() {
            return Err(self.out_of_bounds(offset));
        }
        Ok(offset as usize)
    }

    fn out_of_bounds(&self, offset: i64) -> VMError {
        VMError::OutOfBounds {
            target: self.target.tag(),
            offset,
            len: self.cells.len(),
        }
    }
}

impl Default for Stack {
    fn default() -> Self {
        Self::new()
    }
}
