//! Program storage and label resolution.

use crate::errors::VMError;
use crate::instruction::Instruction;
use crate::memory::{Pointer, Target};
use std::collections::HashMap;
use std::fmt::Write as _;

/// Location within program storage: a raw index or a symbolic label.
#[derive(Clone, Copy, Debug)]
pub enum Loc<'a> {
    Index(usize),
    Label(&'a str),
}

impl From<usize> for Loc<'_> {
    fn from(index: usize) -> Self {
        Loc::Index(index)
    }
}

impl<'a> From<&'a str> for Loc<'a> {
    fn from(label: &'a str) -> Self {
        Loc::Label(label)
    }
}

/// Holds one loaded instruction sequence.
///
/// Instructions are loaded in bulk and read-only afterwards; labels are
/// resolved to their indexes once at load time for fast lookup.
pub struct ProgramStorage {
    instrs: Vec<Instruction>,
    labels: HashMap<String, usize>,
}

impl ProgramStorage {
    /// Creates empty storage.
    pub fn new() -> Self {
        Self {
            instrs: Vec::new(),
            labels: HashMap::new(),
        }
    }

    /// Removes all instructions and clears the label lookup map.
    pub fn clear(&mut self) {
        self.instrs.clear();
        self.labels.clear();
    }

    /// Loads an instruction sequence, replacing any previous program.
    ///
    /// Records `label -> index` for every labeled instruction. Returns
    /// [`VMError::DuplicateLabel`] if two instructions carry the same
    /// label, leaving the storage empty.
    pub fn load(&mut self, instructions: Vec<Instruction>) -> Result<(), VMError> {
        self.clear();
        for (index, instr) in instructions.into_iter().enumerate() {
            if let Some(label) = instr.label().map(str::to_owned) {
                if self.labels.insert(label.clone(), index).is_some() {
                    self.clear();
                    return Err(VMError::DuplicateLabel(label));
                }
            }
            self.instrs.push(instr);
        }
        Ok(())
    }

    /// Returns the number of loaded instructions.
    pub fn len(&self) -> usize {
        self.instrs.len()
    }

    /// Returns `true` if no program is loaded.
    pub fn is_empty(&self) -> bool {
        self.instrs.is_empty()
    }

    /// Fetches the instruction a pointer addresses.
    ///
    /// Returns [`VMError::OutOfBounds`] if the offset is outside the
    /// loaded program.
    pub fn get(&self, ptr: &Pointer) -> Result<&Instruction, VMError> {
        self.get_at(ptr.offset())
    }

    /// Fetches the instruction at a raw offset.
    pub fn get_at(&self, offset: i64) -> Result<&Instruction, VMError> {
        if offset < 0 || offset as usize >= self.instrs.len() {
            return Err(VMError::OutOfBounds {
                target: Target::Program.tag(),
                offset,
                len: self.instrs.len(),
            });
        }
        Ok(&self.instrs[offset as usize])
    }

    /// Looks up the index of a label.
    ///
    /// Returns [`VMError::LabelNotFound`] if no loaded instruction carries
    /// it.
    pub fn index_of_label(&self, label: &str) -> Result<usize, VMError> {
        self.labels
            .get(label)
            .copied()
            .ok_or_else(|| VMError::LabelNotFound(label.to_string()))
    }

    /// Returns an instruction pointer to the given location.
    ///
    /// Label locations are resolved through the label map and fail with
    /// [`VMError::LabelNotFound`] when absent.
    pub fn ptr<'a>(&self, loc: impl Into<Loc<'a>>) -> Result<Pointer, VMError> {
        let index = match loc.into() {
            Loc::Index(index) => index,
            Loc::Label(label) => self.index_of_label(label)?,
        };
        Ok(Pointer::new(Target::Program, index as i64))
    }

    /// Renders one index-prefixed line per instruction for inspection.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        for (index, instr) in self.instrs.iter().enumerate() {
            let _ = writeln!(out, "{:2}: {}", index, instr);
        }
        out
    }
}

impl Default for ProgramStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::Value;

    fn sample() -> Vec<Instruction> {
        vec![
            Instruction::new("push", vec![Value::Int(1)]),
            Instruction::new("push", vec![Value::Int(2)]).with_label("l0"),
            Instruction::halt().with_label("l1"),
        ]
    }

    #[test]
    fn load_resolves_every_label_to_its_index() {
        let mut ps = ProgramStorage::new();
        ps.load(sample()).unwrap();
        assert_eq!(ps.len(), 3);
        assert_eq!(ps.index_of_label("l0").unwrap(), 1);
        assert_eq!(ps.index_of_label("l1").unwrap(), 2);
    }

    #[test]
    fn reload_replaces_the_previous_program_and_labels() {
        let mut ps = ProgramStorage::new();
        ps.load(sample()).unwrap();
        ps.load(vec![Instruction::halt().with_label("l9")]).unwrap();
        assert_eq!(ps.len(), 1);
        assert_eq!(ps.index_of_label("l9").unwrap(), 0);
        assert!(matches!(
            ps.index_of_label("l0"),
            Err(VMError::LabelNotFound(_))
        ));
    }

    #[test]
    fn duplicate_labels_are_rejected() {
        let mut ps = ProgramStorage::new();
        let err = ps
            .load(vec![
                Instruction::nop().with_label("l0"),
                Instruction::halt().with_label("l0"),
            ])
            .unwrap_err();
        assert!(matches!(err, VMError::DuplicateLabel(ref l) if l == "l0"));
        assert!(ps.is_empty());
    }

    #[test]
    fn ptr_accepts_raw_indexes_and_labels() {
        let mut ps = ProgramStorage::new();
        ps.load(sample()).unwrap();
        assert_eq!(ps.ptr(2usize).unwrap().offset(), 2);
        assert_eq!(ps.ptr("l0").unwrap().offset(), 1);
        assert!(matches!(
            ps.ptr("nowhere"),
            Err(VMError::LabelNotFound(ref l)) if l == "nowhere"
        ));
    }

    #[test]
    fn fetch_is_bounds_checked() {
        let mut ps = ProgramStorage::new();
        ps.load(sample()).unwrap();
        assert_eq!(ps.get(&ps.ptr(0usize).unwrap()).unwrap().name(), "push");
        assert!(matches!(
            ps.get_at(3),
            Err(VMError::OutOfBounds {
                target: "PS",
                offset: 3,
                len: 3,
            })
        ));
    }

    #[test]
    fn dump_is_one_line_per_instruction() {
        let mut ps = ProgramStorage::new();
        ps.load(vec![
            Instruction::new("push", vec![Value::Int(1)]),
            Instruction::halt().with_label("l1"),
        ])
        .unwrap();
        assert_eq!(ps.dump(), " 0: push 1\n 1: l1: halt\n");
    }
}
