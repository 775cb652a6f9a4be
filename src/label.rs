//! Label allocation for compilation passes.
//!
//! Branch code generation needs jump targets before the target instruction
//! exists. The allocator hands out globally unique symbolic labels for one
//! compilation pass; [`attach_label`] anchors such a label onto the head of
//! an instruction sequence, emitting a placeholder no-op when the sequence
//! has nothing to anchor to yet. The baseline optimizer rule later folds
//! those placeholders away.

use crate::instruction::Instruction;

/// Issues unique labels of the form `l0`, `l1`, ... for one compilation
/// pass. Reset the allocator between passes; labels from different passes
/// must never mix in a single load.
#[derive(Debug, Default)]
pub struct LabelAllocator {
    counter: usize,
}

impl LabelAllocator {
    /// Creates an allocator starting at `l0`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resets the internal counter for a new compilation pass.
    pub fn reset(&mut self) {
        self.counter = 0;
    }

    /// Returns the next unused label.
    pub fn fresh(&mut self) -> String {
        let label = format!("l{}", self.counter);
        self.counter += 1;
        label
    }
}

/// Puts `label` onto the first instruction of `instrs`.
///
/// An empty sequence gets a labeled no-op. A sequence whose head already
/// carries a label gets a labeled no-op prepended instead, so the existing
/// label stays live as a jump target.
pub fn attach_label(label: impl Into<String>, instrs: &mut Vec<Instruction>) {
    let label = label.into();
    match instrs.first() {
        None => instrs.push(Instruction::nop().with_label(label)),
        Some(first) if first.label().is_some() => {
            instrs.insert(0, Instruction::nop().with_label(label));
        }
        Some(_) => instrs[0].set_label(Some(label)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_labels_are_sequential() {
        let mut labels = LabelAllocator::new();
        assert_eq!(labels.fresh(), "l0");
        assert_eq!(labels.fresh(), "l1");
        assert_eq!(labels.fresh(), "l2");
    }

    #[test]
    fn reset_restarts_the_counter() {
        let mut labels = LabelAllocator::new();
        labels.fresh();
        labels.fresh();
        labels.reset();
        assert_eq!(labels.fresh(), "l0");
    }

    #[test]
    fn attach_to_empty_sequence_emits_labeled_nop() {
        let mut instrs = Vec::new();
        attach_label("l0", &mut instrs);
        assert_eq!(instrs.len(), 1);
        assert_eq!(instrs[0].name(), "nop");
        assert_eq!(instrs[0].label(), Some("l0"));
    }

    #[test]
    fn attach_to_unlabeled_head_sets_its_label() {
        let mut instrs = vec![Instruction::halt()];
        attach_label("l1", &mut instrs);
        assert_eq!(instrs.len(), 1);
        assert_eq!(instrs[0].label(), Some("l1"));
    }

    #[test]
    fn attach_to_labeled_head_prepends_nop() {
        let mut instrs = vec![Instruction::halt().with_label("l0")];
        attach_label("l1", &mut instrs);
        assert_eq!(instrs.len(), 2);
        assert_eq!(instrs[0].name(), "nop");
        assert_eq!(instrs[0].label(), Some("l1"));
        assert_eq!(instrs[1].label(), Some("l0"));
    }
}
