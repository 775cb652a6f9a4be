//! Fixpoint peephole optimization over instruction sequences.
//!
//! Rules inspect a window at the front of the remaining instruction stream
//! and either decline or replace a consumed prefix. Replacements are
//! spliced back onto the front of the stream, so they are immediately
//! eligible for further rewriting - the pipeline runs to a fixpoint rather
//! than making a single linear pass.
//!
//! Rules are tried in registration order and the first match wins, so
//! earlier-registered rules take priority when several would match the same
//! window. The built-in baseline rule removing placeholder no-ops is always
//! registered first.

use crate::instruction::{Instruction, NOP};
use crate::{debug, warn};
use std::collections::VecDeque;

/// A successful rule application: how many instructions of the window were
/// consumed (at least one) and what replaces them.
pub struct Rewrite {
    pub consumed: usize,
    pub replacement: Vec<Instruction>,
}

/// One peephole rewrite rule.
///
/// A rule must consume at least one instruction when it matches and must
/// shrink the stream overall - emitting exactly what it consumed, forever,
/// would loop. The driver guards against gross violations (see
/// [`Optimizer::optimize`]) but semantic shrinkage is the rule author's
/// obligation.
pub trait Rule {
    /// Short name used in diagnostics.
    fn name(&self) -> &'static str;

    /// Minimum number of instructions this rule needs to inspect. Windows
    /// shorter than this are never offered to the rule.
    fn min_window(&self) -> usize {
        2
    }

    /// Inspects a prefix of the remaining stream. Returns `None` to
    /// decline, or the consumed count and replacement sequence.
    fn rewrite(&self, window: &[Instruction]) -> Option<Rewrite>;
}

/// Removes placeholder `nop` instructions left behind by branch code
/// generation.
///
/// An unlabeled `nop` is deleted outright. A labeled `nop` immediately
/// followed by an unlabeled instruction is merged away by moving the label
/// onto that instruction. A labeled `nop` whose successor already carries a
/// label stays - both labels are live jump targets.
struct NopElimination;

impl Rule for NopElimination {
    fn name(&self) -> &'static str {
        "nop-elimination"
    }

    fn min_window(&self) -> usize {
        1
    }

    fn rewrite(&self, window: &[Instruction]) -> Option<Rewrite> {
        let first = window.first()?;
        if first.name() != NOP {
            return None;
        }
        match first.label() {
            None => Some(Rewrite {
                consumed: 1,
                replacement: Vec::new(),
            }),
            Some(label) => match window.get(1) {
                Some(next) if next.label().is_none() => Some(Rewrite {
                    consumed: 2,
                    replacement: vec![next.clone().with_label(label)],
                }),
                _ => None,
            },
        }
    }
}

/// Ordered rule registry plus the fixpoint driver.
pub struct Optimizer {
    rules: Vec<Box<dyn Rule>>,
}

impl Optimizer {
    /// Creates an optimizer with the baseline no-op rule installed.
    pub fn new() -> Self {
        Self {
            rules: vec![Box::new(NopElimination)],
        }
    }

    /// Appends a rule to the registry. Registration order is priority
    /// order.
    pub fn register<R>(&mut self, rule: R)
    where
        R: Rule + 'static,
    {
        self.rules.push(Box::new(rule));
    }

    /// Runs the registered rules over `instructions` to a fixpoint.
    ///
    /// A pure function of the input and the registered rules. Jump targets
    /// are preserved: the baseline rule only drops a label-carrying no-op
    /// when its label can move onto the following instruction.
    ///
    /// A rule that claims a match but consumes zero instructions (or more
    /// than remain) violates its contract; the violation is logged and the
    /// match ignored. A rewrite budget proportional to the input length
    /// bounds total splices, so a rule that keeps replacing without
    /// shrinking cannot prevent termination - on exhaustion the remaining
    /// input is passed through unoptimized.
    pub fn optimize(&self, instructions: Vec<Instruction>) -> Vec<Instruction> {
        let mut input: VecDeque<Instruction> = instructions.into();
        let mut output = Vec::with_capacity(input.len());
        let mut fuel = 32 + 8 * input.len();

        while !input.is_empty() {
            match self.first_match(input.make_contiguous()) {
                Some((rule, rewrite)) if fuel > 0 => {
                    fuel -= 1;
                    debug!(
                        "optimizer: {} rewrote {} instructions into {}",
                        rule,
                        rewrite.consumed,
                        rewrite.replacement.len()
                    );
                    input.drain(..rewrite.consumed);
                    for instr in rewrite.replacement.into_iter().rev() {
                        input.push_front(instr);
                    }
                }
                Some(_) => {
                    warn!(
                        "optimizer: rewrite budget exhausted, passing {} instructions through",
                        input.len()
                    );
                    output.extend(input.drain(..));
                }
                None => {
                    if let Some(instr) = input.pop_front() {
                        output.push(instr);
                    }
                }
            }
        }
        output
    }

    /// Returns the first registered rule's rewrite of the current window,
    /// skipping rules whose window requirement is unmet or whose result
    /// violates the consumption contract.
    fn first_match(&self, window: &[Instruction]) -> Option<(&'static str, Rewrite)> {
        for rule in &self.rules {
            if window.len() < rule.min_window() {
                continue;
            }
            let Some(rewrite) = rule.rewrite(window) else {
                continue;
            };
            if rewrite.consumed == 0 || rewrite.consumed > window.len() {
                warn!(
                    "optimizer: rule {} consumed {} of a {}-instruction window, ignoring match",
                    rule.name(),
                    rewrite.consumed,
                    window.len()
                );
                continue;
            }
            return Some((rule.name(), rewrite));
        }
        None
    }
}

impl Default for Optimizer {
    fn default() -> Self {
        Self::new()
    }
}
