//! Declarative instruction-set definitions.
//!
//! A concrete virtual machine declares its opcode set as a flat list of
//! named operation signatures; the [`instruction_set!`] macro holds the
//! canonical definitions and generates one arity-checked constructor
//! function per operation plus an [`OpSpec`] table. This keeps every module
//! that needs the operation list (code generators, dynamic builders, tests)
//! working from a single declaration without per-opcode boilerplate.
//!
//! Two construction paths exist:
//! - The generated constructors, where arity is enforced by the function
//!   signature and a label is attached with
//!   [`Instruction::with_label`](crate::instruction::Instruction::with_label).
//! - [`InstructionSet::build`], the dynamically-checked path for callers
//!   that assemble instructions from data, which reports
//!   [`VMError::Arity`] and [`VMError::UnknownOpcode`] at runtime.

use crate::errors::VMError;
use crate::instruction::{Instruction, Value};

/// Name and arity of one declared operation.
///
/// `name` is the raw declaration identifier; [`OpSpec::opcode`] yields the
/// opcode name with separator underscores stripped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OpSpec {
    pub name: &'static str,
    pub arity: usize,
}

impl OpSpec {
    /// Returns the opcode name this operation constructs.
    pub fn opcode(&self) -> String {
        opcode(self.name)
    }
}

/// Strips separator underscores from an operation identifier.
///
/// Declarations use underscores to keep reserved words usable as operation
/// names (`if_`, `jump_if_zero`); the constructed opcode drops them
/// (`if`, `jumpifzero`).
pub fn opcode(ident: &str) -> String {
    ident.chars().filter(|c| *c != '_').collect()
}

/// Runtime-checked instruction builder over a declared operation table.
pub struct InstructionSet {
    ops: Vec<(String, usize)>,
}

impl InstructionSet {
    /// Creates a builder from a declaration table, normalizing each
    /// operation identifier to its opcode name.
    pub fn new(specs: &[OpSpec]) -> Self {
        Self {
            ops: specs.iter().map(|s| (s.opcode(), s.arity)).collect(),
        }
    }

    /// Returns the arity of the named opcode, if declared.
    pub fn arity_of(&self, name: &str) -> Option<usize> {
        self.ops
            .iter()
            .find(|(op, _)| op == name)
            .map(|(_, arity)| *arity)
    }

    /// Constructs an instruction for the named opcode.
    ///
    /// Returns [`VMError::UnknownOpcode`] for an undeclared name and
    /// [`VMError::Arity`] when the operand count does not match the
    /// declaration.
    pub fn build(&self, name: &str, operands: Vec<Value>) -> Result<Instruction, VMError> {
        let Some(arity) = self.arity_of(name) else {
            return Err(VMError::UnknownOpcode(name.to_string()));
        };
        if operands.len() != arity {
            return Err(VMError::Arity {
                op: name.to_string(),
                expected: arity,
                got: operands.len(),
            });
        }
        Ok(Instruction::new(name, operands))
    }
}

/// Declares an instruction set as a module of constructor functions.
///
/// Each `name(param, ...);` entry generates
/// `pub fn name(param: impl Into<Value>, ...) -> Instruction` whose opcode
/// is the entry's identifier with underscores stripped, plus one row in the
/// module's `OPS` table for the runtime-checked path.
///
/// ```
/// vmkit::instruction_set! {
///     /// Opcodes of a two-operation machine.
///     pub mod ops {
///         halt();
///         push(value);
///     }
/// }
///
/// let program = vec![ops::push(3), ops::halt().with_label("end")];
/// assert_eq!(program[0].name(), "push");
/// ```
#[macro_export]
macro_rules! instruction_set {
    (
        $(#[$set_attr:meta])*
        $vis:vis mod $set:ident {
            $(
                $(#[$op_attr:meta])*
                $op:ident ( $( $param:ident ),* $(,)? );
            )*
        }
    ) => {
        $(#[$set_attr])*
        $vis mod $set {
            #[allow(unused_imports)]
            use $crate::instruction::{Instruction, Value};

            $(
                $(#[$op_attr])*
                pub fn $op( $( $param: impl Into<Value> ),* ) -> Instruction {
                    Instruction::new(
                        $crate::isa::opcode(stringify!($op)),
                        vec![ $( $param.into() ),* ],
                    )
                }
            )*

            /// Operations declared by this instruction set, in declaration
            /// order.
            pub const OPS: &[$crate::isa::OpSpec] = &[
                $(
                    $crate::isa::OpSpec {
                        name: stringify!($op),
                        arity: $crate::instruction_set!(@count $( $param )*),
                    },
                )*
            ];
        }
    };

    (@count) => { 0usize };
    (@count $head:ident $( $tail:ident )*) => {
        1usize + $crate::instruction_set!(@count $( $tail )*)
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::Value;

    crate::instruction_set! {
        /// Opcode constructors used by the factory tests.
        mod ops {
            nop();
            push(value);
            add();
            jump_if_zero(target);
        }
    }

    #[test]
    fn constructors_produce_named_instructions() {
        let instr = ops::push(7);
        assert_eq!(instr.name(), "push");
        assert_eq!(instr.operands(), &[Value::Int(7)]);
        assert_eq!(instr.label(), None);
        assert_eq!(ops::add().name(), "add");
        assert!(ops::add().operands().is_empty());
    }

    #[test]
    fn separators_are_stripped_from_opcode_names() {
        assert_eq!(ops::jump_if_zero("l0").name(), "jumpifzero");
    }

    #[test]
    fn constructors_attach_labels() {
        let instr = ops::nop().with_label("l3");
        assert_eq!(instr.label(), Some("l3"));
    }

    #[test]
    fn ops_table_records_declared_arities() {
        let set = InstructionSet::new(ops::OPS);
        assert_eq!(set.arity_of("nop"), Some(0));
        assert_eq!(set.arity_of("push"), Some(1));
        assert_eq!(set.arity_of("jumpifzero"), Some(1));
        assert_eq!(set.arity_of("frobnicate"), None);
    }

    #[test]
    fn build_checks_arity() {
        let set = InstructionSet::new(ops::OPS);
        let err = set.build("push", vec![]).unwrap_err();
        assert!(matches!(
            err,
            VMError::Arity {
                ref op,
                expected: 1,
                got: 0,
            } if op == "push"
        ));
        let instr = set.build("push", vec![Value::Int(1)]).unwrap();
        assert_eq!(instr, ops::push(1));
    }

    #[test]
    fn build_rejects_unknown_opcodes() {
        let set = InstructionSet::new(ops::OPS);
        assert!(matches!(
            set.build("frobnicate", vec![]),
            Err(VMError::UnknownOpcode(ref name)) if name == "frobnicate"
        ));
    }
}
