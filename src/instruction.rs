//! Instruction and operand value model.
//!
//! An [`Instruction`] is a plain value: an opcode name, positional operands,
//! and an optional symbolic label. Instructions are built by the constructors
//! an [`instruction_set!`](crate::instruction_set) declaration generates, or
//! dynamically through [`InstructionSet`](crate::isa::InstructionSet), and
//! flow from the code generator through the optimizer into program storage
//! unchanged. Cloning an instruction yields a fully independent copy,
//! label included.

use crate::errors::VMError;
use crate::memory::{HeapObject, Pointer};
use std::fmt;

/// Opcode understood by every machine: does nothing.
///
/// Code generators emit labeled no-ops to anchor a label before the real
/// target instruction is known; the baseline optimizer rule removes them.
pub const NOP: &str = "nop";

/// Opcode understood by every machine: stops execution.
pub const HALT: &str = "halt";

/// Operand payload carried by an instruction, and the cell type of the
/// stack and heap containers.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// Empty cell marker used when a container auto-extends.
    Undef,
    /// 64-bit signed integer.
    Int(i64),
    /// Symbolic constant: an atom, or a label used as a jump target.
    Sym(String),
    /// Pointer into one of the machine's containers.
    Ptr(Pointer),
    /// Immutable tagged record.
    Obj(HeapObject),
    /// Nested instruction-specific data.
    List(Vec<Value>),
}

impl Value {
    /// Returns the type name for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undef => "Undef",
            Value::Int(_) => "Int",
            Value::Sym(_) => "Sym",
            Value::Ptr(_) => "Ptr",
            Value::Obj(_) => "Obj",
            Value::List(_) => "List",
        }
    }

    /// Returns the integer payload, if this value is an integer.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the symbol payload, if this value is a symbol.
    pub fn as_sym(&self) -> Option<&str> {
        match self {
            Value::Sym(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the pointer payload, if this value is a pointer.
    pub fn as_ptr(&self) -> Option<Pointer> {
        match self {
            Value::Ptr(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Sym(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Sym(v)
    }
}

impl From<Pointer> for Value {
    fn from(v: Pointer) -> Self {
        Value::Ptr(v)
    }
}

impl From<HeapObject> for Value {
    fn from(v: HeapObject) -> Self {
        Value::Obj(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::List(v)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undef => write!(f, "undef"),
            Value::Int(v) => write!(f, "{}", v),
            Value::Sym(v) => write!(f, "{}", v),
            Value::Ptr(v) => write!(f, "{}", v),
            Value::Obj(v) => write!(f, "{}", v),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
        }
    }
}

/// One instruction for an arbitrary virtual machine.
///
/// The opcode name is immutable after construction and always non-empty.
/// The label, when present, is the symbolic target branch instructions
/// resolve through [`ProgramStorage`](crate::program::ProgramStorage).
#[derive(Clone, Debug, PartialEq)]
pub struct Instruction {
    name: String,
    operands: Vec<Value>,
    label: Option<String>,
}

impl Instruction {
    /// Creates an instruction with the given opcode name and operands.
    pub fn new(name: impl Into<String>, operands: Vec<Value>) -> Self {
        let name = name.into();
        debug_assert!(!name.is_empty(), "instruction name must be non-empty");
        Self {
            name,
            operands,
            label: None,
        }
    }

    /// Creates an unlabeled no-op.
    pub fn nop() -> Self {
        Self::new(NOP, Vec::new())
    }

    /// Creates a halt instruction.
    pub fn halt() -> Self {
        Self::new(HALT, Vec::new())
    }

    /// Returns the opcode name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the positional operands.
    pub fn operands(&self) -> &[Value] {
        &self.operands
    }

    /// Returns the symbolic label, if any.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Attaches a label, replacing any existing one.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Sets or clears the label in place.
    pub fn set_label(&mut self, label: Option<String>) {
        self.label = label;
    }

    /// Returns the operand at `index`.
    ///
    /// Returns [`VMError::MissingOperand`] if the instruction carries fewer
    /// operands.
    pub fn operand(&self, index: usize) -> Result<&Value, VMError> {
        self.operands
            .get(index)
            .ok_or_else(|| VMError::MissingOperand {
                instruction: self.name.clone(),
                operand: index,
            })
    }

    /// Returns the integer operand at `index`.
    ///
    /// Returns [`VMError::TypeMismatch`] if the operand is not an integer.
    pub fn int_operand(&self, index: usize) -> Result<i64, VMError> {
        match self.operand(index)? {
            Value::Int(v) => Ok(*v),
            other => Err(self.mismatch(index, "Int", other.type_name())),
        }
    }

    /// Returns the symbol operand at `index`.
    ///
    /// Returns [`VMError::TypeMismatch`] if the operand is not a symbol.
    pub fn sym_operand(&self, index: usize) -> Result<&str, VMError> {
        match self.operand(index)? {
            Value::Sym(v) => Ok(v),
            other => Err(self.mismatch(index, "Sym", other.type_name())),
        }
    }

    /// Returns the pointer operand at `index`.
    ///
    /// Returns [`VMError::TypeMismatch`] if the operand is not a pointer.
    pub fn ptr_operand(&self, index: usize) -> Result<Pointer, VMError> {
        match self.operand(index)? {
            Value::Ptr(v) => Ok(*v),
            other => Err(self.mismatch(index, "Ptr", other.type_name())),
        }
    }

    /// Returns the heap-record operand at `index`.
    ///
    /// Returns [`VMError::TypeMismatch`] if the operand is not a record.
    pub fn obj_operand(&self, index: usize) -> Result<&HeapObject, VMError> {
        match self.operand(index)? {
            Value::Obj(v) => Ok(v),
            other => Err(self.mismatch(index, "Obj", other.type_name())),
        }
    }

    fn mismatch(&self, operand: usize, expected: &'static str, actual: &'static str) -> VMError {
        VMError::TypeMismatch {
            instruction: self.name.clone(),
            operand,
            expected,
            actual,
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(label) = &self.label {
            write!(f, "{}: ", label)?;
        }
        write!(f, "{}", self.name)?;
        for operand in &self.operands {
            write!(f, " {}", operand)?;
        }
        Ok(())
    }
}
