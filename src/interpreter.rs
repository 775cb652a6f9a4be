//! Generic interpreter engine.
//!
//! The engine executes one loaded instruction stream on one logical thread
//! of control. [`Machine`] is the state every virtual machine shares -
//! program storage, the program counter, the breakpoint set, and the
//! property broker observers watch registers through. A concrete machine
//! embeds a [`Machine`], adds its own state (stack, heap, extra registers),
//! and implements [`Interpreter::dispatch`] for its opcode set; the
//! fetch-decode-execute loop, breakpoints, and single-stepping come from
//! the trait's provided methods.
//!
//! # Execution states
//!
//! A loaded machine is *ready*; [`Interpreter::run`] drives it until a
//! `halt` instruction executes (`Ok(true)`) or execution suspends in front
//! of a breakpointed instruction (`Ok(false)`). Suspension is a synchronous
//! return - resuming is simply calling `run` or `step` again. A one-shot
//! flag keeps the same breakpoint from re-triggering on the step that
//! resumes from it. Errors (unknown opcode, unresolved label, out-of-bounds
//! fetch) propagate out of `run`/`step` uncaught; the engine never retries.

use crate::errors::VMError;
use crate::instruction::{HALT, Instruction, NOP};
use crate::memory::{Pointer, Target};
use crate::observe::{PropertyBroker, PropertyObserver};
use crate::program::{Loc, ProgramStorage};
use std::collections::BTreeSet;
use std::rc::Rc;

/// Outcome an instruction handler reports to the engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flow {
    /// Keep executing with the next instruction.
    Continue,
    /// The machine halted.
    Halt,
}

/// Outcome of a single interpreter step.
///
/// `Halted` and `Breakpoint` are control-flow results, not failures; they
/// are the two ways a full run ends.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    /// The instruction executed; the machine can continue.
    Ran,
    /// A halt instruction executed.
    Halted,
    /// Execution is suspended in front of a breakpointed instruction.
    Breakpoint,
}

/// Machine state shared by every virtual machine: program storage, the
/// program counter, breakpoints, and register observation.
pub struct Machine {
    ps: ProgramStorage,
    pc: Pointer,
    breakpoints: BTreeSet<usize>,
    breakpoint_hit: bool,
    observers: PropertyBroker,
}

impl Machine {
    /// Creates a machine with empty program storage and the PC at zero.
    pub fn new() -> Self {
        Self {
            ps: ProgramStorage::new(),
            pc: Pointer::new(Target::Program, 0),
            breakpoints: BTreeSet::new(),
            breakpoint_hit: false,
            observers: PropertyBroker::new("machine"),
        }
    }

    /// Returns the program storage.
    pub fn ps(&self) -> &ProgramStorage {
        &self.ps
    }

    /// Loads a program into storage, replacing any previous one.
    pub fn load(&mut self, instructions: Vec<Instruction>) -> Result<(), VMError> {
        self.ps.load(instructions)
    }

    /// Restores the PC to zero and clears the one-shot breakpoint flag.
    /// Breakpoints themselves stay set.
    pub fn reset(&mut self) {
        self.set_pc(0);
        self.breakpoint_hit = false;
    }

    /// Returns the program counter.
    pub fn pc(&self) -> Pointer {
        self.pc
    }

    /// Moves the PC, notifying `pc` property observers around the change.
    pub fn set_pc(&mut self, offset: i64) {
        self.observers.will_change("pc");
        self.pc.set(offset);
        self.observers.did_change();
    }

    /// Advances the PC by `by` instructions.
    pub fn advance_pc(&mut self, by: i64) {
        self.set_pc(self.pc.offset() + by);
    }

    /// Moves the PC to the given location, resolving labels through
    /// program storage.
    pub fn jump<'a>(&mut self, loc: impl Into<Loc<'a>>) -> Result<(), VMError> {
        let ptr = self.ps.ptr(loc)?;
        self.set_pc(ptr.offset());
        Ok(())
    }

    /// Fetches the instruction the PC addresses.
    pub fn fetch(&self) -> Result<Instruction, VMError> {
        Ok(self.ps.get(&self.pc)?.clone())
    }

    /// Sets a breakpoint at the instruction at `index`.
    ///
    /// Setting a breakpoint at the current PC arms the one-shot flag, so
    /// the instruction about to execute runs before the breakpoint can
    /// trigger there.
    pub fn set_breakpoint(&mut self, index: usize) {
        self.breakpoints.insert(index);
        if self.pc == index as i64 {
            self.breakpoint_hit = true;
        }
    }

    /// Replaces the whole breakpoint set.
    pub fn set_breakpoints(&mut self, indices: impl IntoIterator<Item = usize>) {
        self.breakpoints = indices.into_iter().collect();
        let at = self.pc.offset();
        if at >= 0 && self.breakpoints.contains(&(at as usize)) {
            self.breakpoint_hit = true;
        }
    }

    /// Removes the breakpoint at `index`, returning whether one was set.
    pub fn clear_breakpoint(&mut self, index: usize) -> bool {
        self.breakpoints.remove(&index)
    }

    /// Removes all breakpoints.
    pub fn clear_breakpoints(&mut self) {
        self.breakpoints.clear();
    }

    /// Returns `true` if a breakpoint is set at `index`.
    pub fn has_breakpoint(&self, index: usize) -> bool {
        self.breakpoints.contains(&index)
    }

    /// Returns the breakpointed instruction indices in ascending order.
    pub fn breakpoints(&self) -> Vec<usize> {
        self.breakpoints.iter().copied().collect()
    }

    /// Registers a property observer for this machine's registers
    /// (the engine notifies `pc`; concrete machines may notify more).
    pub fn add_observer<O>(&mut self, observer: &Rc<O>, properties: Option<&[&str]>)
    where
        O: PropertyObserver + 'static,
    {
        self.observers.add_observer(observer, properties);
    }

    /// Removes a property observer's registration, or part of it.
    pub fn remove_observer<O>(&mut self, observer: &Rc<O>, properties: Option<&[&str]>)
    where
        O: PropertyObserver + 'static,
    {
        self.observers.remove_observer(observer, properties);
    }

    /// Notifies register observers that `property` is about to change.
    /// For concrete machines mutating their own registers; pair with
    /// [`Machine::did_change`].
    pub fn will_change(&mut self, property: &str) {
        self.observers.will_change(property);
    }

    /// Closes the pending register change notification.
    pub fn did_change(&mut self) {
        self.observers.did_change();
    }
}

impl Default for Machine {
    fn default() -> Self {
        Self::new()
    }
}

/// A concrete virtual machine.
///
/// Implementors supply access to their embedded [`Machine`] and a
/// [`dispatch`](Interpreter::dispatch) method for their opcode set;
/// loading, running, stepping, and breakpoint control are provided.
pub trait Interpreter {
    /// Returns the shared machine state.
    fn machine(&self) -> &Machine;

    /// Returns the shared machine state mutably.
    fn machine_mut(&mut self) -> &mut Machine;

    /// Executes one decoded instruction.
    ///
    /// The universal opcodes `nop` and `halt` never reach this method; the
    /// engine handles them itself. The fallback arm of an implementation's
    /// match must report [`VMError::UnknownOpcode`] naming the opcode.
    /// Handlers mutate machine state and may move the PC, e.g. through
    /// [`Machine::jump`].
    fn dispatch(&mut self, instruction: &Instruction) -> Result<Flow, VMError>;

    /// Loads a program, replacing any previous one.
    fn load(&mut self, instructions: Vec<Instruction>) -> Result<(), VMError> {
        self.machine_mut().load(instructions)
    }

    /// Restores the PC to zero without clearing breakpoints.
    fn reset(&mut self) {
        self.machine_mut().reset();
    }

    /// Performs one computation step.
    ///
    /// If the PC sits on a breakpointed instruction and the machine did
    /// not just suspend there, execution suspends *before* that
    /// instruction runs and the call returns [`Step::Breakpoint`].
    /// Otherwise the instruction at the PC is fetched, the PC advances by
    /// one, and the instruction is dispatched (which may move the PC
    /// again).
    fn step(&mut self) -> Result<Step, VMError> {
        let machine = self.machine_mut();
        let at = machine.pc.offset();
        if !machine.breakpoint_hit && at >= 0 && machine.breakpoints.contains(&(at as usize)) {
            machine.breakpoint_hit = true;
            return Ok(Step::Breakpoint);
        }
        machine.breakpoint_hit = false;

        let instruction = machine.fetch()?;
        machine.advance_pc(1);

        let flow = match instruction.name() {
            NOP => Flow::Continue,
            HALT => Flow::Halt,
            _ => self.dispatch(&instruction)?,
        };
        Ok(match flow {
            Flow::Continue => Step::Ran,
            Flow::Halt => Step::Halted,
        })
    }

    /// Runs the loaded program by stepping until it halts or suspends.
    ///
    /// Returns `Ok(true)` on halt and `Ok(false)` on breakpoint
    /// suspension; any error aborts the run.
    fn run(&mut self) -> Result<bool, VMError> {
        loop {
            match self.step()? {
                Step::Ran => {}
                Step::Halted => return Ok(true),
                Step::Breakpoint => return Ok(false),
            }
        }
    }

    /// Sets a breakpoint at the instruction at `index`.
    fn set_breakpoint(&mut self, index: usize) {
        self.machine_mut().set_breakpoint(index);
    }

    /// Removes the breakpoint at `index`, returning whether one was set.
    fn clear_breakpoint(&mut self, index: usize) -> bool {
        self.machine_mut().clear_breakpoint(index)
    }

    /// Returns the breakpointed instruction indices in ascending order.
    fn breakpoints(&self) -> Vec<usize> {
        self.machine().breakpoints()
    }
}
