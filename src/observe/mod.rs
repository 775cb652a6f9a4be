//! Change-notification protocol.
//!
//! Lets external tools (debuggers, visualizers) react to every mutation of
//! machine state without the mutated object knowing about them. Two event
//! families exist, each strictly paired - every `will_*` call is followed by
//! exactly one matching `did_*` call, and pairs never nest:
//!
//! - **Property changes** ([`PropertyBroker`]): named register-level values
//!   such as the program counter. Observers filter by property name or
//!   watch everything.
//! - **Range changes** ([`RangeBroker`]): spans of cells in a container,
//!   split into in-place change, growth, and shrinkage. Ranges are
//!   half-open (`to` exclusive) and never empty.
//!
//! Observers are held weakly: dropping the last strong reference silently
//! ends delivery. Observers must not mutate the observed machine from
//! inside a callback; the machine is single-threaded and mid-mutation when
//! callbacks fire.

mod broker;
mod interface;

pub use broker::{PropertyBroker, RangeBroker};
pub use interface::{PropertyObserver, RangeObserver};
