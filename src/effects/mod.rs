//! Effect AST and its interpreter.
//!
//! Effects are the closed set of state changes a game definition can
//! express. `apply_effect` / `apply_effects` run them against a state under
//! one operation budget and return the next state, the events emitted and
//! the final bindings, or stop at a decision the caller has not answered.

mod budget;
mod choice;
mod control;
mod effect;
mod interpreter;
mod tokens;
mod turn_flow;

pub use budget::Budget;
pub use effect::{Effect, EffectKind, PriorityGroup, VarTarget};
pub use interpreter::{apply_effect, apply_effects, EffectContext, EffectOutcome, EffectResult, PendingChoice};

pub(crate) use interpreter::{Flow, Interpreter};
