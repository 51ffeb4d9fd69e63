//! Move dispatch and turn bookkeeping.
//!
//! - `engine`: `apply_move` and `initial_state`
//! - `trace`: the audit trail a move returns
//! - `turn_order`: how the active player advances at turn end

pub mod engine;
pub mod trace;
pub(crate) mod turn_order;

pub use engine::{apply_move, initial_state, ApplyMoveResult, IllegalMove, IllegalReason, MoveError, MoveOutcome};
pub use trace::{PartialStep, TraceEntry};
