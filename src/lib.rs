//! # tabletop-kernel
//!
//! A deterministic execution kernel for declarative turn-based board games.
//!
//! ## Design Principles
//!
//! 1. **Definition-Driven**: No hardcoded zones, variables, phases or
//!    actions. A `GameDef` declares them and the kernel executes against it.
//!
//! 2. **Deterministic**: Same definition, state, seed and move produce the
//!    same output state byte for byte. All randomness flows through the
//!    serialized `RngState`.
//!
//! 3. **Bounded**: Every effect dispatch is charged to one operation budget
//!    per call, and queries, subsets and trigger cascades have hard limits.
//!
//! ## Architecture
//!
//! - **Persistent Data Structures**: O(1) state snapshots via `im-rs`, so a
//!   failed call leaves the caller's state untouched.
//!
//! - **Closed ASTs**: Effects, conditions, value expressions and queries are
//!   sum types dispatched by exhaustive matching.
//!
//! - **Explicit suspension**: A decision the move did not answer stops the
//!   program and surfaces as a pending choice.
//!
//! ## Modules
//!
//! - `core`: Players, values, tokens, definitions, state, RNG
//! - `zones`: Token placement within zones
//! - `selectors`: Player, zone and token selectors
//! - `eval`: Conditions, value expressions and queries
//! - `stacking`: Zone capacity constraints
//! - `effects`: Effect AST and interpreter
//! - `triggers`: Events and event-driven triggers
//! - `rules`: Move dispatch, turn order, initial state
//! - `error`: Structured failures

pub mod core;
pub mod effects;
pub mod error;
pub mod eval;
pub mod rules;
pub mod selectors;
pub mod stacking;
pub mod triggers;
pub mod zones;

// Re-export commonly used types
pub use crate::core::{
    ActionDef, ActionPipelineDef, Atomicity, EngineLimits, GameDef, GameState, Move, PhaseDef, PhaseId,
    PipelineStage, PlayerId, RngState, ScalarValue, Token, TokenId, TurnOrderConfig, UsageScope, Value,
    VarDef, VarValue, ZoneDef, ZoneId,
};

pub use crate::core::rng::next_int;

pub use crate::zones::ZonePosition;

pub use crate::selectors::{
    resolve_player_sel, resolve_single_player_sel, resolve_single_zone_sel, resolve_zone_sel, PlayerSel,
    TokenSel, ZoneSel,
};

pub use crate::eval::{Bindings, Condition, EvalContext, Query, TokenFilter, ValueExpr};

pub use crate::stacking::{
    check_stacking_constraints, validate_initial_placements, StackingConstraint, StackingViolation,
};

pub use crate::effects::{
    apply_effect, apply_effects, Effect, EffectContext, EffectKind, EffectOutcome, EffectResult, PendingChoice,
};

pub use crate::triggers::{EventMatcher, TriggerDef, TriggerEvent};

pub use crate::rules::{
    apply_move, initial_state, ApplyMoveResult, IllegalMove, IllegalReason, MoveError, MoveOutcome, TraceEntry,
};

pub use crate::error::KernelError;
