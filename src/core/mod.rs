//! Core engine types: players, values, tokens, definitions, state, RNG.
//!
//! This module contains the data every other layer reads. Nothing here
//! executes effects; see `effects` and `rules` for that.

pub mod player;
pub mod value;
pub mod token;
pub mod config;
pub mod rng;
pub mod action;
pub mod game_def;
pub mod state;

pub use player::PlayerId;
pub use value::{
    is_safe_integer, AttributeValue, ScalarValue, Value, ValueType, VarValue, MAX_SAFE_INTEGER,
    MIN_SAFE_INTEGER,
};
pub use token::{Token, TokenId};
pub use config::{
    AdjacencyDirection, EngineLimits, MarkerLatticeDef, PhaseId, TokenTypeDef, TurnOrderConfig,
    VarDef, VarKind, ZoneAdjacency, ZoneDef, ZoneId, ZoneOrdering, ZoneOwner, ZoneOwnerKind,
    ZoneVisibility,
};
pub use rng::{next_int, RngAlgorithm, RngState, RNG_VERSION};
pub use action::{ActionDef, ActionLimit, ActionPipelineDef, Atomicity, Move, PipelineStage};
pub use game_def::{GameDef, PhaseDef};
pub use state::{
    ActionUsage, CardDrivenRuntime, EligibilityOverride, FreeOperationGrant, GameState,
    InterruptFrame, LastingDuration, LastingEffect, TurnOrderState, UsageScope, VarMap,
};
