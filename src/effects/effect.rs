//! Effect definitions.
//!
//! An effect program is a list of `Effect` nodes run strictly in order.
//! Nodes nest (bodies of `if`, `forEach`, `let`, ...) without limit; the
//! shared operation budget bounds the total work.
//!
//! ## Families
//!
//! - Variables: `SetVar`, `AddVar`
//! - Tokens and zones: `CreateToken`, `DestroyToken`, `MoveToken`, `MoveAll`,
//!   `MoveTokenAdjacent`, `Draw`, `Shuffle`, `SetTokenProp`
//! - Markers: `SetMarker`, `ShiftMarker`, `SetGlobalMarker`
//! - Control flow: `If`, `ForEach`, `Reduce`, `Let`, `RemoveByPriority`,
//!   `EvaluateSubset`
//! - Interaction: `ChooseOne`, `ChooseN`, `RollRandom`
//! - Turn flow: `AdvancePhase`, `GotoPhaseExact`, `PushInterruptPhase`,
//!   `PopInterruptPhase`
//! - Card-driven turn order: `GrantFreeOperation`, `SetEligibility`,
//!   `AddLastingEffect`

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::{LastingDuration, PhaseId};
use crate::eval::{Condition, Query, TokenFilter, ValueExpr};
use crate::selectors::{PlayerSel, TokenSel, ZoneSel};
use crate::zones::ZonePosition;

/// Where a variable effect writes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VarTarget {
    Global,
    /// Must resolve to exactly one player.
    Player(PlayerSel),
}

/// One tier of a `RemoveByPriority`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorityGroup {
    /// Binding each candidate token is held in while `to` is resolved.
    pub bind: String,
    pub over: Query,
    pub to: ZoneSel,
    pub from: Option<ZoneSel>,
}

/// An effect node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Effect {
    // === Variables ===

    /// Integers are clamped to the declared bounds.
    SetVar {
        target: VarTarget,
        var: String,
        value: ValueExpr,
    },

    /// Integer variables only; the sum is clamped.
    AddVar {
        target: VarTarget,
        var: String,
        delta: ValueExpr,
    },

    // === Tokens and zones ===

    /// Mint a `tok_<type>_<ordinal>` token with the type's default props.
    CreateToken {
        token_type: String,
        zone: ZoneSel,
        #[serde(default)]
        position: ZonePosition,
        #[serde(default)]
        props: Vec<(String, ValueExpr)>,
        /// Binds the new token in the current scope.
        bind: Option<String>,
    },

    DestroyToken {
        token: TokenSel,
    },

    /// `from`, when given, must be the token's current zone.
    MoveToken {
        token: TokenSel,
        from: Option<ZoneSel>,
        to: ZoneSel,
        #[serde(default)]
        position: ZonePosition,
    },

    /// Move every matching token as one block onto the top of `to`,
    /// keeping their relative order.
    MoveAll {
        from: ZoneSel,
        to: ZoneSel,
        #[serde(default)]
        filter: Vec<TokenFilter>,
    },

    /// Move to the top of a zone adjacent to the token's current zone.
    MoveTokenAdjacent {
        token: TokenSel,
        from: Option<ZoneSel>,
        to: ZoneSel,
    },

    /// Move up to `count` tokens, one at a time, from the top of `from`
    /// onto the top of `to`.
    Draw {
        from: ZoneSel,
        to: ZoneSel,
        count: ValueExpr,
    },

    Shuffle {
        zone: ZoneSel,
    },

    SetTokenProp {
        token: TokenSel,
        prop: String,
        value: ValueExpr,
    },

    // === Markers ===

    SetMarker {
        zone: ZoneSel,
        marker: String,
        state: ValueExpr,
    },

    /// Step along the lattice, stopping at either end.
    ShiftMarker {
        zone: ZoneSel,
        marker: String,
        delta: ValueExpr,
    },

    SetGlobalMarker {
        marker: String,
        state: ValueExpr,
    },

    // === Control flow ===

    If {
        when: Condition,
        then: Vec<Effect>,
        #[serde(default)]
        otherwise: Vec<Effect>,
    },

    /// `limit` caps the iterations and must be positive. `count_bind`
    /// receives the number of iterations run, in the enclosing scope.
    ForEach {
        bind: String,
        over: Query,
        effects: Vec<Effect>,
        limit: Option<ValueExpr>,
        count_bind: Option<String>,
    },

    /// Fold `next` over the query, then run `effects` with the result bound.
    Reduce {
        item_bind: String,
        acc_bind: String,
        over: Query,
        initial: ValueExpr,
        next: ValueExpr,
        result_bind: String,
        #[serde(default)]
        effects: Vec<Effect>,
    },

    Let {
        bind: String,
        value: ValueExpr,
        effects: Vec<Effect>,
    },

    /// Spend `budget` removals across the groups in order, moving each
    /// candidate token to its group's destination.
    RemoveByPriority {
        budget: ValueExpr,
        groups: Vec<PriorityGroup>,
        remaining_bind: Option<String>,
        #[serde(default)]
        effects: Vec<Effect>,
    },

    /// Score every `subset_size` subset of `source` by running `compute` on
    /// a scratch copy of the state, then run `effects` with the best score
    /// (and subset) bound. The first best subset wins ties.
    EvaluateSubset {
        source: Query,
        subset_size: ValueExpr,
        subset_bind: String,
        compute: Vec<Effect>,
        score: ValueExpr,
        result_bind: String,
        best_subset_bind: Option<String>,
        #[serde(default)]
        effects: Vec<Effect>,
    },

    // === Interaction ===

    ChooseOne {
        decision: String,
        bind: String,
        options: Query,
    },

    ChooseN {
        decision: String,
        bind: String,
        options: Query,
        min: ValueExpr,
        max: ValueExpr,
    },

    RollRandom {
        bind: String,
        min: ValueExpr,
        max: ValueExpr,
        effects: Vec<Effect>,
    },

    // === Turn flow ===

    AdvancePhase,

    /// Jump forward within the turn, skipping intermediate phases.
    GotoPhaseExact {
        phase: PhaseId,
    },

    PushInterruptPhase {
        phase: PhaseId,
        resume_phase: PhaseId,
    },

    PopInterruptPhase,

    // === Card-driven turn order ===

    /// An empty action list covers any action.
    GrantFreeOperation {
        player: PlayerSel,
        #[serde(default)]
        action_ids: Vec<String>,
    },

    /// Queue an eligibility change for the next turn boundary.
    SetEligibility {
        player: PlayerSel,
        eligible: bool,
    },

    AddLastingEffect {
        id: String,
        duration: LastingDuration,
    },
}

/// Tag of an effect node, used in budget and validation errors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EffectKind {
    SetVar,
    AddVar,
    CreateToken,
    DestroyToken,
    MoveToken,
    MoveAll,
    MoveTokenAdjacent,
    Draw,
    Shuffle,
    SetTokenProp,
    SetMarker,
    ShiftMarker,
    SetGlobalMarker,
    If,
    ForEach,
    Reduce,
    Let,
    RemoveByPriority,
    EvaluateSubset,
    ChooseOne,
    ChooseN,
    RollRandom,
    AdvancePhase,
    GotoPhaseExact,
    PushInterruptPhase,
    PopInterruptPhase,
    GrantFreeOperation,
    SetEligibility,
    AddLastingEffect,
}

impl EffectKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            EffectKind::SetVar => "setVar",
            EffectKind::AddVar => "addVar",
            EffectKind::CreateToken => "createToken",
            EffectKind::DestroyToken => "destroyToken",
            EffectKind::MoveToken => "moveToken",
            EffectKind::MoveAll => "moveAll",
            EffectKind::MoveTokenAdjacent => "moveTokenAdjacent",
            EffectKind::Draw => "draw",
            EffectKind::Shuffle => "shuffle",
            EffectKind::SetTokenProp => "setTokenProp",
            EffectKind::SetMarker => "setMarker",
            EffectKind::ShiftMarker => "shiftMarker",
            EffectKind::SetGlobalMarker => "setGlobalMarker",
            EffectKind::If => "if",
            EffectKind::ForEach => "forEach",
            EffectKind::Reduce => "reduce",
            EffectKind::Let => "let",
            EffectKind::RemoveByPriority => "removeByPriority",
            EffectKind::EvaluateSubset => "evaluateSubset",
            EffectKind::ChooseOne => "chooseOne",
            EffectKind::ChooseN => "chooseN",
            EffectKind::RollRandom => "rollRandom",
            EffectKind::AdvancePhase => "advancePhase",
            EffectKind::GotoPhaseExact => "gotoPhaseExact",
            EffectKind::PushInterruptPhase => "pushInterruptPhase",
            EffectKind::PopInterruptPhase => "popInterruptPhase",
            EffectKind::GrantFreeOperation => "grantFreeOperation",
            EffectKind::SetEligibility => "setEligibility",
            EffectKind::AddLastingEffect => "addLastingEffect",
        }
    }
}

impl fmt::Display for EffectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Effect {
    #[must_use]
    pub fn kind(&self) -> EffectKind {
        match self {
            Effect::SetVar { .. } => EffectKind::SetVar,
            Effect::AddVar { .. } => EffectKind::AddVar,
            Effect::CreateToken { .. } => EffectKind::CreateToken,
            Effect::DestroyToken { .. } => EffectKind::DestroyToken,
            Effect::MoveToken { .. } => EffectKind::MoveToken,
            Effect::MoveAll { .. } => EffectKind::MoveAll,
            Effect::MoveTokenAdjacent { .. } => EffectKind::MoveTokenAdjacent,
            Effect::Draw { .. } => EffectKind::Draw,
            Effect::Shuffle { .. } => EffectKind::Shuffle,
            Effect::SetTokenProp { .. } => EffectKind::SetTokenProp,
            Effect::SetMarker { .. } => EffectKind::SetMarker,
            Effect::ShiftMarker { .. } => EffectKind::ShiftMarker,
            Effect::SetGlobalMarker { .. } => EffectKind::SetGlobalMarker,
            Effect::If { .. } => EffectKind::If,
            Effect::ForEach { .. } => EffectKind::ForEach,
            Effect::Reduce { .. } => EffectKind::Reduce,
            Effect::Let { .. } => EffectKind::Let,
            Effect::RemoveByPriority { .. } => EffectKind::RemoveByPriority,
            Effect::EvaluateSubset { .. } => EffectKind::EvaluateSubset,
            Effect::ChooseOne { .. } => EffectKind::ChooseOne,
            Effect::ChooseN { .. } => EffectKind::ChooseN,
            Effect::RollRandom { .. } => EffectKind::RollRandom,
            Effect::AdvancePhase => EffectKind::AdvancePhase,
            Effect::GotoPhaseExact { .. } => EffectKind::GotoPhaseExact,
            Effect::PushInterruptPhase { .. } => EffectKind::PushInterruptPhase,
            Effect::PopInterruptPhase => EffectKind::PopInterruptPhase,
            Effect::GrantFreeOperation { .. } => EffectKind::GrantFreeOperation,
            Effect::SetEligibility { .. } => EffectKind::SetEligibility,
            Effect::AddLastingEffect { .. } => EffectKind::AddLastingEffect,
        }
    }

    // === Constructors ===

    pub fn set_global(var: impl Into<String>, value: impl Into<ValueExpr>) -> Self {
        Effect::SetVar {
            target: VarTarget::Global,
            var: var.into(),
            value: value.into(),
        }
    }

    pub fn add_global(var: impl Into<String>, delta: impl Into<ValueExpr>) -> Self {
        Effect::AddVar {
            target: VarTarget::Global,
            var: var.into(),
            delta: delta.into(),
        }
    }

    pub fn add_player_var(player: PlayerSel, var: impl Into<String>, delta: impl Into<ValueExpr>) -> Self {
        Effect::AddVar {
            target: VarTarget::Player(player),
            var: var.into(),
            delta: delta.into(),
        }
    }

    pub fn create_token(token_type: impl Into<String>, zone: ZoneSel) -> Self {
        Effect::CreateToken {
            token_type: token_type.into(),
            zone,
            position: ZonePosition::Top,
            props: Vec::new(),
            bind: None,
        }
    }

    pub fn move_token(token: TokenSel, to: ZoneSel, position: ZonePosition) -> Self {
        Effect::MoveToken {
            token,
            from: None,
            to,
            position,
        }
    }

    pub fn draw(from: ZoneSel, to: ZoneSel, count: impl Into<ValueExpr>) -> Self {
        Effect::Draw {
            from,
            to,
            count: count.into(),
        }
    }

    pub fn if_then(when: Condition, then: Vec<Effect>) -> Self {
        Effect::If {
            when,
            then,
            otherwise: Vec::new(),
        }
    }

    pub fn for_each(bind: impl Into<String>, over: Query, effects: Vec<Effect>) -> Self {
        Effect::ForEach {
            bind: bind.into(),
            over,
            effects,
            limit: None,
            count_bind: None,
        }
    }

    pub fn choose_one(decision: impl Into<String>, bind: impl Into<String>, options: Query) -> Self {
        Effect::ChooseOne {
            decision: decision.into(),
            bind: bind.into(),
            options,
        }
    }
}
