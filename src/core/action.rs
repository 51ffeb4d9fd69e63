//! Action declarations, pipelines and requested moves.
//!
//! An action is the "verb" a player can request. It declares who may take
//! it, in which phases, how often, and either its own cost and effects or a
//! set of pipelines (conditionally-applicable effect programs) for the
//! dispatcher to choose between.
//!
//! A `Move` is a request to run an action: the action id plus the answers
//! to any decisions (`chooseOne`/`chooseN`) its effects will ask.

use im::OrdMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use super::config::PhaseId;
use super::state::UsageScope;
use super::value::Value;
use crate::effects::Effect;
use crate::eval::Condition;
use crate::selectors::PlayerSel;

/// Upper bound on how often an action may resolve within a scope.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionLimit {
    pub scope: UsageScope,
    pub max: u32,
}

/// A declared action.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActionDef {
    pub id: String,

    /// Who may take the action. Must include the executing player.
    pub actor: PlayerSel,

    /// Phases the action is allowed in. Empty allows every phase.
    pub phases: SmallVec<[PhaseId; 2]>,

    pub limits: Vec<ActionLimit>,

    /// Precondition checked before any pipeline.
    pub pre: Option<Condition>,

    /// Cost effects, used when the action declares no pipelines.
    pub cost: Vec<Effect>,

    /// Effects, used when the action declares no pipelines.
    pub effects: Vec<Effect>,
}

impl ActionDef {
    /// Create an action the active player may take in any phase.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            actor: PlayerSel::Active,
            phases: SmallVec::new(),
            limits: Vec::new(),
            pre: None,
            cost: Vec::new(),
            effects: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_actor(mut self, actor: PlayerSel) -> Self {
        self.actor = actor;
        self
    }

    #[must_use]
    pub fn in_phase(mut self, phase: impl Into<PhaseId>) -> Self {
        self.phases.push(phase.into());
        self
    }

    #[must_use]
    pub fn with_limit(mut self, scope: UsageScope, max: u32) -> Self {
        self.limits.push(ActionLimit { scope, max });
        self
    }

    #[must_use]
    pub fn with_pre(mut self, pre: Condition) -> Self {
        self.pre = Some(pre);
        self
    }

    #[must_use]
    pub fn with_cost(mut self, cost: Vec<Effect>) -> Self {
        self.cost = cost;
        self
    }

    #[must_use]
    pub fn with_effects(mut self, effects: Vec<Effect>) -> Self {
        self.effects = effects;
        self
    }
}

/// How a pipeline reacts to a stage that declines.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Atomicity {
    /// Any declined stage makes the whole move illegal.
    #[default]
    Atomic,
    /// Declined stages are skipped and recorded; later stages still run.
    Partial,
}

/// One ordered step of a pipeline.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PipelineStage {
    pub name: String,
    /// The stage declines when this is false.
    pub requires: Option<Condition>,
    pub effects: Vec<Effect>,
}

impl PipelineStage {
    pub fn new(name: impl Into<String>, effects: Vec<Effect>) -> Self {
        Self {
            name: name.into(),
            requires: None,
            effects,
        }
    }

    #[must_use]
    pub fn requires(mut self, condition: Condition) -> Self {
        self.requires = Some(condition);
        self
    }
}

/// A conditionally-applicable effect program bound to an action.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActionPipelineDef {
    pub id: String,
    pub action_id: String,

    /// Absent means always applicable.
    pub applicability: Option<Condition>,
    pub legality: Option<Condition>,

    pub cost_validation: Option<Condition>,
    pub cost_effects: Vec<Effect>,

    pub stages: Vec<PipelineStage>,
    pub atomicity: Atomicity,
}

impl ActionPipelineDef {
    pub fn new(id: impl Into<String>, action_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            action_id: action_id.into(),
            applicability: None,
            legality: None,
            cost_validation: None,
            cost_effects: Vec::new(),
            stages: Vec::new(),
            atomicity: Atomicity::Atomic,
        }
    }

    #[must_use]
    pub fn applicable_when(mut self, condition: Condition) -> Self {
        self.applicability = Some(condition);
        self
    }

    #[must_use]
    pub fn legal_when(mut self, condition: Condition) -> Self {
        self.legality = Some(condition);
        self
    }

    #[must_use]
    pub fn with_cost(mut self, validation: Option<Condition>, effects: Vec<Effect>) -> Self {
        self.cost_validation = validation;
        self.cost_effects = effects;
        self
    }

    #[must_use]
    pub fn with_stage(mut self, stage: PipelineStage) -> Self {
        self.stages.push(stage);
        self
    }

    #[must_use]
    pub fn partial(mut self) -> Self {
        self.atomicity = Atomicity::Partial;
        self
    }
}

/// A request to execute an action.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Move {
    pub action_id: String,

    /// Decision name -> chosen value.
    #[serde(default)]
    pub params: OrdMap<String, Value>,

    /// Run without paying costs. Requires a pending free-operation grant.
    #[serde(default)]
    pub free_operation: bool,
}

impl Move {
    pub fn new(action_id: impl Into<String>) -> Self {
        Self {
            action_id: action_id.into(),
            params: OrdMap::new(),
            free_operation: false,
        }
    }

    /// Answer a decision (builder pattern).
    #[must_use]
    pub fn with_param(mut self, decision: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(decision.into(), value.into());
        self
    }

    #[must_use]
    pub fn free(mut self) -> Self {
        self.free_operation = true;
        self
    }
}
