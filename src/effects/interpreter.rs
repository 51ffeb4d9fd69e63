//! Budgeted effect interpreter.
//!
//! `Interpreter` owns a working copy of the state for the length of one
//! top-level call. Every dispatched node is charged to a single `Budget`
//! before its handler runs, so nesting shape never changes how much work a
//! call may do. A pending choice stops the program where it stands and
//! surfaces as `EffectOutcome::Awaiting`.
//!
//! Handlers live next to their family:
//! - variables: here
//! - tokens, zones and markers: `tokens`
//! - control flow and randomness: `control`
//! - choices: `choice`
//! - phases, turns and card-driven bookkeeping: `turn_flow`

use im::OrdMap;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::budget::Budget;
use super::control::SubsetScoring;
use super::effect::{Effect, VarTarget};
use crate::core::{GameDef, GameState, PlayerId, ScalarValue, Value, ValueType, VarDef, VarKind, VarValue};
use crate::error::{KernelError, ReferenceKind};
use crate::eval::{eval_condition, eval_value, Bindings, EvalContext};
use crate::selectors::resolve_single_player_sel;
use crate::triggers::TriggerEvent;

/// Caller-supplied context for `apply_effect` / `apply_effects`.
#[derive(Clone, Debug)]
pub struct EffectContext<'a> {
    pub def: &'a GameDef,
    pub active_player: PlayerId,
    pub actor_player: PlayerId,
    /// Decision name -> chosen value, consumed by `chooseOne` / `chooseN`.
    pub move_params: OrdMap<String, Value>,
    /// Overrides `def.limits.max_effect_ops`.
    pub max_effect_ops: Option<usize>,
}

impl<'a> EffectContext<'a> {
    /// Context acting as the state's active player.
    pub fn new(def: &'a GameDef, state: &GameState) -> Self {
        Self {
            def,
            active_player: state.active_player,
            actor_player: state.active_player,
            move_params: OrdMap::new(),
            max_effect_ops: None,
        }
    }

    #[must_use]
    pub fn with_actor(mut self, actor: PlayerId) -> Self {
        self.actor_player = actor;
        self
    }

    #[must_use]
    pub fn with_param(mut self, decision: impl Into<String>, value: impl Into<Value>) -> Self {
        self.move_params.insert(decision.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_params(mut self, params: OrdMap<String, Value>) -> Self {
        self.move_params = params;
        self
    }

    #[must_use]
    pub fn with_max_effect_ops(mut self, max: usize) -> Self {
        self.max_effect_ops = Some(max);
        self
    }
}

/// A decision the caller must supply before the program can go on.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingChoice {
    pub decision: String,
    pub options: Vec<Value>,
    pub min: usize,
    pub max: usize,
}

/// State, events and bindings after a program ran (or stopped).
#[derive(Clone, Debug, PartialEq)]
pub struct EffectResult {
    pub state: GameState,
    pub emitted_events: Vec<TriggerEvent>,
    pub bindings: Bindings,
}

#[derive(Clone, Debug, PartialEq)]
pub enum EffectOutcome {
    Completed(EffectResult),
    /// Stopped at a choice; `result` holds everything applied before it.
    Awaiting { result: EffectResult, choice: PendingChoice },
}

impl EffectOutcome {
    #[must_use]
    pub fn result(&self) -> &EffectResult {
        match self {
            EffectOutcome::Completed(result) | EffectOutcome::Awaiting { result, .. } => result,
        }
    }

    #[must_use]
    pub fn state(&self) -> &GameState {
        &self.result().state
    }

    #[must_use]
    pub fn pending_choice(&self) -> Option<&PendingChoice> {
        match self {
            EffectOutcome::Completed(_) => None,
            EffectOutcome::Awaiting { choice, .. } => Some(choice),
        }
    }
}

/// Whether a program may go on after a node.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Flow {
    Continue,
    Await(PendingChoice),
}

/// Apply one effect to a state.
pub fn apply_effect(
    effect: &Effect,
    state: &GameState,
    bindings: &Bindings,
    ctx: &EffectContext<'_>,
) -> Result<EffectOutcome, KernelError> {
    apply_effects(std::slice::from_ref(effect), state, bindings, ctx)
}

/// Apply an effect program to a state under one budget.
///
/// The input state is never modified; on error nothing is returned.
pub fn apply_effects(
    effects: &[Effect],
    state: &GameState,
    bindings: &Bindings,
    ctx: &EffectContext<'_>,
) -> Result<EffectOutcome, KernelError> {
    let mut interp = Interpreter::new(ctx, state.clone());
    let mut bindings = bindings.clone();
    let flow = interp.run_list(effects, &mut bindings)?;
    Ok(interp.finish(flow, bindings))
}

pub(crate) struct Interpreter<'a> {
    pub(crate) def: &'a GameDef,
    pub(crate) state: GameState,
    pub(crate) events: Vec<TriggerEvent>,
    pub(crate) budget: Budget,
    pub(crate) active: PlayerId,
    pub(crate) actor: PlayerId,
    pub(crate) params: OrdMap<String, Value>,
    pub(crate) type_factions: FxHashMap<String, String>,
}

impl<'a> Interpreter<'a> {
    pub(crate) fn new(ctx: &EffectContext<'a>, state: GameState) -> Self {
        let max = ctx.max_effect_ops.unwrap_or(ctx.def.limits.max_effect_ops);
        Self {
            def: ctx.def,
            state,
            events: Vec::new(),
            budget: Budget::new(max),
            active: ctx.active_player,
            actor: ctx.actor_player,
            params: ctx.move_params.clone(),
            type_factions: ctx.def.type_faction_map(),
        }
    }

    pub(crate) fn finish(self, flow: Flow, bindings: Bindings) -> EffectOutcome {
        let result = EffectResult {
            state: self.state,
            emitted_events: self.events,
            bindings,
        };
        match flow {
            Flow::Continue => EffectOutcome::Completed(result),
            Flow::Await(choice) => EffectOutcome::Awaiting { result, choice },
        }
    }

    /// Read-only view for the evaluator and selector resolver.
    pub(crate) fn eval_ctx<'b>(&'b self, bindings: &'b Bindings) -> EvalContext<'b> {
        EvalContext::new(self.def, &self.state, bindings)
            .with_active(self.active)
            .with_actor(self.actor)
    }

    /// Run nodes in order, stopping at the first pending choice.
    pub(crate) fn run_list(&mut self, effects: &[Effect], bindings: &mut Bindings) -> Result<Flow, KernelError> {
        for effect in effects {
            if let Flow::Await(choice) = self.apply(effect, bindings)? {
                return Ok(Flow::Await(choice));
            }
        }
        Ok(Flow::Continue)
    }

    /// Charge the budget and dispatch one node.
    pub(crate) fn apply(&mut self, effect: &Effect, bindings: &mut Bindings) -> Result<Flow, KernelError> {
        let kind = effect.kind();
        self.budget.consume(kind)?;
        trace!(effect_kind = %kind, remaining = self.budget.remaining, "dispatch");

        match effect {
            // === Variables ===
            Effect::SetVar { target, var, value } => {
                let value = eval_value(value, &self.eval_ctx(bindings))?;
                self.update_var(target, var, bindings, |def, _| assign(def, value))?;
            }
            Effect::AddVar { target, var, delta } => {
                let delta = eval_value(delta, &self.eval_ctx(bindings))?;
                self.update_var(target, var, bindings, |def, old| add(def, old, delta))?;
            }

            // === Tokens, zones and markers ===
            Effect::CreateToken {
                token_type,
                zone,
                position,
                props,
                bind,
            } => self.create_token(token_type, zone, *position, props, bind.as_deref(), bindings)?,
            Effect::DestroyToken { token } => self.destroy_token(token, bindings)?,
            Effect::MoveToken {
                token,
                from,
                to,
                position,
            } => self.move_token(token, from.as_ref(), to, *position, bindings)?,
            Effect::MoveAll { from, to, filter } => self.move_all(from, to, filter, bindings)?,
            Effect::MoveTokenAdjacent { token, from, to } => {
                self.move_token_adjacent(token, from.as_ref(), to, bindings)?
            }
            Effect::Draw { from, to, count } => self.draw(from, to, count, bindings)?,
            Effect::Shuffle { zone } => self.shuffle(zone, bindings)?,
            Effect::SetTokenProp { token, prop, value } => self.set_token_prop(token, prop, value, bindings)?,
            Effect::SetMarker { zone, marker, state } => self.set_marker(zone, marker, state, bindings)?,
            Effect::ShiftMarker { zone, marker, delta } => self.shift_marker(zone, marker, delta, bindings)?,
            Effect::SetGlobalMarker { marker, state } => self.set_global_marker(marker, state, bindings)?,

            // === Control flow ===
            Effect::If { when, then, otherwise } => {
                let branch = if eval_condition(when, &self.eval_ctx(bindings))? {
                    then
                } else {
                    otherwise
                };
                return self.run_list(branch, bindings);
            }
            Effect::ForEach {
                bind,
                over,
                effects,
                limit,
                count_bind,
            } => return self.for_each(bind, over, effects, limit.as_ref(), count_bind.as_deref(), bindings),
            Effect::Reduce {
                item_bind,
                acc_bind,
                over,
                initial,
                next,
                result_bind,
                effects,
            } => return self.reduce(item_bind, acc_bind, over, initial, next, result_bind, effects, bindings),
            Effect::Let { bind, value, effects } => {
                let value: Value = eval_value(value, &self.eval_ctx(bindings))?.into();
                let mut scope = bindings.clone();
                scope.insert(bind.clone(), value);
                return self.run_list(effects, &mut scope);
            }
            Effect::RemoveByPriority {
                budget,
                groups,
                remaining_bind,
                effects,
            } => return self.remove_by_priority(budget, groups, remaining_bind.as_deref(), effects, bindings),
            Effect::EvaluateSubset {
                source,
                subset_size,
                subset_bind,
                compute,
                score,
                result_bind,
                best_subset_bind,
                effects,
            } => {
                let scoring = SubsetScoring {
                    subset_bind,
                    compute,
                    score,
                };
                return self.evaluate_subset(
                    source,
                    subset_size,
                    &scoring,
                    result_bind,
                    best_subset_bind.as_deref(),
                    effects,
                    bindings,
                );
            }

            // === Interaction ===
            Effect::ChooseOne { decision, bind, options } => return self.choose_one(decision, bind, options, bindings),
            Effect::ChooseN {
                decision,
                bind,
                options,
                min,
                max,
            } => return self.choose_n(decision, bind, options, min, max, bindings),
            Effect::RollRandom { bind, min, max, effects } => {
                return self.roll_random(bind, min, max, effects, bindings)
            }

            // === Turn flow ===
            Effect::AdvancePhase => return self.advance_phase(),
            Effect::GotoPhaseExact { phase } => return self.goto_phase_exact(phase),
            Effect::PushInterruptPhase { phase, resume_phase } => return self.push_interrupt_phase(phase, resume_phase),
            Effect::PopInterruptPhase => return self.pop_interrupt_phase(),

            // === Card-driven turn order ===
            Effect::GrantFreeOperation { player, action_ids } => {
                self.grant_free_operation(player, action_ids, bindings)?
            }
            Effect::SetEligibility { player, eligible } => self.set_eligibility(player, *eligible, bindings)?,
            Effect::AddLastingEffect { id, duration } => self.add_lasting_effect(id, *duration)?,
        }
        Ok(Flow::Continue)
    }

    /// Read, update and write back one variable, emitting a change event
    /// when the value actually changed.
    fn update_var(
        &mut self,
        target: &VarTarget,
        var: &str,
        bindings: &Bindings,
        update: impl FnOnce(&VarDef, VarValue) -> Result<VarValue, KernelError>,
    ) -> Result<(), KernelError> {
        let game = self.def;
        let (player, var_def) = match target {
            VarTarget::Global => {
                let var_def = game.global_var(var).ok_or_else(|| {
                    KernelError::unknown(ReferenceKind::GlobalVar, var, game.global_vars.iter().map(|v| v.name.clone()))
                })?;
                (None, var_def)
            }
            VarTarget::Player(sel) => {
                let player = resolve_single_player_sel(sel, &self.eval_ctx(bindings))?;
                let var_def = game.per_player_var(var).ok_or_else(|| {
                    KernelError::unknown(
                        ReferenceKind::PlayerVar,
                        var,
                        game.per_player_vars.iter().map(|v| v.name.clone()),
                    )
                })?;
                (Some(player), var_def)
            }
        };

        let old = match player {
            None => self.state.global_var(var),
            Some(p) => self.state.player_var(p, var),
        }
        .unwrap_or_else(|| var_def.initial_value());
        let new = update(var_def, old)?;
        if new == old {
            return Ok(());
        }

        match player {
            None => {
                self.state.global_vars.insert(var.to_string(), new);
            }
            Some(p) => {
                if let Some(vars) = self.state.player_vars.get_mut(p.index()) {
                    vars.insert(var.to_string(), new);
                }
            }
        }
        debug!(var, player = ?player, %old, %new, "variable changed");
        self.events.push(TriggerEvent::VarChanged {
            player,
            var: var.to_string(),
            old,
            new,
        });
        Ok(())
    }
}

/// `setVar`: ints are clamped, bools stored as is.
fn assign(var: &VarDef, value: ScalarValue) -> Result<VarValue, KernelError> {
    match (&var.kind, value) {
        (VarKind::Int { .. }, ScalarValue::Int(v)) => Ok(VarValue::Int(var.clamp(v))),
        (VarKind::Bool { .. }, ScalarValue::Bool(b)) => Ok(VarValue::Bool(b)),
        (VarKind::Int { .. }, other) => Err(KernelError::type_mismatch(
            ValueType::Int,
            other.value_type(),
            format!("setVar `{}`", var.name),
        )),
        (VarKind::Bool { .. }, other) => Err(KernelError::type_mismatch(
            ValueType::Bool,
            other.value_type(),
            format!("setVar `{}`", var.name),
        )),
    }
}

/// `addVar`: integer variables only, sum clamped.
fn add(var: &VarDef, old: VarValue, delta: ScalarValue) -> Result<VarValue, KernelError> {
    let context = || format!("addVar `{}`", var.name);
    let VarValue::Int(current) = old else {
        return Err(KernelError::type_mismatch(ValueType::Int, ValueType::Bool, context()));
    };
    let ScalarValue::Int(delta) = delta else {
        return Err(KernelError::type_mismatch(ValueType::Int, delta.value_type(), context()));
    };
    let sum = current
        .checked_add(delta)
        .ok_or_else(|| KernelError::IntegerOverflow {
            expr: format!("{} + {delta}", var.name),
        })?;
    Ok(VarValue::Int(var.clamp(sum)))
}
