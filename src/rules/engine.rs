//! Move dispatcher.
//!
//! `apply_move` takes a state and a requested `Move` and either returns the
//! next state with its audit trail, stops at a decision the move did not
//! answer, or reports why the move cannot be made.
//!
//! ## Lifecycle
//!
//! 1. Action lookup, actor, phase, usage limits, precondition
//! 2. Free-operation grant (card-driven turn order only)
//! 3. Pipeline selection: exactly one applicable pipeline, or none declared
//! 4. Legality, usage counters, cost, stages
//! 5. `ActionResolved` event, then the trigger cascade
//!
//! Illegal moves are ordinary outcomes (`MoveError::Illegal`); evaluation
//! failures mean the definition is defective (`MoveError::Eval`). The input
//! state is never modified either way.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::trace::{PartialStep, TraceEntry};
use crate::core::{
    ActionDef, ActionPipelineDef, Atomicity, GameDef, GameState, Move, PlayerId, TurnOrderState, UsageScope,
};
use crate::effects::{EffectContext, Flow, Interpreter, PendingChoice};
use crate::error::KernelError;
use crate::eval::{eval_optional, Bindings};
use crate::selectors::resolve_player_sel;
use crate::triggers::{fire_triggers, TriggerEvent};

/// Why a move was rejected.
#[derive(Clone, Debug, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum IllegalReason {
    #[error("unknown action")]
    UnknownAction,
    #[error("the active player may not take this action")]
    ActorNotAllowed,
    #[error("not allowed in the current phase")]
    WrongPhase,
    #[error("{scope:?} limit of {max} reached")]
    LimitReached { scope: UsageScope, max: u32 },
    #[error("precondition failed")]
    PreconditionFailed,
    #[error("no pipeline applies")]
    NotApplicable,
    #[error("pipeline legality condition failed")]
    FailsLegality,
    #[error("cost cannot be paid")]
    CostUnaffordable,
    #[error("stage `{stage}` declined")]
    StageDeclined { stage: String },
    #[error("no free operation granted")]
    FreeOperationNotGranted,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IllegalMove {
    pub action_id: String,
    pub reason: IllegalReason,
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum MoveError {
    #[error("illegal move `{}`: {}", .0.action_id, .0.reason)]
    Illegal(IllegalMove),
    #[error(transparent)]
    Eval(#[from] KernelError),
}

impl MoveError {
    /// The rejection reason, if the move was illegal rather than broken.
    #[must_use]
    pub fn illegal_reason(&self) -> Option<&IllegalReason> {
        match self {
            MoveError::Illegal(illegal) => Some(&illegal.reason),
            MoveError::Eval(_) => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ApplyMoveResult {
    pub state: GameState,
    pub trace: Vec<TraceEntry>,
    pub emitted_events: Vec<TriggerEvent>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum MoveOutcome {
    Applied(ApplyMoveResult),
    /// The move must be resubmitted with this decision answered.
    Awaiting(PendingChoice),
}

impl MoveOutcome {
    #[must_use]
    pub fn applied(&self) -> Option<&ApplyMoveResult> {
        match self {
            MoveOutcome::Applied(result) => Some(result),
            MoveOutcome::Awaiting(_) => None,
        }
    }
}

/// Dispatch one move for the active player.
pub fn apply_move(def: &GameDef, state: &GameState, mv: &Move) -> Result<MoveOutcome, MoveError> {
    let illegal = |reason: IllegalReason| {
        debug!(action_id = %mv.action_id, %reason, "move rejected");
        MoveError::Illegal(IllegalMove {
            action_id: mv.action_id.clone(),
            reason,
        })
    };

    let Some(action) = def.action(&mv.action_id) else {
        return Err(illegal(IllegalReason::UnknownAction));
    };
    let actor = state.active_player;
    let bindings: Bindings = mv.params.clone();
    let ctx = EffectContext::new(def, state).with_params(mv.params.clone());
    let mut interp = Interpreter::new(&ctx, state.clone());

    if let Some(reason) = admission(&interp, action, &bindings)? {
        return Err(illegal(reason));
    }

    let mut trace = Vec::new();
    if mv.free_operation {
        if !consume_grant(&mut interp.state, actor, &action.id) {
            return Err(illegal(IllegalReason::FreeOperationNotGranted));
        }
        trace.push(TraceEntry::FreeOperationConsumed {
            player: actor,
            action_id: action.id.clone(),
        });
    }

    let pipeline = select_pipeline(def, &interp, action, &bindings)?;
    let mut scope = bindings;
    let flow = match pipeline {
        Some(pipeline) => {
            debug!(action_id = %action.id, pipeline_id = %pipeline.id, "pipeline selected");
            trace.push(TraceEntry::PipelineSelected {
                action_id: action.id.clone(),
                pipeline_id: pipeline.id.clone(),
            });
            if !eval_optional(pipeline.legality.as_ref(), &interp.eval_ctx(&scope))? {
                return Err(illegal(IllegalReason::FailsLegality));
            }
            record_usage(&mut interp.state, &action.id);
            match run_pipeline(&mut interp, pipeline, mv.free_operation, &mut scope, &mut trace)? {
                PipelineRun::Declined(reason) => return Err(illegal(reason)),
                PipelineRun::Finished(flow) => flow,
            }
        }
        None => {
            record_usage(&mut interp.state, &action.id);
            run_plain_action(&mut interp, action, mv.free_operation, &mut scope)?
        }
    };
    if let Flow::Await(choice) = flow {
        debug!(action_id = %action.id, decision = %choice.decision, "move awaiting choice");
        return Ok(MoveOutcome::Awaiting(choice));
    }

    interp.events.push(TriggerEvent::ActionResolved {
        action_id: action.id.clone(),
        actor,
    });
    if let TurnOrderState::Simultaneous { submitted } = &mut interp.state.turn_order {
        submitted.insert(actor, true);
    }
    fire_triggers(&mut interp, 0, &mut trace)?;

    debug!(action_id = %action.id, ops = interp.budget.used(), events = interp.events.len(), "move applied");
    Ok(MoveOutcome::Applied(ApplyMoveResult {
        state: interp.state,
        trace,
        emitted_events: interp.events,
    }))
}

/// Actor, phase, limits and precondition, in that order.
fn admission(
    interp: &Interpreter<'_>,
    action: &ActionDef,
    bindings: &Bindings,
) -> Result<Option<IllegalReason>, KernelError> {
    let state = &interp.state;
    let ctx = interp.eval_ctx(bindings);

    if !resolve_player_sel(&action.actor, &ctx)?.contains(&state.active_player) {
        return Ok(Some(IllegalReason::ActorNotAllowed));
    }
    if !action.phases.is_empty() && !action.phases.contains(&state.current_phase) {
        return Ok(Some(IllegalReason::WrongPhase));
    }
    let usage = state.action_usage(&action.id);
    if let Some(limit) = action.limits.iter().find(|l| usage.count(l.scope) >= l.max) {
        return Ok(Some(IllegalReason::LimitReached {
            scope: limit.scope,
            max: limit.max,
        }));
    }
    if !eval_optional(action.pre.as_ref(), &ctx)? {
        return Ok(Some(IllegalReason::PreconditionFailed));
    }
    Ok(None)
}

/// Remove the first pending grant covering this player and action.
fn consume_grant(state: &mut GameState, player: PlayerId, action_id: &str) -> bool {
    let TurnOrderState::CardDriven(runtime) = &mut state.turn_order else {
        return false;
    };
    let Some(index) = runtime
        .pending_free_operation_grants
        .iter()
        .position(|g| g.covers(player, action_id))
    else {
        return false;
    };
    runtime.pending_free_operation_grants.remove(index);
    true
}

fn select_pipeline<'d>(
    def: &'d GameDef,
    interp: &Interpreter<'_>,
    action: &'d ActionDef,
    bindings: &Bindings,
) -> Result<Option<&'d ActionPipelineDef>, MoveError> {
    let ctx = interp.eval_ctx(bindings);
    let mut declared = false;
    let mut applicable = Vec::new();
    for pipeline in def.pipelines_for(&action.id) {
        declared = true;
        if eval_optional(pipeline.applicability.as_ref(), &ctx)? {
            applicable.push(pipeline);
        }
    }

    match applicable.as_slice() {
        [] if declared => Err(MoveError::Illegal(IllegalMove {
            action_id: action.id.clone(),
            reason: IllegalReason::NotApplicable,
        })),
        [] => Ok(None),
        [one] => Ok(Some(*one)),
        many => Err(KernelError::AmbiguousPipeline {
            action_id: action.id.clone(),
            pipelines: many.iter().map(|p| p.id.clone()).collect(),
        }
        .into()),
    }
}

fn record_usage(state: &mut GameState, action_id: &str) {
    let mut usage = state.action_usage(action_id);
    usage.turn = usage.turn.saturating_add(1);
    usage.phase = usage.phase.saturating_add(1);
    usage.game = usage.game.saturating_add(1);
    state.action_usage.insert(action_id.to_string(), usage);
}

enum PipelineRun {
    Finished(Flow),
    Declined(IllegalReason),
}

fn run_pipeline(
    interp: &mut Interpreter<'_>,
    pipeline: &ActionPipelineDef,
    free: bool,
    scope: &mut Bindings,
    trace: &mut Vec<TraceEntry>,
) -> Result<PipelineRun, KernelError> {
    let partial = pipeline.atomicity == Atomicity::Partial;

    if !free {
        if eval_optional(pipeline.cost_validation.as_ref(), &interp.eval_ctx(scope))? {
            if let Flow::Await(choice) = interp.run_list(&pipeline.cost_effects, scope)? {
                return Ok(PipelineRun::Finished(Flow::Await(choice)));
            }
            trace.push(TraceEntry::CostPaid {
                pipeline_id: pipeline.id.clone(),
            });
        } else if partial {
            debug!(pipeline_id = %pipeline.id, "cost validation failed, spend skipped");
            trace.push(TraceEntry::OperationPartial {
                pipeline_id: pipeline.id.clone(),
                step: PartialStep::CostSpendSkipped,
            });
        } else {
            return Ok(PipelineRun::Declined(IllegalReason::CostUnaffordable));
        }
    }

    for stage in &pipeline.stages {
        if !eval_optional(stage.requires.as_ref(), &interp.eval_ctx(scope))? {
            debug!(pipeline_id = %pipeline.id, stage = %stage.name, partial, "stage declined");
            if !partial {
                return Ok(PipelineRun::Declined(IllegalReason::StageDeclined {
                    stage: stage.name.clone(),
                }));
            }
            trace.push(TraceEntry::OperationPartial {
                pipeline_id: pipeline.id.clone(),
                step: PartialStep::StageDeclined {
                    stage: stage.name.clone(),
                },
            });
            continue;
        }

        if let Flow::Await(choice) = interp.run_list(&stage.effects, scope)? {
            return Ok(PipelineRun::Finished(Flow::Await(choice)));
        }
        debug!(pipeline_id = %pipeline.id, stage = %stage.name, "stage completed");
        trace.push(TraceEntry::StageCompleted {
            pipeline_id: pipeline.id.clone(),
            stage: stage.name.clone(),
        });
    }
    Ok(PipelineRun::Finished(Flow::Continue))
}

/// An action without pipelines runs its own cost, then its effects.
fn run_plain_action(
    interp: &mut Interpreter<'_>,
    action: &ActionDef,
    free: bool,
    scope: &mut Bindings,
) -> Result<Flow, KernelError> {
    if !free {
        if let Flow::Await(choice) = interp.run_list(&action.cost, scope)? {
            return Ok(Flow::Await(choice));
        }
    }
    interp.run_list(&action.effects, scope)
}

/// Build the starting state: defaults, `setup`, then the first phase.
///
/// Setup and the first `onEnter` run without a move, so they cannot ask
/// for decisions.
pub fn initial_state(def: &GameDef, seed: u64, player_count: usize) -> Result<GameState, KernelError> {
    let state = GameState::new(def, seed, player_count)?;
    let ctx = EffectContext::new(def, &state);
    let mut interp = Interpreter::new(&ctx, state);

    let no_choice = |choice: PendingChoice| KernelError::InvalidChoice {
        decision: choice.decision,
        reason: "decisions cannot be made during setup".to_string(),
    };

    if let Flow::Await(choice) = interp.run_list(&def.setup, &mut Bindings::new())? {
        return Err(no_choice(choice));
    }
    interp.events.push(TriggerEvent::TurnStart {
        player: interp.state.active_player,
    });
    if let Some(first) = def.phases.first() {
        if let Flow::Await(choice) = interp.enter_phase(&first.id)? {
            return Err(no_choice(choice));
        }
    }
    fire_triggers(&mut interp, 0, &mut Vec::new())?;

    debug!(game = %def.name, seed, player_count, ops = interp.budget.used(), "initial state built");
    Ok(interp.state)
}
