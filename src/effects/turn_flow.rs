//! Phase lifecycle, interrupts and card-driven bookkeeping.
//!
//! ## Phase lifecycle
//!
//! Leaving a phase runs its `onExit` effects, then records `PhaseExit`.
//! Entering one resets phase-scoped usage, records `PhaseEnter`, then runs
//! `onEnter`. `advancePhase` past the last turn phase ends the turn:
//! `TurnEnd` for the outgoing player, the turn-order runtime advances, then
//! `TurnStart` for the incoming one before the first phase is entered.
//!
//! ## Interrupts
//!
//! `pushInterruptPhase` suspends the current phase without leaving it and
//! enters the interrupt. `popInterruptPhase` leaves the interrupt and resumes
//! the recorded phase without re-entering it. Stepwise advancement is
//! rejected while an interrupt is active.

use tracing::debug;

use super::effect::EffectKind;
use super::interpreter::{Flow, Interpreter};
use crate::core::{
    CardDrivenRuntime, EligibilityOverride, FreeOperationGrant, InterruptFrame, LastingDuration, LastingEffect,
    PhaseDef, PhaseId, TurnOrderState, UsageScope,
};
use crate::error::{KernelError, ReferenceKind};
use crate::eval::Bindings;
use crate::rules::turn_order::{advance_turn_order, reset_usage};
use crate::selectors::{resolve_player_sel, PlayerSel};
use crate::triggers::TriggerEvent;

#[derive(Clone, Copy)]
enum Hook {
    Enter,
    Exit,
}

fn transition_error(from: &PhaseId, to: &PhaseId, reason: impl Into<String>) -> KernelError {
    KernelError::PhaseTransition {
        from: from.clone(),
        to: to.clone(),
        reason: reason.into(),
    }
}

impl Interpreter<'_> {
    fn phase(&self, phase: &PhaseId) -> Result<&PhaseDef, KernelError> {
        let def = self.def;
        def.phase_def(phase)
            .ok_or_else(|| KernelError::unknown(ReferenceKind::Phase, phase.as_str(), def.phase_names()))
    }

    fn turn_phase_index(&self, phase: &PhaseId) -> Result<usize, KernelError> {
        let def = self.def;
        match def.phase_index(phase) {
            Some(index) => Ok(index),
            None if def.phase_def(phase).is_some() => {
                Err(transition_error(&self.state.current_phase, phase, "not a turn phase"))
            }
            None => Err(KernelError::unknown(ReferenceKind::Phase, phase.as_str(), def.phase_names())),
        }
    }

    fn run_phase_hook(&mut self, phase: &PhaseId, hook: Hook) -> Result<Flow, KernelError> {
        let def = self.def;
        let Some(phase_def) = def.phase_def(phase) else {
            return Err(KernelError::unknown(ReferenceKind::Phase, phase.as_str(), def.phase_names()));
        };
        let effects = match hook {
            Hook::Enter => &phase_def.on_enter,
            Hook::Exit => &phase_def.on_exit,
        };
        self.run_list(effects, &mut Bindings::new())
    }

    pub(crate) fn enter_phase(&mut self, phase: &PhaseId) -> Result<Flow, KernelError> {
        self.state.current_phase = phase.clone();
        reset_usage(&mut self.state, UsageScope::Phase);
        self.events.push(TriggerEvent::PhaseEnter { phase: phase.clone() });
        self.run_phase_hook(phase, Hook::Enter)
    }

    fn exit_phase(&mut self, phase: &PhaseId) -> Result<Flow, KernelError> {
        let flow = self.run_phase_hook(phase, Hook::Exit)?;
        self.events.push(TriggerEvent::PhaseExit { phase: phase.clone() });
        Ok(flow)
    }

    /// Close the current turn and open the next one.
    pub(crate) fn end_turn(&mut self) {
        let outgoing = self.state.active_player;
        self.events.push(TriggerEvent::TurnEnd { player: outgoing });

        advance_turn_order(self.def, &mut self.state);
        self.state.turn_count = self.state.turn_count.saturating_add(1);
        reset_usage(&mut self.state, UsageScope::Turn);

        self.active = self.state.active_player;
        debug!(from = %outgoing, to = %self.active, turn = self.state.turn_count, "turn ended");
        self.events.push(TriggerEvent::TurnStart { player: self.active });
    }

    pub(crate) fn advance_phase(&mut self) -> Result<Flow, KernelError> {
        let current = self.state.current_phase.clone();
        if let Some(frame) = self.state.interrupt_stack.back() {
            return Err(transition_error(
                &current,
                &frame.resume_phase,
                "an interrupt phase is active",
            ));
        }
        let index = self.turn_phase_index(&current)?;

        if let Flow::Await(choice) = self.exit_phase(&current)? {
            return Ok(Flow::Await(choice));
        }
        let def = self.def;
        let phases = &def.phases;
        let next = match phases.get(index + 1) {
            Some(phase) => phase.id.clone(),
            None => {
                self.end_turn();
                phases.first().map_or_else(|| current.clone(), |p| p.id.clone())
            }
        };
        debug!(from = %current, to = %next, "phase advanced");
        self.enter_phase(&next)
    }

    pub(crate) fn goto_phase_exact(&mut self, target: &PhaseId) -> Result<Flow, KernelError> {
        let current = self.state.current_phase.clone();
        if !self.state.interrupt_stack.is_empty() {
            return Err(transition_error(&current, target, "an interrupt phase is active"));
        }
        let from = self.turn_phase_index(&current)?;
        let to = self.turn_phase_index(target)?;
        if to == from {
            return Ok(Flow::Continue);
        }
        if to < from {
            return Err(transition_error(&current, target, "cannot jump backwards within a turn"));
        }

        if let Flow::Await(choice) = self.exit_phase(&current)? {
            return Ok(Flow::Await(choice));
        }
        debug!(from = %current, to = %target, skipped = to - from - 1, "phase jumped");
        self.enter_phase(target)
    }

    pub(crate) fn push_interrupt_phase(&mut self, phase: &PhaseId, resume_phase: &PhaseId) -> Result<Flow, KernelError> {
        let def = self.def;
        if !def.interrupt_phases.iter().any(|p| &p.id == phase) {
            self.phase(phase)?;
            return Err(transition_error(
                &self.state.current_phase,
                phase,
                "not an interrupt phase",
            ));
        }
        self.phase(resume_phase)?;

        self.state.interrupt_stack.push_back(InterruptFrame {
            phase: phase.clone(),
            resume_phase: resume_phase.clone(),
        });
        debug!(%phase, resume = %resume_phase, depth = self.state.interrupt_stack.len(), "interrupt pushed");
        self.enter_phase(phase)
    }

    pub(crate) fn pop_interrupt_phase(&mut self) -> Result<Flow, KernelError> {
        let Some(frame) = self.state.interrupt_stack.pop_back() else {
            let current = self.state.current_phase.clone();
            return Err(transition_error(&current, &current, "no interrupt phase to pop"));
        };
        let flow = self.exit_phase(&frame.phase)?;
        debug!(phase = %frame.phase, resume = %frame.resume_phase, "interrupt popped");
        self.state.current_phase = frame.resume_phase;
        Ok(flow)
    }

    // === Card-driven turn order ===

    fn card_driven(&mut self, kind: EffectKind) -> Result<&mut CardDrivenRuntime, KernelError> {
        match &mut self.state.turn_order {
            TurnOrderState::CardDriven(runtime) => Ok(runtime),
            _ => Err(KernelError::invalid_effect(kind, "requires card-driven turn order")),
        }
    }

    pub(crate) fn grant_free_operation(
        &mut self,
        player: &PlayerSel,
        action_ids: &[String],
        bindings: &Bindings,
    ) -> Result<(), KernelError> {
        let players = resolve_player_sel(player, &self.eval_ctx(bindings))?;
        let runtime = self.card_driven(EffectKind::GrantFreeOperation)?;
        for player in players {
            runtime.pending_free_operation_grants.push_back(FreeOperationGrant {
                player,
                action_ids: action_ids.to_vec(),
            });
        }
        Ok(())
    }

    pub(crate) fn set_eligibility(
        &mut self,
        player: &PlayerSel,
        eligible: bool,
        bindings: &Bindings,
    ) -> Result<(), KernelError> {
        let players = resolve_player_sel(player, &self.eval_ctx(bindings))?;
        let runtime = self.card_driven(EffectKind::SetEligibility)?;
        for player in players {
            runtime
                .pending_eligibility_overrides
                .push_back(EligibilityOverride { player, eligible });
        }
        Ok(())
    }

    /// Re-adding an active effect replaces its duration.
    pub(crate) fn add_lasting_effect(&mut self, id: &str, duration: LastingDuration) -> Result<(), KernelError> {
        let runtime = self.card_driven(EffectKind::AddLastingEffect)?;
        runtime.active_lasting_effects = runtime
            .active_lasting_effects
            .iter()
            .filter(|e| e.id != id)
            .cloned()
            .collect();
        runtime.active_lasting_effects.push_back(LastingEffect {
            id: id.to_string(),
            duration,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{GameDef, GameState, PlayerId, TurnOrderConfig, VarDef, VarValue};
    use crate::effects::{apply_effect, apply_effects, Effect, EffectContext, EffectOutcome};

    fn def() -> GameDef {
        GameDef::new("flow", 2, 3)
            .with_global_var(VarDef::int("entered", 0, 0, 100))
            .with_global_var(VarDef::int("exited", 0, 0, 100))
            .with_phase(PhaseDef::new("upkeep").on_exit(vec![Effect::add_global("exited", 1)]))
            .with_phase(PhaseDef::new("main").on_enter(vec![Effect::add_global("entered", 1)]))
            .with_phase(PhaseDef::new("cleanup").on_enter(vec![Effect::add_global("entered", 10)]))
            .with_interrupt_phase(PhaseDef::new("retreat").on_exit(vec![Effect::add_global("exited", 5)]))
    }

    fn run(def: &GameDef, state: &GameState, effects: &[Effect]) -> Result<EffectOutcome, KernelError> {
        apply_effects(effects, state, &Bindings::new(), &EffectContext::new(def, state))
    }

    fn phase_events(events: &[TriggerEvent]) -> Vec<String> {
        events
            .iter()
            .filter_map(|e| match e {
                TriggerEvent::PhaseEnter { phase } => Some(format!("enter:{phase}")),
                TriggerEvent::PhaseExit { phase } => Some(format!("exit:{phase}")),
                TriggerEvent::TurnStart { player } => Some(format!("start:{player}")),
                TriggerEvent::TurnEnd { player } => Some(format!("end:{player}")),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_advance_runs_hooks_in_order() {
        let def = def();
        let state = GameState::new(&def, 7, 2).unwrap();
        let outcome = run(&def, &state, &[Effect::AdvancePhase]).unwrap();
        let result = outcome.result();

        assert_eq!(result.state.current_phase, PhaseId::new("main"));
        assert_eq!(result.state.global_var("exited"), Some(VarValue::Int(1)));
        assert_eq!(result.state.global_var("entered"), Some(VarValue::Int(1)));
        assert_eq!(phase_events(&result.emitted_events), vec!["exit:upkeep", "enter:main"]);
    }

    #[test]
    fn test_advance_past_last_phase_ends_turn() {
        let def = def();
        let mut state = GameState::new(&def, 7, 3).unwrap();
        state.current_phase = PhaseId::new("cleanup");
        let outcome = run(&def, &state, &[Effect::AdvancePhase]).unwrap();
        let next = outcome.state();

        assert_eq!(next.current_phase, PhaseId::new("upkeep"));
        assert_eq!(next.active_player, PlayerId::new(1));
        assert_eq!(next.turn_count, 2);
        assert_eq!(
            phase_events(&outcome.result().emitted_events),
            vec!["exit:cleanup", "end:0", "start:1", "enter:upkeep"]
        );
    }

    #[test]
    fn test_goto_skips_intermediate_phases() {
        let def = def();
        let state = GameState::new(&def, 7, 2).unwrap();
        let outcome = run(&def, &state, &[Effect::GotoPhaseExact { phase: "cleanup".into() }]).unwrap();

        assert_eq!(outcome.state().current_phase, PhaseId::new("cleanup"));
        assert_eq!(outcome.state().global_var("entered"), Some(VarValue::Int(10)));
        assert_eq!(
            phase_events(&outcome.result().emitted_events),
            vec!["exit:upkeep", "enter:cleanup"]
        );
    }

    #[test]
    fn test_goto_rejects_backward_and_ignores_same() {
        let def = def();
        let mut state = GameState::new(&def, 7, 2).unwrap();
        state.current_phase = PhaseId::new("main");

        assert!(matches!(
            run(&def, &state, &[Effect::GotoPhaseExact { phase: "upkeep".into() }]),
            Err(KernelError::PhaseTransition { .. })
        ));

        let same = run(&def, &state, &[Effect::GotoPhaseExact { phase: "main".into() }]).unwrap();
        assert!(same.result().emitted_events.is_empty());

        assert!(matches!(
            run(&def, &state, &[Effect::GotoPhaseExact { phase: "mian".into() }]),
            Err(KernelError::UnknownReference { .. })
        ));
    }

    #[test]
    fn test_interrupt_push_and_pop() {
        let def = def();
        let mut state = GameState::new(&def, 7, 2).unwrap();
        state.current_phase = PhaseId::new("main");
        let push = Effect::PushInterruptPhase {
            phase: "retreat".into(),
            resume_phase: "main".into(),
        };

        let pushed = run(&def, &state, &[push]).unwrap();
        let mid = pushed.state().clone();
        assert_eq!(mid.current_phase, PhaseId::new("retreat"));
        assert_eq!(mid.interrupt_stack.len(), 1);

        assert!(matches!(
            run(&def, &mid, &[Effect::AdvancePhase]),
            Err(KernelError::PhaseTransition { .. })
        ));

        let popped = run(&def, &mid, &[Effect::PopInterruptPhase]).unwrap();
        let after = popped.state();
        assert_eq!(after.current_phase, PhaseId::new("main"));
        assert!(after.interrupt_stack.is_empty());
        assert_eq!(after.global_var("exited"), Some(VarValue::Int(5)));
        assert_eq!(phase_events(&popped.result().emitted_events), vec!["exit:retreat"]);
    }

    #[test]
    fn test_push_requires_interrupt_phase() {
        let def = def();
        let state = GameState::new(&def, 7, 2).unwrap();
        let push = Effect::PushInterruptPhase {
            phase: "main".into(),
            resume_phase: "upkeep".into(),
        };
        assert!(matches!(
            apply_effect(&push, &state, &Bindings::new(), &EffectContext::new(&def, &state)),
            Err(KernelError::PhaseTransition { .. })
        ));
        assert!(matches!(
            run(&def, &state, &[Effect::PopInterruptPhase]),
            Err(KernelError::PhaseTransition { .. })
        ));
    }

    #[test]
    fn test_card_driven_effects_need_card_driven_order() {
        let def = def();
        let state = GameState::new(&def, 7, 2).unwrap();
        let grant = Effect::GrantFreeOperation {
            player: PlayerSel::Active,
            action_ids: vec!["rally".into()],
        };
        assert!(matches!(
            run(&def, &state, &[grant.clone()]),
            Err(KernelError::InvalidEffect { .. })
        ));

        let def = def.with_turn_order(TurnOrderConfig::CardDriven);
        let state = GameState::new(&def, 7, 2).unwrap();
        let effects = vec![
            grant,
            Effect::SetEligibility {
                player: PlayerSel::AllOther,
                eligible: false,
            },
            Effect::AddLastingEffect {
                id: "monsoon".into(),
                duration: LastingDuration::Turn,
            },
            Effect::AddLastingEffect {
                id: "monsoon".into(),
                duration: LastingDuration::Game,
            },
        ];
        let outcome = run(&def, &state, &effects).unwrap();
        let TurnOrderState::CardDriven(runtime) = &outcome.state().turn_order else {
            panic!("Expected card-driven runtime");
        };
        assert!(runtime.pending_free_operation_grants[0].covers(PlayerId::new(0), "rally"));
        assert_eq!(
            runtime.pending_eligibility_overrides[0],
            EligibilityOverride {
                player: PlayerId::new(1),
                eligible: false
            }
        );
        assert_eq!(runtime.active_lasting_effects.len(), 1);
        assert_eq!(runtime.active_lasting_effects[0].duration, LastingDuration::Game);
    }
}
