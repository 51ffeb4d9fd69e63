//! Trigger definitions and the cascade that fires them.
//!
//! After a move's stages, every emitted event is matched against the
//! definition's triggers in declaration order. A matching trigger runs its
//! effects with the event payload bound (`$event.*`), under the move's
//! budget. Events those effects emit form the next wave; waves continue
//! until none are left or `max_trigger_depth` is reached.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::event::EventMatcher;
use crate::effects::{Effect, Flow, Interpreter};
use crate::error::KernelError;
use crate::eval::{eval_optional, Condition};
use crate::rules::TraceEntry;

/// A reaction to an event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerDef {
    pub id: String,
    pub event: EventMatcher,
    /// Checked with the event payload bound.
    #[serde(default)]
    pub when: Option<Condition>,
    #[serde(default)]
    pub effects: Vec<Effect>,
}

impl TriggerDef {
    pub fn new(id: impl Into<String>, event: EventMatcher) -> Self {
        Self {
            id: id.into(),
            event,
            when: None,
            effects: Vec::new(),
        }
    }

    #[must_use]
    pub fn when(mut self, condition: Condition) -> Self {
        self.when = Some(condition);
        self
    }

    #[must_use]
    pub fn with_effects(mut self, effects: Vec<Effect>) -> Self {
        self.effects = effects;
        self
    }
}

/// Fire triggers for every event recorded from `first_event` on.
///
/// A trigger that reaches a choice fails the whole call: there is no caller
/// to hand the decision to mid-cascade.
pub(crate) fn fire_triggers(
    interp: &mut Interpreter<'_>,
    first_event: usize,
    trace: &mut Vec<TraceEntry>,
) -> Result<(), KernelError> {
    let def = interp.def;
    if def.triggers.is_empty() {
        return Ok(());
    }

    let mut wave_start = first_event;
    let mut depth = 1;
    while wave_start < interp.events.len() {
        let wave_end = interp.events.len();

        if depth > def.limits.max_trigger_depth {
            let pending = interp.events[wave_start..wave_end]
                .iter()
                .filter(|event| def.triggers.iter().any(|t| t.event.matches(event)))
                .count();
            if pending > 0 {
                warn!(depth, pending, max_trigger_depth = def.limits.max_trigger_depth, "trigger cascade truncated");
                trace.push(TraceEntry::TriggerTruncated { depth, pending });
            }
            break;
        }

        for index in wave_start..wave_end {
            let event = interp.events[index].clone();
            let payload = event.bindings();
            for trigger in &def.triggers {
                if !trigger.event.matches(&event) {
                    continue;
                }
                let mut bindings = payload.clone();
                if !eval_optional(trigger.when.as_ref(), &interp.eval_ctx(&bindings))? {
                    continue;
                }

                debug!(trigger = %trigger.id, depth, "trigger fired");
                trace.push(TraceEntry::TriggerFired {
                    trigger: trigger.id.clone(),
                    depth,
                });
                if let Flow::Await(choice) = interp.run_list(&trigger.effects, &mut bindings)? {
                    return Err(KernelError::TriggerAwaitingChoice {
                        trigger: trigger.id.clone(),
                        decision: choice.decision,
                    });
                }
            }
        }

        wave_start = wave_end;
        depth += 1;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{EngineLimits, GameDef, GameState, TokenId, VarDef, VarValue, ZoneDef};
    use crate::effects::EffectContext;
    use crate::eval::{Query, ValueExpr};
    use crate::triggers::TriggerEvent;

    fn def() -> GameDef {
        GameDef::new("triggers", 2, 2)
            .with_global_var(VarDef::int("arrivals", 0, 0, 100))
            .with_global_var(VarDef::int("echo", 0, 0, 100))
            .with_zone(ZoneDef::new("saigon:none"))
            .with_trigger(
                TriggerDef::new(
                    "count-arrivals",
                    EventMatcher::TokenEntered {
                        zone: Some("saigon:none".into()),
                    },
                )
                .with_effects(vec![Effect::add_global("arrivals", 1)]),
            )
    }

    fn fire(def: &GameDef, events: Vec<TriggerEvent>) -> Result<(GameState, Vec<TraceEntry>), KernelError> {
        let state = GameState::new(def, 1, 2).unwrap();
        let ctx = EffectContext::new(def, &state);
        let mut interp = Interpreter::new(&ctx, state);
        interp.events = events;
        let mut trace = Vec::new();
        fire_triggers(&mut interp, 0, &mut trace)?;
        Ok((interp.state, trace))
    }

    fn entered(token: &str) -> TriggerEvent {
        TriggerEvent::TokenEntered {
            zone: "saigon:none".into(),
            token: TokenId::new(token),
        }
    }

    #[test]
    fn test_trigger_fires_per_matching_event() {
        let (state, trace) = fire(&def(), vec![entered("t0"), entered("t1")]).unwrap();

        assert_eq!(state.global_var("arrivals"), Some(VarValue::Int(2)));
        assert_eq!(
            trace,
            vec![
                TraceEntry::TriggerFired {
                    trigger: "count-arrivals".into(),
                    depth: 1
                },
                TraceEntry::TriggerFired {
                    trigger: "count-arrivals".into(),
                    depth: 1
                },
            ]
        );
    }

    #[test]
    fn test_condition_sees_payload() {
        let def = def().with_trigger(
            TriggerDef::new("only-t1", EventMatcher::TokenEntered { zone: None })
                .when(Condition::eq(ValueExpr::binding("$event.token"), "t1"))
                .with_effects(vec![Effect::add_global("echo", 1)]),
        );
        let (state, _) = fire(&def, vec![entered("t0"), entered("t1")]).unwrap();
        assert_eq!(state.global_var("echo"), Some(VarValue::Int(1)));
    }

    #[test]
    fn test_cascade_truncated_at_depth() {
        let def = def()
            .with_trigger(
                TriggerDef::new("echo", EventMatcher::VarChanged { var: None })
                    .with_effects(vec![Effect::add_global("echo", 1)]),
            )
            .with_limits(EngineLimits {
                max_trigger_depth: 3,
                ..EngineLimits::default()
            });
        let (state, trace) = fire(&def, vec![entered("t0")]).unwrap();

        // depth 1: arrivals, depth 2: echo (from arrivals), depth 3: echo (from echo)
        assert_eq!(state.global_var("arrivals"), Some(VarValue::Int(1)));
        assert_eq!(state.global_var("echo"), Some(VarValue::Int(2)));
        assert_eq!(
            trace.last(),
            Some(&TraceEntry::TriggerTruncated { depth: 4, pending: 1 })
        );
    }

    #[test]
    fn test_choice_inside_trigger_fails() {
        let def = def().with_trigger(
            TriggerDef::new("ask", EventMatcher::TokenEntered { zone: None }).with_effects(vec![Effect::choose_one(
                "where",
                "$z",
                Query::Zones {
                    category: None,
                    owner: None,
                },
            )]),
        );
        assert_eq!(
            fire(&def, vec![entered("t0")]).unwrap_err(),
            KernelError::TriggerAwaitingChoice {
                trigger: "ask".into(),
                decision: "where".into()
            }
        );
    }
}
