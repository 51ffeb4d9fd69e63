//! Domain events emitted by the interpreter.
//!
//! Events are recorded in emission order. They feed the move's audit trail
//! and trigger matching; nothing in the engine reacts to them directly.
//!
//! ## Payload bindings
//!
//! A trigger's effects see its event's payload as bindings:
//!
//! | Event | Bindings |
//! |-------|----------|
//! | phase enter / exit | `$event.phase` |
//! | turn start / end | `$event.player` |
//! | action resolved | `$event.action`, `$event.actor` |
//! | token entered | `$event.zone`, `$event.token` (id) |
//! | variable changed | `$event.var`, `$event.old`, `$event.new`, `$event.player` (per-player only) |

use serde::{Deserialize, Serialize};

use crate::core::{PhaseId, PlayerId, ScalarValue, TokenId, Value, VarValue, ZoneId};
use crate::eval::Bindings;

/// Something that happened while effects ran.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum TriggerEvent {
    PhaseEnter { phase: PhaseId },
    PhaseExit { phase: PhaseId },
    TurnStart { player: PlayerId },
    TurnEnd { player: PlayerId },
    ActionResolved { action_id: String, actor: PlayerId },
    TokenEntered { zone: ZoneId, token: TokenId },
    /// `player` is `None` for global variables.
    VarChanged {
        player: Option<PlayerId>,
        var: String,
        old: VarValue,
        new: VarValue,
    },
}

impl TriggerEvent {
    /// Payload bindings a trigger's effects run with.
    #[must_use]
    pub fn bindings(&self) -> Bindings {
        let mut bindings = Bindings::new();
        let mut bind = |name: &str, value: Value| {
            bindings.insert(format!("$event.{name}"), value);
        };
        match self {
            TriggerEvent::PhaseEnter { phase } | TriggerEvent::PhaseExit { phase } => {
                bind("phase", Value::Str(phase.as_str().to_string()));
            }
            TriggerEvent::TurnStart { player } | TriggerEvent::TurnEnd { player } => {
                bind("player", Value::Player(*player));
            }
            TriggerEvent::ActionResolved { action_id, actor } => {
                bind("action", Value::Str(action_id.clone()));
                bind("actor", Value::Player(*actor));
            }
            TriggerEvent::TokenEntered { zone, token } => {
                bind("zone", Value::Zone(zone.clone()));
                bind("token", Value::Str(token.as_str().to_string()));
            }
            TriggerEvent::VarChanged { player, var, old, new } => {
                bind("var", Value::Str(var.clone()));
                bind("old", ScalarValue::from(*old).into());
                bind("new", ScalarValue::from(*new).into());
                if let Some(player) = player {
                    bind("player", Value::Player(*player));
                }
            }
        }
        bindings
    }
}

/// Which events a trigger listens for. `None` filters match any value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum EventMatcher {
    PhaseEnter { phase: Option<PhaseId> },
    PhaseExit { phase: Option<PhaseId> },
    TurnStart,
    TurnEnd,
    ActionResolved { action_id: Option<String> },
    TokenEntered { zone: Option<ZoneId> },
    VarChanged { var: Option<String> },
}

impl EventMatcher {
    #[must_use]
    pub fn matches(&self, event: &TriggerEvent) -> bool {
        fn filter<T: PartialEq>(wanted: &Option<T>, actual: &T) -> bool {
            wanted.as_ref().map_or(true, |w| w == actual)
        }

        match (self, event) {
            (EventMatcher::PhaseEnter { phase: want }, TriggerEvent::PhaseEnter { phase })
            | (EventMatcher::PhaseExit { phase: want }, TriggerEvent::PhaseExit { phase }) => filter(want, phase),
            (EventMatcher::TurnStart, TriggerEvent::TurnStart { .. })
            | (EventMatcher::TurnEnd, TriggerEvent::TurnEnd { .. }) => true,
            (EventMatcher::ActionResolved { action_id: want }, TriggerEvent::ActionResolved { action_id, .. }) => {
                filter(want, action_id)
            }
            (EventMatcher::TokenEntered { zone: want }, TriggerEvent::TokenEntered { zone, .. }) => filter(want, zone),
            (EventMatcher::VarChanged { var: want }, TriggerEvent::VarChanged { var, .. }) => filter(want, var),
            _ => false,
        }
    }
}
