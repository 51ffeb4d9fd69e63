//! Turn-order runtime.
//!
//! Advances the active player at a turn boundary according to the
//! definition's `TurnOrderConfig`:
//!
//! - **RoundRobin**: next seat, wrapping.
//! - **FixedOrder**: next entry of the declared order, wrapping.
//! - **Simultaneous**: submission flags cleared, next seat.
//! - **CardDriven**: pending eligibility overrides applied, turn-duration
//!   lasting effects and unused grants dropped, next eligible seat. When no
//!   seat is eligible, every seat becomes eligible again.

use im::{OrdMap, Vector};
use tracing::trace;

use crate::core::{
    CardDrivenRuntime, GameDef, GameState, LastingDuration, PlayerId, TurnOrderConfig, TurnOrderState, UsageScope,
};

/// Hand the turn to the next player.
///
/// A runtime that does not match the configured kind is rebuilt first.
pub(crate) fn advance_turn_order(def: &GameDef, state: &mut GameState) {
    let count = state.player_count();
    let active = state.active_player;

    if !runtime_matches(&def.turn_order, &state.turn_order) {
        trace!("turn-order runtime rebuilt for configured kind");
        state.turn_order = TurnOrderState::initial(&def.turn_order, count);
    }

    let next = match (&def.turn_order, &mut state.turn_order) {
        (TurnOrderConfig::FixedOrder { order }, TurnOrderState::FixedOrder { current_index }) => {
            if order.is_empty() {
                active.right(count)
            } else {
                *current_index = (*current_index + 1) % order.len();
                order
                    .get(*current_index)
                    .copied()
                    .filter(|p| p.index() < count)
                    .unwrap_or_else(|| active.right(count))
            }
        }
        (_, TurnOrderState::Simultaneous { submitted }) => {
            *submitted = PlayerId::all(count).map(|p| (p, false)).collect();
            active.right(count)
        }
        (_, TurnOrderState::CardDriven(runtime)) => next_card_driven(runtime, active, count),
        _ => active.right(count),
    };
    state.active_player = next;
}

fn runtime_matches(config: &TurnOrderConfig, runtime: &TurnOrderState) -> bool {
    matches!(
        (config, runtime),
        (TurnOrderConfig::RoundRobin, TurnOrderState::RoundRobin)
            | (TurnOrderConfig::FixedOrder { .. }, TurnOrderState::FixedOrder { .. })
            | (TurnOrderConfig::Simultaneous, TurnOrderState::Simultaneous { .. })
            | (TurnOrderConfig::CardDriven, TurnOrderState::CardDriven(_))
    )
}

fn next_card_driven(runtime: &mut CardDrivenRuntime, active: PlayerId, count: usize) -> PlayerId {
    for ov in std::mem::take(&mut runtime.pending_eligibility_overrides) {
        runtime.eligibility.insert(ov.player, ov.eligible);
    }
    runtime.active_lasting_effects = runtime
        .active_lasting_effects
        .iter()
        .filter(|e| e.duration == LastingDuration::Game)
        .cloned()
        .collect();
    runtime.pending_free_operation_grants = Vector::new();

    let eligible = |eligibility: &OrdMap<PlayerId, bool>, p: PlayerId| eligibility.get(&p).copied().unwrap_or(true);
    let mut seat = active;
    for _ in 0..count {
        seat = seat.right(count);
        if eligible(&runtime.eligibility, seat) {
            return seat;
        }
    }

    runtime.eligibility = PlayerId::all(count).map(|p| (p, true)).collect();
    active.right(count)
}

/// Zero one usage scope on every action.
pub(crate) fn reset_usage(state: &mut GameState, scope: UsageScope) {
    state.action_usage = state
        .action_usage
        .iter()
        .map(|(action, usage)| {
            let mut usage = *usage;
            match scope {
                UsageScope::Turn => usage.turn = 0,
                UsageScope::Phase => usage.phase = 0,
                UsageScope::Game => usage.game = 0,
            }
            (action.clone(), usage)
        })
        .collect();
}
