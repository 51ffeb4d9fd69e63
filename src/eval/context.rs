//! Evaluation context shared by the evaluator and the selector resolver.

use im::OrdMap;

use crate::core::{GameDef, GameState, PlayerId, Value};
use crate::error::KernelError;

/// Binding scope: `$name` -> value.
pub type Bindings = OrdMap<String, Value>;

/// Everything an expression or selector can read.
///
/// `active_player` is whose turn it is; `actor_player` is who is executing
/// the effect (they differ for effects run on another player's behalf).
#[derive(Clone, Copy, Debug)]
pub struct EvalContext<'a> {
    pub def: &'a GameDef,
    pub state: &'a GameState,
    pub active_player: PlayerId,
    pub actor_player: PlayerId,
    pub bindings: &'a Bindings,
}

impl<'a> EvalContext<'a> {
    /// Context where the state's active player is also the actor.
    pub fn new(def: &'a GameDef, state: &'a GameState, bindings: &'a Bindings) -> Self {
        Self {
            def,
            state,
            active_player: state.active_player,
            actor_player: state.active_player,
            bindings,
        }
    }

    #[must_use]
    pub fn with_actor(mut self, actor: PlayerId) -> Self {
        self.actor_player = actor;
        self
    }

    #[must_use]
    pub fn with_active(mut self, active: PlayerId) -> Self {
        self.active_player = active;
        self
    }

    #[must_use]
    pub fn player_count(&self) -> usize {
        self.state.player_count()
    }

    /// Look up a binding, failing with the names that are in scope.
    pub fn binding(&self, name: &str) -> Result<&'a Value, KernelError> {
        let bindings: &'a Bindings = self.bindings;
        bindings.get(name).ok_or_else(|| KernelError::MissingBinding {
            name: name.to_string(),
            available: bindings.keys().cloned().collect(),
        })
    }
}
